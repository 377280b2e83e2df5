use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Renovation project types offered in the estimate wizard.
///
/// Labels outside the catalog are kept verbatim in [`RoomType::Other`] so the
/// request can still be priced against the generic whole-home table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RoomType {
    Kitchen,
    Bathroom,
    Basement,
    WholeHome,
    Addition,
    OutdoorLiving,
    Other(String),
}

impl RoomType {
    pub const CATALOG: [RoomType; 6] = [
        RoomType::Kitchen,
        RoomType::Bathroom,
        RoomType::Basement,
        RoomType::WholeHome,
        RoomType::Addition,
        RoomType::OutdoorLiving,
    ];

    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "kitchen remodeling" | "kitchen" => RoomType::Kitchen,
            "bathroom remodeling" | "bathroom" => RoomType::Bathroom,
            "basement finishing" | "basement" => RoomType::Basement,
            "whole home renovation" | "whole home" => RoomType::WholeHome,
            "home addition" | "addition" => RoomType::Addition,
            "outdoor living" | "deck & patio" => RoomType::OutdoorLiving,
            _ => RoomType::Other(label.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            RoomType::Kitchen => "Kitchen Remodeling",
            RoomType::Bathroom => "Bathroom Remodeling",
            RoomType::Basement => "Basement Finishing",
            RoomType::WholeHome => "Whole Home Renovation",
            RoomType::Addition => "Home Addition",
            RoomType::OutdoorLiving => "Outdoor Living",
            RoomType::Other(label) => label,
        }
    }

    /// Short noun used when describing the space in prompts.
    pub fn space_noun(&self) -> &str {
        match self {
            RoomType::Kitchen => "kitchen",
            RoomType::Bathroom => "bathroom",
            RoomType::Basement => "basement",
            RoomType::WholeHome => "home interior",
            RoomType::Addition => "home addition",
            RoomType::OutdoorLiving => "outdoor living space",
            RoomType::Other(label) => label,
        }
    }
}

impl From<String> for RoomType {
    fn from(label: String) -> Self {
        RoomType::from_label(&label)
    }
}

impl From<RoomType> for String {
    fn from(room: RoomType) -> Self {
        room.label().to_string()
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Complexity::Low),
            "medium" | "moderate" => Some(Complexity::Medium),
            "high" => Some(Complexity::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Good,
    Fair,
    Poor,
}

impl Condition {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "good" | "excellent" => Some(Condition::Good),
            "fair" | "average" => Some(Condition::Fair),
            "poor" | "needs full gut" => Some(Condition::Poor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Good => "good",
            Condition::Fair => "fair",
            Condition::Poor => "poor",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Answers collected by the estimate wizard. All free-text labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnswers {
    pub square_footage_range: Option<String>,
    pub finish_level: Option<String>,
    pub current_condition: Option<String>,
    pub property_type: Option<String>,
    pub location: Option<String>,
    pub priority: Option<String>,
    pub timeline: Option<String>,
    #[serde(flatten)]
    pub contact: ContactInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRequest {
    pub room_type: RoomType,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub selected_finishes: BTreeMap<String, String>,
    #[serde(default)]
    pub user_answers: UserAnswers,
}

impl EstimateRequest {
    pub fn new(room_type: RoomType) -> Self {
        Self {
            room_type,
            image_url: None,
            selected_finishes: BTreeMap::new(),
            user_answers: UserAnswers::default(),
        }
    }

    /// The photo URL, if one was supplied and is not blank.
    pub fn photo_url(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Space characteristics inferred from the photo and answers.
///
/// Every field is optional: an assessment synthesized without an assessor is
/// simply `SpaceAssessment::default()` and the engine fills in the gaps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceAssessment {
    pub square_footage: Option<f64>,
    pub complexity: Option<Complexity>,
    pub condition: Option<Condition>,
    pub estimated_weeks: Option<f64>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub materials: u64,
    pub labor: u64,
    pub design: u64,
    pub permits: u64,
    pub contingency: u64,
}

impl CostBreakdown {
    pub fn total(&self) -> u64 {
        [self.labor, self.design, self.permits, self.contingency]
            .into_iter()
            .fold(self.materials, u64::saturating_add)
    }

    /// Category name and amount, in presentation order.
    pub fn entries(&self) -> [(&'static str, u64); 5] {
        [
            ("materials", self.materials),
            ("labor", self.labor),
            ("design", self.design),
            ("permits", self.permits),
            ("contingency", self.contingency),
        ]
    }
}

/// Resolved multipliers, reported for auditability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFactors {
    pub complexity: f64,
    pub condition: f64,
    pub finish_level: f64,
    pub location: f64,
    pub priority: f64,
    pub timeline: f64,
    pub combined: f64,
    pub combined_capped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub min: u64,
    pub max: u64,
    /// Materials here include the per-selection finish adjustment.
    pub breakdown: CostBreakdown,
    pub finish_adjustment: u64,
    pub total_base: u64,
    pub square_footage: f64,
    pub estimated_weeks: u32,
    /// Condition label the multiplier was taken from; `None` when neutral.
    pub condition: Option<String>,
    pub applied_factors: AppliedFactors,
}
