//! Static pricing tables used by the cost engine.
//!
//! Tables are built once at startup, either from [`FactorTables::standard`] or
//! from a YAML document, and shared read-only afterwards. Every lookup returns
//! an `Option` and leaves the neutral default to the caller.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::model::{Complexity, Condition, RoomType};

#[derive(Error, Debug)]
pub enum FactorTablesError {
    #[error("Failed to read factor tables from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid factor tables document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Factor tables must define a base cost table for '{0}'")]
    MissingWholeHome(&'static str),
}

/// Base costs for one room type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCosts {
    pub materials_per_sqft: f64,
    pub materials_flat: f64,
    pub labor_per_sqft: f64,
    pub labor_flat: f64,
    pub permits: f64,
    pub design: f64,
    /// Used when neither the assessment nor the wizard gives a size.
    pub typical_sqft: f64,
}

/// Label → multiplier map with case-insensitive, trimmed keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, f64>")]
pub struct MultiplierTable(HashMap<String, f64>);

impl MultiplierTable {
    pub fn get(&self, label: &str) -> Option<f64> {
        self.0.get(&normalize(label)).copied()
    }

    pub fn max_value(&self) -> Option<f64> {
        self.0.values().copied().reduce(f64::max)
    }
}

impl From<HashMap<String, f64>> for MultiplierTable {
    fn from(entries: HashMap<String, f64>) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(label, value)| (normalize(&label), value))
                .collect(),
        )
    }
}

impl<const N: usize> From<[(&str, f64); N]> for MultiplierTable {
    fn from(entries: [(&str, f64); N]) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(label, value)| (normalize(label), value))
                .collect(),
        )
    }
}

fn normalize(label: &str) -> String {
    label.trim().to_ascii_lowercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorTables {
    /// Keyed by catalog label, e.g. "Kitchen Remodeling".
    pub room_costs: HashMap<String, RoomCosts>,
    pub complexity: MultiplierTable,
    pub condition: MultiplierTable,
    pub finish_level: MultiplierTable,
    pub location: MultiplierTable,
    pub priority: MultiplierTable,
    pub timeline: MultiplierTable,
    /// Flat dollar amounts keyed by the literal selection label.
    #[serde(default)]
    pub finish_adjustments: HashMap<String, f64>,
    /// Timeline label that triggers schedule compression.
    #[serde(default = "default_rush_timeline")]
    pub rush_timeline: String,
}

fn default_rush_timeline() -> String {
    "rush".to_string()
}

impl FactorTables {
    pub const WHOLE_HOME: &'static str = "Whole Home Renovation";

    pub fn from_yaml(document: &str) -> Result<Self, FactorTablesError> {
        let tables: FactorTables = serde_yaml::from_str(document)?;
        if !tables.room_costs.contains_key(Self::WHOLE_HOME) {
            return Err(FactorTablesError::MissingWholeHome(Self::WHOLE_HOME));
        }
        Ok(tables)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FactorTablesError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| FactorTablesError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&document)
    }

    pub fn room_costs(&self, room: &RoomType) -> Option<&RoomCosts> {
        self.room_costs.get(room.label())
    }

    /// Base costs for `room`, falling back to the whole-home table.
    pub fn room_costs_or_whole_home(&self, room: &RoomType) -> RoomCosts {
        self.room_costs(room)
            .or_else(|| self.room_costs.get(Self::WHOLE_HOME))
            .copied()
            .unwrap_or(WHOLE_HOME_COSTS)
    }

    pub fn complexity(&self, complexity: Complexity) -> Option<f64> {
        self.complexity.get(complexity.as_str())
    }

    pub fn condition_label(&self, label: &str) -> Option<f64> {
        self.condition.get(label)
    }

    pub fn condition(&self, condition: Condition) -> Option<f64> {
        self.condition.get(condition.as_str())
    }

    pub fn finish_level(&self, label: &str) -> Option<f64> {
        self.finish_level.get(label)
    }

    pub fn location(&self, label: &str) -> Option<f64> {
        self.location.get(label)
    }

    pub fn priority(&self, label: &str) -> Option<f64> {
        self.priority.get(label)
    }

    pub fn timeline(&self, label: &str) -> Option<f64> {
        self.timeline.get(label)
    }

    pub fn finish_adjustment(&self, selection: &str) -> Option<f64> {
        self.finish_adjustments.get(selection).copied()
    }

    pub fn is_rush(&self, timeline: &str) -> bool {
        normalize(timeline) == normalize(&self.rush_timeline)
    }

    /// The built-in price book.
    pub fn standard() -> Self {
        let room_costs = [
            (
                RoomType::Kitchen,
                RoomCosts {
                    materials_per_sqft: 210.0,
                    materials_flat: 6500.0,
                    labor_per_sqft: 150.0,
                    labor_flat: 4500.0,
                    permits: 1200.0,
                    design: 2500.0,
                    typical_sqft: 180.0,
                },
            ),
            (
                RoomType::Bathroom,
                RoomCosts {
                    materials_per_sqft: 185.0,
                    materials_flat: 4000.0,
                    labor_per_sqft: 140.0,
                    labor_flat: 3000.0,
                    permits: 800.0,
                    design: 1500.0,
                    typical_sqft: 75.0,
                },
            ),
            (
                RoomType::Basement,
                RoomCosts {
                    materials_per_sqft: 45.0,
                    materials_flat: 3500.0,
                    labor_per_sqft: 38.0,
                    labor_flat: 3000.0,
                    permits: 1500.0,
                    design: 2000.0,
                    typical_sqft: 800.0,
                },
            ),
            (RoomType::WholeHome, WHOLE_HOME_COSTS),
            (
                RoomType::Addition,
                RoomCosts {
                    materials_per_sqft: 160.0,
                    materials_flat: 12000.0,
                    labor_per_sqft: 130.0,
                    labor_flat: 10000.0,
                    permits: 3500.0,
                    design: 6000.0,
                    typical_sqft: 400.0,
                },
            ),
            (
                RoomType::OutdoorLiving,
                RoomCosts {
                    materials_per_sqft: 40.0,
                    materials_flat: 2500.0,
                    labor_per_sqft: 30.0,
                    labor_flat: 2000.0,
                    permits: 600.0,
                    design: 1000.0,
                    typical_sqft: 300.0,
                },
            ),
        ]
        .into_iter()
        .map(|(room, costs)| (room.label().to_string(), costs))
        .collect();

        let finish_adjustments = [
            ("Quartz Countertops", 3500.0),
            ("Granite Countertops", 2800.0),
            ("Marble Countertops", 5200.0),
            ("Butcher Block Countertops", 1200.0),
            ("Laminate Countertops", 0.0),
            ("Custom Cabinets", 9000.0),
            ("Semi-Custom Cabinets", 4500.0),
            ("Stock Cabinets", 0.0),
            ("Hardwood Flooring", 4500.0),
            ("Luxury Vinyl Plank", 1800.0),
            ("Porcelain Tile", 2200.0),
            ("Natural Stone Tile", 3800.0),
            ("Carpet", 600.0),
            ("Frameless Glass Shower", 2500.0),
            ("Freestanding Tub", 3000.0),
            ("Heated Floors", 2200.0),
            ("Double Vanity", 1800.0),
            ("Floating Vanity", 1400.0),
            ("Smart Home Package", 3200.0),
            ("Recessed Lighting", 1500.0),
            ("Composite Decking", 4000.0),
            ("Outdoor Kitchen", 12000.0),
        ]
        .into_iter()
        .map(|(label, amount)| (label.to_string(), amount))
        .collect();

        Self {
            room_costs,
            complexity: MultiplierTable::from([("low", 0.9), ("medium", 1.0), ("high", 1.25)]),
            condition: MultiplierTable::from([
                ("excellent", 0.95),
                ("good", 1.0),
                ("fair", 1.1),
                ("poor", 1.3),
                ("needs full gut", 1.45),
            ]),
            finish_level: MultiplierTable::from([
                ("basic", 0.85),
                ("standard", 1.0),
                ("premium", 1.35),
                ("luxury", 1.8),
            ]),
            location: MultiplierTable::from([
                ("rural", 0.92),
                ("suburban", 1.0),
                ("urban", 1.15),
                ("downtown core", 1.25),
            ]),
            priority: MultiplierTable::from([
                ("budget", 0.95),
                ("balanced", 1.0),
                ("quality", 1.1),
                ("speed", 1.05),
            ]),
            timeline: MultiplierTable::from([
                ("flexible", 0.95),
                ("standard", 1.0),
                ("rush", 1.2),
            ]),
            finish_adjustments,
            rush_timeline: default_rush_timeline(),
        }
    }
}

const WHOLE_HOME_COSTS: RoomCosts = RoomCosts {
    materials_per_sqft: 95.0,
    materials_flat: 15000.0,
    labor_per_sqft: 80.0,
    labor_flat: 12000.0,
    permits: 4000.0,
    design: 7500.0,
    typical_sqft: 1800.0,
};

impl Default for FactorTables {
    fn default() -> Self {
        Self::standard()
    }
}
