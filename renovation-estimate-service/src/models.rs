use renovation_core::{
    AppliedFactors, Complexity, CostEstimate, EstimateRequest, SpaceAssessment, Visualization,
};
use serde::{Deserialize, Serialize};

/// Used when the assessor produced no notes.
pub const DEFAULT_NOTES: &str =
    "Estimate based on the project details you provided and typical regional costs.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLine {
    pub cost: u64,
    pub percentage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdownView {
    pub materials: CostLine,
    pub labor: CostLine,
    pub design: CostLine,
    pub permits: CostLine,
    pub contingency: CostLine,
}

impl CostBreakdownView {
    /// Each category as a share of `totalBase`, rounded to a whole percent.
    pub fn from_estimate(estimate: &CostEstimate) -> Self {
        let line = |cost: u64| CostLine {
            cost,
            percentage: share(cost, estimate.total_base),
        };
        let breakdown = &estimate.breakdown;
        Self {
            materials: line(breakdown.materials),
            labor: line(breakdown.labor),
            design: line(breakdown.design),
            permits: line(breakdown.permits),
            contingency: line(breakdown.contingency),
        }
    }
}

fn share(cost: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (cost as f64 / total as f64 * 100.0).round() as u32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    pub estimate_id: String,
    pub square_footage: f64,
    pub complexity: Complexity,
    /// Label the condition multiplier came from, e.g. "needs full gut".
    pub condition: Option<String>,
    pub estimated_weeks: u32,
    pub visualization_url: Option<String>,
    pub visualization_source: Option<String>,
    pub cost_breakdown: CostBreakdownView,
    pub total_min: u64,
    pub total_max: u64,
    pub notes: String,
    pub applied_factors: AppliedFactors,
    pub project_details: EstimateRequest,
}

impl EstimateResponse {
    pub fn assemble(
        estimate_id: String,
        request: &EstimateRequest,
        assessment: &SpaceAssessment,
        estimate: &CostEstimate,
        visualization: &Visualization,
    ) -> Self {
        let notes = if assessment.notes.trim().is_empty() {
            DEFAULT_NOTES.to_string()
        } else {
            assessment.notes.clone()
        };

        Self {
            estimate_id,
            square_footage: estimate.square_footage,
            complexity: assessment.complexity.unwrap_or(Complexity::Medium),
            condition: estimate.condition.clone(),
            estimated_weeks: estimate.estimated_weeks,
            visualization_url: visualization.url().map(str::to_string),
            visualization_source: visualization.source().map(str::to_string),
            cost_breakdown: CostBreakdownView::from_estimate(estimate),
            total_min: estimate.min,
            total_max: estimate.max,
            notes,
            applied_factors: estimate.applied_factors,
            project_details: request.clone(),
        }
    }
}
