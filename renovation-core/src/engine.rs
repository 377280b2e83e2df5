//! Deterministic renovation cost model.
//!
//! [`CostEstimationEngine::estimate`] is a pure function of the request, the
//! space assessment and the factor tables. It never fails: every lookup miss
//! degrades to a neutral default (multiplier `1.0`, the whole-home cost table,
//! or a zero finish adjustment).

use std::sync::Arc;
use tracing::debug;

use crate::factors::FactorTables;
use crate::model::{
    AppliedFactors, Condition, CostBreakdown, CostEstimate, EstimateRequest, SpaceAssessment,
};
use crate::range::SquareFootageRange;

/// Hard ceiling on the product of the six multipliers.
pub const MAX_COMBINED_MULTIPLIER: f64 = 3.0;
/// Fixed display reduction applied to every cost line.
pub const COST_REDUCTION: f64 = 0.5;
pub const CONTINGENCY_RATE: f64 = 0.10;
pub const RANGE_LOW: f64 = 0.95;
pub const RANGE_HIGH: f64 = 1.12;
/// Multipliers above this mark a "heavy" condition or complexity.
pub const HEAVY_FACTOR: f64 = 1.2;
pub const POOR_CONDITION_PERMIT_FACTOR: f64 = 1.3;
pub const SQFT_PER_WEEK: f64 = 80.0;
pub const BASE_WEEKS: f64 = 3.0;
pub const MIN_RUSH_WEEKS: f64 = 3.0;
/// Ceiling on the priced area; larger figures are treated as this size.
pub const MAX_SQUARE_FOOTAGE: f64 = 1_000_000.0;
const RUSH_COMPRESSION: f64 = 0.7;
const CONDITION_WEEKS_FACTOR: f64 = 1.25;
const COMPLEXITY_WEEKS_FACTOR: f64 = 1.2;

#[derive(Debug, Clone)]
pub struct CostEstimationEngine {
    tables: Arc<FactorTables>,
}

impl CostEstimationEngine {
    pub fn new(tables: Arc<FactorTables>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &FactorTables {
        &self.tables
    }

    pub fn estimate(&self, request: &EstimateRequest, assessment: &SpaceAssessment) -> CostEstimate {
        let tables = self.tables.as_ref();
        let answers = &request.user_answers;
        let costs = tables.room_costs_or_whole_home(&request.room_type);

        let range = answers
            .square_footage_range
            .as_deref()
            .and_then(SquareFootageRange::parse);
        let square_footage = resolve_square_footage(assessment.square_footage, range, costs.typical_sqft);

        let factors = self.resolve_factors(request, assessment);
        let condition = self
            .resolve_condition(answers.current_condition.as_deref(), assessment.condition)
            .map(|(label, _)| label);

        let materials_base = costs.materials_per_sqft * square_footage + costs.materials_flat;
        let labor_base = costs.labor_per_sqft * square_footage + costs.labor_flat;
        let permits_base = if factors.condition > HEAVY_FACTOR {
            costs.permits * POOR_CONDITION_PERMIT_FACTOR
        } else {
            costs.permits
        };
        // Design follows taste, not site difficulty.
        let design_base = costs.design * factors.finish_level;

        let materials = dollars(materials_base * factors.combined * COST_REDUCTION);
        let labor = dollars(labor_base * factors.combined * COST_REDUCTION);
        let permits = dollars(permits_base * COST_REDUCTION);
        let design = dollars(design_base * COST_REDUCTION);

        let selections_total: f64 = request
            .selected_finishes
            .values()
            .map(|selection| tables.finish_adjustment(selection).unwrap_or(0.0))
            .sum();
        let finish_adjustment = dollars(selections_total * factors.location * COST_REDUCTION);

        let subtotal = [labor, permits, design, finish_adjustment]
            .into_iter()
            .fold(materials, u64::saturating_add);
        let contingency = dollars(subtotal as f64 * CONTINGENCY_RATE);
        let total_base = subtotal.saturating_add(contingency);

        let estimated_weeks = self.estimate_weeks(request, assessment, square_footage, &factors);

        debug!(
            room_type = %request.room_type,
            square_footage,
            combined_multiplier = factors.combined,
            total_base,
            estimated_weeks,
            "Cost estimate computed"
        );

        CostEstimate {
            min: dollars(total_base as f64 * RANGE_LOW),
            max: dollars(total_base as f64 * RANGE_HIGH),
            breakdown: CostBreakdown {
                materials: materials.saturating_add(finish_adjustment),
                labor,
                design,
                permits,
                contingency,
            },
            finish_adjustment,
            total_base,
            square_footage,
            estimated_weeks,
            condition,
            applied_factors: factors,
        }
    }

    /// Resolves the six multipliers and their capped product.
    pub fn resolve_factors(
        &self,
        request: &EstimateRequest,
        assessment: &SpaceAssessment,
    ) -> AppliedFactors {
        let tables = self.tables.as_ref();
        let answers = &request.user_answers;
        let by_label = |label: &Option<String>, lookup: fn(&FactorTables, &str) -> Option<f64>| {
            label
                .as_deref()
                .and_then(|label| lookup(tables, label))
                .unwrap_or(1.0)
        };

        let complexity = assessment
            .complexity
            .and_then(|complexity| tables.complexity(complexity))
            .unwrap_or(1.0);
        let condition = self
            .resolve_condition(answers.current_condition.as_deref(), assessment.condition)
            .map_or(1.0, |(_, value)| value);
        let finish_level = by_label(&answers.finish_level, FactorTables::finish_level);
        let location = by_label(&answers.location, FactorTables::location);
        let priority = by_label(&answers.priority, FactorTables::priority);
        let timeline = by_label(&answers.timeline, FactorTables::timeline);

        let product = complexity * condition * finish_level * location * priority * timeline;
        let combined = product.min(MAX_COMBINED_MULTIPLIER);

        AppliedFactors {
            complexity,
            condition,
            finish_level,
            location,
            priority,
            timeline,
            combined,
            combined_capped: product > MAX_COMBINED_MULTIPLIER,
        }
    }

    /// Condition label matched in the condition table and its multiplier.
    /// The owner's own description of the space wins over the model's.
    pub fn resolve_condition(
        &self,
        stated: Option<&str>,
        assessed: Option<Condition>,
    ) -> Option<(String, f64)> {
        let stated = stated.and_then(|label| {
            self.tables
                .condition_label(label)
                .map(|value| (label.trim().to_ascii_lowercase(), value))
        });
        stated.or_else(|| {
            assessed.and_then(|condition| {
                self.tables
                    .condition(condition)
                    .map(|value| (condition.as_str().to_string(), value))
            })
        })
    }

    fn estimate_weeks(
        &self,
        request: &EstimateRequest,
        assessment: &SpaceAssessment,
        square_footage: f64,
        factors: &AppliedFactors,
    ) -> u32 {
        let mut weeks = assessment
            .estimated_weeks
            .filter(|weeks| weeks.is_finite() && *weeks > 0.0)
            .unwrap_or_else(|| (square_footage / SQFT_PER_WEEK).ceil() + BASE_WEEKS);

        // Inflate before compressing: rush shortens the realistic duration.
        if factors.condition > HEAVY_FACTOR {
            weeks *= CONDITION_WEEKS_FACTOR;
        }
        if factors.complexity > HEAVY_FACTOR {
            weeks *= COMPLEXITY_WEEKS_FACTOR;
        }

        let rush = request
            .user_answers
            .timeline
            .as_deref()
            .is_some_and(|timeline| self.tables.is_rush(timeline));
        let weeks = if rush {
            whole_weeks(weeks * RUSH_COMPRESSION).max(MIN_RUSH_WEEKS)
        } else {
            whole_weeks(weeks)
        };

        weeks as u32
    }
}

fn resolve_square_footage(
    assessed: Option<f64>,
    range: Option<SquareFootageRange>,
    typical: f64,
) -> f64 {
    let sqft = match (assessed.filter(|sqft| sqft.is_finite() && *sqft > 0.0), range) {
        (Some(sqft), Some(range)) => range.clamp(sqft),
        (Some(sqft), None) => sqft,
        (None, Some(range)) => range.midpoint(),
        (None, None) => typical,
    };
    if sqft.is_finite() {
        sqft.min(MAX_SQUARE_FOOTAGE)
    } else {
        MAX_SQUARE_FOOTAGE
    }
}

/// Rounds to whole dollars; negative or non-finite amounts become zero.
fn dollars(amount: f64) -> u64 {
    if amount.is_finite() && amount > 0.0 {
        amount.round() as u64
    } else {
        0
    }
}

/// Ceiling to whole weeks, absorbing float noise such as `15.000000000000002`.
fn whole_weeks(weeks: f64) -> f64 {
    (weeks - 1e-9).ceil()
}
