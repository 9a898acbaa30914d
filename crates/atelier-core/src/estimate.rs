//! Hours estimation.
//!
//! Derives the required effort for a project: raw hours from the plan
//! catalog plus add-ons (or a manual override), then a buffered total with
//! the configured risk margin on top. The buffered value drives every
//! downstream scheduling decision; the breakdown exists for client-facing
//! transparency only.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::schedule::{AddOn, Project};
use crate::storage::config::EstimateConfig;

/// Round to the nearest half hour, for display.
pub fn round_to_half_hour(hours: f64) -> f64 {
    (hours * 2.0).round() / 2.0
}

/// Split of the buffered total into reporting categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HoursBreakdown {
    /// Design/build effort.
    pub technical: f64,
    /// Administrative and sales overhead.
    pub administrative: f64,
}

/// Result of an estimation run.
///
/// `buffered_hours` is carried at full precision for downstream arithmetic;
/// `display_hours` is the half-hour-rounded figure shown to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoursEstimate {
    pub raw_hours: f64,
    pub buffered_hours: f64,
    pub display_hours: f64,
    pub breakdown: HoursBreakdown,
}

/// Derives required effort from plan, add-ons, and overrides.
#[derive(Debug, Clone)]
pub struct HoursEstimator {
    config: EstimateConfig,
}

impl HoursEstimator {
    pub fn new(config: EstimateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimateConfig {
        &self.config
    }

    /// Base hours for a plan type from the configured catalog.
    pub fn plan_base_hours(&self, plan_type: &str) -> Result<f64, ValidationError> {
        self.config
            .plan_hours
            .get(plan_type)
            .copied()
            .ok_or_else(|| ValidationError::UnknownPlanType(plan_type.to_string()))
    }

    /// Estimate required hours.
    ///
    /// `custom_hours` set and positive overrides the catalog entirely;
    /// otherwise raw hours are the plan base plus the sum of add-on costs.
    /// `buffered = raw * (1 + buffer_percentage / 100)`, so the buffered
    /// total is never below the raw total and equals it exactly at 0 %.
    pub fn estimate(
        &self,
        plan_type: &str,
        add_ons: &[AddOn],
        custom_hours: Option<f64>,
        buffer_percentage: f64,
    ) -> Result<HoursEstimate, ValidationError> {
        if !(0.0..=100.0).contains(&buffer_percentage) {
            return Err(ValidationError::BufferOutOfRange {
                value: buffer_percentage,
            });
        }

        let raw_hours = match custom_hours {
            Some(hours) if hours > 0.0 => hours,
            _ => {
                let base = self.plan_base_hours(plan_type)?;
                base + add_ons.iter().map(|a| a.hours).sum::<f64>()
            }
        };

        let buffered_hours = raw_hours * (1.0 + buffer_percentage / 100.0);
        let technical = buffered_hours * self.config.technical_share;

        Ok(HoursEstimate {
            raw_hours,
            buffered_hours,
            display_hours: round_to_half_hour(buffered_hours),
            breakdown: HoursBreakdown {
                technical,
                administrative: buffered_hours - technical,
            },
        })
    }

    /// Estimate a project using its own plan, add-ons, override, and buffer.
    pub fn estimate_project(&self, project: &Project) -> Result<HoursEstimate, ValidationError> {
        self.estimate(
            &project.plan_type,
            &project.add_ons,
            project.custom_hours,
            project.buffer_percentage,
        )
    }
}
