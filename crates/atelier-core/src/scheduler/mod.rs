//! Block allocator: packs required hours into per-day capacity blocks.
//!
//! The walk is forward only, one workday at a time, starting strictly after
//! the given start date. Each day receives `min(remaining, daily_dedication)`
//! hours; the date of the last allocated day is the estimated delivery date.
//! This module is the single implementation of that rule -- the delivery
//! projector and its remote-failure fallback both call into it, so the two
//! paths cannot drift apart.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar;
use crate::error::ValidationError;
use crate::schedule::{BlockType, CapacityBlock, Project};

/// Tolerance for the floating-point hour countdown.
const HOURS_EPSILON: f64 = 1e-9;

/// One day's worth of allocated hours.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayAllocation {
    pub date: NaiveDate,
    pub hours: f64,
}

/// The ordered result of packing a required-hours total into workdays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationPlan {
    /// Date-ascending day allocations.
    pub days: Vec<DayAllocation>,
    /// Date of the last allocated day; `None` when nothing was scheduled.
    pub estimated_date: Option<NaiveDate>,
    /// Number of workdays used.
    pub work_days: usize,
}

impl AllocationPlan {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn total_hours(&self) -> f64 {
        self.days.iter().map(|d| d.hours).sum()
    }
}

/// Pack `required_hours` into workdays strictly after `start`.
///
/// `required_hours <= 0` yields an empty plan (nothing to schedule).
///
/// # Errors
/// Returns an error when `daily_dedication` is not strictly positive.
pub fn allocate(
    required_hours: f64,
    daily_dedication: f64,
    start: NaiveDate,
) -> Result<AllocationPlan, ValidationError> {
    if daily_dedication <= 0.0 {
        return Err(ValidationError::NonPositiveDedication {
            hours: daily_dedication,
        });
    }

    let mut days = Vec::new();
    let mut remaining = required_hours;
    let mut cursor = start;

    while remaining > HOURS_EPSILON {
        cursor = calendar::next_workday(cursor);
        let hours = remaining.min(daily_dedication);
        days.push(DayAllocation {
            date: cursor,
            hours,
        });
        remaining -= hours;
    }

    Ok(AllocationPlan {
        estimated_date: days.last().map(|d| d.date),
        work_days: days.len(),
        days,
    })
}

/// Turn an allocation plan into capacity blocks for a project.
///
/// Every block is a production block carrying the project linkage; `shadow`
/// selects forecast entries versus committed work. The caller persists the
/// result (see `BlockDb::replace_project_blocks` for the regenerate path).
pub fn materialize(plan: &AllocationPlan, project: &Project, shadow: bool) -> Vec<CapacityBlock> {
    plan.days
        .iter()
        .map(|day| {
            let mut block = CapacityBlock::new(project.name.clone(), BlockType::Production, day.hours);
            block.date = Some(day.date);
            block.is_shadow = shadow;
            block.project_id = Some(project.id.clone());
            block.client_name = project.client_name.clone();
            block
        })
        .collect()
}
