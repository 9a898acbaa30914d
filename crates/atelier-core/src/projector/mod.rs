//! Delivery projection and schedule reconciliation.
//!
//! Forward projection answers "when will this finish" by running the
//! allocator without materializing anything. Reconciliation compares the
//! committed production schedule against the current buffered estimate and
//! reports how many calendar days the effective delivery has moved earlier.
//!
//! Both the local projection path and the remote-failure fallback in
//! [`remote`] call [`project_delivery`]; there is deliberately no second
//! copy of the rule anywhere.

pub mod remote;

pub use remote::RemoteProjector;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar;
use crate::error::{CoreError, ValidationError};
use crate::schedule::{BlockType, CapacityBlock};
use crate::scheduler;

/// Tolerance for comparing summed block hours against the estimate.
const HOURS_EPSILON: f64 = 1e-9;

/// Forward projection result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DeliveryProjection {
    /// Estimated delivery date; `None` when there is nothing to schedule.
    pub estimated_date: Option<NaiveDate>,
    /// Workdays the allocation spans.
    pub work_days: usize,
}

/// Project `buffered_hours` forward from `start` at `daily_dedication`
/// hours per workday.
///
/// Pure function of its inputs. This is the shared rule: the remote
/// collaborator computes the same thing, and the fallback path re-invokes
/// this exact function.
pub fn project_delivery(
    buffered_hours: f64,
    daily_dedication: f64,
    start: NaiveDate,
) -> Result<DeliveryProjection, ValidationError> {
    let plan = scheduler::allocate(buffered_hours, daily_dedication, start)?;
    Ok(DeliveryProjection {
        estimated_date: plan.estimated_date,
        work_days: plan.work_days,
    })
}

/// Result of reconciling committed blocks against the current estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Sum of committed production hours.
    pub total_scheduled: f64,
    /// The buffered estimate the schedule was compared against.
    pub needed_hours: f64,
    /// Date of the last committed block, when any exist.
    pub last_date: Option<NaiveDate>,
    /// Earlier effective delivery date, only when acceleration was detected.
    pub accelerated_date: Option<NaiveDate>,
    /// Calendar days gained; 0 when the schedule holds.
    pub days_advanced: i64,
}

impl Reconciliation {
    pub fn has_acceleration(&self) -> bool {
        self.days_advanced > 0
    }

    /// The date delivery is effectively expected on.
    pub fn effective_delivery_date(&self) -> Option<NaiveDate> {
        self.accelerated_date.or(self.last_date)
    }
}

/// Reconcile a project's committed schedule against `needed_hours`.
///
/// Only committed production blocks with a date participate; shadow
/// forecasts and backlog items are ignored. When more hours are scheduled
/// than needed, the surplus is consumed walking backward from the last
/// block: fully-consumed trailing blocks drop off, and the first block the
/// surplus only partially covers becomes the effective last day. The
/// difference is reported in calendar days, clamped at zero.
///
/// A later estimate edit is reinterpreted here on every call; reconciliation
/// never rewrites the block set itself.
pub fn reconcile_blocks(
    blocks: &[CapacityBlock],
    needed_hours: f64,
) -> Result<Reconciliation, ValidationError> {
    if needed_hours <= 0.0 {
        return Err(ValidationError::InvalidValue {
            field: "needed_hours".to_string(),
            message: format!("must be positive, got {needed_hours}"),
        });
    }

    let mut committed: Vec<&CapacityBlock> = blocks
        .iter()
        .filter(|b| !b.is_shadow && b.block_type == BlockType::Production && b.date.is_some())
        .collect();
    committed.sort_by_key(|b| b.date);

    let total_scheduled: f64 = committed.iter().map(|b| b.hours).sum();
    let last_date = committed.last().and_then(|b| b.date);

    let mut result = Reconciliation {
        total_scheduled,
        needed_hours,
        last_date,
        accelerated_date: None,
        days_advanced: 0,
    };

    let last_date = match last_date {
        Some(date) => date,
        None => return Ok(result),
    };

    if total_scheduled <= needed_hours + HOURS_EPSILON {
        return Ok(result);
    }

    // Walk backward consuming the surplus. A block the surplus fully covers
    // is dropped; the first block it only partially covers still ends on its
    // own day and becomes the effective last day.
    let mut extra = total_scheduled - needed_hours;
    let mut accelerated = last_date;
    for block in committed.iter().rev() {
        if extra >= block.hours - HOURS_EPSILON {
            extra -= block.hours;
        } else {
            accelerated = block.date.unwrap_or(accelerated);
            break;
        }
    }

    let days_advanced = calendar::calendar_days_between(last_date, accelerated);
    if days_advanced > 0 {
        result.accelerated_date = Some(accelerated);
        result.days_advanced = days_advanced;
    }

    Ok(result)
}

/// Store access the reconciliation side effect needs.
///
/// Abstracting the store keeps the walk itself pure and testable without a
/// database.
pub trait BlockStore {
    type Error: Into<CoreError>;

    /// Committed production blocks for a project, date ascending.
    fn committed_blocks(&self, project_id: &str) -> Result<Vec<CapacityBlock>, Self::Error>;

    /// Persist the reconciliation result on the project row.
    fn set_days_advanced(&self, project_id: &str, days: i64) -> Result<(), Self::Error>;
}

/// Reconcile a project and persist `days_advanced`, the only write
/// reconciliation performs.
pub fn reconcile_with_store<S: BlockStore>(
    store: &S,
    project_id: &str,
    needed_hours: f64,
) -> Result<Reconciliation, CoreError> {
    let blocks = store.committed_blocks(project_id).map_err(Into::into)?;
    let result = reconcile_blocks(&blocks, needed_hours)?;
    store
        .set_days_advanced(project_id, result.days_advanced)
        .map_err(Into::into)?;

    tracing::debug!(
        project_id,
        total_scheduled = result.total_scheduled,
        days_advanced = result.days_advanced,
        "reconciled project schedule"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::CapacityBlock;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn committed(day: NaiveDate, hours: f64) -> CapacityBlock {
        let mut block = CapacityBlock::new("work", BlockType::Production, hours);
        block.project_id = Some("p1".to_string());
        block.date = Some(day);
        block
    }

    #[test]
    fn projection_matches_allocator() {
        let projection = project_delivery(52.0, 4.0, date(2025, 3, 10)).unwrap();
        assert_eq!(projection.work_days, 13);
        assert_eq!(projection.estimated_date, Some(date(2025, 3, 27)));

        let empty = project_delivery(0.0, 4.0, date(2025, 3, 10)).unwrap();
        assert_eq!(empty.estimated_date, None);
        assert_eq!(empty.work_days, 0);
    }

    #[test]
    fn exact_fit_reports_no_acceleration() {
        let blocks: Vec<_> = (0u32..13)
            .map(|i| committed(crate::calendar::add_workdays(date(2025, 3, 10), i + 1), 4.0))
            .collect();

        let result = reconcile_blocks(&blocks, 52.0).unwrap();
        assert_eq!(result.total_scheduled, 52.0);
        assert_eq!(result.days_advanced, 0);
        assert_eq!(result.accelerated_date, None);
        assert_eq!(result.effective_delivery_date(), result.last_date);
    }

    #[test]
    fn partial_trailing_block_is_not_acceleration() {
        // 60 h scheduled against a 52 h estimate: the surplus of 8 h is less
        // than the 10 h final block, so the effective last day is unchanged.
        let blocks = vec![
            committed(date(2025, 3, 10), 25.0),
            committed(date(2025, 3, 11), 25.0),
            committed(date(2025, 3, 12), 10.0),
        ];

        let result = reconcile_blocks(&blocks, 52.0).unwrap();
        assert_eq!(result.total_scheduled, 60.0);
        assert_eq!(result.days_advanced, 0);
        assert_eq!(result.accelerated_date, None);
    }

    #[test]
    fn fully_consumed_trailing_blocks_advance_the_date() {
        // Surplus of 12 h swallows the 10 h final block whole and bites 2 h
        // into the 8 h block before it, which keeps its own day.
        let blocks = vec![
            committed(date(2025, 3, 10), 20.0),
            committed(date(2025, 3, 11), 22.0),
            committed(date(2025, 3, 12), 8.0),
            committed(date(2025, 3, 14), 10.0),
        ];

        let result = reconcile_blocks(&blocks, 48.0).unwrap();
        assert_eq!(result.total_scheduled, 60.0);
        assert_eq!(result.accelerated_date, Some(date(2025, 3, 12)));
        assert_eq!(result.days_advanced, 2);
        assert!(result.has_acceleration());

        // Hours up to and including the accelerated date still cover the
        // estimate.
        let covered: f64 = blocks
            .iter()
            .filter(|b| b.date <= Some(date(2025, 3, 12)))
            .map(|b| b.hours)
            .sum();
        assert!(covered >= 48.0);
    }

    #[test]
    fn shortfall_reports_zero_days_advanced() {
        let blocks = vec![committed(date(2025, 3, 10), 20.0)];
        let result = reconcile_blocks(&blocks, 52.0).unwrap();
        assert_eq!(result.days_advanced, 0);
        assert_eq!(result.accelerated_date, None);
        assert_eq!(result.last_date, Some(date(2025, 3, 10)));
    }

    #[test]
    fn shadow_and_inbox_blocks_are_ignored() {
        let mut shadow = committed(date(2025, 3, 12), 40.0);
        shadow.is_shadow = true;
        let mut inbox = CapacityBlock::new("backlog", BlockType::Production, 40.0);
        inbox.project_id = Some("p1".to_string());

        let blocks = vec![committed(date(2025, 3, 10), 10.0), shadow, inbox];
        let result = reconcile_blocks(&blocks, 52.0).unwrap();
        assert_eq!(result.total_scheduled, 10.0);
        assert_eq!(result.last_date, Some(date(2025, 3, 10)));
    }

    #[test]
    fn no_committed_blocks_yields_empty_result() {
        let result = reconcile_blocks(&[], 52.0).unwrap();
        assert_eq!(result.total_scheduled, 0.0);
        assert_eq!(result.last_date, None);
        assert_eq!(result.effective_delivery_date(), None);
    }

    #[test]
    fn non_positive_estimate_rejected() {
        assert!(reconcile_blocks(&[], 0.0).is_err());
        assert!(reconcile_blocks(&[], -5.0).is_err());
    }

    #[test]
    fn unsorted_input_is_sorted_before_the_walk() {
        let blocks = vec![
            committed(date(2025, 3, 14), 10.0),
            committed(date(2025, 3, 10), 20.0),
            committed(date(2025, 3, 12), 30.0),
        ];
        let result = reconcile_blocks(&blocks, 50.0).unwrap();
        assert_eq!(result.last_date, Some(date(2025, 3, 14)));
        assert_eq!(result.accelerated_date, Some(date(2025, 3, 12)));
        assert_eq!(result.days_advanced, 2);
    }
}
