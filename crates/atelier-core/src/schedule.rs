//! Domain types for capacity blocks and projects.
//!
//! A [`CapacityBlock`] is the unit of scheduled work: one chunk of hours on
//! one calendar day (or in the backlog when it has no date). Blocks are
//! created in bulk by the allocator or one at a time by direct scheduling.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Type of capacity block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    /// Manually scheduled ad-hoc work
    Manual,
    /// Project-linked delivery work; always carries a project id
    Production,
    /// Meetings and other non-delivery commitments
    Meeting,
}

/// An ordered sub-item inside a block, pure progress tracking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockTask {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

impl BlockTask {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            completed: false,
        }
    }
}

/// The unit of scheduled (or backlog) work.
///
/// A block with `date == None` is a backlog/inbox item: it is excluded from
/// every day aggregate and is never a shadow block. Shadow blocks are
/// forecast entries generated by the allocator before commitment; they count
/// toward forecast hours but never toward a day's committed capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityBlock {
    pub id: String,
    /// Calendar day, or `None` for backlog items.
    pub date: Option<NaiveDate>,
    pub title: String,
    pub block_type: BlockType,
    /// Planned duration in hours. Always positive; 0.5 h granularity in the UI.
    pub hours: f64,
    /// Accumulated tracked duration, populated by tracker stop events.
    pub actual_hours: Option<f64>,
    /// Optional fixed time-of-day (HH:mm). Fixed blocks sort before unfixed
    /// ones within a day.
    pub start_time: Option<String>,
    /// Forecast entry not yet confirmed as committed work.
    pub is_shadow: bool,
    pub completed: bool,
    /// Non-null exactly while a timer is running on this block.
    pub tracking_started_at: Option<DateTime<Utc>>,
    pub tasks: Vec<BlockTask>,
    pub notes: String,
    pub client_name: Option<String>,
    pub project_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CapacityBlock {
    /// Create a new block. Callers set `date`, `project_id`, etc. before
    /// persisting; [`CapacityBlock::validate`] is enforced at the store
    /// boundary.
    pub fn new(title: impl Into<String>, block_type: BlockType, hours: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            date: None,
            title: title.into(),
            block_type,
            hours,
            actual_hours: None,
            start_time: None,
            is_shadow: false,
            completed: false,
            tracking_started_at: None,
            tasks: Vec::new(),
            notes: String::new(),
            client_name: None,
            project_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True for backlog items (no assigned date).
    pub fn is_inbox(&self) -> bool {
        self.date.is_none()
    }

    /// Check the block invariants.
    ///
    /// - `hours > 0`
    /// - production blocks reference a project
    /// - backlog items are never shadow blocks
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.hours <= 0.0 {
            return Err(ValidationError::NonPositiveHours { hours: self.hours });
        }
        if self.block_type == BlockType::Production && self.project_id.is_none() {
            return Err(ValidationError::ProductionWithoutProject {
                block_id: self.id.clone(),
            });
        }
        if self.date.is_none() && self.is_shadow {
            return Err(ValidationError::ShadowInboxBlock {
                block_id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Append a sub-item and return its id.
    pub fn add_task(&mut self, text: impl Into<String>) -> String {
        let task = BlockTask::new(text);
        let id = task.id.clone();
        self.tasks.push(task);
        self.updated_at = Utc::now();
        id
    }

    /// Toggle a sub-item by id. Returns false when the id is unknown.
    pub fn toggle_task(&mut self, task_id: &str) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == task_id) {
            Some(task) => {
                task.completed = !task.completed;
                self.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Fraction of completed sub-items, 0.0 when the block has none.
    pub fn task_progress(&self) -> f64 {
        if self.tasks.is_empty() {
            return 0.0;
        }
        let done = self.tasks.iter().filter(|t| t.completed).count();
        done as f64 / self.tasks.len() as f64
    }

    pub fn set_completed(&mut self, completed: bool) {
        self.completed = completed;
        self.updated_at = Utc::now();
    }
}

/// An add-on purchased with a plan, each with an hours cost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddOn {
    pub name: String,
    pub hours: f64,
}

/// The project subset the engine reads and writes.
///
/// Projects are owned by the external persistence API; the engine stores the
/// scheduling-relevant fields and persists `days_advanced` as the single
/// reconciliation side effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub client_name: Option<String>,
    pub plan_type: String,
    pub add_ons: Vec<AddOn>,
    /// Manual override of the estimated raw hours.
    pub custom_hours: Option<f64>,
    /// Risk margin on top of raw hours, 0..=100.
    pub buffer_percentage: f64,
    /// Hours/day ceiling used when allocating this project.
    pub daily_dedication: f64,
    pub estimated_hours: Option<f64>,
    pub quoted_delivery_date: Option<NaiveDate>,
    pub confirmed_delivery_date: Option<NaiveDate>,
    pub hours_completed: f64,
    /// Calendar days the effective delivery moved earlier, written by
    /// reconciliation.
    pub days_advanced: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>, plan_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            client_name: None,
            plan_type: plan_type.into(),
            add_ons: Vec::new(),
            custom_hours: None,
            buffer_percentage: 30.0,
            daily_dedication: 4.0,
            estimated_hours: None,
            quoted_delivery_date: None,
            confirmed_delivery_date: None,
            hours_completed: 0.0,
            days_advanced: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-day capacity summary.
///
/// Shadow hours are reported separately and never count toward the committed
/// total; backlog items appear in no aggregate at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayAggregate {
    pub date: NaiveDate,
    /// Sum of hours over non-shadow blocks on this day.
    pub total_hours: f64,
    /// Sum of hours over shadow blocks on this day.
    pub shadow_hours: f64,
    /// Committed total exceeds the configured day capacity.
    pub over_capacity: bool,
    /// More than one shadow block landed on this day.
    pub has_overlap: bool,
}

/// Ordering key for blocks within a day: fixed start times first (sorted by
/// time), then unfixed blocks in insertion order.
pub fn day_order_key(block: &CapacityBlock) -> (bool, Option<String>, DateTime<Utc>) {
    (
        block.start_time.is_none(),
        block.start_time.clone(),
        block.created_at,
    )
}
