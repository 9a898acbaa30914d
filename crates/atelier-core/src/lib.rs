//! # Atelier Core Library
//!
//! This library provides the capacity and delivery scheduling engine for
//! Atelier, an agency operations tool. All operations are available via a
//! standalone CLI binary; any outer HTTP or GUI surface is a thin layer over
//! the same core library.
//!
//! ## Architecture
//!
//! - **Estimator**: derives raw and buffered work-hours for a project from
//!   its plan, add-ons, and overrides
//! - **Calendar**: pure business-day arithmetic (weekends skipped)
//! - **Allocator**: packs required hours into per-day blocks under a
//!   daily-dedication ceiling
//! - **Projector**: forward delivery projection (with an optional remote
//!   computation path) and backward reconciliation of committed blocks
//! - **Tracker**: per-block start/stop time tracking
//! - **Storage**: SQLite-based block/project storage and TOML configuration
//!
//! ## Key Components
//!
//! - [`HoursEstimator`]: plan + add-ons + buffer into required hours
//! - [`AllocationPlan`]: the per-day packing the allocator produces
//! - [`RemoteProjector`]: remote projection with local fallback
//! - [`BlockDb`]: capacity block and project persistence

pub mod calendar;
pub mod error;
pub mod estimate;
pub mod projector;
pub mod schedule;
pub mod scheduler;
pub mod storage;
pub mod tracker;

pub use error::{ConfigError, CoreError, DatabaseError, ProjectionError, ValidationError};
pub use estimate::{HoursBreakdown, HoursEstimate, HoursEstimator};
pub use projector::{DeliveryProjection, Reconciliation, RemoteProjector};
pub use schedule::{AddOn, BlockTask, BlockType, CapacityBlock, DayAggregate, Project};
pub use scheduler::{AllocationPlan, DayAllocation};
pub use storage::{BlockDb, EngineConfig};
pub use tracker::{TrackingState, TrackingStopped};
