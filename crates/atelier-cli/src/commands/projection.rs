use atelier_core::estimate::HoursEstimator;
use atelier_core::projector::{self, RemoteProjector};
use atelier_core::storage::{BlockDb, EngineConfig};
use clap::Subcommand;

use super::{parse_date, today};

#[derive(Subcommand)]
pub enum ProjectionAction {
    /// Compute the estimated delivery date for a buffered-hours total
    Compute {
        /// Buffered hours to schedule
        #[arg(long)]
        hours: f64,
        /// Hours/day ceiling; defaults to the configured value
        #[arg(long)]
        dedication: Option<f64>,
        /// Start date (YYYY-MM-DD); allocation begins the next workday
        #[arg(long)]
        start: Option<String>,
        /// Skip the remote endpoint even when configured
        #[arg(long)]
        local: bool,
    },
    /// Materialize capacity blocks for a project
    Generate {
        /// Project id
        project: String,
        /// Override the buffered hours; defaults to the project estimate
        #[arg(long)]
        hours: Option<f64>,
        /// Start date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        start: Option<String>,
        /// Create forecast (shadow) blocks instead of committed work
        #[arg(long)]
        shadow: bool,
        /// Replace the project's existing blocks
        #[arg(long)]
        replace: bool,
        /// Confirm the destructive replace
        #[arg(long)]
        yes: bool,
    },
    /// Reconcile a project's committed schedule against its estimate
    Reconcile {
        /// Project id
        project: String,
        /// Override the buffered hours; defaults to the project estimate
        #[arg(long)]
        hours: Option<f64>,
    },
}

/// Buffered hours for a project: explicit override, or the estimator run on
/// the project's own plan and buffer.
fn buffered_hours(
    config: &EngineConfig,
    project: &atelier_core::schedule::Project,
    override_hours: Option<f64>,
) -> Result<f64, Box<dyn std::error::Error>> {
    if let Some(hours) = override_hours {
        return Ok(hours);
    }
    let estimator = HoursEstimator::new(config.estimate.clone());
    Ok(estimator.estimate_project(project)?.buffered_hours)
}

pub fn run(action: ProjectionAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::load_or_default();

    match action {
        ProjectionAction::Compute {
            hours,
            dedication,
            start,
            local,
        } => {
            let dedication = config
                .scheduling
                .validate_dedication(dedication.unwrap_or(config.scheduling.daily_dedication))?;
            let start = match start {
                Some(s) => parse_date(&s)?,
                None => today(),
            };

            let projection = if local {
                projector::project_delivery(hours, dedication, start)?
            } else {
                let projector = RemoteProjector::new(&config.projection);
                let runtime = tokio::runtime::Runtime::new()?;
                runtime.block_on(projector.project(hours, dedication, start))?
            };
            println!("{}", serde_json::to_string_pretty(&projection)?);
        }
        ProjectionAction::Generate {
            project,
            hours,
            start,
            shadow,
            replace,
            yes,
        } => {
            if replace && !yes {
                return Err(
                    "--replace deletes the project's existing blocks; pass --yes to confirm".into(),
                );
            }

            let db = BlockDb::open()?;
            let project = db.require_project(&project)?;
            let hours = buffered_hours(&config, &project, hours)?;
            let dedication = config
                .scheduling
                .validate_dedication(project.daily_dedication)?;
            let start = match start {
                Some(s) => parse_date(&s)?,
                None => today(),
            };

            let blocks =
                db.materialize_project_blocks(&project, hours, dedication, start, shadow, replace)?;
            match blocks.last() {
                Some(last) => println!(
                    "{} blocks generated, last on {}",
                    blocks.len(),
                    last.date.map(|d| d.to_string()).unwrap_or_default()
                ),
                None => println!("nothing to schedule"),
            }
        }
        ProjectionAction::Reconcile { project, hours } => {
            let db = BlockDb::open()?;
            let project = db.require_project(&project)?;
            let hours = buffered_hours(&config, &project, hours)?;

            let result = projector::reconcile_with_store(&db, &project.id, hours)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}
