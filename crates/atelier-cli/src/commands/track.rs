use atelier_core::storage::BlockDb;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum TrackAction {
    /// Start the timer on a block (no-op while already running)
    Start { id: String },
    /// Stop the timer, folding elapsed time into actual hours
    Stop {
        id: String,
        /// Override the elapsed duration instead of using wall-clock time
        #[arg(long)]
        minutes: Option<i64>,
    },
    /// Show the tracking state of a block
    Status { id: String },
}

pub fn run(action: TrackAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = BlockDb::open()?;
    let now = chrono::Utc::now();

    match action {
        TrackAction::Start { id } => {
            let block = db.start_tracking(&id, now)?;
            println!("tracking '{}'", block.title);
        }
        TrackAction::Stop { id, minutes } => {
            let stopped = match minutes {
                Some(minutes) => db.stop_tracking_with_elapsed(&id, minutes, now)?,
                None => db.stop_tracking(&id, now)?,
            };
            match stopped {
                Some(stopped) => println!(
                    "stopped after {} min, {:.2}h tracked in total",
                    stopped.elapsed_minutes, stopped.actual_hours
                ),
                None => println!("no timer running"),
            }
        }
        TrackAction::Status { id } => {
            let block = db.require_block(&id)?;
            match block.tracking_started_at {
                Some(_) => println!(
                    "running, {} min elapsed",
                    block.elapsed_minutes_at(now)
                ),
                None => println!(
                    "idle, {:.2}h tracked",
                    block.actual_hours.unwrap_or(0.0)
                ),
            }
        }
    }
    Ok(())
}
