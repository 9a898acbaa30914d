use atelier_core::schedule::{BlockType, CapacityBlock};
use atelier_core::storage::{BlockDb, EngineConfig};
use clap::Subcommand;

use super::parse_date;

#[derive(Subcommand)]
pub enum BlockAction {
    /// Create a block; without --date it lands in the inbox
    Add {
        title: String,
        /// Planned hours
        #[arg(long)]
        hours: f64,
        /// manual, production, or meeting
        #[arg(long, default_value = "manual")]
        kind: String,
        /// Day (YYYY-MM-DD); omit for the inbox
        #[arg(long)]
        date: Option<String>,
        /// Fixed time of day (HH:mm)
        #[arg(long)]
        time: Option<String>,
        /// Project id (required for production blocks)
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        client: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List scheduled blocks, with day capacity summaries
    List {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// List backlog items
    Inbox,
    /// Put a block on a day (inbox items keep their identity)
    Schedule { id: String, date: String },
    /// Edit a block's fields
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        hours: Option<f64>,
        /// Fixed time of day (HH:mm); "none" clears it
        #[arg(long)]
        time: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Mark a block completed (or not, with --undo)
    Done {
        id: String,
        #[arg(long)]
        undo: bool,
    },
    /// Delete a single block
    Rm { id: String },
    /// Delete a block and all future blocks of its project
    RmFuture {
        id: String,
        /// Confirm the bulk delete
        #[arg(long)]
        yes: bool,
    },
}

fn parse_block_kind(value: &str) -> Result<BlockType, Box<dyn std::error::Error>> {
    match value {
        "manual" => Ok(BlockType::Manual),
        "production" => Ok(BlockType::Production),
        "meeting" => Ok(BlockType::Meeting),
        other => Err(format!("unknown block kind '{other}'").into()),
    }
}

pub fn run(action: BlockAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = BlockDb::open()?;

    match action {
        BlockAction::Add {
            title,
            hours,
            kind,
            date,
            time,
            project,
            client,
            notes,
        } => {
            let mut block = CapacityBlock::new(title, parse_block_kind(&kind)?, hours);
            block.date = date.as_deref().map(parse_date).transpose()?;
            block.start_time = time;
            block.project_id = project;
            block.client_name = client;
            block.notes = notes.unwrap_or_default();

            db.create_block(&block)?;
            println!("created block {}", block.id);
        }
        BlockAction::List { from, to } => {
            let from = from.as_deref().map(parse_date).transpose()?;
            let to = to.as_deref().map(parse_date).transpose()?;
            let blocks = db.list_blocks(from, to)?;
            if blocks.is_empty() {
                println!("no scheduled blocks");
                return Ok(());
            }

            let config = EngineConfig::load_or_default();
            let mut current_day = None;
            for block in &blocks {
                if block.date != current_day {
                    current_day = block.date;
                    if let Some(day) = block.date {
                        let aggregate =
                            db.day_aggregate(day, config.scheduling.max_day_capacity)?;
                        let mut flags = String::new();
                        if aggregate.over_capacity {
                            flags.push_str(" [over capacity]");
                        }
                        if aggregate.has_overlap {
                            flags.push_str(" [shadow overlap]");
                        }
                        println!(
                            "{day}  {:.1}h committed, {:.1}h forecast{flags}",
                            aggregate.total_hours, aggregate.shadow_hours
                        );
                    }
                }
                let time = block.start_time.as_deref().unwrap_or("--:--");
                let shadow = if block.is_shadow { " (shadow)" } else { "" };
                let done = if block.completed { "x" } else { " " };
                println!(
                    "  [{done}] {time}  {:<30}  {:.1}h{shadow}  {}",
                    block.title, block.hours, block.id
                );
            }
        }
        BlockAction::Inbox => {
            let blocks = db.list_inbox()?;
            if blocks.is_empty() {
                println!("inbox is empty");
            }
            for block in blocks {
                println!("{:<30}  {:.1}h  {}", block.title, block.hours, block.id);
            }
        }
        BlockAction::Schedule { id, date } => {
            let block = db.schedule_block(&id, parse_date(&date)?)?;
            println!("scheduled '{}' on {date}", block.title);
        }
        BlockAction::Edit {
            id,
            title,
            hours,
            time,
            notes,
        } => {
            let mut block = db.require_block(&id)?;
            if let Some(title) = title {
                block.title = title;
            }
            if let Some(hours) = hours {
                block.hours = hours;
            }
            match time.as_deref() {
                Some("none") => block.start_time = None,
                Some(time) => block.start_time = Some(time.to_string()),
                None => {}
            }
            if let Some(notes) = notes {
                block.notes = notes;
            }
            block.updated_at = chrono::Utc::now();
            db.update_block(&block)?;
            println!("updated block {id}");
        }
        BlockAction::Done { id, undo } => {
            let mut block = db.require_block(&id)?;
            block.set_completed(!undo);
            db.update_block(&block)?;
            println!(
                "'{}' marked {}",
                block.title,
                if undo { "not completed" } else { "completed" }
            );
        }
        BlockAction::Rm { id } => {
            db.delete_block(&id)?;
            println!("deleted block {id}");
        }
        BlockAction::RmFuture { id, yes } => {
            if !yes {
                return Err(
                    "this deletes the block and all future blocks of its project; pass --yes to confirm"
                        .into(),
                );
            }
            let deleted = db.delete_block_and_future(&id)?;
            println!("deleted {deleted} block(s)");
        }
    }
    Ok(())
}
