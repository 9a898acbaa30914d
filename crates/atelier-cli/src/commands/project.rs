use atelier_core::estimate::HoursEstimator;
use atelier_core::schedule::{AddOn, Project};
use atelier_core::storage::{BlockDb, EngineConfig};
use clap::Subcommand;

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Create a project
    Add {
        name: String,
        /// Plan type from the configured catalog
        #[arg(long)]
        plan: String,
        #[arg(long)]
        client: Option<String>,
        /// Add-on as name:hours, repeatable
        #[arg(long = "add-on", value_name = "NAME:HOURS")]
        add_ons: Vec<String>,
        /// Buffer percentage; defaults to the configured value
        #[arg(long)]
        buffer: Option<f64>,
        /// Hours/day ceiling; defaults to the configured value
        #[arg(long)]
        dedication: Option<f64>,
        /// Manual override of raw hours
        #[arg(long)]
        custom_hours: Option<f64>,
    },
    /// List projects
    List,
    /// Show a project with its estimate and blocks
    Show { id: String },
}

pub fn run(action: ProjectAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::load_or_default();
    let db = BlockDb::open()?;

    match action {
        ProjectAction::Add {
            name,
            plan,
            client,
            add_ons,
            buffer,
            dedication,
            custom_hours,
        } => {
            let mut project = Project::new(name, plan);
            project.client_name = client;
            project.buffer_percentage = buffer.unwrap_or(config.estimate.buffer_percentage);
            project.daily_dedication = config
                .scheduling
                .validate_dedication(dedication.unwrap_or(config.scheduling.daily_dedication))?;
            project.custom_hours = custom_hours;
            for add_on in add_ons {
                let (name, hours) = add_on
                    .split_once(':')
                    .ok_or_else(|| format!("invalid add-on '{add_on}', expected NAME:HOURS"))?;
                project.add_ons.push(AddOn {
                    name: name.to_string(),
                    hours: hours.parse()?,
                });
            }

            // Record the estimate at creation time for later comparison.
            let estimator = HoursEstimator::new(config.estimate.clone());
            project.estimated_hours = Some(estimator.estimate_project(&project)?.buffered_hours);

            db.create_project(&project)?;
            println!("created project {}", project.id);
        }
        ProjectAction::List => {
            for project in db.list_projects()? {
                println!(
                    "{:<30}  plan={:<10}  advanced={}d  {}",
                    project.name, project.plan_type, project.days_advanced, project.id
                );
            }
        }
        ProjectAction::Show { id } => {
            let project = db.require_project(&id)?;
            println!("{}", serde_json::to_string_pretty(&project)?);

            let blocks = db.blocks_for_project(&id)?;
            println!("{} block(s):", blocks.len());
            for block in blocks {
                let day = block
                    .date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "inbox".to_string());
                let shadow = if block.is_shadow { " (shadow)" } else { "" };
                println!("  {day}  {:.1}h{shadow}  {}", block.hours, block.id);
            }
        }
    }
    Ok(())
}
