use atelier_core::estimate::HoursEstimator;
use atelier_core::schedule::AddOn;
use atelier_core::storage::EngineConfig;
use clap::Args;

#[derive(Args)]
pub struct EstimateArgs {
    /// Plan type from the configured catalog
    #[arg(long)]
    pub plan: String,
    /// Add-on as name:hours, repeatable
    #[arg(long = "add-on", value_name = "NAME:HOURS")]
    pub add_ons: Vec<String>,
    /// Manual override of raw hours
    #[arg(long)]
    pub custom_hours: Option<f64>,
    /// Buffer percentage; defaults to the configured value
    #[arg(long)]
    pub buffer: Option<f64>,
}

fn parse_add_on(value: &str) -> Result<AddOn, Box<dyn std::error::Error>> {
    let (name, hours) = value
        .split_once(':')
        .ok_or_else(|| format!("invalid add-on '{value}', expected NAME:HOURS"))?;
    Ok(AddOn {
        name: name.to_string(),
        hours: hours.parse()?,
    })
}

pub fn run(args: EstimateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::load_or_default();
    let buffer = args.buffer.unwrap_or(config.estimate.buffer_percentage);
    let estimator = HoursEstimator::new(config.estimate);

    let add_ons = args
        .add_ons
        .iter()
        .map(|a| parse_add_on(a))
        .collect::<Result<Vec<_>, _>>()?;

    let estimate = estimator.estimate(&args.plan, &add_ons, args.custom_hours, buffer)?;
    println!("{}", serde_json::to_string_pretty(&estimate)?);
    Ok(())
}
