pub mod block;
pub mod config;
pub mod estimate;
pub mod project;
pub mod projection;
pub mod track;

use chrono::NaiveDate;

/// Parse a YYYY-MM-DD date argument.
pub fn parse_date(value: &str) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    value
        .parse::<NaiveDate>()
        .map_err(|_| format!("invalid date '{value}', expected YYYY-MM-DD").into())
}

/// Today in UTC; the CLI is the boundary that reads the clock.
pub fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}
