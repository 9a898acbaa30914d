//! End-to-end scheduling flow: estimate -> project -> materialize -> read back.

use atelier_core::estimate::HoursEstimator;
use atelier_core::projector;
use atelier_core::schedule::Project;
use atelier_core::storage::config::EngineConfig;
use atelier_core::storage::BlockDb;
use chrono::NaiveDate;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn estimate_to_committed_schedule() {
    let config = EngineConfig::default();
    let estimator = HoursEstimator::new(config.estimate.clone());
    let db = BlockDb::open_memory().unwrap();

    // A standard plan with a 30 % buffer: 40 raw hours -> 52 buffered.
    let mut project = Project::new("Acme site", "standard");
    project.daily_dedication = 4.0;
    db.create_project(&project).unwrap();

    let estimate = estimator.estimate_project(&project).unwrap();
    assert_eq!(estimate.raw_hours, 40.0);
    assert!((estimate.buffered_hours - 52.0).abs() < 1e-9);

    // Forward projection from a Monday: 13 workdays, delivery on a workday.
    let monday = date(2025, 3, 10);
    let projection =
        projector::project_delivery(estimate.buffered_hours, project.daily_dedication, monday)
            .unwrap();
    assert_eq!(projection.work_days, 13);
    let estimated = projection.estimated_date.unwrap();
    assert!(atelier_core::calendar::is_workday(estimated));
    assert_eq!(estimated, date(2025, 3, 27));

    // Materialize the forecast. Shadow hours stay out of committed totals.
    let blocks = db
        .materialize_project_blocks(
            &project,
            estimate.buffered_hours,
            project.daily_dedication,
            monday,
            true,
            false,
        )
        .unwrap();
    assert_eq!(blocks.len(), 13);
    assert_eq!(blocks.last().unwrap().date, Some(estimated));

    let first_day = db.day_aggregate(date(2025, 3, 11), 8.0).unwrap();
    assert_eq!(first_day.total_hours, 0.0);
    assert_eq!(first_day.shadow_hours, 4.0);

    // Commit: regenerate as real production blocks, replacing the forecast.
    let committed = db
        .materialize_project_blocks(
            &project,
            estimate.buffered_hours,
            project.daily_dedication,
            monday,
            false,
            true,
        )
        .unwrap();
    assert_eq!(committed.len(), 13);

    let stored = db.blocks_for_project(&project.id).unwrap();
    assert_eq!(stored.len(), 13);
    assert!(stored.iter().all(|b| !b.is_shadow));

    let first_day = db.day_aggregate(date(2025, 3, 11), 8.0).unwrap();
    assert_eq!(first_day.total_hours, 4.0);
    assert_eq!(first_day.shadow_hours, 0.0);
}

#[test]
fn regenerating_twice_yields_the_same_block_set() {
    let db = BlockDb::open_memory().unwrap();
    let project = Project::new("Beta app", "premium");
    db.create_project(&project).unwrap();

    let start = date(2025, 6, 2);
    let first = db
        .materialize_project_blocks(&project, 30.0, 6.0, start, true, true)
        .unwrap();
    let second = db
        .materialize_project_blocks(&project, 30.0, 6.0, start, true, true)
        .unwrap();

    let dates_first: Vec<_> = first.iter().map(|b| (b.date, b.hours as i64)).collect();
    let dates_second: Vec<_> = second.iter().map(|b| (b.date, b.hours as i64)).collect();
    assert_eq!(dates_first, dates_second);

    // The store holds exactly one generation.
    assert_eq!(db.blocks_for_project(&project.id).unwrap().len(), first.len());
}

#[test]
fn zero_buffered_hours_schedules_nothing() {
    let db = BlockDb::open_memory().unwrap();
    let project = Project::new("Tiny fix", "essential");
    db.create_project(&project).unwrap();

    let blocks = db
        .materialize_project_blocks(&project, 0.0, 4.0, date(2025, 3, 10), true, true)
        .unwrap();
    assert!(blocks.is_empty());

    let projection = projector::project_delivery(0.0, 4.0, date(2025, 3, 10)).unwrap();
    assert_eq!(projection.estimated_date, None);
}
