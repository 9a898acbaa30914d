//! SQLite-based storage for capacity blocks and projects.
//!
//! The block store is the only shared mutable state in the engine. Every
//! mutation that touches more than one row (regenerate, bulk future-delete)
//! runs inside an immediate transaction so readers never observe a project
//! with a partially-replaced block set.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::data_dir;
use super::migrations;
use crate::error::{CoreError, DatabaseError, Result, ValidationError};
use crate::schedule::{AddOn, BlockTask, BlockType, CapacityBlock, DayAggregate, Project};
use crate::scheduler;
use crate::tracker::TrackingStopped;

// === Helper Functions ===

/// Parse block type from database string
fn parse_block_type(block_type_str: &str) -> BlockType {
    match block_type_str {
        "production" => BlockType::Production,
        "meeting" => BlockType::Meeting,
        _ => BlockType::Manual,
    }
}

/// Format block type for database storage
fn format_block_type(block_type: BlockType) -> &'static str {
    match block_type {
        BlockType::Manual => "manual",
        BlockType::Production => "production",
        BlockType::Meeting => "meeting",
    }
}

/// Parse a calendar day from its ISO string
fn parse_date(date_str: &str) -> Option<NaiveDate> {
    date_str.parse::<NaiveDate>().ok()
}

/// Parse datetime from RFC3339 string with fallback to current time
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Build a CapacityBlock from a database row.
///
/// Column order matches [`BLOCK_COLUMNS`].
fn row_to_block(row: &rusqlite::Row) -> std::result::Result<CapacityBlock, rusqlite::Error> {
    let date_str: Option<String> = row.get(1)?;
    let block_type_str: String = row.get(3)?;
    let tracking_str: Option<String> = row.get(9)?;
    let tasks_json: String = row.get(10)?;
    let created_at_str: String = row.get(14)?;
    let updated_at_str: String = row.get(15)?;

    Ok(CapacityBlock {
        id: row.get(0)?,
        date: date_str.as_deref().and_then(parse_date),
        title: row.get(2)?,
        block_type: parse_block_type(&block_type_str),
        hours: row.get(4)?,
        actual_hours: row.get(5)?,
        start_time: row.get(6)?,
        is_shadow: row.get(7)?,
        completed: row.get(8)?,
        tracking_started_at: tracking_str.as_deref().map(parse_datetime_fallback),
        tasks: serde_json::from_str::<Vec<BlockTask>>(&tasks_json).unwrap_or_default(),
        notes: row.get(11)?,
        client_name: row.get(12)?,
        project_id: row.get(13)?,
        created_at: parse_datetime_fallback(&created_at_str),
        updated_at: parse_datetime_fallback(&updated_at_str),
    })
}

const BLOCK_COLUMNS: &str = "id, date, title, block_type, hours, actual_hours, start_time, \
     is_shadow, completed, tracking_started_at, tasks, notes, client_name, project_id, \
     created_at, updated_at";

/// Within-day ordering: fixed start times first, then insertion order.
const DAY_ORDER: &str = "(start_time IS NULL) ASC, start_time ASC, created_at ASC";

fn row_to_project(row: &rusqlite::Row) -> std::result::Result<Project, rusqlite::Error> {
    let add_ons_json: String = row.get(4)?;
    let quoted_str: Option<String> = row.get(9)?;
    let confirmed_str: Option<String> = row.get(10)?;
    let created_at_str: String = row.get(13)?;
    let updated_at_str: String = row.get(14)?;

    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        client_name: row.get(2)?,
        plan_type: row.get(3)?,
        add_ons: serde_json::from_str::<Vec<AddOn>>(&add_ons_json).unwrap_or_default(),
        custom_hours: row.get(5)?,
        buffer_percentage: row.get(6)?,
        daily_dedication: row.get(7)?,
        estimated_hours: row.get(8)?,
        quoted_delivery_date: quoted_str.as_deref().and_then(parse_date),
        confirmed_delivery_date: confirmed_str.as_deref().and_then(parse_date),
        hours_completed: row.get(11)?,
        days_advanced: row.get(12)?,
        created_at: parse_datetime_fallback(&created_at_str),
        updated_at: parse_datetime_fallback(&updated_at_str),
    })
}

const PROJECT_COLUMNS: &str = "id, name, client_name, plan_type, add_ons, custom_hours, \
     buffer_percentage, daily_dedication, estimated_hours, quoted_delivery_date, \
     confirmed_delivery_date, hours_completed, days_advanced, created_at, updated_at";

/// SQLite database for capacity block storage.
///
/// Stores capacity blocks and the project subset the engine owns.
pub struct BlockDb {
    conn: Connection,
}

impl BlockDb {
    /// Open the block database at `~/.config/atelier/atelier.db`.
    ///
    /// Creates tables if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("atelier.db");
        let conn = Connection::open(&path).map_err(|e| DatabaseError::OpenFailed {
            path: path.clone(),
            source: e,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (tests and ephemeral use).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::from)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        // Create base tables (v1 schema) first
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS capacity_blocks (
                    id          TEXT PRIMARY KEY,
                    date        TEXT,
                    title       TEXT NOT NULL,
                    block_type  TEXT NOT NULL,
                    hours       REAL NOT NULL,
                    start_time  TEXT,
                    is_shadow   INTEGER NOT NULL DEFAULT 0,
                    completed   INTEGER NOT NULL DEFAULT 0,
                    tasks       TEXT NOT NULL DEFAULT '[]',
                    notes       TEXT NOT NULL DEFAULT '',
                    client_name TEXT,
                    project_id  TEXT,
                    created_at  TEXT NOT NULL,
                    updated_at  TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS projects (
                    id                    TEXT PRIMARY KEY,
                    name                  TEXT NOT NULL,
                    client_name           TEXT,
                    plan_type             TEXT NOT NULL,
                    add_ons               TEXT NOT NULL DEFAULT '[]',
                    custom_hours          REAL,
                    buffer_percentage     REAL NOT NULL DEFAULT 30,
                    daily_dedication      REAL NOT NULL DEFAULT 4,
                    estimated_hours       REAL,
                    quoted_delivery_date  TEXT,
                    hours_completed       REAL NOT NULL DEFAULT 0,
                    created_at            TEXT NOT NULL,
                    updated_at            TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_blocks_project_date
                    ON capacity_blocks(project_id, date);
                CREATE INDEX IF NOT EXISTS idx_blocks_date
                    ON capacity_blocks(date);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        // Run incremental migrations (v1 -> v2 -> v3)
        migrations::migrate(&self.conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        Ok(())
    }

    // === Block CRUD ===

    /// Create a new block. Invariants are checked before the write.
    pub fn create_block(&self, block: &CapacityBlock) -> Result<()> {
        block.validate()?;
        let tasks_json = serde_json::to_string(&block.tasks)?;

        self.conn.execute(
            "INSERT INTO capacity_blocks (id, date, title, block_type, hours, actual_hours, \
             start_time, is_shadow, completed, tracking_started_at, tasks, notes, client_name, \
             project_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                block.id,
                block.date.map(|d| d.to_string()),
                block.title,
                format_block_type(block.block_type),
                block.hours,
                block.actual_hours,
                block.start_time,
                block.is_shadow,
                block.completed,
                block.tracking_started_at.map(|t| t.to_rfc3339()),
                tasks_json,
                block.notes,
                block.client_name,
                block.project_id,
                block.created_at.to_rfc3339(),
                block.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a block by ID.
    pub fn get_block(&self, id: &str) -> Result<Option<CapacityBlock>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BLOCK_COLUMNS} FROM capacity_blocks WHERE id = ?1"
        ))?;
        let block = stmt.query_row(params![id], row_to_block).optional()?;
        Ok(block)
    }

    /// Get a block by ID, failing when it does not exist.
    pub fn require_block(&self, id: &str) -> Result<CapacityBlock> {
        self.get_block(id)?.ok_or_else(|| CoreError::NotFound {
            entity: "block",
            id: id.to_string(),
        })
    }

    /// Update an existing block. Invariants are re-checked.
    pub fn update_block(&self, block: &CapacityBlock) -> Result<()> {
        block.validate()?;
        let tasks_json = serde_json::to_string(&block.tasks)?;

        let changed = self.conn.execute(
            "UPDATE capacity_blocks
             SET date = ?1, title = ?2, block_type = ?3, hours = ?4, actual_hours = ?5,
                 start_time = ?6, is_shadow = ?7, completed = ?8, tracking_started_at = ?9,
                 tasks = ?10, notes = ?11, client_name = ?12, project_id = ?13, updated_at = ?14
             WHERE id = ?15",
            params![
                block.date.map(|d| d.to_string()),
                block.title,
                format_block_type(block.block_type),
                block.hours,
                block.actual_hours,
                block.start_time,
                block.is_shadow,
                block.completed,
                block.tracking_started_at.map(|t| t.to_rfc3339()),
                tasks_json,
                block.notes,
                block.client_name,
                block.project_id,
                block.updated_at.to_rfc3339(),
                block.id,
            ],
        )?;
        if changed == 0 {
            return Err(CoreError::NotFound {
                entity: "block",
                id: block.id.clone(),
            });
        }
        Ok(())
    }

    /// Delete a block.
    pub fn delete_block(&self, id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM capacity_blocks WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(CoreError::NotFound {
                entity: "block",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// List scheduled blocks, optionally bounded by an inclusive date range.
    ///
    /// Backlog items never appear here; within a day, fixed start times sort
    /// first.
    pub fn list_blocks(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<CapacityBlock>> {
        let mut query = format!(
            "SELECT {BLOCK_COLUMNS} FROM capacity_blocks WHERE date IS NOT NULL"
        );
        if start.is_some() {
            query += " AND date >= ?";
        }
        if end.is_some() {
            query += " AND date <= ?";
        }
        query += &format!(" ORDER BY date ASC, {DAY_ORDER}");

        let start_str = start.map(|d| d.to_string());
        let end_str = end.map(|d| d.to_string());

        let mut stmt = self.conn.prepare(&query)?;
        let blocks = match (&start_str, &end_str) {
            (Some(s), Some(e)) => stmt
                .query_map(params![s, e], row_to_block)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (Some(s), None) => stmt
                .query_map(params![s], row_to_block)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (None, Some(e)) => stmt
                .query_map(params![e], row_to_block)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (None, None) => stmt
                .query_map([], row_to_block)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };
        Ok(blocks)
    }

    /// List backlog items (blocks without a date), oldest first.
    pub fn list_inbox(&self) -> Result<Vec<CapacityBlock>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BLOCK_COLUMNS} FROM capacity_blocks
             WHERE date IS NULL ORDER BY created_at ASC"
        ))?;
        let blocks = stmt
            .query_map([], row_to_block)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(blocks)
    }

    /// All blocks for a project, scheduled ones first in date order.
    pub fn blocks_for_project(&self, project_id: &str) -> Result<Vec<CapacityBlock>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BLOCK_COLUMNS} FROM capacity_blocks
             WHERE project_id = ?1
             ORDER BY (date IS NULL) ASC, date ASC, {DAY_ORDER}"
        ))?;
        let blocks = stmt
            .query_map(params![project_id], row_to_block)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(blocks)
    }

    /// Committed production blocks for a project, date ascending. This is
    /// the set reconciliation walks.
    pub fn committed_blocks(&self, project_id: &str) -> Result<Vec<CapacityBlock>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BLOCK_COLUMNS} FROM capacity_blocks
             WHERE project_id = ?1 AND is_shadow = 0 AND block_type = 'production'
               AND date IS NOT NULL
             ORDER BY date ASC"
        ))?;
        let blocks = stmt
            .query_map(params![project_id], row_to_block)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(blocks)
    }

    /// All blocks (shadow or production) for a project on or after a date.
    pub fn future_blocks_of(
        &self,
        project_id: &str,
        from: NaiveDate,
    ) -> Result<Vec<CapacityBlock>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BLOCK_COLUMNS} FROM capacity_blocks
             WHERE project_id = ?1 AND date IS NOT NULL AND date >= ?2
             ORDER BY date ASC, {DAY_ORDER}"
        ))?;
        let blocks = stmt
            .query_map(params![project_id, from.to_string()], row_to_block)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(blocks)
    }

    /// Move a backlog item onto a day (or move a scheduled block to another
    /// day). The block keeps its identity; this is an update, never a
    /// delete/insert.
    pub fn schedule_block(&self, id: &str, date: NaiveDate) -> Result<CapacityBlock> {
        let mut block = self.require_block(id)?;
        block.date = Some(date);
        block.updated_at = Utc::now();
        self.update_block(&block)?;
        Ok(block)
    }

    /// Delete every block of a project dated on or after `from`.
    ///
    /// A single DELETE statement, so the removal is atomic. Returns the
    /// number of removed blocks. Backlog items are untouched.
    pub fn delete_future_blocks(&self, project_id: &str, from: NaiveDate) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM capacity_blocks
             WHERE project_id = ?1 AND date IS NOT NULL AND date >= ?2",
            params![project_id, from.to_string()],
        )?;
        tracing::info!(project_id, from = %from, deleted, "deleted future blocks");
        Ok(deleted)
    }

    /// Delete a block and, when it belongs to a project, every block of that
    /// project from the block's date onward ("this and all future").
    ///
    /// # Errors
    /// The target must be scheduled; backlog items have no date to delete
    /// from.
    pub fn delete_block_and_future(&self, id: &str) -> Result<usize> {
        let block = self.require_block(id)?;
        let date = block.date.ok_or(ValidationError::UnscheduledBlock {
            block_id: block.id.clone(),
        })?;

        match &block.project_id {
            Some(project_id) => self.delete_future_blocks(project_id, date),
            None => {
                self.delete_block(id)?;
                Ok(1)
            }
        }
    }

    /// Atomically replace a project's entire block set (shadow and
    /// production) with `blocks`.
    ///
    /// Readers never observe the intermediate empty state: the delete and
    /// the inserts commit together or not at all.
    pub fn replace_project_blocks(
        &self,
        project_id: &str,
        blocks: &[CapacityBlock],
    ) -> Result<usize> {
        for block in blocks {
            block.validate()?;
        }

        self.conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        let result: Result<usize> = (|| {
            self.conn.execute(
                "DELETE FROM capacity_blocks WHERE project_id = ?1",
                params![project_id],
            )?;
            for block in blocks {
                self.create_block(block)?;
            }
            Ok(blocks.len())
        })();

        match result {
            Ok(count) => {
                self.conn.execute_batch("COMMIT;")?;
                tracing::info!(project_id, count, "replaced project block set");
                Ok(count)
            }
            Err(err) => {
                let _ = self.conn.execute_batch("ROLLBACK;");
                Err(err)
            }
        }
    }

    /// Allocate and persist blocks for a project.
    ///
    /// With `delete_existing` the project's previous block set (shadow and
    /// production) is replaced in the same transaction; otherwise the new
    /// blocks are appended. Returns the created blocks in date order.
    pub fn materialize_project_blocks(
        &self,
        project: &Project,
        buffered_hours: f64,
        daily_dedication: f64,
        start: NaiveDate,
        shadow: bool,
        delete_existing: bool,
    ) -> Result<Vec<CapacityBlock>> {
        let plan = scheduler::allocate(buffered_hours, daily_dedication, start)?;
        let blocks = scheduler::materialize(&plan, project, shadow);

        if delete_existing {
            self.replace_project_blocks(&project.id, &blocks)?;
        } else {
            self.conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
            let result: Result<()> = (|| {
                for block in &blocks {
                    self.create_block(block)?;
                }
                Ok(())
            })();
            match result {
                Ok(()) => self.conn.execute_batch("COMMIT;")?,
                Err(err) => {
                    let _ = self.conn.execute_batch("ROLLBACK;");
                    return Err(err);
                }
            }
        }

        tracing::info!(
            project_id = %project.id,
            blocks = blocks.len(),
            shadow,
            delete_existing,
            "materialized allocation"
        );
        Ok(blocks)
    }

    // === Day aggregation ===

    /// Capacity summary for one day.
    ///
    /// Shadow hours are summed separately and never count toward the
    /// committed total; backlog items are excluded by the date filter.
    pub fn day_aggregate(&self, date: NaiveDate, max_capacity: f64) -> Result<DayAggregate> {
        let (total_hours, shadow_hours, shadow_count): (f64, f64, i64) = self.conn.query_row(
            "SELECT COALESCE(SUM(CASE WHEN is_shadow = 0 THEN hours ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN is_shadow = 1 THEN hours ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN is_shadow = 1 THEN 1 ELSE 0 END), 0)
             FROM capacity_blocks WHERE date = ?1",
            params![date.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(DayAggregate {
            date,
            total_hours,
            shadow_hours,
            over_capacity: total_hours > max_capacity,
            has_overlap: shadow_count > 1,
        })
    }

    /// Day aggregates over an inclusive range, one entry per day that has
    /// blocks. Feed for the week view.
    pub fn day_aggregates(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        max_capacity: f64,
    ) -> Result<Vec<DayAggregate>> {
        let mut stmt = self.conn.prepare(
            "SELECT date,
                    COALESCE(SUM(CASE WHEN is_shadow = 0 THEN hours ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN is_shadow = 1 THEN hours ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN is_shadow = 1 THEN 1 ELSE 0 END), 0)
             FROM capacity_blocks
             WHERE date IS NOT NULL AND date >= ?1 AND date <= ?2
             GROUP BY date ORDER BY date ASC",
        )?;

        let rows = stmt.query_map(params![start.to_string(), end.to_string()], |row| {
            let date_str: String = row.get(0)?;
            let total_hours: f64 = row.get(1)?;
            let shadow_hours: f64 = row.get(2)?;
            let shadow_count: i64 = row.get(3)?;
            Ok((date_str, total_hours, shadow_hours, shadow_count))
        })?;

        let mut aggregates = Vec::new();
        for row in rows {
            let (date_str, total_hours, shadow_hours, shadow_count) = row?;
            let date = match parse_date(&date_str) {
                Some(date) => date,
                None => continue,
            };
            aggregates.push(DayAggregate {
                date,
                total_hours,
                shadow_hours,
                over_capacity: total_hours > max_capacity,
                has_overlap: shadow_count > 1,
            });
        }
        Ok(aggregates)
    }

    // === Time tracking ===

    /// Start the timer on a block and persist the anchor.
    pub fn start_tracking(&self, id: &str, now: DateTime<Utc>) -> Result<CapacityBlock> {
        let mut block = self.require_block(id)?;
        block.start_tracking(now);
        self.update_block(&block)?;
        Ok(block)
    }

    /// Stop the timer on a block, folding wall-clock elapsed time into its
    /// actual hours. Returns `None` when no timer was running.
    pub fn stop_tracking(&self, id: &str, now: DateTime<Utc>) -> Result<Option<TrackingStopped>> {
        let mut block = self.require_block(id)?;
        let stopped = block.stop_tracking(now);
        if stopped.is_some() {
            self.update_block(&block)?;
        }
        Ok(stopped)
    }

    /// Stop the timer with a caller-supplied elapsed duration.
    pub fn stop_tracking_with_elapsed(
        &self,
        id: &str,
        elapsed_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<TrackingStopped>> {
        let mut block = self.require_block(id)?;
        let stopped = block.stop_tracking_with_elapsed(elapsed_minutes, now);
        if stopped.is_some() {
            self.update_block(&block)?;
        }
        Ok(stopped)
    }

    // === Project CRUD ===

    /// Create a new project.
    pub fn create_project(&self, project: &Project) -> Result<()> {
        let add_ons_json = serde_json::to_string(&project.add_ons)?;
        self.conn.execute(
            "INSERT INTO projects (id, name, client_name, plan_type, add_ons, custom_hours, \
             buffer_percentage, daily_dedication, estimated_hours, quoted_delivery_date, \
             confirmed_delivery_date, hours_completed, days_advanced, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                project.id,
                project.name,
                project.client_name,
                project.plan_type,
                add_ons_json,
                project.custom_hours,
                project.buffer_percentage,
                project.daily_dedication,
                project.estimated_hours,
                project.quoted_delivery_date.map(|d| d.to_string()),
                project.confirmed_delivery_date.map(|d| d.to_string()),
                project.hours_completed,
                project.days_advanced,
                project.created_at.to_rfc3339(),
                project.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a project by ID.
    pub fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"
        ))?;
        let project = stmt.query_row(params![id], row_to_project).optional()?;
        Ok(project)
    }

    /// Get a project by ID, failing when it does not exist.
    pub fn require_project(&self, id: &str) -> Result<Project> {
        self.get_project(id)?.ok_or_else(|| CoreError::NotFound {
            entity: "project",
            id: id.to_string(),
        })
    }

    /// List all projects.
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at ASC"
        ))?;
        let projects = stmt
            .query_map([], row_to_project)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    /// Update an existing project.
    pub fn update_project(&self, project: &Project) -> Result<()> {
        let add_ons_json = serde_json::to_string(&project.add_ons)?;
        let changed = self.conn.execute(
            "UPDATE projects
             SET name = ?1, client_name = ?2, plan_type = ?3, add_ons = ?4, custom_hours = ?5,
                 buffer_percentage = ?6, daily_dedication = ?7, estimated_hours = ?8,
                 quoted_delivery_date = ?9, confirmed_delivery_date = ?10, hours_completed = ?11,
                 days_advanced = ?12, updated_at = ?13
             WHERE id = ?14",
            params![
                project.name,
                project.client_name,
                project.plan_type,
                add_ons_json,
                project.custom_hours,
                project.buffer_percentage,
                project.daily_dedication,
                project.estimated_hours,
                project.quoted_delivery_date.map(|d| d.to_string()),
                project.confirmed_delivery_date.map(|d| d.to_string()),
                project.hours_completed,
                project.days_advanced,
                project.updated_at.to_rfc3339(),
                project.id,
            ],
        )?;
        if changed == 0 {
            return Err(CoreError::NotFound {
                entity: "project",
                id: project.id.clone(),
            });
        }
        Ok(())
    }

    /// Persist the reconciliation result on the project row.
    pub fn set_days_advanced(&self, project_id: &str, days: i64) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE projects SET days_advanced = ?1, updated_at = ?2 WHERE id = ?3",
            params![days, Utc::now().to_rfc3339(), project_id],
        )?;
        if changed == 0 {
            return Err(CoreError::NotFound {
                entity: "project",
                id: project_id.to_string(),
            });
        }
        Ok(())
    }
}

impl crate::projector::BlockStore for BlockDb {
    type Error = CoreError;

    fn committed_blocks(&self, project_id: &str) -> Result<Vec<CapacityBlock>> {
        BlockDb::committed_blocks(self, project_id)
    }

    fn set_days_advanced(&self, project_id: &str, days: i64) -> Result<()> {
        BlockDb::set_days_advanced(self, project_id, days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn db() -> BlockDb {
        BlockDb::open_memory().unwrap()
    }

    fn manual_block(title: &str, day: Option<NaiveDate>, hours: f64) -> CapacityBlock {
        let mut block = CapacityBlock::new(title, BlockType::Manual, hours);
        block.date = day;
        block
    }

    fn production_block(project_id: &str, day: NaiveDate, hours: f64) -> CapacityBlock {
        let mut block = CapacityBlock::new("delivery", BlockType::Production, hours);
        block.project_id = Some(project_id.to_string());
        block.date = Some(day);
        block
    }

    #[test]
    fn block_crud_round_trip() {
        let db = db();
        let mut block = manual_block("kickoff prep", Some(date(2025, 3, 10)), 2.5);
        block.notes = "agenda + slides".to_string();
        block.add_task("draft agenda");

        db.create_block(&block).unwrap();
        let loaded = db.require_block(&block.id).unwrap();
        assert_eq!(loaded.title, "kickoff prep");
        assert_eq!(loaded.hours, 2.5);
        assert_eq!(loaded.tasks.len(), 1);
        assert_eq!(loaded.date, Some(date(2025, 3, 10)));

        let mut updated = loaded.clone();
        updated.hours = 3.0;
        updated.set_completed(true);
        db.update_block(&updated).unwrap();
        let reloaded = db.require_block(&block.id).unwrap();
        assert_eq!(reloaded.hours, 3.0);
        assert!(reloaded.completed);

        db.delete_block(&block.id).unwrap();
        assert!(db.get_block(&block.id).unwrap().is_none());
    }

    #[test]
    fn missing_ids_are_not_found() {
        let db = db();
        assert!(matches!(
            db.require_block("nope"),
            Err(CoreError::NotFound { entity: "block", .. })
        ));
        assert!(matches!(
            db.delete_block("nope"),
            Err(CoreError::NotFound { .. })
        ));
        assert!(matches!(
            db.set_days_advanced("nope", 1),
            Err(CoreError::NotFound { entity: "project", .. })
        ));
    }

    #[test]
    fn store_rejects_invariant_violations() {
        let db = db();

        let zero_hours = manual_block("bad", Some(date(2025, 3, 10)), 0.0);
        assert!(db.create_block(&zero_hours).is_err());

        let orphan = CapacityBlock::new("orphan", BlockType::Production, 2.0);
        assert!(db.create_block(&orphan).is_err());

        let mut shadow_inbox = manual_block("forecast", None, 2.0);
        shadow_inbox.is_shadow = true;
        assert!(db.create_block(&shadow_inbox).is_err());
    }

    #[test]
    fn inbox_is_separate_from_scheduled_listing() {
        let db = db();
        db.create_block(&manual_block("backlog item", None, 1.0)).unwrap();
        db.create_block(&manual_block("scheduled", Some(date(2025, 3, 10)), 2.0))
            .unwrap();

        let inbox = db.list_inbox().unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].title, "backlog item");

        let scheduled = db.list_blocks(None, None).unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].title, "scheduled");
    }

    #[test]
    fn inbox_items_never_count_in_aggregates() {
        let db = db();
        db.create_block(&manual_block("backlog item", None, 6.0)).unwrap();
        db.create_block(&manual_block("on the day", Some(date(2025, 3, 10)), 2.0))
            .unwrap();

        let aggregate = db.day_aggregate(date(2025, 3, 10), 8.0).unwrap();
        assert_eq!(aggregate.total_hours, 2.0);
        assert_eq!(aggregate.shadow_hours, 0.0);
    }

    #[test]
    fn scheduling_a_backlog_item_keeps_identity() {
        let db = db();
        let block = manual_block("backlog item", None, 1.0);
        db.create_block(&block).unwrap();

        let scheduled = db.schedule_block(&block.id, date(2025, 3, 12)).unwrap();
        assert_eq!(scheduled.id, block.id);
        assert_eq!(scheduled.date, Some(date(2025, 3, 12)));
        assert!(db.list_inbox().unwrap().is_empty());
    }

    #[test]
    fn fixed_start_times_sort_first_within_a_day() {
        let db = db();
        let day = date(2025, 3, 10);
        db.create_block(&manual_block("flexible", Some(day), 3.0)).unwrap();
        let mut late_meeting = manual_block("late meeting", Some(day), 1.0);
        late_meeting.start_time = Some("15:00".to_string());
        db.create_block(&late_meeting).unwrap();
        let mut standup = manual_block("standup", Some(day), 0.5);
        standup.start_time = Some("09:30".to_string());
        db.create_block(&standup).unwrap();

        let blocks = db.list_blocks(Some(day), Some(day)).unwrap();
        let titles: Vec<_> = blocks.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["standup", "late meeting", "flexible"]);
    }

    #[test]
    fn day_aggregate_separates_shadow_and_flags() {
        let db = db();
        let day = date(2025, 3, 10);
        db.create_block(&manual_block("committed a", Some(day), 5.0)).unwrap();
        db.create_block(&manual_block("committed b", Some(day), 4.0)).unwrap();

        let mut shadow_a = production_block("p1", day, 2.0);
        shadow_a.is_shadow = true;
        db.create_block(&shadow_a).unwrap();
        let mut shadow_b = production_block("p2", day, 1.0);
        shadow_b.is_shadow = true;
        db.create_block(&shadow_b).unwrap();

        let aggregate = db.day_aggregate(day, 8.0).unwrap();
        assert_eq!(aggregate.total_hours, 9.0);
        assert_eq!(aggregate.shadow_hours, 3.0);
        assert!(aggregate.over_capacity);
        assert!(aggregate.has_overlap);

        let quiet = db.day_aggregate(date(2025, 3, 11), 8.0).unwrap();
        assert_eq!(quiet.total_hours, 0.0);
        assert!(!quiet.over_capacity);
        assert!(!quiet.has_overlap);
    }

    #[test]
    fn day_aggregates_cover_a_range() {
        let db = db();
        db.create_block(&manual_block("mon", Some(date(2025, 3, 10)), 2.0)).unwrap();
        db.create_block(&manual_block("wed", Some(date(2025, 3, 12)), 9.0)).unwrap();

        let aggregates = db
            .day_aggregates(date(2025, 3, 10), date(2025, 3, 14), 8.0)
            .unwrap();
        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates[0].date, date(2025, 3, 10));
        assert!(!aggregates[0].over_capacity);
        assert!(aggregates[1].over_capacity);
    }

    #[test]
    fn delete_this_and_future_leaves_earlier_days() {
        let db = db();
        let d1 = date(2025, 3, 10);
        let d2 = date(2025, 3, 11);
        let d3 = date(2025, 3, 12);
        let first = production_block("p1", d1, 4.0);
        let target = production_block("p1", d2, 4.0);
        let last = production_block("p1", d3, 4.0);
        db.create_block(&first).unwrap();
        db.create_block(&target).unwrap();
        db.create_block(&last).unwrap();
        // Another project on the same days stays put.
        let other = production_block("p2", d2, 2.0);
        db.create_block(&other).unwrap();

        let deleted = db.delete_block_and_future(&target.id).unwrap();
        assert_eq!(deleted, 2);

        let remaining = db.blocks_for_project("p1").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, first.id);
        assert_eq!(db.blocks_for_project("p2").unwrap().len(), 1);
    }

    #[test]
    fn delete_future_from_backlog_item_is_rejected() {
        let db = db();
        let mut backlog = manual_block("backlog", None, 1.0);
        backlog.project_id = Some("p1".to_string());
        db.create_block(&backlog).unwrap();

        assert!(matches!(
            db.delete_block_and_future(&backlog.id),
            Err(CoreError::Validation(ValidationError::UnscheduledBlock { .. }))
        ));
    }

    #[test]
    fn replace_project_blocks_is_atomic_and_complete() {
        let db = db();
        let mut old_shadow = production_block("p1", date(2025, 3, 10), 4.0);
        old_shadow.is_shadow = true;
        db.create_block(&old_shadow).unwrap();
        db.create_block(&production_block("p1", date(2025, 3, 11), 4.0))
            .unwrap();

        let fresh = vec![
            production_block("p1", date(2025, 3, 17), 4.0),
            production_block("p1", date(2025, 3, 18), 4.0),
            production_block("p1", date(2025, 3, 19), 4.0),
        ];
        db.replace_project_blocks("p1", &fresh).unwrap();

        let blocks = db.blocks_for_project("p1").unwrap();
        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| b.date >= Some(date(2025, 3, 17))));
    }

    #[test]
    fn replace_rolls_back_on_invalid_input() {
        let db = db();
        db.create_block(&production_block("p1", date(2025, 3, 10), 4.0))
            .unwrap();

        let bad = vec![
            production_block("p1", date(2025, 3, 17), 4.0),
            production_block("p1", date(2025, 3, 18), -1.0),
        ];
        assert!(db.replace_project_blocks("p1", &bad).is_err());

        // Prior state intact.
        let blocks = db.blocks_for_project("p1").unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].date, Some(date(2025, 3, 10)));
    }

    #[test]
    fn materialize_with_replace_is_idempotent() {
        let db = db();
        let project = Project::new("Acme site", "standard");
        db.create_project(&project).unwrap();

        let monday = date(2025, 3, 10);
        let first = db
            .materialize_project_blocks(&project, 52.0, 4.0, monday, true, true)
            .unwrap();
        let second = db
            .materialize_project_blocks(&project, 52.0, 4.0, monday, true, true)
            .unwrap();

        assert_eq!(first.len(), 13);
        assert_eq!(second.len(), 13);

        // Two runs leave one set, not a union.
        let stored = db.blocks_for_project(&project.id).unwrap();
        assert_eq!(stored.len(), 13);
        let dates_a: Vec<_> = first.iter().map(|b| b.date).collect();
        let dates_b: Vec<_> = stored.iter().map(|b| b.date).collect();
        assert_eq!(dates_a, dates_b);
    }

    #[test]
    fn materialize_append_keeps_existing_blocks() {
        let db = db();
        let project = Project::new("Acme site", "standard");
        db.create_project(&project).unwrap();
        let mut existing = production_block(&project.id, date(2025, 3, 3), 4.0);
        existing.is_shadow = false;
        db.create_block(&existing).unwrap();

        db.materialize_project_blocks(&project, 8.0, 4.0, date(2025, 3, 10), true, false)
            .unwrap();
        assert_eq!(db.blocks_for_project(&project.id).unwrap().len(), 3);
    }

    #[test]
    fn tracking_round_trip_persists() {
        let db = db();
        let block = manual_block("tracked", Some(date(2025, 3, 10)), 2.0);
        db.create_block(&block).unwrap();

        let now = Utc::now();
        let started = db.start_tracking(&block.id, now).unwrap();
        assert!(started.tracking_started_at.is_some());

        let stopped = db
            .stop_tracking_with_elapsed(&block.id, 90, now)
            .unwrap()
            .unwrap();
        assert_eq!(stopped.elapsed_minutes, 90);

        let reloaded = db.require_block(&block.id).unwrap();
        assert_eq!(reloaded.actual_hours, Some(1.5));
        assert!(reloaded.tracking_started_at.is_none());

        // Stop again: no timer running, nothing accumulates.
        assert!(db.stop_tracking(&block.id, now).unwrap().is_none());
        let reloaded = db.require_block(&block.id).unwrap();
        assert_eq!(reloaded.actual_hours, Some(1.5));
    }

    #[test]
    fn project_crud_round_trip() {
        let db = db();
        let mut project = Project::new("Acme site", "standard");
        project.add_ons.push(AddOn {
            name: "copywriting".to_string(),
            hours: 6.0,
        });
        project.quoted_delivery_date = Some(date(2025, 4, 1));
        db.create_project(&project).unwrap();

        let loaded = db.require_project(&project.id).unwrap();
        assert_eq!(loaded.name, "Acme site");
        assert_eq!(loaded.add_ons.len(), 1);
        assert_eq!(loaded.quoted_delivery_date, Some(date(2025, 4, 1)));

        let mut updated = loaded.clone();
        updated.buffer_percentage = 20.0;
        db.update_project(&updated).unwrap();
        assert_eq!(
            db.require_project(&project.id).unwrap().buffer_percentage,
            20.0
        );

        assert_eq!(db.list_projects().unwrap().len(), 1);
    }

    #[test]
    fn reconcile_with_store_persists_days_advanced() {
        let db = db();
        let project = Project::new("Acme site", "standard");
        db.create_project(&project).unwrap();

        db.create_block(&production_block(&project.id, date(2025, 3, 10), 20.0))
            .unwrap();
        db.create_block(&production_block(&project.id, date(2025, 3, 11), 22.0))
            .unwrap();
        db.create_block(&production_block(&project.id, date(2025, 3, 12), 8.0))
            .unwrap();
        db.create_block(&production_block(&project.id, date(2025, 3, 14), 10.0))
            .unwrap();

        let result = projector::reconcile_with_store(&db, &project.id, 48.0).unwrap();
        assert_eq!(result.days_advanced, 2);
        assert_eq!(result.accelerated_date, Some(date(2025, 3, 12)));

        let reloaded = db.require_project(&project.id).unwrap();
        assert_eq!(reloaded.days_advanced, 2);
    }
}
