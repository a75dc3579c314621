//! SQLite storage handle shared by the repository and analytics layers.
//!
//! Gradebook database schema:
//! - `students` table: id, name, email
//! - `courses` table: id, name, code, credits
//! - `grades` table: id, student_id, course_id, score, recorded_at
//! - `latest_grades` view: effective grade per (student, course)
//!
//! Repository operations for each entity live in `students.rs`, `courses.rs`
//! and `grades.rs` as further `impl Storage` blocks.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use rusqlite::{Connection, OpenFlags, Row};
use serde::{Deserialize, Serialize};

use super::models::{Course, Grade, GradeRecord, Student};
use super::schema::{self, SeedOutcome};
use crate::config::DbConfig;
use crate::error::{Error, Result};

/// What deleting a student or course does to the grades that reference it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Remove dependent grades in the same transaction
    #[default]
    Cascade,
    /// Refuse the delete while grades reference the row
    Restrict,
}

/// Store timestamps with fixed precision so text ordering matches time ordering
pub(crate) fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp into a DateTime<Utc>
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

pub(crate) fn student_from_row(row: &Row) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
    })
}

pub(crate) fn course_from_row(row: &Row) -> rusqlite::Result<Course> {
    Ok(Course {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        credits: row.get(3)?,
    })
}

/// Read a grade from columns `offset..offset + 5`
pub(crate) fn grade_from_row(row: &Row, offset: usize) -> rusqlite::Result<Grade> {
    let raw: String = row.get(offset + 4)?;
    let recorded_at = parse_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            offset + 4,
            rusqlite::types::Type::Text,
            format!("invalid timestamp: {raw}").into(),
        )
    })?;
    Ok(Grade {
        id: row.get(offset)?,
        student_id: row.get(offset + 1)?,
        course_id: row.get(offset + 2)?,
        score: row.get(offset + 3)?,
        recorded_at,
    })
}

/// Columns: grade (5), student name, course name, course code, credits
pub(crate) fn grade_record_from_row(row: &Row) -> rusqlite::Result<GradeRecord> {
    Ok(GradeRecord {
        grade: grade_from_row(row, 0)?,
        student_name: row.get(5)?,
        course_name: row.get(6)?,
        course_code: row.get(7)?,
        credits: row.get(8)?,
    })
}

/// Storage interface for the gradebook database
pub struct Storage {
    conn: Connection,
    path: Option<PathBuf>,
    delete_policy: DeletePolicy,
}

impl Storage {
    /// Open the database described by `config`, creating the file if needed.
    ///
    /// The schema is not created here; call [`Storage::ensure_schema`].
    pub fn open(config: &DbConfig, dir: &Path, delete_policy: DeletePolicy) -> Result<Self> {
        if config.is_in_memory() {
            return Self::open_in_memory(delete_policy);
        }
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::Connection(format!("cannot create data directory {}: {e}", dir.display()))
        })?;
        let path = config.database_file(dir);
        Self::open_path(&path, delete_policy)
    }

    /// Open a database file directly
    pub fn open_path(path: &Path, delete_policy: DeletePolicy) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| Error::Connection(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), ?delete_policy, "opened database");
        Self::configure(conn, Some(path.to_path_buf()), delete_policy)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory(delete_policy: DeletePolicy) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Connection(e.to_string()))?;
        Self::configure(conn, None, delete_policy)
    }

    fn configure(
        conn: Connection,
        path: Option<PathBuf>,
        delete_policy: DeletePolicy,
    ) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| Error::Connection(format!("cannot enable foreign keys: {e}")))?;
        Ok(Storage {
            conn,
            path,
            delete_policy,
        })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Location of the database file, `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn delete_policy(&self) -> DeletePolicy {
        self.delete_policy
    }

    /// Create tables, indexes and views that are missing
    pub fn ensure_schema(&self) -> Result<()> {
        schema::ensure_schema(&self.conn)?;
        tracing::info!("schema ready");
        Ok(())
    }

    /// Whether setup has run against this database
    pub fn schema_exists(&self) -> Result<bool> {
        schema::schema_exists(&self.conn)
    }

    /// Insert the sample dataset unless data already exists
    pub fn seed_sample_data(&self) -> Result<SeedOutcome> {
        let outcome = schema::seed_sample_data(&self.conn)?;
        tracing::info!(?outcome, "seed sample data");
        Ok(outcome)
    }

    /// Drop all data and recreate the schema
    pub fn reset_schema(&self) -> Result<()> {
        schema::reset_schema(&self.conn)?;
        tracing::warn!("database reset; all data removed");
        Ok(())
    }

    /// Count rows in one of the gradebook tables or views
    pub(crate) fn count(&self, table: &str) -> Result<usize> {
        debug_assert!(matches!(
            table,
            "students" | "courses" | "grades" | "latest_grades"
        ));
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// `%term%` for a LIKE match, or `None` for an empty search
pub(crate) fn like_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let escaped = s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
            format!("%{escaped}%")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_round_trip() {
        let now = Utc::now();
        let text = format_timestamp(now);
        let parsed = parse_timestamp(&text).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn test_timestamp_text_orders_like_time() {
        let earlier = DateTime::parse_from_rfc3339("2024-01-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = DateTime::parse_from_rfc3339("2024-01-01T10:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(format_timestamp(earlier) < format_timestamp(later));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(None), None);
        assert_eq!(like_pattern(Some("  ")), None);
        assert_eq!(like_pattern(Some("ali")), Some("%ali%".to_string()));
        assert_eq!(like_pattern(Some("50%")), Some("%50\\%%".to_string()));
    }

    #[test]
    fn test_open_in_memory_enforces_foreign_keys() {
        let storage = Storage::open_in_memory(DeletePolicy::Restrict).unwrap();
        let enabled: i64 = storage
            .conn()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
        assert_eq!(storage.delete_policy(), DeletePolicy::Restrict);
        assert!(storage.path().is_none());
    }

    #[test]
    fn test_schema_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grades.db");

        let storage = Storage::open_path(&path, DeletePolicy::Cascade).unwrap();
        storage.ensure_schema().unwrap();
        storage.seed_sample_data().unwrap();
        drop(storage);

        let reopened = Storage::open_path(&path, DeletePolicy::Cascade).unwrap();
        assert!(reopened.schema_exists().unwrap());
        reopened.ensure_schema().unwrap();
        assert_eq!(reopened.count("students").unwrap(), 22);
        assert_eq!(reopened.seed_sample_data().unwrap(), SeedOutcome::Skipped);
    }
}
