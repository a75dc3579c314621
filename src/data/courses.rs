//! Course repository operations.

use rusqlite::{params, OptionalExtension, Transaction};

use super::models::{Course, CourseId};
use super::storage::{course_from_row, like_pattern, DeletePolicy, Storage};
use super::validate::NewCourse;
use crate::error::{Error, Result};

const ENTITY: &str = "Course";
const COLUMNS: &str = "id, name, code, credits";

/// Sort order for course listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CourseSort {
    #[default]
    Id,
    Code,
    Name,
}

impl CourseSort {
    pub fn next(self) -> Self {
        match self {
            CourseSort::Id => CourseSort::Code,
            CourseSort::Code => CourseSort::Name,
            CourseSort::Name => CourseSort::Id,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CourseSort::Id => "id",
            CourseSort::Code => "code",
            CourseSort::Name => "name",
        }
    }
}

/// Optional filter for [`Storage::list_courses`]
#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    /// Case-insensitive match on name or code
    pub search: Option<String>,
    pub sort: CourseSort,
}

fn ensure_code_free(tx: &Transaction, code: &str, except: Option<CourseId>) -> Result<()> {
    let holder: Option<CourseId> = tx
        .query_row(
            "SELECT id FROM courses WHERE code = ?1 COLLATE NOCASE",
            [code],
            |row| row.get(0),
        )
        .optional()?;
    match holder {
        Some(id) if Some(id) != except => Err(Error::UniqueConstraint {
            entity: ENTITY,
            field: "code",
            value: code.to_string(),
        }),
        _ => Ok(()),
    }
}

pub(crate) fn course_exists(conn: &rusqlite::Connection, id: CourseId) -> Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM courses WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

impl Storage {
    /// Add a course and return its new id
    pub fn create_course(&self, input: &NewCourse) -> Result<CourseId> {
        let input = input.validated()?;
        let tx = self.conn().unchecked_transaction()?;
        ensure_code_free(&tx, &input.code, None)?;
        tx.execute(
            "INSERT INTO courses (name, code, credits) VALUES (?1, ?2, ?3)",
            params![input.name, input.code, input.credits],
        )?;
        let id = CourseId(tx.last_insert_rowid());
        tx.commit()?;
        tracing::info!(%id, code = %input.code, "course created");
        Ok(id)
    }

    /// Get a course by id
    pub fn get_course(&self, id: CourseId) -> Result<Course> {
        self.conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM courses WHERE id = ?1"),
                [id],
                course_from_row,
            )
            .optional()?
            .ok_or(Error::not_found(ENTITY, id.0))
    }

    /// Look a course up by its code (case-insensitive)
    pub fn course_by_code(&self, code: &str) -> Result<Option<Course>> {
        let course = self
            .conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM courses WHERE code = ?1 COLLATE NOCASE"),
                [code.trim()],
                course_from_row,
            )
            .optional()?;
        Ok(course)
    }

    /// Replace a course's name, code and credits
    pub fn update_course(&self, id: CourseId, input: &NewCourse) -> Result<Course> {
        let input = input.validated()?;
        let tx = self.conn().unchecked_transaction()?;
        if !course_exists(&tx, id)? {
            return Err(Error::not_found(ENTITY, id.0));
        }
        ensure_code_free(&tx, &input.code, Some(id))?;
        tx.execute(
            "UPDATE courses SET name = ?1, code = ?2, credits = ?3 WHERE id = ?4",
            params![input.name, input.code, input.credits, id],
        )?;
        tx.commit()?;
        tracing::info!(%id, "course updated");
        Ok(Course {
            id,
            name: input.name,
            code: input.code,
            credits: input.credits,
        })
    }

    /// Delete a course, applying the configured policy to its grades.
    ///
    /// Returns the number of grades removed along with the course.
    pub fn delete_course(&self, id: CourseId) -> Result<usize> {
        let tx = self.conn().unchecked_transaction()?;
        if !course_exists(&tx, id)? {
            return Err(Error::not_found(ENTITY, id.0));
        }
        let dependents: i64 = tx.query_row(
            "SELECT COUNT(*) FROM grades WHERE course_id = ?1",
            [id],
            |row| row.get(0),
        )?;
        let removed = match self.delete_policy() {
            DeletePolicy::Restrict if dependents > 0 => {
                return Err(Error::ReferentialIntegrity {
                    entity: ENTITY,
                    id: id.0,
                    dependents: dependents as usize,
                });
            }
            DeletePolicy::Restrict => 0,
            DeletePolicy::Cascade => tx.execute("DELETE FROM grades WHERE course_id = ?1", [id])?,
        };
        tx.execute("DELETE FROM courses WHERE id = ?1", [id])?;
        tx.commit()?;
        tracing::info!(%id, removed_grades = removed, "course deleted");
        Ok(removed)
    }

    /// List courses ordered by id unless another sort is requested
    pub fn list_courses(&self, filter: &CourseFilter) -> Result<Vec<Course>> {
        let order = match filter.sort {
            CourseSort::Id => "id",
            CourseSort::Code => "code COLLATE NOCASE, id",
            CourseSort::Name => "name COLLATE NOCASE, id",
        };
        let pattern = like_pattern(filter.search.as_deref());
        let sql = format!(
            "SELECT {COLUMNS} FROM courses
             WHERE ?1 IS NULL OR name LIKE ?1 ESCAPE '\\' OR code LIKE ?1 ESCAPE '\\'
             ORDER BY {order}"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let courses = stmt
            .query_map([pattern], course_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(courses)
    }
}
