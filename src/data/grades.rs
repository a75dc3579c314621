//! Grade repository operations.
//!
//! Grades are append-only history: recording a grade for a (student, course)
//! pair that already has one adds a new row, and the latest row becomes the
//! effective grade. `update_grade` corrects a row in place.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::courses::course_exists;
use super::models::{CourseId, Grade, GradeId, GradeRecord, StudentId};
use super::storage::{format_timestamp, grade_from_row, grade_record_from_row, like_pattern, Storage};
use super::students::student_exists;
use super::validate::{GradeUpdate, NewGrade};
use crate::error::{Error, Result};

const ENTITY: &str = "Grade";
const GRADE_COLUMNS: &str = "id, student_id, course_id, score, recorded_at";

/// Sort order for grade listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GradeSort {
    #[default]
    Id,
    /// Highest score first, ties by student name
    ScoreDesc,
}

impl GradeSort {
    pub fn next(self) -> Self {
        match self {
            GradeSort::Id => GradeSort::ScoreDesc,
            GradeSort::ScoreDesc => GradeSort::Id,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GradeSort::Id => "id",
            GradeSort::ScoreDesc => "score",
        }
    }
}

/// Optional filter for [`Storage::list_grades`]
#[derive(Debug, Clone, Default)]
pub struct GradeFilter {
    pub student_id: Option<StudentId>,
    pub course_id: Option<CourseId>,
    /// Case-insensitive match on student name, course name or course code
    pub search: Option<String>,
    /// Only the effective (latest) grade per (student, course)
    pub latest_only: bool,
    pub sort: GradeSort,
}

impl GradeFilter {
    pub fn latest() -> Self {
        GradeFilter {
            latest_only: true,
            ..Default::default()
        }
    }
}

impl Storage {
    /// Record a grade; the student and course must exist
    pub fn create_grade(&self, input: &NewGrade) -> Result<GradeId> {
        let input = input.validated()?;
        let tx = self.conn().unchecked_transaction()?;
        if !student_exists(&tx, input.student_id)? {
            return Err(Error::not_found("Student", input.student_id.0));
        }
        if !course_exists(&tx, input.course_id)? {
            return Err(Error::not_found("Course", input.course_id.0));
        }
        tx.execute(
            "INSERT INTO grades (student_id, course_id, score, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                input.student_id,
                input.course_id,
                input.score,
                format_timestamp(Utc::now())
            ],
        )?;
        let id = GradeId(tx.last_insert_rowid());
        tx.commit()?;
        tracing::info!(
            %id,
            student = %input.student_id,
            course = %input.course_id,
            score = input.score,
            "grade recorded"
        );
        Ok(id)
    }

    /// Get a grade by id
    pub fn get_grade(&self, id: GradeId) -> Result<Grade> {
        self.conn()
            .query_row(
                &format!("SELECT {GRADE_COLUMNS} FROM grades WHERE id = ?1"),
                [id],
                |row| grade_from_row(row, 0),
            )
            .optional()?
            .ok_or(Error::not_found(ENTITY, id.0))
    }

    /// Correct the score of an existing grade
    pub fn update_grade(&self, id: GradeId, update: &GradeUpdate) -> Result<Grade> {
        let update = update.validated()?;
        let tx = self.conn().unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE grades SET score = ?1 WHERE id = ?2",
            params![update.score, id],
        )?;
        if changed == 0 {
            return Err(Error::not_found(ENTITY, id.0));
        }
        let grade = tx.query_row(
            &format!("SELECT {GRADE_COLUMNS} FROM grades WHERE id = ?1"),
            [id],
            |row| grade_from_row(row, 0),
        )?;
        tx.commit()?;
        tracing::info!(%id, score = update.score, "grade updated");
        Ok(grade)
    }

    /// Delete a single grade
    pub fn delete_grade(&self, id: GradeId) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        let removed = tx.execute("DELETE FROM grades WHERE id = ?1", [id])?;
        if removed == 0 {
            return Err(Error::not_found(ENTITY, id.0));
        }
        tx.commit()?;
        tracing::info!(%id, "grade deleted");
        Ok(())
    }

    /// The effective grade for a (student, course) pair, if any
    pub fn latest_grade(&self, student_id: StudentId, course_id: CourseId) -> Result<Option<Grade>> {
        let grade = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {GRADE_COLUMNS} FROM latest_grades
                     WHERE student_id = ?1 AND course_id = ?2"
                ),
                params![student_id, course_id],
                |row| grade_from_row(row, 0),
            )
            .optional()?;
        Ok(grade)
    }

    /// Every grade recorded for a (student, course) pair, oldest first
    pub fn grade_history(&self, student_id: StudentId, course_id: CourseId) -> Result<Vec<Grade>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {GRADE_COLUMNS} FROM grades
             WHERE student_id = ?1 AND course_id = ?2
             ORDER BY recorded_at, id"
        ))?;
        let grades = stmt
            .query_map(params![student_id, course_id], |row| grade_from_row(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(grades)
    }

    /// List grades joined with student and course details
    pub fn list_grades(&self, filter: &GradeFilter) -> Result<Vec<GradeRecord>> {
        let source = if filter.latest_only {
            "latest_grades"
        } else {
            "grades"
        };
        let order = match filter.sort {
            GradeSort::Id => "g.id",
            GradeSort::ScoreDesc => "g.score DESC, s.name COLLATE NOCASE, g.id",
        };
        let sql = format!(
            "SELECT g.id, g.student_id, g.course_id, g.score, g.recorded_at,
                    s.name, c.name, c.code, c.credits
             FROM {source} g
             JOIN students s ON g.student_id = s.id
             JOIN courses c ON g.course_id = c.id
             WHERE (?1 IS NULL OR g.student_id = ?1)
               AND (?2 IS NULL OR g.course_id = ?2)
               AND (?3 IS NULL OR s.name LIKE ?3 ESCAPE '\\'
                    OR c.name LIKE ?3 ESCAPE '\\' OR c.code LIKE ?3 ESCAPE '\\')
             ORDER BY {order}"
        );
        let pattern = like_pattern(filter.search.as_deref());
        let mut stmt = self.conn().prepare(&sql)?;
        let records = stmt
            .query_map(
                params![filter.student_id, filter.course_id, pattern],
                grade_record_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::storage::DeletePolicy;
    use crate::data::validate::{NewCourse, NewStudent};

    struct Fixture {
        storage: Storage,
        alice: StudentId,
        bob: StudentId,
        math: CourseId,
        physics: CourseId,
    }

    fn fixture() -> Fixture {
        let storage = Storage::open_in_memory(DeletePolicy::Cascade).unwrap();
        storage.ensure_schema().unwrap();
        let alice = storage
            .create_student(&NewStudent::new("Alice", "alice@example.com"))
            .unwrap();
        let bob = storage
            .create_student(&NewStudent::new("Bob", "bob@example.com"))
            .unwrap();
        let math = storage
            .create_course(&NewCourse::new("Mathematics", "MATH101", 3))
            .unwrap();
        let physics = storage
            .create_course(&NewCourse::new("Physics", "PHYS101", 4))
            .unwrap();
        Fixture {
            storage,
            alice,
            bob,
            math,
            physics,
        }
    }

    #[test]
    fn test_unknown_student_or_course_persists_nothing() {
        let f = fixture();

        let err = f
            .storage
            .create_grade(&NewGrade::new(StudentId(999), f.math, 80.0))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "Student", id: 999 }));

        let err = f
            .storage
            .create_grade(&NewGrade::new(f.alice, CourseId(999), 80.0))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "Course", id: 999 }));

        assert_eq!(f.storage.count("grades").unwrap(), 0);
    }

    #[test]
    fn test_out_of_range_score_rejected() {
        let f = fixture();
        let err = f
            .storage
            .create_grade(&NewGrade::new(f.alice, f.math, 100.5))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "score", .. }));
        assert_eq!(f.storage.count("grades").unwrap(), 0);
    }

    #[test]
    fn test_create_read_update_delete() {
        let f = fixture();
        let id = f
            .storage
            .create_grade(&NewGrade::new(f.alice, f.math, 72.5))
            .unwrap();

        let grade = f.storage.get_grade(id).unwrap();
        assert_eq!(grade.student_id, f.alice);
        assert_eq!(grade.course_id, f.math);
        assert_eq!(grade.score, 72.5);

        let updated = f
            .storage
            .update_grade(id, &GradeUpdate { score: 81.0 })
            .unwrap();
        assert_eq!(updated.score, 81.0);
        assert_eq!(updated.recorded_at, grade.recorded_at);

        assert!(matches!(
            f.storage.update_grade(id, &GradeUpdate { score: -1.0 }),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            f.storage.update_grade(GradeId(500), &GradeUpdate { score: 50.0 }),
            Err(Error::NotFound { .. })
        ));

        f.storage.delete_grade(id).unwrap();
        assert!(matches!(
            f.storage.get_grade(id),
            Err(Error::NotFound { entity: "Grade", .. })
        ));
        assert!(matches!(
            f.storage.delete_grade(id),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_history_is_append_only_with_latest_view() {
        let f = fixture();
        f.storage
            .create_grade(&NewGrade::new(f.alice, f.math, 55.0))
            .unwrap();
        let second = f
            .storage
            .create_grade(&NewGrade::new(f.alice, f.math, 78.0))
            .unwrap();

        let history = f.storage.grade_history(f.alice, f.math).unwrap();
        let scores: Vec<f64> = history.iter().map(|g| g.score).collect();
        assert_eq!(scores, vec![55.0, 78.0]);

        let latest = f.storage.latest_grade(f.alice, f.math).unwrap().unwrap();
        assert_eq!(latest.id, second);
        assert!(f.storage.latest_grade(f.bob, f.math).unwrap().is_none());

        let all = f.storage.list_grades(&GradeFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        let latest_only = f.storage.list_grades(&GradeFilter::latest()).unwrap();
        assert_eq!(latest_only.len(), 1);
        assert_eq!(latest_only[0].grade.score, 78.0);
    }

    #[test]
    fn test_list_filters_and_joins() {
        let f = fixture();
        for (student, course, score) in [
            (f.alice, f.math, 90.0),
            (f.bob, f.math, 70.0),
            (f.bob, f.physics, 85.0),
        ] {
            f.storage
                .create_grade(&NewGrade::new(student, course, score))
                .unwrap();
        }

        let bob = f
            .storage
            .list_grades(&GradeFilter {
                student_id: Some(f.bob),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(bob.len(), 2);
        assert!(bob.iter().all(|r| r.student_name == "Bob"));

        let math_ranked = f
            .storage
            .list_grades(&GradeFilter {
                course_id: Some(f.math),
                sort: GradeSort::ScoreDesc,
                ..Default::default()
            })
            .unwrap();
        let names: Vec<&str> = math_ranked.iter().map(|r| r.student_name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert_eq!(math_ranked[0].course_code, "MATH101");
        assert_eq!(math_ranked[0].credits, 3);

        let physics = f
            .storage
            .list_grades(&GradeFilter {
                search: Some("phys".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(physics.len(), 1);
        assert_eq!(physics[0].grade.score, 85.0);
    }
}
