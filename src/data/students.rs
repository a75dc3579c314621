//! Student repository operations.

use rusqlite::{params, OptionalExtension, Transaction};

use super::models::{Student, StudentId};
use super::storage::{like_pattern, student_from_row, DeletePolicy, Storage};
use super::validate::NewStudent;
use crate::error::{Error, Result};

const ENTITY: &str = "Student";

/// Sort order for student listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StudentSort {
    #[default]
    Id,
    Name,
}

impl StudentSort {
    pub fn next(self) -> Self {
        match self {
            StudentSort::Id => StudentSort::Name,
            StudentSort::Name => StudentSort::Id,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StudentSort::Id => "id",
            StudentSort::Name => "name",
        }
    }
}

/// Optional filter for [`Storage::list_students`]
#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    /// Case-insensitive match on name or email
    pub search: Option<String>,
    pub sort: StudentSort,
}

fn ensure_email_free(tx: &Transaction, email: &str, except: Option<StudentId>) -> Result<()> {
    let holder: Option<StudentId> = tx
        .query_row(
            "SELECT id FROM students WHERE email = ?1 COLLATE NOCASE",
            [email],
            |row| row.get(0),
        )
        .optional()?;
    match holder {
        Some(id) if Some(id) != except => Err(Error::UniqueConstraint {
            entity: ENTITY,
            field: "email",
            value: email.to_string(),
        }),
        _ => Ok(()),
    }
}

pub(crate) fn student_exists(tx: &rusqlite::Connection, id: StudentId) -> Result<bool> {
    let found = tx
        .query_row("SELECT 1 FROM students WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

impl Storage {
    /// Add a student and return its new id
    pub fn create_student(&self, input: &NewStudent) -> Result<StudentId> {
        let input = input.validated()?;
        let tx = self.conn().unchecked_transaction()?;
        ensure_email_free(&tx, &input.email, None)?;
        tx.execute(
            "INSERT INTO students (name, email) VALUES (?1, ?2)",
            params![input.name, input.email],
        )?;
        let id = StudentId(tx.last_insert_rowid());
        tx.commit()?;
        tracing::info!(%id, email = %input.email, "student created");
        Ok(id)
    }

    /// Get a student by id
    pub fn get_student(&self, id: StudentId) -> Result<Student> {
        self.conn()
            .query_row(
                "SELECT id, name, email FROM students WHERE id = ?1",
                [id],
                student_from_row,
            )
            .optional()?
            .ok_or(Error::not_found(ENTITY, id.0))
    }

    /// Replace a student's name and email
    pub fn update_student(&self, id: StudentId, input: &NewStudent) -> Result<Student> {
        let input = input.validated()?;
        let tx = self.conn().unchecked_transaction()?;
        if !student_exists(&tx, id)? {
            return Err(Error::not_found(ENTITY, id.0));
        }
        ensure_email_free(&tx, &input.email, Some(id))?;
        tx.execute(
            "UPDATE students SET name = ?1, email = ?2 WHERE id = ?3",
            params![input.name, input.email, id],
        )?;
        tx.commit()?;
        tracing::info!(%id, "student updated");
        Ok(Student {
            id,
            name: input.name,
            email: input.email,
        })
    }

    /// Delete a student, applying the configured policy to their grades.
    ///
    /// Returns the number of grades removed along with the student.
    pub fn delete_student(&self, id: StudentId) -> Result<usize> {
        let tx = self.conn().unchecked_transaction()?;
        if !student_exists(&tx, id)? {
            return Err(Error::not_found(ENTITY, id.0));
        }
        let dependents: i64 = tx.query_row(
            "SELECT COUNT(*) FROM grades WHERE student_id = ?1",
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
            DeletePolicy::Cascade => {
                tx.execute("DELETE FROM grades WHERE student_id = ?1", [id])?
            }
        };
        tx.execute("DELETE FROM students WHERE id = ?1", [id])?;
        tx.commit()?;
        tracing::info!(%id, removed_grades = removed, "student deleted");
        Ok(removed)
    }

    /// List students ordered by id unless another sort is requested
    pub fn list_students(&self, filter: &StudentFilter) -> Result<Vec<Student>> {
        let order = match filter.sort {
            StudentSort::Id => "id",
            StudentSort::Name => "name COLLATE NOCASE, id",
        };
        let pattern = like_pattern(filter.search.as_deref());
        let sql = format!(
            "SELECT id, name, email FROM students
             WHERE ?1 IS NULL OR name LIKE ?1 ESCAPE '\\' OR email LIKE ?1 ESCAPE '\\'
             ORDER BY {order}"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let students = stmt
            .query_map([pattern], student_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(students)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::CourseId;
    use crate::data::validate::{NewCourse, NewGrade};

    fn storage(policy: DeletePolicy) -> Storage {
        let storage = Storage::open_in_memory(policy).unwrap();
        storage.ensure_schema().unwrap();
        storage
    }

    #[test]
    fn test_create_then_read_round_trip() {
        let storage = storage(DeletePolicy::Cascade);
        let input = NewStudent::new("Alice Johnson", "alice@example.com");
        let id = storage.create_student(&input).unwrap();

        let student = storage.get_student(id).unwrap();
        assert_eq!(student.id, id);
        assert_eq!(student.name, input.name);
        assert_eq!(student.email, input.email);
    }

    #[test]
    fn test_duplicate_email_is_rejected_case_insensitively() {
        let storage = storage(DeletePolicy::Cascade);
        storage
            .create_student(&NewStudent::new("Alice", "alice@example.com"))
            .unwrap();
        let err = storage
            .create_student(&NewStudent::new("Alicia", "ALICE@example.com"))
            .unwrap_err();
        assert!(matches!(err, Error::UniqueConstraint { field: "email", .. }));
        assert_eq!(storage.list_students(&StudentFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_input_is_not_stored() {
        let storage = storage(DeletePolicy::Cascade);
        let err = storage
            .create_student(&NewStudent::new("Bob", "not-an-email"))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "email", .. }));
        assert!(storage.list_students(&StudentFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_read_missing_student() {
        let storage = storage(DeletePolicy::Cascade);
        let err = storage.get_student(StudentId(99)).unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "Student", id: 99 }));
    }

    #[test]
    fn test_update_student() {
        let storage = storage(DeletePolicy::Cascade);
        let alice = storage
            .create_student(&NewStudent::new("Alice", "alice@example.com"))
            .unwrap();
        let bob = storage
            .create_student(&NewStudent::new("Bob", "bob@example.com"))
            .unwrap();

        // Keeping your own email is fine
        let updated = storage
            .update_student(alice, &NewStudent::new("Alice Johnson", "alice@example.com"))
            .unwrap();
        assert_eq!(updated.name, "Alice Johnson");
        assert_eq!(storage.get_student(alice).unwrap(), updated);

        // Taking someone else's is not
        let err = storage
            .update_student(bob, &NewStudent::new("Bob", "alice@example.com"))
            .unwrap_err();
        assert!(matches!(err, Error::UniqueConstraint { .. }));

        let err = storage
            .update_student(StudentId(42), &NewStudent::new("Nobody", "no@example.com"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        let err = storage
            .update_student(alice, &NewStudent::new("", "alice@example.com"))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    fn student_with_grade(storage: &Storage) -> (StudentId, CourseId) {
        let student = storage
            .create_student(&NewStudent::new("Alice", "alice@example.com"))
            .unwrap();
        let course = storage
            .create_course(&NewCourse::new("Mathematics", "MATH101", 3))
            .unwrap();
        storage
            .create_grade(&NewGrade::new(student, course, 88.0))
            .unwrap();
        storage
            .create_grade(&NewGrade::new(student, course, 91.0))
            .unwrap();
        (student, course)
    }

    #[test]
    fn test_delete_cascades_grades() {
        let storage = storage(DeletePolicy::Cascade);
        let (student, _) = student_with_grade(&storage);

        assert_eq!(storage.delete_student(student).unwrap(), 2);
        assert!(matches!(
            storage.get_student(student),
            Err(Error::NotFound { .. })
        ));
        assert_eq!(storage.count("grades").unwrap(), 0);
    }

    #[test]
    fn test_delete_restricted_while_grades_exist() {
        let storage = storage(DeletePolicy::Restrict);
        let (student, _) = student_with_grade(&storage);

        let err = storage.delete_student(student).unwrap_err();
        assert!(matches!(
            err,
            Error::ReferentialIntegrity {
                entity: "Student",
                dependents: 2,
                ..
            }
        ));
        assert!(storage.get_student(student).is_ok());
        assert_eq!(storage.count("grades").unwrap(), 2);
    }

    #[test]
    fn test_delete_without_grades_under_restrict() {
        let storage = storage(DeletePolicy::Restrict);
        let id = storage
            .create_student(&NewStudent::new("Alice", "alice@example.com"))
            .unwrap();
        assert_eq!(storage.delete_student(id).unwrap(), 0);
        assert!(matches!(
            storage.delete_student(id),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_list_search_and_sort() {
        let storage = storage(DeletePolicy::Cascade);
        for (name, email) in [
            ("Charlie Davis", "charlie@example.com"),
            ("alice Johnson", "alice@example.com"),
            ("Bob Smith", "bob@uni.edu"),
        ] {
            storage.create_student(&NewStudent::new(name, email)).unwrap();
        }

        let by_id = storage.list_students(&StudentFilter::default()).unwrap();
        let ids: Vec<i64> = by_id.iter().map(|s| s.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let by_name = storage
            .list_students(&StudentFilter {
                search: None,
                sort: StudentSort::Name,
            })
            .unwrap();
        let names: Vec<&str> = by_name.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alice Johnson", "Bob Smith", "Charlie Davis"]);

        let found = storage
            .list_students(&StudentFilter {
                search: Some("UNI.EDU".into()),
                sort: StudentSort::Id,
            })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Bob Smith");
    }
}
