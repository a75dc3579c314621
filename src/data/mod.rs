//! Data layer for the gradebook's SQLite database.
//!
//! Handles schema setup, validation of incoming records, and typed CRUD for
//! students, courses and grades.

mod courses;
mod grades;
mod models;
pub mod schema;
mod storage;
mod students;
mod validate;

pub use courses::{CourseFilter, CourseSort};
pub use grades::{GradeFilter, GradeSort};
pub use models::{Course, CourseId, Grade, GradeId, GradeRecord, Letter, Student, StudentId, PASSING_SCORE};
pub use schema::SeedOutcome;
pub use storage::{DeletePolicy, Storage};
pub use students::{StudentFilter, StudentSort};
pub use validate::{GradeUpdate, NewCourse, NewGrade, NewStudent, MAX_CREDITS};
