//! Database schema definitions and setup.
//!
//! Grades reference students and courses with `ON DELETE RESTRICT`; cascading
//! deletes are carried out explicitly by the repository inside the delete
//! transaction, so the database itself never permits an orphan.

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::Result;

/// SQL to create the students table
pub const CREATE_STUDENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    email TEXT NOT NULL COLLATE NOCASE UNIQUE
)
"#;

/// SQL to create the courses table
pub const CREATE_COURSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS courses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    code TEXT NOT NULL COLLATE NOCASE UNIQUE,
    credits INTEGER NOT NULL CHECK (credits > 0 AND credits <= 30)
)
"#;

/// SQL to create the grades table (append-only history)
pub const CREATE_GRADES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS grades (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL REFERENCES students(id) ON DELETE RESTRICT,
    course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE RESTRICT,
    score REAL NOT NULL CHECK (score >= 0 AND score <= 100),
    recorded_at TEXT NOT NULL
)
"#;

/// The effective grade per (student, course): latest `recorded_at`, then highest id
pub const CREATE_LATEST_GRADES_VIEW: &str = r#"
CREATE VIEW IF NOT EXISTS latest_grades AS
SELECT g.id, g.student_id, g.course_id, g.score, g.recorded_at
FROM grades g
WHERE NOT EXISTS (
    SELECT 1 FROM grades h
    WHERE h.student_id = g.student_id
      AND h.course_id = g.course_id
      AND (h.recorded_at > g.recorded_at
           OR (h.recorded_at = g.recorded_at AND h.id > g.id))
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id)",
    "CREATE INDEX IF NOT EXISTS idx_grades_course ON grades(course_id)",
    "CREATE INDEX IF NOT EXISTS idx_grades_pair ON grades(student_id, course_id, recorded_at)",
];

const TABLES: [&str; 3] = ["students", "courses", "grades"];

/// All schema creation statements, in dependency order
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_STUDENTS_TABLE,
        CREATE_COURSES_TABLE,
        CREATE_GRADES_TABLE,
        CREATE_LATEST_GRADES_VIEW,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}

/// Create every table, index and view that is missing
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    for stmt in all_schema_statements() {
        tx.execute(stmt, [])?;
    }
    tx.commit()?;
    Ok(())
}

/// Whether all three tables exist
pub fn schema_exists(conn: &Connection) -> Result<bool> {
    let mut present = 0;
    for table in TABLES {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        present += count;
    }
    Ok(present == TABLES.len() as i64)
}

/// Drop everything and recreate an empty schema
pub fn reset_schema(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "DROP VIEW IF EXISTS latest_grades;
         DROP TABLE IF EXISTS grades;
         DROP TABLE IF EXISTS courses;
         DROP TABLE IF EXISTS students;",
    )?;
    for stmt in all_schema_statements() {
        tx.execute(stmt, [])?;
    }
    tx.commit()?;
    Ok(())
}

const SAMPLE_STUDENTS: &[(&str, &str)] = &[
    ("Alice Johnson", "alice.johnson@example.com"),
    ("Bob Smith", "bob.smith@example.com"),
    ("Charlie Davis", "charlie.davis@example.com"),
    ("Diana Evans", "diana.evans@example.com"),
    ("Ethan Brown", "ethan.brown@example.com"),
    ("Fiona Clark", "fiona.clark@example.com"),
    ("George Miller", "george.miller@example.com"),
    ("Hannah Wilson", "hannah.wilson@example.com"),
    ("Ian Thompson", "ian.thompson@example.com"),
    ("Julia Robinson", "julia.robinson@example.com"),
    ("Kevin Walker", "kevin.walker@example.com"),
    ("Laura King", "laura.king@example.com"),
    ("Michael Scott", "michael.scott@example.com"),
    ("Nina Perez", "nina.perez@example.com"),
    ("Oliver Martinez", "oliver.martinez@example.com"),
    ("Ahmed Khalid", "ahmed.khalid@example.com"),
    ("Fatima Ali", "fatima.ali@example.com"),
    ("Omar Farouk", "omar.farouk@example.com"),
    ("Layla Hassan", "layla.hassan@example.com"),
    ("Yousef Ibrahim", "yousef.ibrahim@example.com"),
    ("Sara Nasser", "sara.nasser@example.com"),
    ("Zainab Mustafa", "zainab.mustafa@example.com"),
];

const SAMPLE_COURSES: &[(&str, &str, u32)] = &[
    ("Mathematics", "MATH101", 3),
    ("Physics", "PHYS101", 4),
    ("Chemistry", "CHEM101", 3),
    ("English Literature", "ENG101", 2),
    ("History", "HIST101", 3),
];

/// Deterministic sample score in 30..=100; roughly one in five is failing
fn sample_score(student: usize, course: usize) -> f64 {
    let mix = (student * 37 + course * 23 + student * course * 11 + 7) % 100;
    if mix < 20 {
        30.0 + (mix as f64)
    } else {
        50.0 + ((mix * 13) % 51) as f64
    }
}

/// Result of a seeding attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SeedOutcome {
    Seeded {
        students: usize,
        courses: usize,
        grades: usize,
    },
    /// Students or courses already exist; nothing was inserted
    Skipped,
}

/// Insert the sample dataset unless the database already holds data
pub fn seed_sample_data(conn: &Connection) -> Result<SeedOutcome> {
    let tx = conn.unchecked_transaction()?;

    let existing: i64 = tx.query_row(
        "SELECT (SELECT COUNT(*) FROM students) + (SELECT COUNT(*) FROM courses)",
        [],
        |row| row.get(0),
    )?;
    if existing > 0 {
        return Ok(SeedOutcome::Skipped);
    }

    let mut student_ids = Vec::with_capacity(SAMPLE_STUDENTS.len());
    for (name, email) in SAMPLE_STUDENTS {
        tx.execute(
            "INSERT INTO students (name, email) VALUES (?1, ?2)",
            params![name, email],
        )?;
        student_ids.push(tx.last_insert_rowid());
    }

    let mut course_ids = Vec::with_capacity(SAMPLE_COURSES.len());
    for (name, code, credits) in SAMPLE_COURSES {
        tx.execute(
            "INSERT INTO courses (name, code, credits) VALUES (?1, ?2, ?3)",
            params![name, code, credits],
        )?;
        course_ids.push(tx.last_insert_rowid());
    }

    let recorded_at = super::storage::format_timestamp(Utc::now());
    let mut grades = 0;
    for (s, student_id) in student_ids.iter().enumerate() {
        for (c, course_id) in course_ids.iter().enumerate() {
            tx.execute(
                "INSERT INTO grades (student_id, course_id, score, recorded_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![student_id, course_id, sample_score(s, c), recorded_at],
            )?;
            grades += 1;
        }
    }

    tx.commit()?;
    Ok(SeedOutcome::Seeded {
        students: student_ids.len(),
        courses: course_ids.len(),
        grades,
    })
}
