//! Data models for students, courses and grades.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                self.0.to_sql()
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map($name)
            }
        }
    };
}

id_type!(
    /// System-assigned student identifier
    StudentId
);
id_type!(
    /// System-assigned course identifier
    CourseId
);
id_type!(
    /// System-assigned grade identifier
    GradeId
);

/// A student enrolled in the gradebook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub email: String,
}

/// A course that grades are recorded against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub code: String,
    pub credits: u32,
}

/// A single recorded grade. Several may exist per (student, course) pair;
/// the most recently recorded one is the effective grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub id: GradeId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub score: f64,
    pub recorded_at: DateTime<Utc>,
}

impl Grade {
    pub fn letter(&self) -> Letter {
        Letter::from_score(self.score)
    }
}

/// A grade joined with the names it refers to, for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub grade: Grade,
    pub student_name: String,
    pub course_name: String,
    pub course_code: String,
    pub credits: u32,
}

/// Letter grade bands used for distributions and GPA points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Letter {
    A,
    B,
    C,
    D,
    F,
}

/// Scores below this are failing
pub const PASSING_SCORE: f64 = 60.0;

impl Letter {
    pub const ALL: [Letter; 5] = [Letter::A, Letter::B, Letter::C, Letter::D, Letter::F];

    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Letter::A
        } else if score >= 80.0 {
            Letter::B
        } else if score >= 70.0 {
            Letter::C
        } else if score >= PASSING_SCORE {
            Letter::D
        } else {
            Letter::F
        }
    }

    /// Grade points on the 4.0 scale
    pub fn points(self) -> f64 {
        match self {
            Letter::A => 4.0,
            Letter::B => 3.0,
            Letter::C => 2.0,
            Letter::D => 1.0,
            Letter::F => 0.0,
        }
    }

    /// Position in `Letter::ALL`
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Letter::A => "A",
            Letter::B => "B",
            Letter::C => "C",
            Letter::D => "D",
            Letter::F => "F",
        }
    }
}

impl std::fmt::Display for Letter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
