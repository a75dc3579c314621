//! Structured input records and their boundary validation.
//!
//! Every mutating repository call takes one of these records and validates it
//! before any SQL runs, so malformed values never reach the database.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::models::{CourseId, StudentId};
use crate::error::{Error, Result};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;
pub const MAX_CODE_LEN: usize = 16;
pub const MAX_CREDITS: u32 = 30;
const MAX_NAME_LEN: usize = 120;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("email pattern is a valid regex")
    })
}

fn required_text(field: &'static str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(field, "cannot be empty"));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(Error::validation(
            field,
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    Ok(value.to_string())
}

/// Check an email address against the accepted format
pub fn validate_email(email: &str) -> Result<String> {
    let email = email.trim();
    if email.is_empty() {
        return Err(Error::validation("email", "cannot be empty"));
    }
    if !email_pattern().is_match(email) {
        return Err(Error::validation("email", format!("'{email}' is not a valid address")));
    }
    Ok(email.to_string())
}

/// Check that a score lies in the accepted range
pub fn validate_score(score: f64) -> Result<f64> {
    if !score.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(Error::validation(
            "score",
            format!("must be between {MIN_SCORE} and {MAX_SCORE}"),
        ));
    }
    Ok(score)
}

/// Fields for creating or replacing a student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStudent {
    pub name: String,
    pub email: String,
}

impl NewStudent {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        NewStudent {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Return the trimmed record, or the first problem found
    pub fn validated(&self) -> Result<Self> {
        Ok(NewStudent {
            name: required_text("name", &self.name)?,
            email: validate_email(&self.email)?,
        })
    }
}

/// Fields for creating or replacing a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCourse {
    pub name: String,
    pub code: String,
    pub credits: u32,
}

impl NewCourse {
    pub fn new(name: impl Into<String>, code: impl Into<String>, credits: u32) -> Self {
        NewCourse {
            name: name.into(),
            code: code.into(),
            credits,
        }
    }

    pub fn validated(&self) -> Result<Self> {
        let name = required_text("name", &self.name)?;
        let code = self.code.trim();
        if code.is_empty() {
            return Err(Error::validation("code", "is required"));
        }
        if code.chars().count() > MAX_CODE_LEN || code.chars().any(char::is_whitespace) {
            return Err(Error::validation(
                "code",
                format!("must be at most {MAX_CODE_LEN} characters without spaces"),
            ));
        }
        if self.credits == 0 || self.credits > MAX_CREDITS {
            return Err(Error::validation(
                "credits",
                format!("must be between 1 and {MAX_CREDITS}"),
            ));
        }
        Ok(NewCourse {
            name,
            code: code.to_string(),
            credits: self.credits,
        })
    }
}

/// Fields for recording a grade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGrade {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub score: f64,
}

impl NewGrade {
    pub fn new(student_id: StudentId, course_id: CourseId, score: f64) -> Self {
        NewGrade {
            student_id,
            course_id,
            score,
        }
    }

    pub fn validated(&self) -> Result<Self> {
        Ok(NewGrade {
            score: validate_score(self.score)?,
            ..self.clone()
        })
    }
}

/// Correction of an existing grade's score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeUpdate {
    pub score: f64,
}

impl GradeUpdate {
    pub fn validated(&self) -> Result<Self> {
        Ok(GradeUpdate {
            score: validate_score(self.score)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_is_trimmed() {
        let student = NewStudent::new("  Alice Johnson ", " alice@example.com ")
            .validated()
            .unwrap();
        assert_eq!(student.name, "Alice Johnson");
        assert_eq!(student.email, "alice@example.com");
    }

    #[test]
    fn test_student_requires_name() {
        let err = NewStudent::new("   ", "alice@example.com").validated().unwrap_err();
        assert!(matches!(err, Error::Validation { field: "name", .. }));
    }

    #[test]
    fn test_email_format() {
        assert!(validate_email("first.last+tag@uni.edu").is_ok());
        for bad in ["", "alice", "alice@", "@example.com", "alice@example", "a b@example.com"] {
            assert!(validate_email(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_course_rules() {
        assert!(NewCourse::new("Mathematics", "MATH101", 3).validated().is_ok());

        let err = NewCourse::new("Mathematics", "MATH101", 0).validated().unwrap_err();
        assert!(matches!(err, Error::Validation { field: "credits", .. }));

        assert!(NewCourse::new("Thesis", "THESIS", MAX_CREDITS).validated().is_ok());
        let err = NewCourse::new("Thesis", "THESIS", MAX_CREDITS + 1)
            .validated()
            .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "credits", .. }));
        let err = NewCourse::new("Thesis", "THESIS", 3_000_000_000)
            .validated()
            .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "credits", .. }));

        let err = NewCourse::new("Mathematics", "MATH 101", 3).validated().unwrap_err();
        assert!(matches!(err, Error::Validation { field: "code", .. }));

        let err = NewCourse::new("Mathematics", "", 3).validated().unwrap_err();
        assert!(matches!(err, Error::Validation { field: "code", .. }));

        let err = NewCourse::new("Mathematics", "X".repeat(17), 3).validated().unwrap_err();
        assert!(matches!(err, Error::Validation { field: "code", .. }));
    }

    #[test]
    fn test_score_range() {
        assert!(validate_score(0.0).is_ok());
        assert!(validate_score(100.0).is_ok());
        assert!(validate_score(-0.5).is_err());
        assert!(validate_score(100.5).is_err());
        assert!(validate_score(f64::NAN).is_err());
        assert!(validate_score(f64::INFINITY).is_err());
    }

    #[test]
    fn test_grade_update_validates() {
        assert!(GradeUpdate { score: 101.0 }.validated().is_err());
        assert_eq!(GradeUpdate { score: 75.0 }.validated().unwrap().score, 75.0);
    }
}
