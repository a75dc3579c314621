//! Command-line interface argument parsing for gradebook.
//!
//! - `gradebook` or `gradebook show`: interactive dashboard
//! - `gradebook setup --seed`: create the schema and load sample data
//! - `gradebook summary --json`: overall statistics
//! - `gradebook gpa 3` / `gradebook course-stats MATH101`: single reports
//! - `gradebook history 3 MATH101`: every grade recorded for one pairing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::DbConfig;
use crate::data::DeletePolicy;
use crate::error::Result;

/// Environment variable overriding the data directory
pub const DIR_ENV: &str = "GRADEBOOK_DIR";

/// A terminal gradebook for students, courses and grades.
///
/// Connection settings come from DB_NAME, DB_USER, DB_PASSWORD, DB_HOST and DB_PORT.
#[derive(Parser, Debug)]
#[command(name = "gradebook")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding the database file
    /// Defaults to $GRADEBOOK_DIR, then the platform data directory
    #[arg(long, global = true)]
    pub db_dir: Option<PathBuf>,

    /// What deleting a student or course does to their grades
    #[arg(long, value_enum, global = true, default_value_t = DeletePolicy::Cascade)]
    pub on_delete: DeletePolicy,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Launch the interactive dashboard (default)
    Show,

    /// Create the database schema if it is missing
    Setup {
        /// Load the sample dataset when the database is empty
        #[arg(long)]
        seed: bool,

        /// Drop all tables and data first
        #[arg(long)]
        reset: bool,
    },

    /// Print student, course and grade totals
    Summary {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Print a student's GPA
    Gpa {
        /// Student ID
        student_id: i64,

        #[arg(long)]
        json: bool,
    },

    /// Print statistics for a course
    CourseStats {
        /// Course ID or code
        course: String,

        #[arg(long)]
        json: bool,
    },

    /// Print the grade history of a student in a course
    History {
        /// Student ID
        student_id: i64,

        /// Course ID or code
        course: String,

        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Show)
    }
}

/// Configuration derived from CLI arguments and the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db: DbConfig,
    pub data_dir: PathBuf,
    pub delete_policy: DeletePolicy,
}

impl AppConfig {
    /// Resolve settings from the process environment
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        Self::resolve(cli.db_dir.clone(), cli.on_delete, |key| std::env::var(key).ok())
    }

    pub fn resolve<F>(db_dir: Option<PathBuf>, delete_policy: DeletePolicy, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db = DbConfig::from_lookup(&lookup)?;

        let data_dir = db_dir.unwrap_or_else(|| {
            if let Some(dir) = lookup(DIR_ENV).filter(|d| !d.trim().is_empty()) {
                PathBuf::from(dir)
            } else {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("gradebook")
            }
        });

        Ok(AppConfig {
            db,
            data_dir,
            delete_policy,
        })
    }

    /// Where the interactive dashboard writes its log
    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("gradebook.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_default_command_is_show() {
        let cli = Cli::try_parse_from(["gradebook"]).unwrap();
        assert_eq!(cli.command(), Commands::Show);
        assert_eq!(cli.on_delete, DeletePolicy::Cascade);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_parse_setup_and_policy() {
        let cli =
            Cli::try_parse_from(["gradebook", "setup", "--seed", "--on-delete", "restrict"]).unwrap();
        assert_eq!(
            cli.command(),
            Commands::Setup {
                seed: true,
                reset: false
            }
        );
        assert_eq!(cli.on_delete, DeletePolicy::Restrict);
    }

    #[test]
    fn test_parse_reports() {
        let cli = Cli::try_parse_from(["gradebook", "gpa", "7", "--json"]).unwrap();
        assert_eq!(
            cli.command(),
            Commands::Gpa {
                student_id: 7,
                json: true
            }
        );
        let cli = Cli::try_parse_from(["gradebook", "-v", "course-stats", "MATH101"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(
            cli.command(),
            Commands::CourseStats {
                course: "MATH101".to_string(),
                json: false
            }
        );
        let cli = Cli::try_parse_from(["gradebook", "history", "3", "2", "--json"]).unwrap();
        assert_eq!(
            cli.command(),
            Commands::History {
                student_id: 3,
                course: "2".to_string(),
                json: true
            }
        );
    }

    #[test]
    fn test_dir_precedence() {
        let lookup = env(&[
            ("DB_NAME", "grades"),
            ("DB_USER", "admin"),
            ("GRADEBOOK_DIR", "/srv/gradebook"),
        ]);
        let from_env = AppConfig::resolve(None, DeletePolicy::Cascade, &lookup).unwrap();
        assert_eq!(from_env.data_dir, PathBuf::from("/srv/gradebook"));
        assert_eq!(from_env.log_file(), PathBuf::from("/srv/gradebook/gradebook.log"));

        let from_flag =
            AppConfig::resolve(Some(PathBuf::from("/tmp/gb")), DeletePolicy::Restrict, &lookup)
                .unwrap();
        assert_eq!(from_flag.data_dir, PathBuf::from("/tmp/gb"));
        assert_eq!(from_flag.delete_policy, DeletePolicy::Restrict);
    }

    #[test]
    fn test_missing_settings_fail() {
        let err = AppConfig::resolve(None, DeletePolicy::Cascade, env(&[("DB_NAME", "grades")]))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { key: "DB_USER", .. }));
    }
}
