//! Database connection settings resolved from the environment.
//!
//! Recognized keys: `DB_NAME`, `DB_USER` (required), `DB_PASSWORD`, `DB_HOST`,
//! `DB_PORT` (optional). Storage is an embedded SQLite file, so the host must be
//! local and the database name selects the file inside the data directory.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DB_NAME: &str = "DB_NAME";
pub const DB_USER: &str = "DB_USER";
pub const DB_PASSWORD: &str = "DB_PASSWORD";
pub const DB_HOST: &str = "DB_HOST";
pub const DB_PORT: &str = "DB_PORT";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;
const LOCAL_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

/// Database name that selects an in-memory database
pub const IN_MEMORY: &str = ":memory:";

/// Connection parameters for the gradebook database
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub name: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

// Password stays out of logs and panic messages
impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl DbConfig {
    /// Read the settings through an arbitrary key lookup.
    ///
    /// Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &'static str| {
            get(key).ok_or(Error::Configuration {
                key,
                reason: "required setting is missing".to_string(),
            })
        };

        let name = required(DB_NAME)?;
        if name != IN_MEMORY && name.contains(['/', '\\']) {
            return Err(Error::Configuration {
                key: DB_NAME,
                reason: format!("'{name}' must be a plain name, not a path"),
            });
        }
        let user = required(DB_USER)?;
        // Passwords keep their surrounding whitespace
        let password = lookup(DB_PASSWORD).unwrap_or_default();

        let host = get(DB_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string());
        if !LOCAL_HOSTS.contains(&host.as_str()) {
            return Err(Error::Configuration {
                key: DB_HOST,
                reason: format!("'{host}' is not local; the embedded database only supports local hosts"),
            });
        }

        let port = match get(DB_PORT) {
            Some(raw) => raw.parse::<u16>().ok().filter(|p| *p > 0).ok_or(
                Error::Configuration {
                    key: DB_PORT,
                    reason: format!("'{raw}' is not a valid port number"),
                },
            )?,
            None => DEFAULT_PORT,
        };

        Ok(DbConfig {
            name,
            user,
            password,
            host,
            port,
        })
    }

    pub fn is_in_memory(&self) -> bool {
        self.name == IN_MEMORY
    }

    /// Path of the database file inside `dir`
    pub fn database_file(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.db", self.name))
    }

    /// Short label for status lines, e.g. `alice@grades`
    pub fn label(&self) -> String {
        format!("{}@{}", self.user, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_for_optional_keys() {
        let config =
            DbConfig::from_lookup(lookup_from(&[("DB_NAME", "grades"), ("DB_USER", "admin")]))
                .unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.password, "");
        assert_eq!(config.label(), "admin@grades");
    }

    #[test]
    fn test_missing_name_names_the_key() {
        let err = DbConfig::from_lookup(lookup_from(&[("DB_USER", "admin")])).unwrap_err();
        assert!(matches!(err, Error::Configuration { key: "DB_NAME", .. }));
        assert!(err.to_string().contains("DB_NAME"));
    }

    #[test]
    fn test_blank_user_counts_as_missing() {
        let err = DbConfig::from_lookup(lookup_from(&[("DB_NAME", "grades"), ("DB_USER", "  ")]))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { key: "DB_USER", .. }));
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = DbConfig::from_lookup(lookup_from(&[
            ("DB_NAME", "grades"),
            ("DB_USER", "admin"),
            ("DB_PORT", "99999"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Configuration { key: "DB_PORT", .. }));
    }

    #[test]
    fn test_remote_host_is_rejected() {
        let err = DbConfig::from_lookup(lookup_from(&[
            ("DB_NAME", "grades"),
            ("DB_USER", "admin"),
            ("DB_HOST", "db.example.com"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Configuration { key: "DB_HOST", .. }));
    }

    #[test]
    fn test_name_must_not_be_a_path() {
        let err = DbConfig::from_lookup(lookup_from(&[
            ("DB_NAME", "../etc/grades"),
            ("DB_USER", "admin"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Configuration { key: "DB_NAME", .. }));
    }

    #[test]
    fn test_database_file_and_memory() {
        let config =
            DbConfig::from_lookup(lookup_from(&[("DB_NAME", "grades"), ("DB_USER", "admin")]))
                .unwrap();
        assert_eq!(
            config.database_file(Path::new("/tmp/gb")),
            PathBuf::from("/tmp/gb/grades.db")
        );
        assert!(!config.is_in_memory());

        let memory =
            DbConfig::from_lookup(lookup_from(&[("DB_NAME", ":memory:"), ("DB_USER", "admin")]))
                .unwrap();
        assert!(memory.is_in_memory());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = DbConfig::from_lookup(lookup_from(&[
            ("DB_NAME", "grades"),
            ("DB_USER", "admin"),
            ("DB_PASSWORD", "hunter2"),
        ]))
        .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
