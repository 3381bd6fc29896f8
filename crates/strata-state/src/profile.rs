//! Connection profiles loaded from the YAML configuration file.
//!
//! ```yaml
//! default:
//!   dialect: sqlite
//!   database: ./dev.db
//! prod:
//!   dialect: postgresql
//!   host: db.internal
//!   port: 5432
//!   username: deploy
//!   password: "s3cret"
//!   database: app
//!   connection_warning: true
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::target::StateResult;

/// Name of the environment used when none is requested
pub const DEFAULT_ENVIRONMENT: &str = "default";

/// Connection parameters for one named environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    /// Environment name (the key in the configuration file)
    #[serde(skip)]
    pub name: String,
    pub dialect: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    /// Surface an advisory notice before connecting
    #[serde(default)]
    pub connection_warning: bool,
}

impl ConnectionProfile {
    /// A SQLite profile pointing at `database` (a path or `:memory:`).
    pub fn sqlite(name: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dialect: "sqlite".to_string(),
            host: None,
            port: None,
            username: None,
            password: None,
            database: Some(database.into()),
            connection_warning: false,
        }
    }

    pub fn is_sqlite(&self) -> bool {
        self.dialect.eq_ignore_ascii_case("sqlite")
    }

    /// Connection URL with the password masked, safe to log.
    pub fn display_url(&self) -> String {
        let database = self.database.as_deref().unwrap_or_default();
        if self.is_sqlite() {
            return format!("{}:///{}", self.dialect, database);
        }
        let user = self.username.as_deref().unwrap_or_default();
        let auth = if self.password.is_some() {
            format!("{user}:****@")
        } else if user.is_empty() {
            String::new()
        } else {
            format!("{user}@")
        };
        let host = self.host.as_deref().unwrap_or("localhost");
        let port = self.port.map(|p| format!(":{p}")).unwrap_or_default();
        format!("{}://{auth}{host}{port}/{database}", self.dialect)
    }

    /// Text of the advisory notice shown when `connection_warning` is set.
    pub fn warning_notice(&self) -> Option<String> {
        if !self.connection_warning {
            return None;
        }
        let target = match (&self.host, self.port) {
            (Some(host), Some(port)) => format!(" at {host}:{port}"),
            (Some(host), None) => format!(" at {host}"),
            _ => String::new(),
        };
        Some(format!(
            "WARNING: connecting to database {}{} (environment '{}')",
            self.database.as_deref().unwrap_or("<unnamed>"),
            target,
            self.name
        ))
    }
}

impl fmt::Display for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.display_url())
    }
}

/// All environments defined in a configuration file.
#[derive(Debug, Clone, Default)]
pub struct ProfileSet {
    profiles: BTreeMap<String, ConnectionProfile>,
}

impl ProfileSet {
    pub fn from_yaml_str(yaml: &str) -> StateResult<Self> {
        let raw: BTreeMap<String, ConnectionProfile> = serde_yaml::from_str(yaml)?;
        let profiles = raw
            .into_iter()
            .map(|(name, mut profile)| {
                profile.name = name.clone();
                (name, profile)
            })
            .collect();
        Ok(Self { profiles })
    }

    pub fn load(path: &Path) -> StateResult<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            StateError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Look up an environment by name.
    pub fn get(&self, name: &str) -> StateResult<&ConnectionProfile> {
        self.profiles
            .get(name)
            .ok_or_else(|| StateError::EnvironmentNotFound(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}
