//! Application configuration loaded from the environment.
//!
//! All knobs are environment variables (a `.env` file is honored via
//! `dotenvy` in the binary). The database file defaults to the platform
//! data directory.

use std::env;
use std::fs::create_dir_all;
use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::repositories::base::RepositoryOptions;

const BUNDLE_IDENTIFIER: &str = "formulary";

/// Runtime configuration for the data backend
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,
    /// Whether repositories open realtime change feeds
    pub enable_realtime: bool,
    /// Whether repositories serve fallback data on failed reads
    pub use_fallback_data: bool,
}

impl AppConfig {
    /// Load configuration from the environment
    pub fn from_env() -> Result<Self> {
        let database_path = match env::var("FORMULARY_DB") {
            Ok(path) => PathBuf::from(path),
            Err(_) => default_database_path()?,
        };

        Ok(Self {
            database_path,
            enable_realtime: env_flag("FORMULARY_REALTIME", false)?,
            use_fallback_data: env_flag("FORMULARY_FALLBACK_DATA", true)?,
        })
    }

    /// Connection string for the configured database file
    pub fn database_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.database_path.display())
    }

    /// Repository options derived from this configuration
    pub fn repository_options(&self) -> RepositoryOptions {
        RepositoryOptions {
            enable_realtime: self.enable_realtime,
            use_fallback_data: self.use_fallback_data,
        }
    }
}

/// Database location under the platform data directory.
/// Falls back to the current directory if the data directory cannot be determined.
fn default_database_path() -> Result<PathBuf> {
    let mut path = match dirs::data_dir() {
        Some(dir) => dir,
        None => env::current_dir()?,
    };
    path.push(BUNDLE_IDENTIFIER);
    create_dir_all(&path)?;
    path.push("formulary.db");
    Ok(path)
}

fn env_flag(name: &str, default: bool) -> Result<bool> {
    match env::var(name) {
        Ok(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(AppError::configuration(format!(
                "{name} must be a boolean, got {other:?}"
            ))),
        },
        Err(_) => Ok(default),
    }
}
