//! Server configuration read from environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use haver_database::db;
use haver_ingest_models::{CommitPolicy, UploadSettings};

/// Error raised for an environment variable that is set but unparsable.
#[derive(Debug, thiserror::Error)]
#[error("Invalid value {value:?} for {name}")]
pub struct ConfigError {
    /// Variable name.
    pub name: &'static str,
    /// The rejected value.
    pub value: String,
}

/// Runtime configuration of the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind (`BIND_ADDR`, default `127.0.0.1`).
    pub bind_addr: String,
    /// Port to bind (`PORT`, default `8080`).
    pub port: u16,
    /// `SQLite` database file (`DATABASE_PATH`, default `data/haver.db`).
    pub database_path: PathBuf,
    /// Upload handling (`HAVER_UPLOAD_DIR`, `HAVER_MAX_UPLOAD_BYTES`,
    /// `HAVER_RETAIN_UPLOADS`, `HAVER_COMMIT_POLICY`).
    pub uploads: UploadSettings,
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to a value that cannot
    /// be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable if it is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a value cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = UploadSettings::default();

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_var(&lookup, "PORT")?.unwrap_or(8080),
            database_path: lookup("DATABASE_PATH")
                .map_or_else(|| PathBuf::from(db::DEFAULT_DB_PATH), PathBuf::from),
            uploads: UploadSettings {
                upload_dir: lookup("HAVER_UPLOAD_DIR").map_or(defaults.upload_dir, PathBuf::from),
                max_upload_bytes: parse_var(&lookup, "HAVER_MAX_UPLOAD_BYTES")?
                    .unwrap_or(defaults.max_upload_bytes),
                retain_uploads: parse_flag(&lookup, "HAVER_RETAIN_UPLOADS")?
                    .unwrap_or(defaults.retain_uploads),
                commit_policy: parse_var::<CommitPolicy>(&lookup, "HAVER_COMMIT_POLICY")?
                    .unwrap_or(defaults.commit_policy),
            },
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError { name, value })
        })
        .transpose()
}

fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<bool>, ConfigError> {
    lookup(name)
        .map(|value| match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError { name, value }),
        })
        .transpose()
}
