//! Environment-driven configuration.
//!
//! Every setting is optional. Values are read through a lookup function so
//! tests can supply a map instead of mutating the process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::query::{default_cases, QueryCase};

pub const DEFAULT_URL: &str = "http://localhost:8080/startTest";
pub const DEFAULT_TIME_ZONE: &str = "Asia/Taipei";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

const DEFAULT_PROJECT: &str = "williamlab";
const DEFAULT_INSTANCE: &str = "go-spanner-test-instance";
const DEFAULT_DATABASE: &str = "go-spanner-db";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("unknown time zone {0:?}")]
    TimeZone(String),

    #[error("cannot read query cases from {path}: {source}")]
    CasesIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse query cases in {path}: {source}")]
    CasesParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("query case table is empty")]
    EmptyCases,
}

/// Environment lookup; blank values count as unset.
pub trait Lookup: Fn(&str) -> Option<String> {}
impl<F: Fn(&str) -> Option<String>> Lookup for F {}

pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn var(lookup: &impl Lookup, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr>(lookup: &impl Lookup, name: &'static str, default: T) -> Result<T, ConfigError> {
    match var(lookup, name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var: name, value: raw }),
        None => Ok(default),
    }
}

fn time_zone(lookup: &impl Lookup) -> Result<Tz, ConfigError> {
    let name = var(lookup, "TIME_ZONE").unwrap_or_else(|| DEFAULT_TIME_ZONE.to_owned());
    name.parse().map_err(|_| ConfigError::TimeZone(name))
}

// ─── Client ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    /// Requests launched per tick.
    pub concurrency: usize,
    pub interval: Duration,
    /// `None` leaves in-flight requests unbounded.
    pub max_in_flight: Option<usize>,
    pub print_body: bool,
    pub time_zone: Tz,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Lookup) -> Result<Self, ConfigError> {
        let concurrency = parsed(&lookup, "CONCURRENT", 6usize)?;
        if concurrency == 0 {
            return Err(ConfigError::Invalid {
                var: "CONCURRENT",
                value: "0".into(),
            });
        }

        let interval_ms = parsed(&lookup, "INTERVAL_MS", 1000u64)?;
        if interval_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "INTERVAL_MS",
                value: "0".into(),
            });
        }

        let max_in_flight = match var(&lookup, "MAX_IN_FLIGHT") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "MAX_IN_FLIGHT",
                        value: raw,
                    })
                }
            },
            None => None,
        };

        Ok(Self {
            url: var(&lookup, "URL").unwrap_or_else(|| DEFAULT_URL.to_owned()),
            concurrency,
            interval: Duration::from_millis(interval_ms),
            max_in_flight,
            print_body: parsed(&lookup, "PRINT_BODY", true)?,
            time_zone: time_zone(&lookup)?,
        })
    }
}

// ─── Store ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub redis_url: String,
    pub project: String,
    pub instance: String,
    pub database: String,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    /// The project/instance/database triple falls back as a whole when
    /// `PROJECT` is unset.
    pub fn from_lookup(lookup: impl Lookup) -> Self {
        let redis_url = var(&lookup, "REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_owned());
        match var(&lookup, "PROJECT") {
            Some(project) => Self {
                redis_url,
                project,
                instance: var(&lookup, "INSTANCE").unwrap_or_default(),
                database: var(&lookup, "DATABASE").unwrap_or_default(),
            },
            None => Self {
                redis_url,
                project: DEFAULT_PROJECT.to_owned(),
                instance: DEFAULT_INSTANCE.to_owned(),
                database: DEFAULT_DATABASE.to_owned(),
            },
        }
    }

    /// Fully qualified database name, used as the key namespace.
    pub fn database_name(&self) -> String {
        format!(
            "projects/{}/instances/{}/databases/{}",
            self.project, self.instance, self.database
        )
    }
}

// ─── Server ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub store: StoreConfig,
    pub time_zone: Tz,
    pub query_cases: Vec<QueryCase>,
    /// Include `row_scanned` in timing records.
    pub log_row_scanned: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Lookup) -> Result<Self, ConfigError> {
        let query_cases = match var(&lookup, "QUERY_CASES_FILE") {
            Some(path) => load_cases(PathBuf::from(path))?,
            None => default_cases(),
        };

        Ok(Self {
            bind_addr: var(&lookup, "BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned()),
            time_zone: time_zone(&lookup)?,
            log_row_scanned: parsed(&lookup, "LOG_ROW_SCANNED", true)?,
            store: StoreConfig::from_lookup(&lookup),
            query_cases,
        })
    }
}

/// Reads a JSON array of query cases.
pub fn load_cases(path: PathBuf) -> Result<Vec<QueryCase>, ConfigError> {
    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::CasesIo {
        path: path.clone(),
        source,
    })?;
    let cases: Vec<QueryCase> =
        serde_json::from_str(&raw).map_err(|source| ConfigError::CasesParse { path, source })?;
    if cases.is_empty() {
        return Err(ConfigError::EmptyCases);
    }
    Ok(cases)
}
