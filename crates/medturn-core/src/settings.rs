//! Runtime settings.
//!
//! Defaults are compiled in; a JSON file may override any subset of fields,
//! and `MEDTURN_*` environment variables override both.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::queue::WaitThresholds;

/// Settings errors.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "medturn_core=info,medturn_llm=info";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// The single account allowed into the admin panel
    pub admin_email: String,
    pub window_threshold_minutes: u32,
    pub doctor_threshold_minutes: u32,
    pub monitor_tick_secs: u64,
    /// Patient lookup endpoint; lookups are disabled when unset
    pub lookup_url: Option<String>,
    pub lookup_timeout_secs: u64,
    pub generator_url: String,
    pub generator_model: String,
    pub generator_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            admin_email: "admin@hospital.com".to_string(),
            window_threshold_minutes: 15,
            doctor_threshold_minutes: 30,
            monitor_tick_secs: 30,
            lookup_url: None,
            lookup_timeout_secs: 10,
            generator_url: "http://localhost:11434".to_string(),
            generator_model: "llama3.1".to_string(),
            generator_timeout_secs: 120,
        }
    }
}

impl Settings {
    /// Load from an optional JSON file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> SettingsResult<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> SettingsResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Apply `MEDTURN_*` overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> SettingsResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MEDTURN_ADMIN_EMAIL") {
            self.admin_email = v;
        }
        if let Some(v) = lookup("MEDTURN_WINDOW_THRESHOLD_MINUTES") {
            self.window_threshold_minutes = parse("MEDTURN_WINDOW_THRESHOLD_MINUTES", v)?;
        }
        if let Some(v) = lookup("MEDTURN_DOCTOR_THRESHOLD_MINUTES") {
            self.doctor_threshold_minutes = parse("MEDTURN_DOCTOR_THRESHOLD_MINUTES", v)?;
        }
        if let Some(v) = lookup("MEDTURN_MONITOR_TICK_SECS") {
            self.monitor_tick_secs = parse("MEDTURN_MONITOR_TICK_SECS", v)?;
        }
        if let Some(v) = lookup("MEDTURN_LOOKUP_URL") {
            let v = v.trim().to_string();
            self.lookup_url = (!v.is_empty()).then_some(v);
        }
        if let Some(v) = lookup("MEDTURN_LOOKUP_TIMEOUT_SECS") {
            self.lookup_timeout_secs = parse("MEDTURN_LOOKUP_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = lookup("MEDTURN_GENERATOR_URL") {
            self.generator_url = v;
        }
        if let Some(v) = lookup("MEDTURN_GENERATOR_MODEL") {
            self.generator_model = v;
        }
        if let Some(v) = lookup("MEDTURN_GENERATOR_TIMEOUT_SECS") {
            self.generator_timeout_secs = parse("MEDTURN_GENERATOR_TIMEOUT_SECS", v)?;
        }
        Ok(())
    }

    pub fn thresholds(&self) -> WaitThresholds {
        WaitThresholds {
            window: chrono::Duration::minutes(i64::from(self.window_threshold_minutes)),
            doctor: chrono::Duration::minutes(i64::from(self.doctor_threshold_minutes)),
        }
    }

    pub fn monitor_tick(&self) -> Duration {
        Duration::from_secs(self.monitor_tick_secs.max(1))
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> SettingsResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SettingsError::InvalidValue { key, value })
}
