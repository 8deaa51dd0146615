//! Purpose: Tunables for the poller, loadable from JSON.
//! Exports: `WatchSettings`, `DEFAULT_INTERVAL_MS`, `DEFAULT_ATTEMPTS`.
//! Role: One value type shared by the engine, settings files, and CLI overrides.
//! Invariants: Missing fields fall back to the defaults; unknown fields are rejected.
//! Invariants: The interval is read when a timer is armed, the attempt budget when a request registers.
use crate::core::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_INTERVAL_MS: u64 = 50;
pub const DEFAULT_ATTEMPTS: u32 = 1000;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchSettings {
    pub interval_ms: u64,
    pub default_attempts: u32,
}

impl WatchSettings {
    pub fn new() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            default_attempts: DEFAULT_ATTEMPTS,
        }
    }

    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn with_default_attempts(mut self, attempts: u32) -> Self {
        self.default_attempts = attempts;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn from_json_str(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Parse)
                .with_message(format!("invalid settings: {err}"))
                .with_hint("Expected an object like {\"interval_ms\": 50, \"default_attempts\": 1000}.")
                .with_source(err)
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            let kind = if err.kind() == std::io::ErrorKind::NotFound {
                ErrorKind::NotFound
            } else {
                ErrorKind::Io
            };
            Error::new(kind)
                .with_message("failed to read settings file")
                .with_path(path)
                .with_source(err)
        })?;
        Self::from_json_str(&text).map_err(|err| err.with_path(path))
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self::new()
    }
}
