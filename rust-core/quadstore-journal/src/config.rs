// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transaction configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable holding the writer-gate timeout in milliseconds.
pub const ENV_WRITE_LOCK_TIMEOUT_MS: &str = "QUADSTORE_WRITE_LOCK_TIMEOUT_MS";
/// Environment variable enabling autocommit writes (`true`/`false`).
pub const ENV_ALLOW_AUTOCOMMIT: &str = "QUADSTORE_ALLOW_AUTOCOMMIT";

/// Behaviour of the transactional wrapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// How long `begin(Write)` waits for the writer gate. `None` waits
    /// forever.
    pub write_lock_timeout_ms: Option<u64>,
    /// Run a mutation issued outside any transaction as its own write
    /// transaction instead of rejecting it.
    pub allow_autocommit: bool,
}

impl TransactionConfig {
    pub fn write_lock_timeout(&self) -> Option<Duration> {
        self.write_lock_timeout_ms.map(Duration::from_millis)
    }

    #[must_use]
    pub fn with_write_lock_timeout(mut self, timeout: Duration) -> Self {
        self.write_lock_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[must_use]
    pub fn with_autocommit(mut self, allow: bool) -> Self {
        self.allow_autocommit = allow;
        self
    }

    /// Defaults overridden by `QUADSTORE_WRITE_LOCK_TIMEOUT_MS` and
    /// `QUADSTORE_ALLOW_AUTOCOMMIT`. Unparseable values are logged and
    /// ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_WRITE_LOCK_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.write_lock_timeout_ms = Some(ms),
                Err(_) => warn!(value = %raw, "Invalid QUADSTORE_WRITE_LOCK_TIMEOUT_MS (expected milliseconds)"),
            }
        }

        if let Some(raw) = lookup(ENV_ALLOW_AUTOCOMMIT) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.allow_autocommit = true,
                "0" | "false" | "no" | "off" => config.allow_autocommit = false,
                _ => warn!(value = %raw, "Invalid QUADSTORE_ALLOW_AUTOCOMMIT (expected true or false)"),
            }
        }

        config
    }

    /// Parse a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
