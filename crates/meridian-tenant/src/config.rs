//! Layered configuration loader ( "dynamic attribute lookups
//! replaced by a single config schema").
//!
//! Precedence, lowest to highest: built-in defaults < config file (TOML) <
//! environment variables < runtime overrides applied by the caller. Unknown
//! keys in the config file are rejected at load rather than silently
//! ignored, matching the enumerated-schema design note.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown config key(s): {0:?}")]
    UnknownKeys(Vec<String>),
}

/// Retry and cache tuning, budget caps, tracing toggles: the behavior-
/// bearing knobs named in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "defaults::retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "defaults::http_timeout_s")]
    pub http_timeout_s: u64,
    #[serde(default = "defaults::dedup_cosine_threshold")]
    pub dedup_cosine_threshold: f64,
    #[serde(default = "defaults::hard_cap_usd")]
    pub hard_cap_usd: f64,
    #[serde(default = "defaults::tracing_json")]
    pub tracing_json: bool,
    /// `ENABLE_*` feature flags, looked up at call sites — never
    /// cached globally so tests can toggle them freely.
    #[serde(default)]
    pub feature_flags: HashMap<String, bool>,
}

mod defaults {
    pub fn retry_max_attempts() -> u32 {
        3
    }
    pub fn http_timeout_s() -> u64 {
        30
    }
    pub fn dedup_cosine_threshold() -> f64 {
        0.97
    }
    pub fn hard_cap_usd() -> f64 {
        f64::MAX
    }
    pub fn tracing_json() -> bool {
        false
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry_max_attempts: defaults::retry_max_attempts(),
            http_timeout_s: defaults::http_timeout_s(),
            dedup_cosine_threshold: defaults::dedup_cosine_threshold(),
            hard_cap_usd: defaults::hard_cap_usd(),
            tracing_json: defaults::tracing_json(),
            feature_flags: HashMap::new(),
        }
    }
}

impl Config {
    /// Loads defaults < file < env, in that order. `file` is optional —
    /// absence is not an error, matching "file" being one layer among several.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(path) = file {
            if path.exists() {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                })?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("RETRY_MAX_ATTEMPTS") {
            if let Ok(parsed) = v.parse() {
                self.retry_max_attempts = parsed;
            }
        }
        if let Ok(v) = std::env::var("HTTP_TIMEOUT_S") {
            if let Ok(parsed) = v.parse() {
                self.http_timeout_s = parsed;
            }
        }
        if let Ok(v) = std::env::var("DEDUP_COSINE_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                self.dedup_cosine_threshold = parsed;
            }
        }
        if let Ok(v) = std::env::var("HARD_CAP_USD") {
            if let Ok(parsed) = v.parse() {
                self.hard_cap_usd = parsed;
            }
        }
        if let Ok(v) = std::env::var("TRACING_JSON") {
            self.tracing_json = v == "1" || v.eq_ignore_ascii_case("true");
        }
        for (key, value) in std::env::vars() {
            if let Some(flag) = key.strip_prefix("ENABLE_") {
                self.feature_flags
                    .insert(flag.to_ascii_lowercase(), value == "1" || value.eq_ignore_ascii_case("true"));
            }
        }
    }

    /// Retry attempt precedence: call-site > env (already folded in by
    /// `load`) > config file > default.
    pub fn retry_max_attempts_for(&self, call_site_override: Option<u32>) -> u32 {
        call_site_override.unwrap_or(self.retry_max_attempts)
    }

    /// Feature-flag lookup at the call site: never cached globally.
    /// Unknown flags default to off.
    pub fn feature_enabled(&self, flag: &str) -> bool {
        self.feature_flags.get(flag).copied().unwrap_or(false)
    }

    pub fn with_override(mut self, flag: impl Into<String>, value: bool) -> Self {
        self.feature_flags.insert(flag.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_no_file() {
        let config = Config::load(None).expect("load");
        assert_eq!(config.retry_max_attempts, 3);
        assert_eq!(config.dedup_cosine_threshold, 0.97);
    }

    #[test]
    fn file_overrides_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("tmp file");
        writeln!(tmp, "retry_max_attempts = 7\nhttp_timeout_s = 45\ndedup_cosine_threshold = 0.9\nhard_cap_usd = 10.0\ntracing_json = true").unwrap();
        let config = Config::load(Some(tmp.path())).expect("load");
        assert_eq!(config.retry_max_attempts, 7);
        assert_eq!(config.http_timeout_s, 45);
    }

    #[test]
    fn unknown_key_rejected() {
        let mut tmp = tempfile::NamedTempFile::new().expect("tmp file");
        writeln!(tmp, "not_a_real_field = 1").unwrap();
        let err = Config::load(Some(tmp.path())).expect_err("should reject unknown key");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn feature_flag_lookup_defaults_off() {
        let config = Config::default();
        assert!(!config.feature_enabled("ingest_concurrent"));
        let config = config.with_override("ingest_concurrent", true);
        assert!(config.feature_enabled("ingest_concurrent"));
    }
}
