//! Configuration sources for a context.
//!
//! [`ConfigService`] is the flat key/value view the container reads its
//! environment name from; [`ContextConfig`] carries the container's own
//! tunables.

use crate::di::Scope;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::time::Duration;

pub const ENVIRONMENT_KEY: &str = "meshestra.environment";
pub const LOCK_TIMEOUT_KEY: &str = "meshestra.context.lock-timeout-ms";
pub const DEFAULT_SCOPE_KEY: &str = "meshestra.context.default-scope";

/// Configuration service
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    /// Snapshot of the process environment.
    pub fn new() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    /// Looks up `key`, then its upper-snake spelling
    /// (`meshestra.environment` -> `MESHESTRA_ENVIRONMENT`).
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).or_else(|| self.get(&upper_snake(key)))
    }

    pub fn len(&self) -> usize {
        self.config.len()
    }

    pub fn is_empty(&self) -> bool {
        self.config.is_empty()
    }
}

fn upper_snake(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Container tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// How long a phase or registry access waits for the container gate.
    pub lock_timeout_ms: u64,
    /// Config key holding the active environment name.
    pub environment_key: String,
    /// Scope used when a component carries no scope marker.
    pub default_scope: Scope,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 1000,
            environment_key: ENVIRONMENT_KEY.to_string(),
            default_scope: Scope::Singleton,
        }
    }
}

impl ContextConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Overlays the tunables found in `service` on the defaults.
    /// Unparsable values are ignored with a warning.
    pub fn from_service(service: &ConfigService) -> Self {
        let mut config = Self::default();
        if let Some(raw) = service.lookup(LOCK_TIMEOUT_KEY) {
            match raw.trim().parse() {
                Ok(ms) => config.lock_timeout_ms = ms,
                Err(_) => tracing::warn!("Ignoring invalid {}: '{}'", LOCK_TIMEOUT_KEY, raw),
            }
        }
        if let Some(raw) = service.lookup(DEFAULT_SCOPE_KEY) {
            match raw.trim().parse() {
                Ok(scope) => config.default_scope = scope,
                Err(_) => tracing::warn!("Ignoring invalid {}: '{}'", DEFAULT_SCOPE_KEY, raw),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_falls_back_to_upper_snake() {
        let service = ConfigService::empty().with("MESHESTRA_ENVIRONMENT", "dev");
        assert_eq!(service.lookup(ENVIRONMENT_KEY).as_deref(), Some("dev"));

        let service = service.with(ENVIRONMENT_KEY, "prod");
        assert_eq!(service.lookup(ENVIRONMENT_KEY).as_deref(), Some("prod"));
    }

    #[test]
    fn context_config_overlays_service_values() {
        let service = ConfigService::empty()
            .with("MESHESTRA_CONTEXT_LOCK_TIMEOUT_MS", "250")
            .with(DEFAULT_SCOPE_KEY, "prototype");
        let config = ContextConfig::from_service(&service);
        assert_eq!(config.lock_timeout(), Duration::from_millis(250));
        assert_eq!(config.default_scope, Scope::Prototype);
    }

    #[test]
    fn context_config_ignores_garbage() {
        let service = ConfigService::empty().with(LOCK_TIMEOUT_KEY, "soon");
        let config = ContextConfig::from_service(&service);
        assert_eq!(config.lock_timeout_ms, 1000);
        assert_eq!(config.default_scope, Scope::Singleton);
    }

    #[test]
    fn context_config_deserializes_with_defaults() {
        let config: ContextConfig = serde_json::from_str(r#"{"lock_timeout_ms": 50}"#).unwrap();
        assert_eq!(config.lock_timeout_ms, 50);
        assert_eq!(config.environment_key, ENVIRONMENT_KEY);
    }
}
