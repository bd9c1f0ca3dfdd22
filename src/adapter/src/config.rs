// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Adapter configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::queue::{BLOCKING_QUEUE_CAPACITY, DEFAULT_OFFER_TIMEOUT};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Configures statement admission and result delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Whether statements are checked against topic ACLs at all.
    #[serde(rename = "authorization.enabled")]
    pub authorization_enabled: bool,
    /// How long an authorization decision is reused after it is made.
    #[serde(rename = "authorization.cache.expiry.time.secs")]
    pub auth_cache_expiry_secs: u64,
    #[serde(rename = "authorization.cache.max.entries")]
    pub auth_cache_max_entries: u64,
    #[serde(rename = "query.queue.capacity")]
    pub queue_capacity: usize,
    /// How long a producer waits for space before rechecking whether the
    /// result queue was closed.
    #[serde(rename = "query.queue.offer.timeout.ms")]
    pub queue_offer_timeout_ms: u64,
}

impl Default for AdapterConfig {
    fn default() -> AdapterConfig {
        AdapterConfig {
            authorization_enabled: true,
            auth_cache_expiry_secs: 30,
            auth_cache_max_entries: 10_000,
            queue_capacity: BLOCKING_QUEUE_CAPACITY,
            queue_offer_timeout_ms: u64::try_from(DEFAULT_OFFER_TIMEOUT.as_millis())
                .unwrap_or(u64::MAX),
        }
    }
}

impl AdapterConfig {
    /// Loads configuration from a JSON object. Absent keys take their
    /// defaults and unknown keys are ignored.
    pub fn from_json(json: &str) -> Result<AdapterConfig, ConfigError> {
        let config: AdapterConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from string-valued properties, as found in a
    /// server properties file.
    pub fn from_properties(props: &BTreeMap<String, String>) -> Result<AdapterConfig, ConfigError> {
        let object = props
            .iter()
            .map(|(k, v)| {
                let value = if let Ok(n) = v.trim().parse::<u64>() {
                    Value::from(n)
                } else if let Ok(b) = v.trim().parse::<bool>() {
                    Value::from(b)
                } else {
                    Value::from(v.as_str())
                };
                (k.clone(), value)
            })
            .collect();
        let config: AdapterConfig = serde_json::from_value(Value::Object(object))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "query.queue.capacity",
                reason: "must be at least 1".into(),
            });
        }
        if self.queue_offer_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "query.queue.offer.timeout.ms",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn auth_cache_expiry(&self) -> Duration {
        Duration::from_secs(self.auth_cache_expiry_secs)
    }

    pub fn queue_offer_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_offer_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use maplit::btreemap;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = AdapterConfig::from_json("{}").unwrap();
        assert_eq!(config, AdapterConfig::default());
        assert_eq!(config.auth_cache_expiry(), Duration::from_secs(30));
        assert_eq!(config.auth_cache_max_entries, 10_000);
        assert_eq!(config.queue_capacity, 500);
        assert_eq!(config.queue_offer_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_from_properties() {
        let props = btreemap! {
            "authorization.enabled".to_string() => "false".to_string(),
            "authorization.cache.expiry.time.secs".to_string() => "5".to_string(),
            "query.queue.capacity".to_string() => " 16 ".to_string(),
            "listeners".to_string() => "http://0.0.0.0:8088".to_string(),
        };
        let config = AdapterConfig::from_properties(&props).unwrap();
        assert!(!config.authorization_enabled);
        assert_eq!(config.auth_cache_expiry_secs, 5);
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.auth_cache_max_entries, 10_000);
    }

    #[test]
    fn test_invalid() {
        let props = btreemap! {
            "authorization.cache.max.entries".to_string() => "lots".to_string(),
        };
        assert!(matches!(
            AdapterConfig::from_properties(&props),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            AdapterConfig::from_json(r#"{"query.queue.capacity": 0}"#),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
