use crate::core::{Result, TableError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Insert attempts available to ordinal-suffixed keys (`000`..`999`).
pub const DEFAULT_INSERT_MAX_ATTEMPTS: u32 = 1000;
pub const DEFAULT_BATCH_MAX_RETRIES: u32 = 1000;
pub const DEFAULT_MODIFY_OR_CREATE_ATTEMPTS: u32 = 15;

/// Attempt ceilings for the retrying protocols.
///
/// There is no backoff: every retry is issued immediately. Delays between
/// attempts belong to the store client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Ceiling for single-row inserts with a regenerated row key.
    pub insert_max_attempts: u32,
    /// Retries after the first batch submission.
    pub batch_max_retries: u32,
    /// Total attempts of the legacy modify-or-create loop.
    pub modify_or_create_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            insert_max_attempts: DEFAULT_INSERT_MAX_ATTEMPTS,
            batch_max_retries: DEFAULT_BATCH_MAX_RETRIES,
            modify_or_create_attempts: DEFAULT_MODIFY_OR_CREATE_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// Parses a policy from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let policy: Self = serde_json::from_str(json)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn insert_max_attempts(mut self, attempts: u32) -> Self {
        self.insert_max_attempts = attempts;
        self
    }

    pub fn batch_max_retries(mut self, retries: u32) -> Self {
        self.batch_max_retries = retries;
        self
    }

    pub fn modify_or_create_attempts(mut self, attempts: u32) -> Self {
        self.modify_or_create_attempts = attempts;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.insert_max_attempts == 0 {
            return Err(TableError::Config(
                "insert_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.modify_or_create_attempts == 0 {
            return Err(TableError::Config(
                "modify_or_create_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// `Key=Value;Key=Value` storage connection string.
///
/// Keys are matched case-insensitively; segments without `=` are skipped.
/// Only the first `=` splits a segment, so base64 values keep their padding.
/// A key given more than once keeps its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSettings {
    values: HashMap<String, String>,
}

impl ConnectionSettings {
    pub fn parse(connection_string: &str) -> Self {
        let values = connection_string
            .split(';')
            .filter_map(|segment| segment.split_once('='))
            .map(|(key, value)| (key.trim().to_lowercase(), value.to_string()))
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_lowercase()).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            TableError::Config(format!("connection string is missing '{}'", key))
        })
    }

    pub fn account_name(&self) -> Option<&str> {
        self.get("AccountName")
    }

    pub fn account_key(&self) -> Option<&str> {
        self.get("AccountKey")
    }

    pub fn default_endpoints_protocol(&self) -> Option<&str> {
        self.get("DefaultEndpointsProtocol")
    }

    pub fn endpoint_suffix(&self) -> Option<&str> {
        self.get("EndpointSuffix")
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.insert_max_attempts, 1000);
        assert_eq!(policy.batch_max_retries, 1000);
        assert_eq!(policy.modify_or_create_attempts, 15);
    }

    #[test]
    fn test_policy_from_partial_json() {
        let policy = RetryPolicy::from_json(r#"{ "batch_max_retries": 3 }"#).unwrap();
        assert_eq!(policy.batch_max_retries, 3);
        assert_eq!(policy.insert_max_attempts, DEFAULT_INSERT_MAX_ATTEMPTS);
    }

    #[test]
    fn test_policy_rejects_zero_ceiling() {
        let err = RetryPolicy::from_json(r#"{ "insert_max_attempts": 0 }"#).unwrap_err();
        assert!(matches!(err, TableError::Config(_)));
        assert!(RetryPolicy::from_json("not json").is_err());
    }

    #[test]
    fn test_builder() {
        let policy = RetryPolicy::default()
            .insert_max_attempts(5)
            .batch_max_retries(2)
            .modify_or_create_attempts(3);
        assert_eq!(policy.insert_max_attempts, 5);
        assert_eq!(policy.batch_max_retries, 2);
        assert_eq!(policy.modify_or_create_attempts, 3);
    }

    #[test]
    fn test_parse_connection_string() {
        let settings = ConnectionSettings::parse(
            "DefaultEndpointsProtocol=https;AccountName=devstore;AccountKey=abc==;EndpointSuffix=core.windows.net;junk",
        );
        assert_eq!(settings.default_endpoints_protocol(), Some("https"));
        assert_eq!(settings.account_name(), Some("devstore"));
        assert_eq!(settings.account_key(), Some("abc=="));
        assert_eq!(settings.get("endpointsuffix"), Some("core.windows.net"));
        assert!(settings.require("TableEndpoint").is_err());
    }

    #[test]
    fn test_repeated_key_keeps_last_value() {
        let settings = ConnectionSettings::parse("AccountName=first;accountname=second");
        assert_eq!(settings.account_name(), Some("second"));
    }

    #[test]
    fn test_parse_empty_connection_string() {
        assert!(ConnectionSettings::parse("").is_empty());
    }
}
