//! Oracle configuration.

use oracle_core::ConfigurationError;
use oracle_types::Address;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// What a listener does when its live subscription drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorPolicy {
    /// End the stream with [`Termination::Failed`](oracle_types::Termination).
    #[default]
    Abort,
    /// Resubscribe, replaying the blocks missed while disconnected.
    Resubscribe,
}

/// What a listener does when a decision callback panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackErrorPolicy {
    /// Log the panic and keep processing.
    #[default]
    Continue,
    /// End the stream with [`Termination::Failed`](oracle_types::Termination).
    Abort,
}

/// Configuration for an [`Oracle`](crate::Oracle).
///
/// ```toml
/// identity = "0xb0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0"
/// transport_error_policy = "resubscribe"
/// resubscribe_delay_ms = 250
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleConfig {
    /// Address the oracle arbitrates as. Required by `require_oracle` and
    /// `require_request`.
    #[serde(deserialize_with = "deserialize_address")]
    pub identity: Address,

    /// Handling of dropped live subscriptions.
    pub transport_error_policy: TransportErrorPolicy,

    /// Pause before each resubscribe attempt.
    pub resubscribe_delay_ms: u64,

    /// Resubscribe attempts allowed per listener run.
    pub max_resubscribes: u32,

    /// Handling of panicking decision callbacks.
    pub callback_error_policy: CallbackErrorPolicy,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            identity: Address::ZERO,
            transport_error_policy: TransportErrorPolicy::Abort,
            resubscribe_delay_ms: 500,
            max_resubscribes: 5,
            callback_error_policy: CallbackErrorPolicy::Continue,
        }
    }
}

impl OracleConfig {
    /// Default configuration arbitrating as `identity`.
    pub fn new(identity: Address) -> Self {
        Self {
            identity,
            ..Self::default()
        }
    }

    pub fn with_identity(mut self, identity: Address) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_transport_error_policy(mut self, policy: TransportErrorPolicy) -> Self {
        self.transport_error_policy = policy;
        self
    }

    pub fn with_resubscribe(mut self, delay: Duration, max_attempts: u32) -> Self {
        self.resubscribe_delay_ms = delay.as_millis() as u64;
        self.max_resubscribes = max_attempts;
        self
    }

    pub fn with_callback_error_policy(mut self, policy: CallbackErrorPolicy) -> Self {
        self.callback_error_policy = policy;
        self
    }

    pub fn resubscribe_delay(&self) -> Duration {
        Duration::from_millis(self.resubscribe_delay_ms)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(s).map_err(|e| ConfigurationError::Invalid(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::Invalid(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }
}

fn deserialize_address<'de, D>(deserializer: D) -> Result<Address, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Address::from_str(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_types::ArbitrateOptions;

    #[test]
    fn test_defaults() {
        let config = OracleConfig::from_toml_str("").unwrap();
        assert_eq!(config, OracleConfig::default());
        assert_eq!(config.resubscribe_delay(), Duration::from_millis(500));
        assert_eq!(config.max_resubscribes, 5);
    }

    #[test]
    fn test_parse_full() {
        let config = OracleConfig::from_toml_str(
            r#"
            identity = "0xb0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0"
            transport_error_policy = "resubscribe"
            resubscribe_delay_ms = 250
            max_resubscribes = 2
            callback_error_policy = "abort"
            "#,
        )
        .unwrap();

        assert_eq!(config.identity, Address::repeat_byte(0xb0));
        assert_eq!(config.transport_error_policy, TransportErrorPolicy::Resubscribe);
        assert_eq!(config.resubscribe_delay(), Duration::from_millis(250));
        assert_eq!(config.max_resubscribes, 2);
        assert_eq!(config.callback_error_policy, CallbackErrorPolicy::Abort);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            OracleConfig::from_toml_str(r#"identity = "0x1234""#),
            Err(ConfigurationError::Invalid(_))
        ));
        assert!(matches!(
            OracleConfig::from_toml_str("unknown_field = 1"),
            Err(ConfigurationError::Invalid(_))
        ));
        assert!(OracleConfig::from_toml_file("/nonexistent/oracle.toml").is_err());
    }

    #[test]
    fn test_options_from_toml() {
        let options: ArbitrateOptions =
            toml::from_str("skip_arbitrated = true\nrequire_oracle = true").unwrap();
        assert!(options.skip_arbitrated);
        assert!(options.require_oracle);
        assert!(!options.require_request);
        assert!(!options.only_new);
    }
}
