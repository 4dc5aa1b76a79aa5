//! Reconciliation settings
use crate::Result;
use serde::Deserialize;
use std::time::Duration;

/// Configuration for one reconciliation core instance.
///
/// Every field carries a default, so a partial (or empty) TOML document is a
/// valid configuration.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub poll: PollConfig,
    pub features: Features,
    /// How long the caller should wait before re-running synthesis when a
    /// load balancer is still provisioning.
    #[serde(with = "humantime_serde")]
    pub lb_stabilization_requeue: Duration,
    /// Number of ARNs per DescribeTags call.
    pub describe_tags_chunk: usize,
    /// Tag keys owned by external tooling. Never added, updated or removed.
    pub external_managed_tags: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            poll: PollConfig::default(),
            features: Features::default(),
            lb_stabilization_requeue: Duration::from_secs(30),
            describe_tags_chunk: 20,
            external_managed_tags: Vec::new(),
        }
    }
}

/// Bounded poll windows for the two transient-error retry loops.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollConfig {
    /// Listener-rule create wait for listener visibility.
    #[serde(with = "humantime_serde")]
    pub rule_create_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub rule_create_timeout: Duration,
    /// Target-group delete wait on ResourceInUse.
    #[serde(with = "humantime_serde")]
    pub tg_delete_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub tg_delete_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            rule_create_interval: Duration::from_secs(2),
            rule_create_timeout: Duration::from_secs(20),
            tg_delete_interval: Duration::from_secs(2),
            tg_delete_timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Features {
    /// Enhanced drift policy for listener mutual-TLS and ALPN: an unset
    /// desired value converges the cloud side back to off.
    pub enhanced_mtls_drift: bool,
    /// Reconcile minimum load-balancer capacity after synthesis.
    pub capacity_reservation: bool,
}

impl Default for Features {
    fn default() -> Self {
        Features {
            enhanced_mtls_drift: true,
            capacity_reservation: false,
        }
    }
}

/// Parses a reconciliation configuration document.
pub fn parse_config(buffer: &str) -> Result<Config> {
    toml::from_str(buffer)
        .map_err(|err| crate::Error::Validation(format!("could not parse configuration: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_budgets() {
        let config = Config::default();
        assert_eq!(Duration::from_secs(2), config.poll.rule_create_interval);
        assert_eq!(Duration::from_secs(20), config.poll.rule_create_timeout);
        assert_eq!(Duration::from_secs(2), config.poll.tg_delete_interval);
        assert_eq!(Duration::from_secs(20), config.poll.tg_delete_timeout);
        assert_eq!(20, config.describe_tags_chunk);
        assert!(config.features.enhanced_mtls_drift);
        assert!(!config.features.capacity_reservation);
    }

    #[test]
    fn parse_empty_document() {
        let config = parse_config("").unwrap();
        assert_eq!(Duration::from_secs(30), config.lb_stabilization_requeue);
    }

    #[test]
    fn parse_partial_document() {
        let config = parse_config(
            r#"
            lb_stabilization_requeue = "1m"
            external_managed_tags = ["team"]

            [poll]
            tg_delete_timeout = "45s"

            [features]
            capacity_reservation = true
            "#,
        )
        .unwrap();

        assert_eq!(Duration::from_secs(60), config.lb_stabilization_requeue);
        assert_eq!(vec!["team".to_string()], config.external_managed_tags);
        assert_eq!(Duration::from_secs(45), config.poll.tg_delete_timeout);
        // untouched sections keep their defaults
        assert_eq!(Duration::from_secs(2), config.poll.tg_delete_interval);
        assert!(config.features.capacity_reservation);
        assert!(config.features.enhanced_mtls_drift);
    }

    #[test]
    fn parse_rejects_malformed_document() {
        assert!(parse_config("poll = 12").is_err());
    }
}
