// Copyright (c) Khala Indexer Team
// SPDX-License-Identifier: Apache-2.0

//! Indexer configuration.
//!
//! The full configuration surface is deliberately small: the two reserve
//! accounts the circulation computation subtracts, the router account that
//! marks programmatic outbound transfers, the SS58 prefix used when
//! re-encoding destinations, and the circulation cadence.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Khala network SS58 address prefix.
pub const KHALA_SS58_PREFIX: u16 = 30;

/// Blocks between circulating-supply computations.
pub const DEFAULT_CIRCULATION_INTERVAL: u64 = 300;

/// Mining subsidy reserve account, excluded from circulation.
const KHALA_MINING_RESERVE_ACCOUNT: &str =
    "5EYCAe5iixJKLJE7D1zaaRxUiy2bL4KUKqZBSckPw3iWSyvk";

/// Bridge reserve account, excluded from the khala-only circulation figure.
const KHALA_BRIDGE_RESERVE_ACCOUNT: &str =
    "5EYCAe5iixJKLJE5vokZcdJwS4ZpFU23Ged95YDBznC789dM";

/// Router account whose signed outbound transfers are forwarded
/// multi-hop transfers rather than user sends.
const KHALA_ROUTER_ACCOUNT: &str =
    "3zcnkmF6XjEogm8vAyPiL2ykPZHpeVtcfDcwTWJ2teqdSvjq";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexerConfig {
    #[serde(default = "default_mining_reserve")]
    pub mining_reserve_account: String,
    #[serde(default = "default_bridge_reserve")]
    pub bridge_reserve_account: String,
    #[serde(default = "default_router")]
    pub router_account: String,
    #[serde(default = "default_ss58_prefix")]
    pub ss58_prefix: u16,
    #[serde(default = "default_circulation_interval")]
    pub circulation_interval: u64,
}

fn default_mining_reserve() -> String {
    KHALA_MINING_RESERVE_ACCOUNT.to_string()
}

fn default_bridge_reserve() -> String {
    KHALA_BRIDGE_RESERVE_ACCOUNT.to_string()
}

fn default_router() -> String {
    KHALA_ROUTER_ACCOUNT.to_string()
}

fn default_ss58_prefix() -> u16 {
    KHALA_SS58_PREFIX
}

fn default_circulation_interval() -> u64 {
    DEFAULT_CIRCULATION_INTERVAL
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            mining_reserve_account: default_mining_reserve(),
            bridge_reserve_account: default_bridge_reserve(),
            router_account: default_router(),
            ss58_prefix: default_ss58_prefix(),
            circulation_interval: default_circulation_interval(),
        }
    }
}

impl IndexerConfig {
    /// Load from a YAML file with `${VAR}` environment substitution.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read indexer config file: {:?}", path))?;
        let contents = substitute_env_vars(&contents);
        let config: IndexerConfig =
            serde_yaml::from_str(&contents).context("Failed to parse indexer config YAML")?;
        Ok(config)
    }
}

/// Substitute environment variables in the format `${VAR_NAME}`. Unset
/// variables keep their placeholder.
fn substitute_env_vars(content: &str) -> String {
    let re = regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];
        if let Ok(var_value) = std::env::var(var_name) {
            result = result.replace(full_match, &var_value);
        } else {
            tracing::warn!(
                "Environment variable {} not found, keeping placeholder",
                var_name
            );
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_khala_constants() {
        let config = IndexerConfig::default();
        assert_eq!(config.ss58_prefix, 30);
        assert_eq!(config.circulation_interval, 300);
        assert!(config.mining_reserve_account.starts_with("5EYCAe"));
        assert!(config.bridge_reserve_account.starts_with("5EYCAe"));
        assert_ne!(
            config.mining_reserve_account,
            config.bridge_reserve_account
        );
    }

    #[test]
    fn parses_partial_yaml_with_defaults() {
        let yaml = "circulation-interval: 100\nrouter-account: someone\n";
        let config: IndexerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.circulation_interval, 100);
        assert_eq!(config.router_account, "someone");
        assert_eq!(config.ss58_prefix, 30);
    }

    #[test]
    fn env_substitution_keeps_unset_placeholders() {
        let out = substitute_env_vars("router-account: ${KHALA_TEST_UNSET_VAR}\n");
        assert!(out.contains("${KHALA_TEST_UNSET_VAR}"));
    }
}
