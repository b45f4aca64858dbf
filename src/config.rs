//! Engine configuration.
//!
//! Defaults match the platform rules; each value can be overridden through
//! an environment variable. Unparseable overrides are ignored with a warning.

use crate::types::{PlayerId, Uc};
use crate::wallet::DEFAULT_SUSPENSION_THRESHOLD;
use log::warn;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Batches with at most this many teams are ingested synchronously.
pub const DEFAULT_SYNC_TEAM_THRESHOLD: usize = 8;

/// How long a match may stay `Processing` before it is forced back to `Ready`.
pub const DEFAULT_SAFETY_TIMEOUT: Duration = Duration::from_secs(60);

/// House accounts that receive tax byproducts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HouseAccounts {
    /// Receives the 60% share of repeat-winner tax.
    pub fund: PlayerId,

    /// Receives the 40% share of repeat-winner tax.
    pub org: PlayerId,

    /// Receives the solo-tax bonus pool and loser-support rounding.
    pub bonus_pool: PlayerId,
}

impl Default for HouseAccounts {
    fn default() -> Self {
        HouseAccounts {
            fund: 900_001,
            org: 900_002,
            bonus_pool: 900_003,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub sync_team_threshold: usize,
    pub safety_timeout: Duration,
    pub suspension_threshold: Uc,
    pub accounts: HouseAccounts,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sync_team_threshold: DEFAULT_SYNC_TEAM_THRESHOLD,
            safety_timeout: DEFAULT_SAFETY_TIMEOUT,
            suspension_threshold: DEFAULT_SUSPENSION_THRESHOLD,
            accounts: HouseAccounts::default(),
        }
    }
}

impl EngineConfig {
    /// Builds a config from defaults plus `SETTLEMENT_*` environment overrides.
    pub fn from_env() -> Self {
        let defaults = EngineConfig::default();
        EngineConfig {
            sync_team_threshold: env_or("SETTLEMENT_SYNC_THRESHOLD", defaults.sync_team_threshold),
            safety_timeout: Duration::from_secs(env_or(
                "SETTLEMENT_SAFETY_TIMEOUT_SECS",
                defaults.safety_timeout.as_secs(),
            )),
            suspension_threshold: env_or(
                "SETTLEMENT_SUSPENSION_THRESHOLD",
                defaults.suspension_threshold,
            ),
            accounts: HouseAccounts {
                fund: env_or("SETTLEMENT_FUND_ACCOUNT", defaults.accounts.fund),
                org: env_or("SETTLEMENT_ORG_ACCOUNT", defaults.accounts.org),
                bonus_pool: env_or(
                    "SETTLEMENT_BONUS_POOL_ACCOUNT",
                    defaults.accounts.bonus_pool,
                ),
            },
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => parse_or(key, &raw, default),
        Err(_) => default,
    }
}

fn parse_or<T: FromStr>(key: &str, raw: &str, default: T) -> T {
    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }
    }
}
