//! Environment configuration
//!
//! Everything is read from environment variables; the binary loads an
//! optional `.env` first.

use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::services::locks::DEFAULT_LOCK_TTL_SECS;
use crate::services::player_sync::TokenRange;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_SIMULATOR_BASE_URL: &str = "SIMULATOR_BASE_URL";
pub const ENV_SIMULATOR_API_KEY: &str = "SIMULATOR_API_KEY";
pub const ENV_SIMULATOR_TIMEOUT_SECS: &str = "SIMULATOR_TIMEOUT_SECS";
pub const ENV_SIMULATION_POLL_INTERVAL_SECS: &str = "SIMULATION_POLL_INTERVAL_SECS";
pub const ENV_PLAYER_SYNC_INTERVAL_SECS: &str = "PLAYER_SYNC_INTERVAL_SECS";
pub const ENV_PLAYER_SYNC_MIN_TOKEN: &str = "PLAYER_SYNC_MIN_TOKEN";
pub const ENV_PLAYER_SYNC_MAX_TOKEN: &str = "PLAYER_SYNC_MAX_TOKEN";
pub const ENV_OWNERSHIP_SYNC_INTERVAL_SECS: &str = "OWNERSHIP_SYNC_INTERVAL_SECS";
pub const ENV_ETH_RPC_URL: &str = "ETH_RPC_URL";
pub const ENV_PLAYER_CONTRACT_ADDRESS: &str = "PLAYER_CONTRACT_ADDRESS";
pub const ENV_CONTRACT_DEPLOY_BLOCK: &str = "CONTRACT_DEPLOY_BLOCK";
pub const ENV_JOB_LOCK_TTL_SECS: &str = "JOB_LOCK_TTL_SECS";

pub const DEFAULT_SIMULATOR_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SIMULATION_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_PLAYER_SYNC_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_OWNERSHIP_SYNC_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Where to scan player token transfers from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub contract_address: String,
    pub deploy_block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub database_url: String,
    pub simulator_base_url: String,
    pub simulator_api_key: Option<String>,
    pub simulator_timeout: Duration,
    pub simulation_poll_interval: Duration,
    pub player_sync_interval: Duration,
    pub token_range: TokenRange,
    pub ownership_sync_interval: Duration,
    /// `None` disables transfer scanning; ownership is then recomputed from
    /// whatever is already in the transfer log
    pub chain: Option<ChainConfig>,
    pub job_lock_ttl_secs: i64,
}

impl ReconcilerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let secs = |name: &'static str, default: u64| -> Result<Duration, ConfigError> {
            parse_or(get(name), name, default).map(Duration::from_secs)
        };

        let default_range = TokenRange::default();
        let token_range = TokenRange::new(
            parse_or(get(ENV_PLAYER_SYNC_MIN_TOKEN), ENV_PLAYER_SYNC_MIN_TOKEN, default_range.min)?,
            parse_or(get(ENV_PLAYER_SYNC_MAX_TOKEN), ENV_PLAYER_SYNC_MAX_TOKEN, default_range.max)?,
        );
        if token_range.min > token_range.max {
            return Err(ConfigError::Invalid {
                name: ENV_PLAYER_SYNC_MIN_TOKEN,
                value: token_range.min.to_string(),
                reason: format!("greater than {} ({})", ENV_PLAYER_SYNC_MAX_TOKEN, token_range.max),
            });
        }

        let chain = match (get(ENV_ETH_RPC_URL), get(ENV_PLAYER_CONTRACT_ADDRESS)) {
            (Some(rpc_url), Some(contract_address)) => Some(ChainConfig {
                rpc_url,
                contract_address,
                deploy_block: parse_or(get(ENV_CONTRACT_DEPLOY_BLOCK), ENV_CONTRACT_DEPLOY_BLOCK, 0)?,
            }),
            _ => None,
        };

        Ok(Self {
            database_url: required(ENV_DATABASE_URL)?,
            simulator_base_url: required(ENV_SIMULATOR_BASE_URL)?,
            simulator_api_key: get(ENV_SIMULATOR_API_KEY),
            simulator_timeout: secs(ENV_SIMULATOR_TIMEOUT_SECS, DEFAULT_SIMULATOR_TIMEOUT_SECS)?,
            simulation_poll_interval: secs(
                ENV_SIMULATION_POLL_INTERVAL_SECS,
                DEFAULT_SIMULATION_POLL_INTERVAL_SECS,
            )?,
            player_sync_interval: secs(ENV_PLAYER_SYNC_INTERVAL_SECS, DEFAULT_PLAYER_SYNC_INTERVAL_SECS)?,
            token_range,
            ownership_sync_interval: secs(
                ENV_OWNERSHIP_SYNC_INTERVAL_SECS,
                DEFAULT_OWNERSHIP_SYNC_INTERVAL_SECS,
            )?,
            chain,
            job_lock_ttl_secs: parse_or(get(ENV_JOB_LOCK_TTL_SECS), ENV_JOB_LOCK_TTL_SECS, DEFAULT_LOCK_TTL_SECS)?,
        })
    }
}

fn parse_or<T>(value: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value: raw,
        }),
    }
}
