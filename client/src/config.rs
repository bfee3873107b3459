use crate::{ledger::Network, retry::RetryPolicy};
use ethers::signers::{LocalWallet, Signer};
use honest_types::{
    accountant::DEFAULT_PAYOUT_PERIOD_SECS,
    casino::{BLOCKS_PER_DAY, BPS_DENOMINATOR, DEFAULT_FEE_BPS, MAX_PRIZE_WEI, WEI_PER_ETHER},
    Address, U256,
};
use serde::Deserialize;
use std::{fmt, str::FromStr, time::Duration};
use thiserror::Error;
use tracing::Level;
use url::Url;

pub mod defaults {
    pub const LOG_LEVEL: &str = "info";
    pub const POLL_INTERVAL_MS: u64 = 1_000;
    pub const CONFIRMATION_TIMEOUT_MS: u64 = 120_000;
    pub const READ_RETRY_ATTEMPTS: usize = 3;
    pub const READ_RETRY_BACKOFF_MS: u64 = 250;
    pub const READ_RETRY_MAX_BACKOFF_MS: u64 = 2_000;
}

/// Configuration as read from YAML.
#[derive(Deserialize)]
pub struct Config {
    pub rpc_url: String,
    pub chain_id: u64,
    /// Address of the registry resolving every other component.
    pub registry: String,
    /// Hex private key used to sign writes. Read-only without it.
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
    #[serde(default = "default_max_prize_ether")]
    pub max_prize_ether: u64,
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u32,
    #[serde(default = "default_payout_period_secs")]
    pub payout_period_secs: u64,
    #[serde(default = "default_guesses_lookback_blocks")]
    pub guesses_lookback_blocks: u64,
    #[serde(default = "default_read_retry_attempts")]
    pub read_retry_attempts: usize,
    #[serde(default = "default_read_retry_backoff_ms")]
    pub read_retry_backoff_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("{field} must be an address: {value}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("private_key is invalid")]
    InvalidPrivateKey,
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
    #[error("{field} must be a valid URL: {value}")]
    InvalidUrl { field: &'static str, value: String },
    #[error("{field} URL scheme must be http or https: {value}")]
    InvalidUrlScheme { field: &'static str, value: String },
    #[error("fee_bps must be below {max} (got {value})")]
    FeeTooLarge { value: u32, max: u32 },
}

/// Rule parameters shared by the casino, accountant and governance desks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub max_prize: U256,
    pub fee_bps: u32,
    pub payout_period_secs: u64,
    pub guesses_lookback_blocks: u64,
    pub retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_prize: U256::from(MAX_PRIZE_WEI),
            fee_bps: DEFAULT_FEE_BPS,
            payout_period_secs: DEFAULT_PAYOUT_PERIOD_SECS,
            guesses_lookback_blocks: BLOCKS_PER_DAY,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct ValidatedConfig {
    pub network: Network,
    pub registry: Address,
    pub wallet: Option<LocalWallet>,
    pub log_level: Level,
    pub poll_interval: Duration,
    pub confirmation_timeout: Duration,
    pub settings: Settings,
}

impl fmt::Debug for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedConfig")
            .field("network", &self.network)
            .field("registry", &self.registry)
            .field("signer", &self.wallet.as_ref().map(|wallet| wallet.address()))
            .field("log_level", &self.log_level)
            .field("poll_interval", &self.poll_interval)
            .field("confirmation_timeout", &self.confirmation_timeout)
            .field("settings", &self.settings)
            .finish()
    }
}

impl Config {
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        validate_http_url("rpc_url", &self.rpc_url)?;
        ensure_nonzero("chain_id", self.chain_id)?;
        ensure_nonzero("poll_interval_ms", self.poll_interval_ms)?;
        ensure_nonzero("confirmation_timeout_ms", self.confirmation_timeout_ms)?;
        ensure_nonzero("max_prize_ether", self.max_prize_ether)?;
        ensure_nonzero("payout_period_secs", self.payout_period_secs)?;
        ensure_nonzero("guesses_lookback_blocks", self.guesses_lookback_blocks)?;
        ensure_nonzero("read_retry_attempts", self.read_retry_attempts as u64)?;
        if self.fee_bps >= BPS_DENOMINATOR {
            return Err(ConfigError::FeeTooLarge {
                value: self.fee_bps,
                max: BPS_DENOMINATOR,
            });
        }

        let registry = parse_address("registry", &self.registry)?;
        let log_level =
            Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;
        let wallet = self
            .private_key
            .as_deref()
            .map(|key| {
                key.trim_start_matches("0x")
                    .parse::<LocalWallet>()
                    .map(|wallet| wallet.with_chain_id(self.chain_id))
                    .map_err(|_| ConfigError::InvalidPrivateKey)
            })
            .transpose()?;

        Ok(ValidatedConfig {
            network: Network {
                chain_id: self.chain_id,
                rpc_url: self.rpc_url,
            },
            registry,
            wallet,
            log_level,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            confirmation_timeout: Duration::from_millis(self.confirmation_timeout_ms),
            settings: Settings {
                max_prize: U256::from(self.max_prize_ether) * U256::from(WEI_PER_ETHER),
                fee_bps: self.fee_bps,
                payout_period_secs: self.payout_period_secs,
                guesses_lookback_blocks: self.guesses_lookback_blocks,
                retry: RetryPolicy {
                    max_attempts: self.read_retry_attempts,
                    initial_backoff: Duration::from_millis(self.read_retry_backoff_ms),
                    max_backoff: Duration::from_millis(defaults::READ_RETRY_MAX_BACKOFF_MS)
                        .max(Duration::from_millis(self.read_retry_backoff_ms)),
                },
            },
        })
    }
}

fn default_log_level() -> String {
    defaults::LOG_LEVEL.to_string()
}

fn default_poll_interval_ms() -> u64 {
    defaults::POLL_INTERVAL_MS
}

fn default_confirmation_timeout_ms() -> u64 {
    defaults::CONFIRMATION_TIMEOUT_MS
}

fn default_max_prize_ether() -> u64 {
    (MAX_PRIZE_WEI / WEI_PER_ETHER) as u64
}

fn default_fee_bps() -> u32 {
    DEFAULT_FEE_BPS
}

fn default_payout_period_secs() -> u64 {
    DEFAULT_PAYOUT_PERIOD_SECS
}

fn default_guesses_lookback_blocks() -> u64 {
    BLOCKS_PER_DAY
}

fn default_read_retry_attempts() -> usize {
    defaults::READ_RETRY_ATTEMPTS
}

fn default_read_retry_backoff_ms() -> u64 {
    defaults::READ_RETRY_BACKOFF_MS
}

fn ensure_nonzero(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(())
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, ConfigError> {
    let invalid = || ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
    };
    let address = Address::from_str(value).map_err(|_| invalid())?;
    if address.is_zero() {
        return Err(invalid());
    }
    Ok(address)
}

fn validate_http_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|_| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => {}
        _ => {
            return Err(ConfigError::InvalidUrlScheme {
                field,
                value: value.to_string(),
            })
        }
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
rpc_url: "http://127.0.0.1:8545"
chain_id: 31337
registry: "0x5fbdb2315678afecb367f032d93f642f64180aa3"
"#;

    // Well-known development key; never holds real funds.
    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_defaults_apply() {
        let config = Config::from_yaml(MINIMAL).unwrap().validate().unwrap();
        assert_eq!(config.network.chain_id, 31_337);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert!(config.wallet.is_none());
        assert_eq!(config.settings, Settings::default());
    }

    #[test]
    fn test_private_key_binds_chain_id() {
        let source = format!("{MINIMAL}private_key: \"0x{DEV_KEY}\"\nlog_level: debug\n");
        let config = Config::from_yaml(&source).unwrap().validate().unwrap();
        let wallet = config.wallet.as_ref().unwrap();
        assert_eq!(wallet.chain_id(), 31_337);
        assert_eq!(
            wallet.address(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
                .parse::<Address>()
                .unwrap()
        );
        assert_eq!(config.log_level, Level::DEBUG);
        assert!(!format!("{config:?}").contains(DEV_KEY));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let bad_url = MINIMAL.replace("http://127.0.0.1:8545", "ws://127.0.0.1:8545");
        assert!(matches!(
            Config::from_yaml(&bad_url).unwrap().validate(),
            Err(ConfigError::InvalidUrlScheme { .. })
        ));

        let zero_registry = MINIMAL.replace(
            "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "0x0000000000000000000000000000000000000000",
        );
        assert!(matches!(
            Config::from_yaml(&zero_registry).unwrap().validate(),
            Err(ConfigError::InvalidAddress { field: "registry", .. })
        ));

        let bad_level = format!("{MINIMAL}log_level: loud\n");
        assert!(matches!(
            Config::from_yaml(&bad_level).unwrap().validate(),
            Err(ConfigError::InvalidLogLevel { .. })
        ));

        let zero_poll = format!("{MINIMAL}poll_interval_ms: 0\n");
        assert!(matches!(
            Config::from_yaml(&zero_poll).unwrap().validate(),
            Err(ConfigError::InvalidNonZero {
                field: "poll_interval_ms",
                value: 0
            })
        ));

        let bad_key = format!("{MINIMAL}private_key: \"0x1234\"\n");
        assert!(matches!(
            Config::from_yaml(&bad_key).unwrap().validate(),
            Err(ConfigError::InvalidPrivateKey)
        ));

        assert!(matches!(
            Config::from_yaml("rpc_url: 1"),
            Err(ConfigError::Parse(_))
        ));
    }
}
