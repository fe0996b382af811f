use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use alloy::primitives::Address;
use eyre::{eyre, Result, WrapErr};
use serde::Deserialize;

use crate::types::ChainId;

/// Main configuration for the relayer. Loaded once at startup and immutable
/// for the process lifetime.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub chain_a: ChainConfig,
    pub chain_b: ChainConfig,
    pub contracts: ContractAddresses,
    pub relayer: RelayerConfig,
    pub api_listen: std::net::SocketAddr,
}

/// Database configuration
#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Custom Debug that redacts the database URL (may contain credentials).
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"<redacted>")
            .finish()
    }
}

/// Per-chain RPC configuration
#[derive(Clone)]
pub struct ChainConfig {
    pub name: &'static str,
    pub chain_id: ChainId,
    pub rpc_url: String,
    pub private_key: String,
}

/// Custom Debug that redacts private_key to prevent accidental log leakage.
impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConfig")
            .field("name", &self.name)
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Addresses of the watched and called contracts.
#[derive(Debug, Clone, Copy)]
pub struct ContractAddresses {
    /// Chain A: lock-side bridge (emits Locked, accepts unlock)
    pub bridge_lock: Address,
    /// Chain A: emergency executor (accepts pauseBridge)
    pub governance_emergency: Address,
    /// Chain B: mint-side bridge (emits Burned, accepts mintWrapped)
    pub bridge_mint: Address,
    /// Chain B: voting contract (emits ProposalPassed)
    pub governance_voting: Address,
}

/// Relay loop tuning
#[derive(Debug, Clone)]
pub struct RelayerConfig {
    pub poll_interval: Duration,
    /// Blocks below the head treated as possibly-reorganizable.
    pub confirmation_depth: u64,
    /// Bound on a single transaction confirmation wait.
    pub confirm_timeout: Duration,
    /// First-run cursor lookback from the observed head.
    pub sync_lookback: u64,
    /// Attempts before a pending action stops being retried.
    pub max_retry_attempts: u32,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_confirmation_depth() -> u64 {
    3
}

fn default_confirm_timeout_secs() -> u64 {
    60
}

fn default_sync_lookback() -> u64 {
    100
}

fn default_max_retry_attempts() -> u32 {
    5
}

/// On-disk deployments file written by the contract deployment tooling.
#[derive(Debug, Clone, Deserialize)]
pub struct Deployments {
    #[serde(rename = "chainA")]
    pub chain_a: ChainADeployments,
    #[serde(rename = "chainB")]
    pub chain_b: ChainBDeployments,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainADeployments {
    #[serde(rename = "BridgeLock")]
    pub bridge_lock: String,
    #[serde(rename = "GovernanceEmergency")]
    pub governance_emergency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainBDeployments {
    #[serde(rename = "BridgeMint")]
    pub bridge_mint: String,
    #[serde(rename = "GovernanceVoting")]
    pub governance_voting: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// Loads .env file if present, then reads from environment. Contract
    /// addresses come either from address env vars or from the deployments
    /// file (see [`Config::load_waiting_for_deployments`]).
    pub async fn load() -> Result<Self> {
        if Path::new(".env").exists() {
            dotenvy::from_filename(".env").wrap_err("Failed to load .env file")?;
        }
        Self::load_from_env().await
    }

    async fn load_from_env() -> Result<Self> {
        let database = DatabaseConfig {
            url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/relayer.db".to_string()),
        };

        let private_key = env::var("RELAYER_PRIVATE_KEY")
            .map_err(|_| eyre!("RELAYER_PRIVATE_KEY environment variable is required"))?;

        let chain_a = ChainConfig {
            name: "chain-a",
            chain_id: ChainId(parse_env_or("CHAIN_A_ID", 1111)?),
            rpc_url: env::var("CHAIN_A_RPC_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8545".to_string()),
            private_key: private_key.clone(),
        };

        let chain_b = ChainConfig {
            name: "chain-b",
            chain_id: ChainId(parse_env_or("CHAIN_B_ID", 2222)?),
            rpc_url: env::var("CHAIN_B_RPC_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:9545".to_string()),
            private_key,
        };

        let relayer = RelayerConfig {
            poll_interval: Duration::from_millis(parse_env_or(
                "POLL_INTERVAL_MS",
                default_poll_interval_ms(),
            )?),
            confirmation_depth: parse_env_or("CONFIRMATION_DEPTH", default_confirmation_depth())?,
            confirm_timeout: Duration::from_secs(parse_env_or(
                "CONFIRM_TIMEOUT_SECS",
                default_confirm_timeout_secs(),
            )?),
            sync_lookback: parse_env_or("SYNC_LOOKBACK", default_sync_lookback())?,
            max_retry_attempts: parse_env_or(
                "MAX_RETRY_ATTEMPTS",
                default_max_retry_attempts(),
            )?,
        };

        let api_listen = env::var("API_LISTEN")
            .unwrap_or_else(|_| "0.0.0.0:9090".to_string())
            .parse()
            .wrap_err("API_LISTEN must be a host:port address")?;

        let contracts = Self::load_contracts().await?;

        let config = Config {
            database,
            chain_a,
            chain_b,
            contracts,
            relayer,
            api_listen,
        };

        config.validate()?;
        Ok(config)
    }

    /// Contract addresses from env vars when all four are present, otherwise
    /// from the deployments file (waiting a bounded period for it to appear).
    async fn load_contracts() -> Result<ContractAddresses> {
        let from_env = (
            env::var("BRIDGE_LOCK_ADDRESS").ok(),
            env::var("GOVERNANCE_EMERGENCY_ADDRESS").ok(),
            env::var("BRIDGE_MINT_ADDRESS").ok(),
            env::var("GOVERNANCE_VOTING_ADDRESS").ok(),
        );

        if let (Some(lock), Some(emergency), Some(mint), Some(voting)) = from_env {
            return Ok(ContractAddresses {
                bridge_lock: parse_address("BRIDGE_LOCK_ADDRESS", &lock)?,
                governance_emergency: parse_address("GOVERNANCE_EMERGENCY_ADDRESS", &emergency)?,
                bridge_mint: parse_address("BRIDGE_MINT_ADDRESS", &mint)?,
                governance_voting: parse_address("GOVERNANCE_VOTING_ADDRESS", &voting)?,
            });
        }

        let path = env::var("DEPLOYMENTS_PATH").unwrap_or_else(|_| "./deployments.json".to_string());
        let deployments = wait_for_deployments(&path, 60, Duration::from_secs(2)).await?;
        ContractAddresses::from_deployments(&deployments)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(eyre!("database.url cannot be empty"));
        }

        for chain in [&self.chain_a, &self.chain_b] {
            if chain.rpc_url.is_empty() {
                return Err(eyre!("{}.rpc_url cannot be empty", chain.name));
            }
            if chain.private_key.len() != 66 || !chain.private_key.starts_with("0x") {
                return Err(eyre!(
                    "{}.private_key must be 66 chars (0x + 64 hex chars)",
                    chain.name
                ));
            }
        }

        if self.chain_a.chain_id == self.chain_b.chain_id {
            return Err(eyre!(
                "chain A and chain B must have distinct chain IDs (both are {})",
                self.chain_a.chain_id
            ));
        }

        if self.relayer.poll_interval.is_zero() {
            return Err(eyre!("relayer.poll_interval must be nonzero"));
        }

        Ok(())
    }
}

impl ContractAddresses {
    pub fn from_deployments(deployments: &Deployments) -> Result<Self> {
        Ok(ContractAddresses {
            bridge_lock: parse_address("chainA.BridgeLock", &deployments.chain_a.bridge_lock)?,
            governance_emergency: parse_address(
                "chainA.GovernanceEmergency",
                &deployments.chain_a.governance_emergency,
            )?,
            bridge_mint: parse_address("chainB.BridgeMint", &deployments.chain_b.bridge_mint)?,
            governance_voting: parse_address(
                "chainB.GovernanceVoting",
                &deployments.chain_b.governance_voting,
            )?,
        })
    }
}

/// Poll for the deployments file until it exists and parses with both chain
/// sections present, or the attempt limit is exhausted. A missing file after
/// the bounded wait is a startup precondition failure and terminates the
/// process with a non-zero exit via the returned error.
pub async fn wait_for_deployments(
    path: &str,
    max_attempts: u32,
    interval: Duration,
) -> Result<Deployments> {
    for attempt in 0..max_attempts {
        match std::fs::read_to_string(path) {
            Ok(data) if !data.trim().is_empty() => {
                match serde_json::from_str::<Deployments>(&data) {
                    Ok(deployments) => return Ok(deployments),
                    Err(err) => {
                        // Deployment tooling may still be writing the file.
                        tracing::debug!(path, error = %err, "Deployments file not yet parseable");
                    }
                }
            }
            _ => {}
        }
        tracing::info!(path, attempt, "Waiting for deployments file");
        tokio::time::sleep(interval).await;
    }

    Err(eyre!(
        "Deployments file {} not found after {} attempts",
        path,
        max_attempts
    ))
}

fn parse_address(name: &str, value: &str) -> Result<Address> {
    value
        .parse::<Address>()
        .wrap_err_with(|| format!("{} is not a valid EVM address: {}", name, value))
}

fn parse_env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| eyre!("{} has an invalid value: {}", name, value)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let key = "0x0000000000000000000000000000000000000000000000000000000000000001";
        Config {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
            },
            chain_a: ChainConfig {
                name: "chain-a",
                chain_id: ChainId(1111),
                rpc_url: "http://127.0.0.1:8545".to_string(),
                private_key: key.to_string(),
            },
            chain_b: ChainConfig {
                name: "chain-b",
                chain_id: ChainId(2222),
                rpc_url: "http://127.0.0.1:9545".to_string(),
                private_key: key.to_string(),
            },
            contracts: ContractAddresses {
                bridge_lock: Address::ZERO,
                governance_emergency: Address::ZERO,
                bridge_mint: Address::ZERO,
                governance_voting: Address::ZERO,
            },
            relayer: RelayerConfig {
                poll_interval: Duration::from_millis(2000),
                confirmation_depth: 3,
                confirm_timeout: Duration::from_secs(60),
                sync_lookback: 100,
                max_retry_attempts: 5,
            },
            api_listen: "0.0.0.0:9090".parse().unwrap(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_private_key_validation() {
        let mut config = test_config();
        config.chain_a.private_key = "0x123".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_chain_ids_rejected() {
        let mut config = test_config();
        config.chain_b.chain_id = config.chain_a.chain_id;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("1111"), "{}", err);
    }

    #[test]
    fn test_chain_config_debug_redacts_key() {
        let config = test_config();
        let rendered = format!("{:?}", config.chain_a);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("0000000000000001"));
    }

    #[test]
    fn test_deployments_parse() {
        let json = r#"{
            "chainA": {
                "BridgeLock": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
                "GovernanceEmergency": "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"
            },
            "chainB": {
                "BridgeMint": "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0",
                "GovernanceVoting": "0xCf7Ed3AccA5a467e9e704C703E8D87F634fB0Fc9"
            }
        }"#;
        let deployments: Deployments = serde_json::from_str(json).unwrap();
        let contracts = ContractAddresses::from_deployments(&deployments).unwrap();
        assert_ne!(contracts.bridge_lock, Address::ZERO);
        assert_ne!(contracts.governance_voting, Address::ZERO);
    }

    #[tokio::test]
    async fn test_wait_for_deployments_times_out() {
        let result = wait_for_deployments(
            "/nonexistent/deployments.json",
            2,
            Duration::from_millis(10),
        )
        .await;
        assert!(result.is_err());
    }
}
