use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::Filter;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use tracing::info;

use crate::config::ChainConfig;
use crate::contracts::{BridgeLock, BridgeMint, GovernanceEmergency};
use crate::types::{Action, ChainId};

use super::{ChainClient, LogRecord};

/// EVM JSON-RPC chain client. Reads go through a shared provider; writes
/// build a wallet-filled provider per submission.
pub struct EvmChainClient {
    chain_id: ChainId,
    rpc_url: String,
    provider: RootProvider<Http<Client>>,
    signer: PrivateKeySigner,
    confirmations: u64,
    confirm_timeout: Duration,
}

impl EvmChainClient {
    pub fn new(
        config: &ChainConfig,
        confirmations: u64,
        confirm_timeout: Duration,
    ) -> Result<Self> {
        let url = config
            .rpc_url
            .parse()
            .wrap_err_with(|| format!("Invalid RPC URL for {}", config.name))?;
        let provider = ProviderBuilder::new().on_http(url);

        let signer: PrivateKeySigner = config
            .private_key
            .parse()
            .wrap_err("Failed to parse relayer private key")?;

        Ok(Self {
            chain_id: config.chain_id,
            rpc_url: config.rpc_url.clone(),
            provider,
            signer,
            confirmations,
            confirm_timeout,
        })
    }
}

#[async_trait]
impl ChainClient for EvmChainClient {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn head_block(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .wrap_err("Failed to get block number")
    }

    async fn fetch_logs(
        &self,
        contract: Address,
        topic0: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogRecord>> {
        let filter = Filter::new()
            .address(contract)
            .event_signature(topic0)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .wrap_err("Failed to get logs")?;

        let mut records = Vec::with_capacity(logs.len());
        for log in logs {
            let block_number = log
                .block_number
                .ok_or_else(|| eyre!("Missing block number"))?;
            let log_index = log.log_index.ok_or_else(|| eyre!("Missing log index"))?;
            records.push(LogRecord {
                block_number,
                log_index,
                topics: log.topics().to_vec(),
                data: log.data().data.clone(),
            });
        }

        Ok(records)
    }

    async fn submit_action(&self, contract: Address, action: &Action) -> Result<String> {
        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .on_http(self.rpc_url.parse().wrap_err("Invalid RPC URL")?);

        let pending_tx = match action {
            Action::MintWrapped { user, amount, nonce } => {
                let bridge = BridgeMint::new(contract, &provider);
                bridge
                    .mintWrapped(*user, *amount, alloy::primitives::U256::from(*nonce))
                    .send()
                    .await
                    .map_err(|e| eyre!("Failed to send mintWrapped: {}", e))?
            }
            Action::Unlock { user, amount, nonce } => {
                let bridge = BridgeLock::new(contract, &provider);
                bridge
                    .unlock(*user, *amount, alloy::primitives::U256::from(*nonce))
                    .send()
                    .await
                    .map_err(|e| eyre!("Failed to send unlock: {}", e))?
            }
            Action::PauseBridge => {
                let emergency = GovernanceEmergency::new(contract, &provider);
                emergency
                    .pauseBridge()
                    .send()
                    .await
                    .map_err(|e| eyre!("Failed to send pauseBridge: {}", e))?
            }
        };

        let tx_hash = *pending_tx.tx_hash();
        info!(
            chain_id = %self.chain_id,
            tx_hash = %tx_hash,
            action = %action.kind(),
            "Transaction sent, waiting for confirmation"
        );

        let receipt = pending_tx
            .with_required_confirmations(self.confirmations)
            .with_timeout(Some(self.confirm_timeout))
            .get_receipt()
            .await
            .map_err(|e| eyre!("Failed to get receipt: {}", e))?;

        if !receipt.status() {
            return Err(eyre!("Transaction reverted: {:?}", receipt.transaction_hash));
        }

        Ok(format!("{:?}", receipt.transaction_hash))
    }
}
