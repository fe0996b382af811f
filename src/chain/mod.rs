//! Chain client boundary
//!
//! The relay engine talks to a chain only through [`ChainClient`]: a head
//! query, a log query by block range, and a submit-and-confirm call. The
//! production implementation wraps an EVM JSON-RPC endpoint; tests inject
//! fakes to drive the loop deterministically.

use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use eyre::Result;

use crate::types::{Action, ChainId};

pub mod evm;

pub use evm::EvmChainClient;

/// A raw log as returned by the chain, before route-specific decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub block_number: u64,
    pub log_index: u64,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Read/write access to a single chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> ChainId;

    /// Current head block number.
    async fn head_block(&self) -> Result<u64>;

    /// Ordered logs from `contract` matching `topic0` in `[from_block, to_block]`.
    async fn fetch_logs(
        &self,
        contract: Address,
        topic0: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogRecord>>;

    /// Submit a destination call and block until it is confirmed, returning
    /// the transaction hash. The wait is bounded; a transaction that neither
    /// confirms nor fails within the bound surfaces as an error.
    async fn submit_action(&self, contract: Address, action: &Action) -> Result<String>;
}
