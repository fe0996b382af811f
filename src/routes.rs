//! Declarative relay route table
//!
//! Each route is a directed mapping from one watched source event kind to one
//! destination action kind. Routes carry their own decode/encode strategy as
//! a tagged variant, so adding a route never touches the dispatch logic.

use alloy::primitives::{Address, B256};
use alloy::sol_types::SolEvent;
use eyre::{eyre, Result};

use crate::config::Config;
use crate::contracts::{BridgeLock, BridgeMint, GovernanceVoting};
use crate::types::{Action, ActionKind, ChainId, EventKind, EventPayload, RelayEvent};

/// Decode/encode strategy for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Nonce-correlated token movement: Locked→mintWrapped or Burned→unlock.
    ValueTransfer,
    /// Proposal-correlated governance action: ProposalPassed→pauseBridge.
    Governance,
}

/// A configured source-event → destination-action mapping.
#[derive(Debug, Clone)]
pub struct RelayRoute {
    pub name: &'static str,
    pub kind: RouteKind,
    pub source_chain: ChainId,
    pub source_contract: Address,
    pub event: EventKind,
    pub dest_chain: ChainId,
    pub dest_contract: Address,
    pub action: ActionKind,
}

impl RelayRoute {
    /// topic0 of the watched event.
    pub fn event_signature(&self) -> B256 {
        match self.event {
            EventKind::Locked => BridgeLock::Locked::SIGNATURE_HASH,
            EventKind::Burned => BridgeMint::Burned::SIGNATURE_HASH,
            EventKind::ProposalPassed => GovernanceVoting::ProposalPassed::SIGNATURE_HASH,
        }
    }

    /// Map a decoded event from this route's source onto the destination call.
    pub fn action_for(&self, event: &RelayEvent) -> Result<Action> {
        match (self.action, &event.payload) {
            (ActionKind::MintWrapped, EventPayload::Transfer { user, amount, nonce }) => {
                Ok(Action::MintWrapped {
                    user: *user,
                    amount: *amount,
                    nonce: *nonce,
                })
            }
            (ActionKind::Unlock, EventPayload::Transfer { user, amount, nonce }) => {
                Ok(Action::Unlock {
                    user: *user,
                    amount: *amount,
                    nonce: *nonce,
                })
            }
            (ActionKind::PauseBridge, EventPayload::Governance { .. }) => Ok(Action::PauseBridge),
            (action, payload) => Err(eyre!(
                "route {}: payload {:?} does not fit action {}",
                self.name,
                payload,
                action
            )),
        }
    }
}

/// Build the fixed route set from the loaded configuration.
///
/// Locked@A → mintWrapped@B, Burned@B → unlock@A, ProposalPassed@B →
/// pauseBridge@A. The set is immutable for the process lifetime.
pub fn build_routes(config: &Config) -> Vec<RelayRoute> {
    vec![
        RelayRoute {
            name: "lock-mint",
            kind: RouteKind::ValueTransfer,
            source_chain: config.chain_a.chain_id,
            source_contract: config.contracts.bridge_lock,
            event: EventKind::Locked,
            dest_chain: config.chain_b.chain_id,
            dest_contract: config.contracts.bridge_mint,
            action: ActionKind::MintWrapped,
        },
        RelayRoute {
            name: "burn-unlock",
            kind: RouteKind::ValueTransfer,
            source_chain: config.chain_b.chain_id,
            source_contract: config.contracts.bridge_mint,
            event: EventKind::Burned,
            dest_chain: config.chain_a.chain_id,
            dest_contract: config.contracts.bridge_lock,
            action: ActionKind::Unlock,
        },
        RelayRoute {
            name: "proposal-pause",
            kind: RouteKind::Governance,
            source_chain: config.chain_b.chain_id,
            source_contract: config.contracts.governance_voting,
            event: EventKind::ProposalPassed,
            dest_chain: config.chain_a.chain_id,
            dest_contract: config.contracts.governance_emergency,
            action: ActionKind::PauseBridge,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{keccak256, U256};
    use crate::types::CorrelationId;

    #[test]
    fn test_event_signatures_match_abi() {
        let route = RelayRoute {
            name: "lock-mint",
            kind: RouteKind::ValueTransfer,
            source_chain: ChainId(1111),
            source_contract: Address::ZERO,
            event: EventKind::Locked,
            dest_chain: ChainId(2222),
            dest_contract: Address::ZERO,
            action: ActionKind::MintWrapped,
        };
        assert_eq!(
            route.event_signature(),
            keccak256(b"Locked(address,uint256,uint256)")
        );
    }

    #[test]
    fn test_action_for_rejects_mismatched_payload() {
        let route = RelayRoute {
            name: "proposal-pause",
            kind: RouteKind::Governance,
            source_chain: ChainId(2222),
            source_contract: Address::ZERO,
            event: EventKind::ProposalPassed,
            dest_chain: ChainId(1111),
            dest_contract: Address::ZERO,
            action: ActionKind::PauseBridge,
        };
        let event = RelayEvent {
            chain_id: ChainId(2222),
            block_number: 1,
            log_index: 0,
            kind: EventKind::Burned,
            correlation_id: CorrelationId::Nonce(1),
            payload: EventPayload::Transfer {
                user: Address::ZERO,
                amount: U256::from(1),
                nonce: 1,
            },
        };
        assert!(route.action_for(&event).is_err());
    }
}
