use std::fmt;

use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// Numeric identifier of an EVM chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl ChainId {
    pub fn as_i64(&self) -> i64 {
        self.0 as i64
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cross-chain-unique deduplication key for a relay event.
///
/// Value-transfer events carry the contract-assigned monotonic nonce.
/// Governance events have no natural nonce, so one is synthesized from the
/// proposal identifier. The string renderings live in disjoint key spaces,
/// so a transfer nonce can never collide with a proposal key in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorrelationId {
    Nonce(u64),
    Proposal(u64),
}

impl CorrelationId {
    /// Ledger key rendering ("5" or "PROPOSAL-1").
    pub fn as_key(&self) -> String {
        self.to_string()
    }

    /// Parse a ledger key back into a correlation id.
    pub fn from_key(key: &str) -> Option<Self> {
        if let Some(id) = key.strip_prefix("PROPOSAL-") {
            return id.parse().ok().map(CorrelationId::Proposal);
        }
        key.parse().ok().map(CorrelationId::Nonce)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationId::Nonce(n) => write!(f, "{}", n),
            CorrelationId::Proposal(id) => write!(f, "PROPOSAL-{}", id),
        }
    }
}

/// Watched event kinds on the source contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Locked,
    Burned,
    ProposalPassed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Locked => "locked",
            EventKind::Burned => "burned",
            EventKind::ProposalPassed => "proposal_passed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decoded payload of a watched log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    Transfer {
        user: Address,
        amount: U256,
        nonce: u64,
    },
    Governance {
        proposal_id: u64,
        data: Bytes,
    },
}

/// A decoded occurrence of a watched log, derived fresh each scan pass and
/// never persisted standalone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEvent {
    pub chain_id: ChainId,
    pub block_number: u64,
    pub log_index: u64,
    pub kind: EventKind,
    pub correlation_id: CorrelationId,
    pub payload: EventPayload,
}

/// Destination-chain call kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    MintWrapped,
    Unlock,
    PauseBridge,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::MintWrapped => "mint_wrapped",
            ActionKind::Unlock => "unlock",
            ActionKind::PauseBridge => "pause_bridge",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "mint_wrapped" => Some(ActionKind::MintWrapped),
            "unlock" => Some(ActionKind::Unlock),
            "pause_bridge" => Some(ActionKind::PauseBridge),
            _ => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fully-specified destination-chain call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    MintWrapped {
        user: Address,
        amount: U256,
        nonce: u64,
    },
    Unlock {
        user: Address,
        amount: U256,
        nonce: u64,
    },
    PauseBridge,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::MintWrapped { .. } => ActionKind::MintWrapped,
            Action::Unlock { .. } => ActionKind::Unlock,
            Action::PauseBridge => ActionKind::PauseBridge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_key_rendering() {
        assert_eq!(CorrelationId::Nonce(5).as_key(), "5");
        assert_eq!(CorrelationId::Proposal(1).as_key(), "PROPOSAL-1");
        assert_eq!(CorrelationId::Proposal(2).as_key(), "PROPOSAL-2");
    }

    #[test]
    fn test_correlation_key_round_trip() {
        for id in [CorrelationId::Nonce(5), CorrelationId::Proposal(9)] {
            assert_eq!(CorrelationId::from_key(&id.as_key()), Some(id));
        }
        assert_eq!(CorrelationId::from_key("PROPOSAL-x"), None);
        assert_eq!(CorrelationId::from_key("not-a-nonce"), None);
    }

    #[test]
    fn test_correlation_key_spaces_disjoint() {
        // A proposal id can never render to the same key as a nonce.
        assert_ne!(
            CorrelationId::Nonce(1).as_key(),
            CorrelationId::Proposal(1).as_key()
        );
    }

    #[test]
    fn test_action_kind_round_trip() {
        for kind in [
            ActionKind::MintWrapped,
            ActionKind::Unlock,
            ActionKind::PauseBridge,
        ] {
            assert_eq!(ActionKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ActionKind::from_str("bogus"), None);
    }
}
