//! Bridge and governance contract ABI definitions
//!
//! Uses alloy's sol! macro to generate type-safe bindings for the contracts
//! the relayer watches and calls. The relayer consumes these interfaces only;
//! it does not own the contracts.

use alloy::sol;

sol! {
    /// Lock-side bridge on Chain A. Locks deposits and releases them when the
    /// relayer observes a finalized burn on Chain B. `unlock` reverts with
    /// "Nonce already processed" on nonce reuse.
    #[sol(rpc)]
    contract BridgeLock {
        event Locked(address indexed user, uint256 amount, uint256 nonce);

        function unlock(address user, uint256 amount, uint256 nonce) external;
        function pause() external;
    }
}

sol! {
    /// Mint-side bridge on Chain B. Mints wrapped tokens against finalized
    /// locks on Chain A and burns them for the reverse direction.
    /// `mintWrapped` reverts with "Nonce already processed" on nonce reuse.
    #[sol(rpc)]
    contract BridgeMint {
        event Burned(address indexed user, uint256 amount, uint256 nonce);
        event Minted(address indexed user, uint256 amount, uint256 nonce);

        function mintWrapped(address user, uint256 amount, uint256 nonce) external;
        function burn(uint256 amount) external;
    }
}

sol! {
    /// Governance voting contract on Chain B. Emits a passed proposal with an
    /// opaque payload; the relayer only keys on the proposal id.
    #[sol(rpc)]
    contract GovernanceVoting {
        event ProposalPassed(uint256 proposalId, bytes data);
    }
}

sol! {
    /// Emergency governance executor on Chain A.
    #[sol(rpc)]
    contract GovernanceEmergency {
        event EmergencyActionTriggered(string action);

        function pauseBridge() external;
    }
}
