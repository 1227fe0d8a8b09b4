//! The chain as seen by ceremony tasks
//!
//! [`EthDkgChain`] covers the ETHDKG and validator pool contracts plus the
//! transaction plumbing around them. RPC clients and ABI bindings live
//! behind it.

#[cfg(any(test, feature = "testing"))]
pub mod memory;

use alloy_primitives::{Address, B256, U256};
use ark_bn254::{G1Affine, G2Affine};
use async_trait::async_trait;
use ethdkg_crypto::DleqProof;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::state::{DkgEvent, Phase};

#[cfg(any(test, feature = "testing"))]
pub use memory::InMemoryEthDkg;

/// Result type for chain operations
pub type Result<T> = std::result::Result<T, ChainError>;

/// Errors reported by the chain collaborator
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Transport or node failure
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The call would revert
    #[error("Reverted: {0}")]
    Reverted(String),

    /// The wait was cancelled
    #[error("Cancelled")]
    Cancelled,

    /// No transaction with this handle
    #[error("Unknown transaction {0}")]
    UnknownTx(B256),
}

/// Hash of a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHandle(pub B256);

/// Outcome recorded in a receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Failed(String),
}

/// A mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub status: ReceiptStatus,

    /// Block the transaction was mined in
    pub block: u64,

    /// Decoded events it emitted
    pub logs: Vec<DkgEvent>,
}

/// ETHDKG contract entry points used by the tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DkgCall {
    Register {
        public_key: G1Affine,
    },
    AccuseNotRegistered {
        accused: Vec<Address>,
    },
    DistributeShares {
        encrypted_shares: Vec<U256>,
        commitments: Vec<G1Affine>,
    },
    AccuseDidNotDistributeShares {
        accused: Vec<Address>,
    },
    AccuseDistributedBadShares {
        accused: Address,
        encrypted_shares: Vec<U256>,
        commitments: Vec<G1Affine>,
        shared_key: G1Affine,
        shared_key_proof: DleqProof,
    },
    SubmitKeyShare {
        key_share_g1: G1Affine,
        key_share_g1_proof: DleqProof,
        key_share_g2: G2Affine,
    },
    AccuseDidNotSubmitKeyShares {
        accused: Vec<Address>,
    },
    SubmitMasterPublicKey {
        master_public_key: G2Affine,
    },
    SubmitGpkj {
        gpkj: G2Affine,
        signature: G1Affine,
    },
    AccuseDidNotSubmitGpkj {
        accused: Vec<Address>,
    },
    AccuseSubmittedBadGpkj {
        validators: Vec<Address>,
        encrypted_shares_hashes: Vec<B256>,
        commitments: Vec<Vec<G1Affine>>,
        accused: Address,
    },
    Complete,
}

impl DkgCall {
    /// Contract function name, for logs
    pub fn name(&self) -> &'static str {
        match self {
            DkgCall::Register { .. } => "register",
            DkgCall::AccuseNotRegistered { .. } => "accuseParticipantNotRegistered",
            DkgCall::DistributeShares { .. } => "distributeShares",
            DkgCall::AccuseDidNotDistributeShares { .. } => "accuseParticipantDidNotDistributeShares",
            DkgCall::AccuseDistributedBadShares { .. } => "accuseParticipantDistributedBadShares",
            DkgCall::SubmitKeyShare { .. } => "submitKeyShare",
            DkgCall::AccuseDidNotSubmitKeyShares { .. } => "accuseParticipantDidNotSubmitKeyShares",
            DkgCall::SubmitMasterPublicKey { .. } => "submitMasterPublicKey",
            DkgCall::SubmitGpkj { .. } => "submitGPKJ",
            DkgCall::AccuseDidNotSubmitGpkj { .. } => "accuseParticipantDidNotSubmitGPKJ",
            DkgCall::AccuseSubmittedBadGpkj { .. } => "accuseParticipantSubmittedBadGPKJ",
            DkgCall::Complete => "complete",
        }
    }
}

/// A participant as stored by the contract
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantState {
    pub index: u64,

    /// Round of the last registration; stale when below the current nonce
    pub nonce: u64,

    /// Last phase completed, `None` before registering
    pub phase: Option<Phase>,

    pub public_key: Option<G1Affine>,
    pub distributed_shares_hash: B256,
    pub commitments_first_coefficient: Option<G1Affine>,
    pub key_share_g1: Option<G1Affine>,
    pub key_share_g1_proof: Option<DleqProof>,
    pub key_share_g2: Option<G2Affine>,
    pub gpkj: Option<G2Affine>,
}

/// Reads and writes against the ETHDKG and validator pool contracts
#[async_trait]
pub trait EthDkgChain: Send + Sync {
    /// Latest block height
    async fn current_height(&self) -> Result<u64>;

    async fn block_hash(&self, height: u64) -> Result<B256>;

    /// Sign and send `call` from `from`
    async fn submit(&self, from: Address, call: DkgCall) -> Result<TxHandle>;

    /// Wait until `tx` is mined, or `cancel` fires
    async fn await_receipt(&self, tx: TxHandle, cancel: &CancellationToken) -> Result<Receipt>;

    async fn phase(&self) -> Result<Phase>;

    /// Number of participants penalized in the current round
    async fn bad_participants(&self) -> Result<u64>;

    async fn participant_state(&self, account: Address) -> Result<ParticipantState>;

    async fn is_master_public_key_set(&self) -> Result<bool>;

    async fn master_public_key_hash(&self) -> Result<B256>;

    /// Current validator pool
    async fn validator_addresses(&self) -> Result<Vec<Address>>;

    async fn is_validator(&self, account: Address) -> Result<bool>;
}
