// Define types related to swap execution: lifecycle, failures and records

use crate::data_structures::{LegKind, Party, SwapId};
use crate::onchain::BridgeError;
use ethers::types::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Reasons a swap attempt is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwapError {
    #[error("{leg} leg signature does not recover to {party:?}")]
    InvalidSignature { leg: LegKind, party: Party },
    #[error("{leg} leg authorization expired at {deadline} (now {now})")]
    ExpiredAuthorization { leg: LegKind, deadline: u64, now: u64 },
    #[error("{leg} leg nonce for {party:?} is {presented}, ledger expects {expected}")]
    StaleOrFutureNonce { leg: LegKind, party: Party, expected: U256, presented: U256 },
    #[error("{leg} leg bridge transfer failed: {source}")]
    BridgeTransferFailed { leg: LegKind, source: BridgeError },
    #[error("malformed swap request: {0}")]
    MalformedRequest(String),
}

impl SwapError {
    // Short stable label, used in events
    pub fn kind(&self) -> &'static str {
        match self {
            SwapError::InvalidSignature { .. } => "InvalidSignature",
            SwapError::ExpiredAuthorization { .. } => "ExpiredAuthorization",
            SwapError::StaleOrFutureNonce { .. } => "StaleOrFutureNonce",
            SwapError::BridgeTransferFailed { .. } => "BridgeTransferFailed",
            SwapError::MalformedRequest(_) => "MalformedRequest",
        }
    }
}

/// Lifecycle of a single swap attempt. Executed and Rejected are terminal.
///
/// ```text
/// Received --validate--> Validated --commit--> Executed
///    |                       |
///    +-------> Rejected <----+
/// ```
///
/// `Received -> Rejected` covers malformed requests and failed signature,
/// deadline or nonce checks; nothing has been touched yet. `Validated ->
/// Rejected` is a bridge failure after the nonces were consumed; by the time
/// the status is recorded every reservation is released, any committed leg is
/// reverted and both nonces are rewound, so it leaves the same state behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapStatus {
    Received,
    Validated,
    Executed,
    Rejected(SwapError),
}

impl SwapStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapStatus::Executed | SwapStatus::Rejected(_))
    }

    pub fn can_transition_to(&self, next: &SwapStatus) -> bool {
        matches!(
            (self, next),
            (SwapStatus::Received, SwapStatus::Validated)
                | (SwapStatus::Received, SwapStatus::Rejected(_))
                | (SwapStatus::Validated, SwapStatus::Executed)
                | (SwapStatus::Validated, SwapStatus::Rejected(_))
        )
    }
}

/// Immutable record of an executed swap, published for external indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRecord {
    pub swap_id: SwapId,
    pub party_a: Party, // Sent the fungible amount
    pub party_b: Party, // Sent the item
    pub amount: U256,
    pub item_id: U256,
    pub timestamp: u64,
}

/// Observability stream emitted by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum SwapEvent {
    Executed(SwapRecord),
    Rejected {
        swap_id: SwapId,
        kind: String,
        reason: String,
        timestamp: u64,
    },
}

impl SwapEvent {
    pub fn swap_id(&self) -> SwapId {
        match self {
            SwapEvent::Executed(record) => record.swap_id,
            SwapEvent::Rejected { swap_id, .. } => *swap_id,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
