use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

// Caller-supplied label for a swap attempt. Not authoritative: replay
// protection comes from nonces, not from this id.
pub type SwapId = U256;

// Identity of a signing party (an EVM address)
pub type Party = Address;

/// What moves in a single leg of a swap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetDescriptor {
    /// Fungible balance, in the token's smallest unit.
    Amount(U256),
    /// Unique item identifier.
    Item(U256),
}

impl AssetDescriptor {
    pub fn kind(&self) -> LegKind {
        match self {
            AssetDescriptor::Amount(_) => LegKind::Fungible,
            AssetDescriptor::Item(_) => LegKind::Item,
        }
    }

    // The raw uint256 value encoded in the signed message
    pub fn value(&self) -> U256 {
        match self {
            AssetDescriptor::Amount(v) | AssetDescriptor::Item(v) => *v,
        }
    }
}

impl fmt::Display for AssetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetDescriptor::Amount(v) => write!(f, "amount {}", v),
            AssetDescriptor::Item(v) => write!(f, "item #{}", v),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegKind {
    Fungible,
    Item,
}

impl fmt::Display for LegKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegKind::Fungible => f.write_str("fungible"),
            LegKind::Item => f.write_str("item"),
        }
    }
}

/// Signing domain. Every digest a party signs is bound to one of these, so a
/// signature is only meaningful to one coordinator on one chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    // Address of the coordinator that verifies and executes the authorization
    pub verifying_contract: Address,
}

impl Domain {
    pub fn new(name: impl Into<String>, version: impl Into<String>, chain_id: u64, verifying_contract: Address) -> Self {
        Domain {
            name: name.into(),
            version: version.into(),
            chain_id,
            verifying_contract,
        }
    }
}

/// The fields of a leg that get signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMessage {
    pub from: Party,
    pub to: Party,
    pub asset: AssetDescriptor,
    pub nonce: U256,
    // Unix seconds; the authorization is invalid strictly after this instant
    pub deadline: u64,
}

/// One party's signed consent to move one asset to a counterparty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub party: Party,
    pub counterparty: Party,
    pub asset: AssetDescriptor,
    pub nonce: U256,
    pub deadline: u64,
    // 65 bytes, r || s || v
    pub signature: Bytes,
}

impl Authorization {
    pub fn message(&self) -> TransferMessage {
        TransferMessage {
            from: self.party,
            to: self.counterparty,
            asset: self.asset,
            nonce: self.nonce,
            deadline: self.deadline,
        }
    }
}

/// One side of a swap as submitted by the relayer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapLeg {
    pub party: Party,
    pub counterparty: Party,
    // Bridge that moves this leg's asset
    pub bridge: Address,
    pub asset: AssetDescriptor,
    pub authorization: Authorization,
}

impl SwapLeg {
    /// Builds a leg whose outer fields mirror the authorization.
    pub fn from_authorization(bridge: Address, authorization: Authorization) -> Self {
        SwapLeg {
            party: authorization.party,
            counterparty: authorization.counterparty,
            bridge,
            asset: authorization.asset,
            authorization,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub swap_id: SwapId,
    // Leg A: fungible balance from party A to party B
    pub fungible: SwapLeg,
    // Leg B: unique item from party B to party A
    pub item: SwapLeg,
}
