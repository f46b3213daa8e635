use crate::data_structures::{AssetDescriptor, LegKind, Party};
use async_trait::async_trait;
use ethers::types::{Address, U256};
use thiserror::Error;

// Handle to a pending transfer held by a bridge between reserve and commit/release
pub type ReservationId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("bridge {bridge:?} does not move {kind} assets")]
    UnsupportedAsset { bridge: Address, kind: LegKind },
    #[error("transfer amount must be non-zero")]
    ZeroAmount,
    #[error("transfer to the zero address")]
    ZeroAddress,
    #[error("insufficient balance for {owner:?}: has {available}, needs {requested}")]
    InsufficientBalance { owner: Party, available: U256, requested: U256 },
    #[error("operator {operator:?} allowance from {owner:?} is {allowance}, needs {requested}")]
    InsufficientAllowance { owner: Party, operator: Address, allowance: U256, requested: U256 },
    #[error("item #{0} does not exist")]
    NonexistentItem(U256),
    #[error("item #{item_id} is not owned by {claimed:?}")]
    NotOwner { item_id: U256, claimed: Party },
    #[error("operator {operator:?} is not approved for item #{item_id}")]
    NotApproved { item_id: U256, operator: Address },
    #[error("item #{0} is already reserved by another transfer")]
    ItemReserved(U256),
    #[error("unknown reservation {0}")]
    UnknownReservation(ReservationId),
    #[error("balance or supply would overflow")]
    Overflow,
}

/// Capability surface of an asset system the coordinator moves value through.
///
/// Transfers are two-phase so that two independent bridges can be driven
/// all-or-nothing: `reserve` performs every check and takes the asset out of
/// circulation, `release` undoes a reservation and `commit` delivers it.
///
/// A committed transfer stays revertible until it is settled, so a caller
/// whose other leg fails to commit can put this one back with `revert`.
#[async_trait]
pub trait AssetBridge: Send + Sync {
    /// Address the bridge is known by; swap legs name it.
    fn address(&self) -> Address;

    /// Kind of asset this bridge moves.
    fn kind(&self) -> LegKind;

    /// Checks `operator`'s authority and `from`'s holdings, then holds `asset`
    /// for a transfer to `to`.
    async fn reserve(
        &self,
        operator: Address,
        from: Party,
        to: Party,
        asset: &AssetDescriptor,
    ) -> Result<ReservationId, BridgeError>;

    async fn commit(&self, reservation: ReservationId) -> Result<(), BridgeError>;

    async fn release(&self, reservation: ReservationId) -> Result<(), BridgeError>;

    /// Undoes a committed, not yet settled transfer.
    async fn revert(&self, reservation: ReservationId) -> Result<(), BridgeError>;

    /// Makes a committed transfer final and forgets it.
    async fn settle(&self, reservation: ReservationId);
}
