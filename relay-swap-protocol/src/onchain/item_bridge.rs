// In-memory registry of uniquely identified items with per-item and
// operator-wide approvals (ERC-721 style)

use crate::data_structures::{AssetDescriptor, LegKind, Party};
use crate::onchain::interface::{AssetBridge, BridgeError, ReservationId};
use async_trait::async_trait;
use ethers::types::{Address, U256};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct PendingTransfer {
    item_id: U256,
    from: Party,
    to: Party,
}

#[derive(Debug, Clone)]
struct CommittedTransfer {
    transfer: PendingTransfer,
    // Per-item approval cleared by the commit
    approval: Option<Address>,
}

#[derive(Debug)]
struct ItemState {
    owners: HashMap<U256, Party>,
    approvals: HashMap<U256, Address>,
    // (owner, operator) pairs allowed to move every item of the owner
    operators: HashSet<(Party, Address)>,
    next_item_id: U256,
    pending: HashMap<ReservationId, PendingTransfer>,
    committed: HashMap<ReservationId, CommittedTransfer>,
    reserved_items: HashSet<U256>,
    next_reservation: ReservationId,
}

impl Default for ItemState {
    fn default() -> Self {
        ItemState {
            owners: HashMap::new(),
            approvals: HashMap::new(),
            operators: HashSet::new(),
            next_item_id: U256::one(), // Item ids start at 1
            pending: HashMap::new(),
            committed: HashMap::new(),
            reserved_items: HashSet::new(),
            next_reservation: 0,
        }
    }
}

#[derive(Debug)]
pub struct ItemBridge {
    address: Address,
    name: String,
    state: Mutex<ItemState>,
}

impl ItemBridge {
    pub fn new(address: Address, name: impl Into<String>) -> Self {
        ItemBridge {
            address,
            name: name.into(),
            state: Mutex::new(ItemState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mints the next sequential item to `to` and returns its id.
    pub async fn mint(&self, to: Party) -> Result<U256, BridgeError> {
        if to.is_zero() {
            return Err(BridgeError::ZeroAddress);
        }
        let mut state = self.state.lock().await;
        let item_id = state.next_item_id;
        state.next_item_id = item_id + U256::one();
        state.owners.insert(item_id, to);
        log::debug!("[ItemBridge {}] Minted item #{} to {:?}", self.name, item_id, to);
        Ok(item_id)
    }

    /// Approves `operator` to move a single item. Only the current owner may approve.
    pub async fn approve(&self, owner: Party, operator: Address, item_id: U256) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;
        match state.owners.get(&item_id) {
            None => Err(BridgeError::NonexistentItem(item_id)),
            Some(current) if *current != owner => Err(BridgeError::NotOwner { item_id, claimed: owner }),
            Some(_) => {
                state.approvals.insert(item_id, operator);
                log::debug!("[ItemBridge {}] {:?} approved {:?} for item #{}", self.name, owner, operator, item_id);
                Ok(())
            }
        }
    }

    pub async fn set_approval_for_all(&self, owner: Party, operator: Address, approved: bool) {
        let mut state = self.state.lock().await;
        if approved {
            state.operators.insert((owner, operator));
        } else {
            state.operators.remove(&(owner, operator));
        }
    }

    pub async fn owner_of(&self, item_id: U256) -> Result<Party, BridgeError> {
        let state = self.state.lock().await;
        state.owners.get(&item_id).copied().ok_or(BridgeError::NonexistentItem(item_id))
    }

    pub async fn get_approved(&self, item_id: U256) -> Option<Address> {
        self.state.lock().await.approvals.get(&item_id).copied()
    }

    pub async fn pending_reservations(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn unsettled_transfers(&self) -> usize {
        self.state.lock().await.committed.len()
    }
}

#[async_trait]
impl AssetBridge for ItemBridge {
    fn address(&self) -> Address {
        self.address
    }

    fn kind(&self) -> LegKind {
        LegKind::Item
    }

    async fn reserve(
        &self,
        operator: Address,
        from: Party,
        to: Party,
        asset: &AssetDescriptor,
    ) -> Result<ReservationId, BridgeError> {
        let item_id = match asset {
            AssetDescriptor::Item(item_id) => *item_id,
            other => return Err(BridgeError::UnsupportedAsset { bridge: self.address, kind: other.kind() }),
        };
        if to.is_zero() {
            return Err(BridgeError::ZeroAddress);
        }

        let mut state = self.state.lock().await;
        let owner = state.owners.get(&item_id).copied().ok_or(BridgeError::NonexistentItem(item_id))?;
        if owner != from {
            return Err(BridgeError::NotOwner { item_id, claimed: from });
        }
        let authorized = operator == owner
            || state.approvals.get(&item_id) == Some(&operator)
            || state.operators.contains(&(owner, operator));
        if !authorized {
            return Err(BridgeError::NotApproved { item_id, operator });
        }
        if !state.reserved_items.insert(item_id) {
            return Err(BridgeError::ItemReserved(item_id));
        }

        let id = state.next_reservation;
        state.next_reservation += 1;
        state.pending.insert(id, PendingTransfer { item_id, from, to });
        log::debug!("[ItemBridge {}] Reserved item #{} from {:?} to {:?} (reservation {})", self.name, item_id, from, to, id);
        Ok(id)
    }

    async fn commit(&self, reservation: ReservationId) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;
        let transfer = state.pending.remove(&reservation).ok_or(BridgeError::UnknownReservation(reservation))?;
        state.reserved_items.remove(&transfer.item_id);
        state.owners.insert(transfer.item_id, transfer.to);
        // Per-item approval does not survive a change of owner
        let approval = state.approvals.remove(&transfer.item_id);
        log::info!(
            "[ItemBridge {}] Transferred item #{} from {:?} to {:?}",
            self.name, transfer.item_id, transfer.from, transfer.to
        );
        state.committed.insert(reservation, CommittedTransfer { transfer, approval });
        Ok(())
    }

    async fn release(&self, reservation: ReservationId) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;
        let transfer = state.pending.remove(&reservation).ok_or(BridgeError::UnknownReservation(reservation))?;
        state.reserved_items.remove(&transfer.item_id);
        log::debug!("[ItemBridge {}] Released reservation {}", self.name, reservation);
        Ok(())
    }

    async fn revert(&self, reservation: ReservationId) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;
        let committed = state.committed.get(&reservation).cloned().ok_or(BridgeError::UnknownReservation(reservation))?;
        let CommittedTransfer { transfer, approval } = committed;
        if state.owners.get(&transfer.item_id) != Some(&transfer.to) || state.reserved_items.contains(&transfer.item_id) {
            return Err(BridgeError::NotOwner { item_id: transfer.item_id, claimed: transfer.to });
        }
        state.committed.remove(&reservation);
        state.owners.insert(transfer.item_id, transfer.from);
        match approval {
            Some(operator) => state.approvals.insert(transfer.item_id, operator),
            None => state.approvals.remove(&transfer.item_id),
        };
        log::warn!(
            "[ItemBridge {}] Reverted transfer of item #{} back to {:?}",
            self.name, transfer.item_id, transfer.from
        );
        Ok(())
    }

    async fn settle(&self, reservation: ReservationId) {
        self.state.lock().await.committed.remove(&reservation);
    }
}
