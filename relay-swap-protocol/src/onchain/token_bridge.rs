// In-memory fungible token with allowance-gated transfers (ERC-20 style)

use crate::data_structures::{AssetDescriptor, LegKind, Party};
use crate::onchain::interface::{AssetBridge, BridgeError, ReservationId};
use async_trait::async_trait;
use ethers::types::{Address, U256};
use ethers::utils::{format_units, parse_units, ConversionError};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct PendingTransfer {
    operator: Address,
    from: Party,
    to: Party,
    amount: U256,
}

#[derive(Debug, Default)]
struct TokenState {
    balances: HashMap<Party, U256>,
    // (owner, spender) -> remaining allowance
    allowances: HashMap<(Party, Address), U256>,
    total_supply: U256,
    pending: HashMap<ReservationId, PendingTransfer>,
    // Committed but not yet settled, kept so the transfer can be reverted
    committed: HashMap<ReservationId, PendingTransfer>,
    next_reservation: ReservationId,
}

#[derive(Debug)]
pub struct TokenBridge {
    address: Address,
    symbol: String,
    decimals: u32,
    state: Mutex<TokenState>,
}

impl TokenBridge {
    pub fn new(address: Address, symbol: impl Into<String>, decimals: u32) -> Self {
        TokenBridge {
            address,
            symbol: symbol.into(),
            decimals,
            state: Mutex::new(TokenState::default()),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// "1500" -> 1500 * 10^decimals
    pub fn parse_amount(&self, amount: &str) -> Result<U256, ConversionError> {
        Ok(parse_units(amount, self.decimals)?.into())
    }

    pub fn format_amount(&self, amount: U256) -> Result<String, ConversionError> {
        format_units(amount, self.decimals)
    }

    pub async fn mint(&self, to: Party, amount: U256) -> Result<(), BridgeError> {
        if to.is_zero() {
            return Err(BridgeError::ZeroAddress);
        }
        let mut state = self.state.lock().await;
        let total_supply = state.total_supply.checked_add(amount).ok_or(BridgeError::Overflow)?;
        // Every balance is bounded by the total supply
        let balance = state.balances.get(&to).copied().unwrap_or_default() + amount;
        state.balances.insert(to, balance);
        state.total_supply = total_supply;
        log::debug!("[TokenBridge {}] Minted {} to {:?}", self.symbol, amount, to);
        Ok(())
    }

    /// Grants `spender` the right to move up to `amount` of `owner`'s balance.
    pub async fn approve(&self, owner: Party, spender: Address, amount: U256) {
        let mut state = self.state.lock().await;
        state.allowances.insert((owner, spender), amount);
        log::debug!("[TokenBridge {}] {:?} approved {:?} for {}", self.symbol, owner, spender, amount);
    }

    pub async fn allowance(&self, owner: Party, spender: Address) -> U256 {
        let state = self.state.lock().await;
        state.allowances.get(&(owner, spender)).copied().unwrap_or_default()
    }

    pub async fn balance_of(&self, owner: Party) -> U256 {
        let state = self.state.lock().await;
        state.balances.get(&owner).copied().unwrap_or_default()
    }

    pub async fn total_supply(&self) -> U256 {
        self.state.lock().await.total_supply
    }

    pub async fn pending_reservations(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Committed transfers not yet settled or reverted.
    pub async fn unsettled_transfers(&self) -> usize {
        self.state.lock().await.committed.len()
    }
}

#[async_trait]
impl AssetBridge for TokenBridge {
    fn address(&self) -> Address {
        self.address
    }

    fn kind(&self) -> LegKind {
        LegKind::Fungible
    }

    async fn reserve(
        &self,
        operator: Address,
        from: Party,
        to: Party,
        asset: &AssetDescriptor,
    ) -> Result<ReservationId, BridgeError> {
        let amount = match asset {
            AssetDescriptor::Amount(amount) => *amount,
            other => return Err(BridgeError::UnsupportedAsset { bridge: self.address, kind: other.kind() }),
        };
        if amount.is_zero() {
            return Err(BridgeError::ZeroAmount);
        }
        if to.is_zero() {
            return Err(BridgeError::ZeroAddress);
        }

        let mut state = self.state.lock().await;
        let allowance = state.allowances.get(&(from, operator)).copied().unwrap_or_default();
        if allowance < amount {
            return Err(BridgeError::InsufficientAllowance { owner: from, operator, allowance, requested: amount });
        }
        let available = state.balances.get(&from).copied().unwrap_or_default();
        if available < amount {
            return Err(BridgeError::InsufficientBalance { owner: from, available, requested: amount });
        }

        // Checks passed: take the funds out of circulation until commit or release
        state.allowances.insert((from, operator), allowance - amount);
        state.balances.insert(from, available - amount);

        let id = state.next_reservation;
        state.next_reservation += 1;
        state.pending.insert(id, PendingTransfer { operator, from, to, amount });
        log::debug!("[TokenBridge {}] Reserved {} from {:?} to {:?} (reservation {})", self.symbol, amount, from, to, id);
        Ok(id)
    }

    async fn commit(&self, reservation: ReservationId) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;
        let transfer = state.pending.remove(&reservation).ok_or(BridgeError::UnknownReservation(reservation))?;
        *state.balances.entry(transfer.to).or_default() += transfer.amount;
        log::info!(
            "[TokenBridge {}] Transferred {} from {:?} to {:?}",
            self.symbol, transfer.amount, transfer.from, transfer.to
        );
        state.committed.insert(reservation, transfer);
        Ok(())
    }

    async fn release(&self, reservation: ReservationId) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;
        let transfer = state.pending.remove(&reservation).ok_or(BridgeError::UnknownReservation(reservation))?;
        *state.balances.entry(transfer.from).or_default() += transfer.amount;
        *state.allowances.entry((transfer.from, transfer.operator)).or_default() += transfer.amount;
        log::debug!("[TokenBridge {}] Released reservation {}", self.symbol, reservation);
        Ok(())
    }

    async fn revert(&self, reservation: ReservationId) -> Result<(), BridgeError> {
        let mut state = self.state.lock().await;
        let transfer = state.committed.get(&reservation).cloned().ok_or(BridgeError::UnknownReservation(reservation))?;
        let available = state.balances.get(&transfer.to).copied().unwrap_or_default();
        if available < transfer.amount {
            return Err(BridgeError::InsufficientBalance {
                owner: transfer.to,
                available,
                requested: transfer.amount,
            });
        }
        state.committed.remove(&reservation);
        state.balances.insert(transfer.to, available - transfer.amount);
        *state.balances.entry(transfer.from).or_default() += transfer.amount;
        *state.allowances.entry((transfer.from, transfer.operator)).or_default() += transfer.amount;
        log::warn!(
            "[TokenBridge {}] Reverted transfer of {} from {:?} to {:?}",
            self.symbol, transfer.amount, transfer.from, transfer.to
        );
        Ok(())
    }

    async fn settle(&self, reservation: ReservationId) {
        self.state.lock().await.committed.remove(&reservation);
    }
}
