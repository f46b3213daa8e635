use crate::data_structures::Party;
use ethers::types::U256;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("nonce mismatch for {party:?}: expected {expected}, presented {presented}")]
    NonceMismatch { party: Party, expected: U256, presented: U256 },
    #[error("cannot rewind {party:?} to {to}: current nonce is {current}")]
    InvalidRewind { party: Party, to: U256, current: U256 },
    #[error("nonce space exhausted for {0:?}")]
    Exhausted(Party),
}

// Trait defining the nonce storage the coordinator expects
pub trait NonceStore: Send + Sync {
    // Next nonce the party must present. 0 for a party never seen before.
    fn current(&self, party: &Party) -> U256;

    // Advance by exactly one if `presented` equals the current nonce.
    // On mismatch the store is left untouched.
    fn consume(&mut self, party: &Party, presented: U256) -> Result<(), LedgerError>;

    // Undo a consumption made earlier in the same swap attempt. Only valid when
    // the current nonce is exactly `to + 1`.
    fn rewind(&mut self, party: &Party, to: U256) -> Result<(), LedgerError>;
}

// In-memory nonce ledger
#[derive(Debug, Clone, Default)]
pub struct InMemoryNonceLedger {
    nonces: HashMap<Party, U256>,
}

impl InMemoryNonceLedger {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.nonces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nonces.is_empty()
    }
}

impl NonceStore for InMemoryNonceLedger {
    fn current(&self, party: &Party) -> U256 {
        self.nonces.get(party).copied().unwrap_or_default()
    }

    fn consume(&mut self, party: &Party, presented: U256) -> Result<(), LedgerError> {
        let expected = self.current(party);
        if presented != expected {
            return Err(LedgerError::NonceMismatch { party: *party, expected, presented });
        }
        let next = expected.checked_add(U256::one()).ok_or(LedgerError::Exhausted(*party))?;
        self.nonces.insert(*party, next);
        Ok(())
    }

    fn rewind(&mut self, party: &Party, to: U256) -> Result<(), LedgerError> {
        let current = self.current(party);
        if to.checked_add(U256::one()) != Some(current) {
            return Err(LedgerError::InvalidRewind { party: *party, to, current });
        }
        if to.is_zero() {
            self.nonces.remove(party);
        } else {
            self.nonces.insert(*party, to);
        }
        Ok(())
    }
}
