// Per-party replay protection

pub mod nonce_ledger;

pub use nonce_ledger::{InMemoryNonceLedger, LedgerError, NonceStore};
