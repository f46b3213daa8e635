//! Relayer-executed atomic swaps of a fungible balance against a unique item.
//!
//! Two parties each sign an EIP-712 authorization off-chain; any relayer
//! submits the pair to a [`swap::SwapCoordinator`], which either moves both
//! assets or neither.

pub mod authorization;
pub mod clock;
pub mod config;
pub mod data_structures;
pub mod ledger;
pub mod onchain;
pub mod swap;

pub mod test_utils; // Shared fixtures for unit and integration tests
