// Re-export relevant types for easier use
pub use interface::{AssetBridge, BridgeError, ReservationId};
pub use item_bridge::ItemBridge;
pub use token_bridge::TokenBridge;

// Asset bridges the coordinator moves value through

pub mod interface;
pub mod item_bridge; // ERC-721 style unique items
pub mod token_bridge; // ERC-20 style balances
