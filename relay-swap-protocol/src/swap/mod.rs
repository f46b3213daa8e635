// Swap execution: the coordinator state machine and its shared handle

pub mod coordinator;
pub mod handle;
pub mod types;

pub use coordinator::SwapCoordinator;
pub use handle::CoordinatorHandle;
pub use types::{SwapError, SwapEvent, SwapRecord, SwapStatus};
