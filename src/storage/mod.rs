//! State persistence.
//!
//! The state store is the only thing that survives between runs: a map from
//! target URL to its last known [`StateRecord`](crate::models::StateRecord).
//! It is read once at the start of a run and rewritten once at the end.
//!
//! ```text
//! storage/
//! ├── config.toml     # Monitor configuration
//! ├── targets.json    # Target list
//! └── state.json      # Last known signatures
//! ```

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::State;

pub use local::LocalStateStore;
pub use memory::MemoryStateStore;

/// Persistence backend for the per-target state map.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the full state. A store that has never been written is empty.
    async fn load(&self) -> Result<State>;

    /// Replace the full state.
    async fn save(&self, state: &State) -> Result<()>;
}
