//! In-memory state store.
//!
//! Nothing survives the process. Useful for dry runs and tests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::State;
use crate::storage::StateStore;

/// State store holding the map behind a shared lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<State>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing state.
    pub fn with_state(state: State) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> State {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<State> {
        Ok(self.snapshot().await)
    }

    async fn save(&self, state: &State) -> Result<()> {
        *self.inner.write().await = state.clone();
        Ok(())
    }
}
