//! Rate limit state repository
//!
//! Holds the singleton `RateLimitState` behind one lock so every mutation
//! is an atomic read-compute-write step; the rate limiter in the core crate
//! builds its gate logic on top of `mutate`.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::models::RateLimitState;
use crate::store::BlobStore;

const BLOB_KEY: &str = "rate_limit";

/// Rate limit state repository
pub struct RateLimitRepository {
    store: Arc<dyn BlobStore>,
    state: RwLock<RateLimitState>,
}

impl RateLimitRepository {
    /// Load state from storage, overriding the ceiling with the configured
    /// `max_per_hour`; missing or corrupt state falls back to defaults
    pub async fn load(store: Arc<dyn BlobStore>, max_per_hour: u32) -> Self {
        let mut state = match store.load(BLOB_KEY).await {
            Ok(Some(blob)) => match serde_json::from_str::<RateLimitState>(&blob) {
                Ok(state) => state,
                Err(e) => {
                    warn!("Corrupt rate limit blob, using defaults: {}", e);
                    RateLimitState::default()
                }
            },
            Ok(None) => RateLimitState::default(),
            Err(e) => {
                warn!("Failed to load rate limit state, using defaults: {}", e);
                RateLimitState::default()
            }
        };
        // Configuration is the source of truth for the ceiling
        state.max_per_hour = max_per_hour;

        Self {
            store,
            state: RwLock::new(state),
        }
    }

    async fn persist(&self, state: &RateLimitState) {
        let blob = match serde_json::to_string(state) {
            Ok(blob) => blob,
            Err(e) => {
                warn!("Failed to serialize rate limit state: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.save(BLOB_KEY, &blob).await {
            warn!("Rate limit state not persisted, continuing in memory: {}", e);
        }
    }

    /// Read-only snapshot of the current state
    pub async fn snapshot(&self) -> RateLimitState {
        self.state.read().await.clone()
    }

    /// Apply one atomic read-compute-write step and persist the result
    pub async fn mutate<R>(&self, f: impl FnOnce(&mut RateLimitState) -> R) -> R {
        let mut state = self.state.write().await;
        let result = f(&mut state);
        self.persist(&state).await;
        result
    }
}
