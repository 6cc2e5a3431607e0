//! Upsert client for the identity sync subsystem.
//!
//! This crate owns the downstream half of the sync flow: the [`UserUpserter`]
//! seam the reconciler dispatches through, the persisted [`UserRecord`]
//! shape, and [`UserSyncSink`], the concrete implementation that writes to
//! the user store's REST API.
//!
//! The sink carries a [`SyncContext`] (the store access token) that the host
//! sets after sign-in and clears on sign-out. Upserts attempted without a
//! context fail with a configuration error rather than silently succeeding,
//! so the identity stays retry-eligible upstream.

mod client;
mod error;

pub use client::UserStoreClient;
pub use error::{UserSyncError, UserSyncResult};

use async_trait::async_trait;
use auth_signal::Identity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

/// Authentication context required for user store writes.
#[derive(Clone)]
pub struct SyncContext {
    /// Access token for store API authentication.
    pub access_token: String,
}

/// The downstream persisted representation of an identity.
///
/// Created on the first successful upsert, overwritten on every subsequent
/// one (last write wins), never deleted by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Identity id this record mirrors.
    pub id: String,
    /// Email as of the last successful sync.
    pub email: Option<String>,
    /// Display name as of the last successful sync.
    pub name: Option<String>,
    /// When the record was last written by a sync.
    pub last_synced_at: DateTime<Utc>,
}

/// Trait for performing the create-or-update against the store.
///
/// Contract: idempotent at the storage layer keyed by `identity.id` — safe
/// to call more than once with the same id without creating duplicate
/// records. Any timeout policy lives behind this seam; callers only await.
#[async_trait]
pub trait UserUpserter: Send + Sync {
    /// Ensures a record for `identity` exists and is up to date.
    async fn upsert(&self, identity: &Identity) -> UserSyncResult<UserRecord>;
}

/// [`UserUpserter`] backed by the user store REST API.
///
/// # Thread Safety
///
/// The sink is shared across tasks; the sync context can be swapped at
/// runtime (e.g., after a token refresh) without recreating the sink.
pub struct UserSyncSink {
    client: UserStoreClient,
    context: RwLock<Option<SyncContext>>,
}

impl UserSyncSink {
    /// Create a new sink for the given store.
    ///
    /// # Arguments
    /// * `api_url` - The store's API URL
    /// * `anon_key` - The store's anonymous key
    pub fn new(api_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            client: UserStoreClient::new(api_url, anon_key),
            context: RwLock::new(None),
        }
    }

    /// Configures the sync context with authentication credentials.
    ///
    /// Must be called after user authentication before upserts will
    /// succeed.
    pub async fn set_context(&self, context: SyncContext) {
        let mut guard = self.context.write().await;
        *guard = Some(context);
        info!("user sync context set");
    }

    /// Removes the sync context.
    ///
    /// Call this on user logout to clear credentials. Upserts in flight may
    /// still complete with the old token.
    pub async fn clear_context(&self) {
        let mut guard = self.context.write().await;
        *guard = None;
        info!("user sync context cleared");
    }

    /// Returns true if a sync context has been set.
    pub async fn is_enabled(&self) -> bool {
        self.context.read().await.is_some()
    }
}

#[async_trait]
impl UserUpserter for UserSyncSink {
    async fn upsert(&self, identity: &Identity) -> UserSyncResult<UserRecord> {
        let context = {
            let guard = self.context.read().await;
            guard.clone()
        };
        let Some(context) = context else {
            return Err(UserSyncError::Config("sync context not set".to_string()));
        };
        self.client
            .upsert_user(identity, &context.access_token)
            .await
    }
}
