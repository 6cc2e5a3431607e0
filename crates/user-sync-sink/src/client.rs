//! REST API client for the user store.
//!
//! Speaks a PostgREST-style dialect: upserts go to the `users` table as a
//! POST with `Prefer: resolution=merge-duplicates`, keyed on the `id`
//! column, so repeating the same upsert never creates duplicate rows.

use crate::error::{UserSyncError, UserSyncResult};
use crate::UserRecord;
use auth_signal::Identity;

/// REST API client for user record upserts.
#[derive(Clone)]
pub struct UserStoreClient {
    http_client: reqwest::Client,
    api_url: String,
    anon_key: String,
}

impl UserStoreClient {
    /// Create a new user store client.
    ///
    /// # Arguments
    /// * `api_url` - The store's API URL (e.g., `https://xyz.example.co`)
    /// * `anon_key` - The store's anonymous API key
    pub fn new(api_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.into(),
            anon_key: anon_key.into(),
        }
    }

    /// Build the REST API URL for a table.
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    /// Create or update the user record for an identity.
    ///
    /// Idempotent at the storage layer keyed by `identity.id`: conflicting
    /// rows are merged, last write wins. Returns the stored representation.
    ///
    /// # Arguments
    /// * `identity` - The identity whose record should exist downstream
    /// * `access_token` - Access token for store authentication
    pub async fn upsert_user(
        &self,
        identity: &Identity,
        access_token: &str,
    ) -> UserSyncResult<UserRecord> {
        let url = format!("{}?on_conflict=id", self.rest_url("users"));
        let now = chrono::Utc::now().to_rfc3339();

        let mut body = serde_json::json!({
            "id": identity.id,
            "last_synced_at": now,
        });
        if let Some(email) = &identity.primary_email {
            body["email"] = serde_json::json!(email);
        }
        if let Some(name) = &identity.display_name {
            body["name"] = serde_json::json!(name);
        }

        tracing::debug!(identity_id = %identity.id, "upserting user record");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Content-Type", "application/json")
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "user record upsert rejected");
            return Err(UserSyncError::Api {
                status: status.as_u16(),
                message,
            });
        }

        // return=representation yields the affected rows as a JSON array.
        let records: Vec<UserRecord> = response.json().await?;
        records.into_iter().next().ok_or_else(|| UserSyncError::Api {
            status: status.as_u16(),
            message: "upsert returned an empty representation".to_string(),
        })
    }
}
