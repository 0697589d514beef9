//! Per-run memoization of user and channel display names.

use std::collections::HashMap;
use std::sync::Mutex;

use pulse_slack::WorkspaceClient;

/// Fallback label cached for failed lookups, so a broken id is fetched at
/// most once per run.
pub(super) const UNKNOWN_LABEL: &str = "unknown";

/// Name cache scoped to one runtime invocation, never persisted. Shared by
/// the two ranking pipelines; the lock is never held across an await, so
/// concurrent misses may fetch twice and the later insert wins.
#[derive(Default)]
pub(super) struct LookupCache {
    user_names: Mutex<HashMap<String, String>>,
    channel_names: Mutex<HashMap<String, String>>,
}

impl LookupCache {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) async fn resolve_user_name(
        &self,
        client: &dyn WorkspaceClient,
        user_id: &str,
    ) -> String {
        if let Some(cached) = self
            .user_names
            .lock()
            .ok()
            .and_then(|names| names.get(user_id).cloned())
        {
            return cached;
        }

        let resolved = match client.fetch_user_name(user_id).await {
            Ok(name) => name,
            Err(error) => {
                tracing::warn!(user_id, %error, "caching unknown user after lookup failure");
                UNKNOWN_LABEL.to_string()
            }
        };
        if let Ok(mut names) = self.user_names.lock() {
            names.insert(user_id.to_string(), resolved.clone());
        }
        resolved
    }

    pub(super) async fn resolve_channel_name(
        &self,
        client: &dyn WorkspaceClient,
        channel_id: &str,
    ) -> String {
        if let Some(cached) = self
            .channel_names
            .lock()
            .ok()
            .and_then(|names| names.get(channel_id).cloned())
        {
            return cached;
        }

        let resolved = match client.fetch_channel_name(channel_id).await {
            Ok(name) => name,
            Err(error) => {
                tracing::warn!(channel_id, %error, "caching unknown channel after lookup failure");
                UNKNOWN_LABEL.to_string()
            }
        };
        if let Ok(mut names) = self.channel_names.lock() {
            names.insert(channel_id.to_string(), resolved.clone());
        }
        resolved
    }
}
