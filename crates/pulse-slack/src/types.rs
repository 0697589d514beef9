//! Shared Slack Web API types used across Pulse components.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One conversation the bot discovered while listing the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub is_member: bool,
}

/// A single reaction record attached to a history message. `count` is the
/// platform-reported total; `users` is a possibly truncated sample of the
/// user ids that applied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackReaction {
    pub name: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub users: Vec<String>,
}

/// A raw history message. `channel_id` is not part of the history payload;
/// the collector stamps it after fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackMessage {
    pub ts: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub reply_count: Option<u64>,
    #[serde(default)]
    pub reactions: Option<Vec<SlackReaction>>,
}

impl SlackMessage {
    /// True for posts that start (or have no) thread. Replies inside a
    /// thread carry a `thread_ts` different from their own `ts`.
    pub fn is_parent(&self) -> bool {
        match self.thread_ts.as_deref() {
            None => true,
            Some(thread_ts) => thread_ts == self.ts,
        }
    }

    /// Total reaction uses on this message as reported by the platform.
    pub fn reaction_total(&self) -> u64 {
        self.reactions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|reaction| reaction.count)
            .sum()
    }
}

/// One paginated slice of channel history. `next_cursor` chains pages until
/// absent.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub messages: Vec<SlackMessage>,
    pub next_cursor: Option<String>,
}

/// Identifies a message created through `chat.postMessage`.
#[derive(Debug, Clone)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

#[derive(Debug, Error)]
/// Enumerates supported `SlackApiError` values.
pub enum SlackApiError {
    #[error("missing bot token")]
    MissingBotToken,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("slack api {operation} failed with status {status}: {body}")]
    HttpStatus {
        operation: String,
        status: u16,
        body: String,
    },
    #[error("slack api {operation} failed: {error}")]
    Api { operation: String, error: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
/// Trait contract for the workspace API surface the ranking pipelines
/// consume. Implemented by `SlackApiClient` and by scripted test doubles.
pub trait WorkspaceClient: Send + Sync {
    /// Lists public and private channels, following pagination to the end.
    async fn list_channels(&self) -> Result<Vec<ChannelInfo>, SlackApiError>;

    /// Fetches one history page for a channel. `oldest` bounds the window;
    /// `cursor` continues a previous page.
    async fn fetch_history(
        &self,
        channel_id: &str,
        cursor: Option<&str>,
        oldest: Option<&str>,
    ) -> Result<HistoryPage, SlackApiError>;

    /// Fetches the single message at `ts`, when it still exists.
    async fn fetch_single_message(
        &self,
        channel_id: &str,
        ts: &str,
    ) -> Result<Option<SlackMessage>, SlackApiError>;

    /// Fetches a thread's messages. The platform re-returns the parent as
    /// the first entry; callers drop it.
    async fn fetch_thread_replies(
        &self,
        channel_id: &str,
        ts: &str,
        limit: u64,
    ) -> Result<Vec<SlackMessage>, SlackApiError>;

    async fn fetch_user_name(&self, user_id: &str) -> Result<String, SlackApiError>;

    async fn fetch_channel_name(&self, channel_id: &str) -> Result<String, SlackApiError>;

    async fn fetch_permalink(&self, channel_id: &str, ts: &str) -> Result<String, SlackApiError>;

    /// Posts a message, optionally with Block Kit blocks alongside the
    /// fallback text.
    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        blocks: Option<Value>,
    ) -> Result<PostedMessage, SlackApiError>;
}
