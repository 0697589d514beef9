//! Typed Slack Web API client for the Pulse ranking pipelines.
//!
//! Exposes the `WorkspaceClient` trait consumed by the ranking runtime and a
//! reqwest-backed `SlackApiClient` implementation with bounded retry.

pub mod client;
pub mod retry;
pub mod types;

pub use client::SlackApiClient;
pub use types::{
    ChannelInfo, HistoryPage, PostedMessage, SlackApiError, SlackMessage, SlackReaction,
    WorkspaceClient,
};
