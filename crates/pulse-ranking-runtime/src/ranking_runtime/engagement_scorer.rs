//! Weighted engagement scoring for parent posts.

use std::collections::HashSet;

use pulse_slack::{SlackMessage, WorkspaceClient};

use super::lookup_cache::{LookupCache, UNKNOWN_LABEL};
use super::ScoreWeights;

/// A parent post that earned a non-zero engagement score, with its display
/// fields already resolved.
#[derive(Debug, Clone)]
pub struct ScoredMessage {
    pub score: f64,
    pub message: SlackMessage,
    pub channel_name: String,
    pub user_name: String,
    pub permalink: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub(super) struct ReplyStats {
    pub(super) reply_count: u64,
    pub(super) unique_repliers: u64,
}

/// Fetches a thread's reply statistics. The replies endpoint re-returns the
/// parent as its first entry; it is dropped before counting. A fetch
/// failure degrades to zero stats so one noisy thread cannot sink the run.
pub(super) async fn fetch_reply_stats(
    client: &dyn WorkspaceClient,
    channel_id: &str,
    ts: &str,
    limit: u64,
) -> ReplyStats {
    match client.fetch_thread_replies(channel_id, ts, limit).await {
        Ok(messages) => {
            let replies = messages.get(1..).unwrap_or_default();
            let unique_repliers = replies
                .iter()
                .filter_map(|reply| reply.user.as_deref())
                .collect::<HashSet<_>>()
                .len() as u64;
            ReplyStats {
                reply_count: replies.len() as u64,
                unique_repliers,
            }
        }
        Err(error) => {
            tracing::warn!(
                channel_id,
                ts,
                %error,
                "treating thread as reply-less after fetch failure"
            );
            ReplyStats::default()
        }
    }
}

pub(super) fn weighted_score(
    weights: &ScoreWeights,
    unique_repliers: u64,
    reply_count: u64,
    reaction_total: u64,
) -> f64 {
    unique_repliers as f64 * weights.users
        + reply_count as f64 * weights.replies
        + reaction_total as f64 * weights.reactions
}

/// Scores parent messages. Posts scoring zero never become ranking
/// candidates; thread replies are excluded before this point.
pub(super) async fn score_messages(
    client: &dyn WorkspaceClient,
    cache: &LookupCache,
    parents: &[SlackMessage],
    weights: &ScoreWeights,
    replies_page_limit: u64,
) -> Vec<ScoredMessage> {
    let mut scored = Vec::new();
    for message in parents {
        let Some(channel_id) = message.channel_id.as_deref() else {
            continue;
        };

        let reaction_total = message.reaction_total();
        let reply_stats = if message.reply_count.unwrap_or(0) > 0 {
            fetch_reply_stats(client, channel_id, &message.ts, replies_page_limit).await
        } else {
            ReplyStats::default()
        };

        let score = weighted_score(
            weights,
            reply_stats.unique_repliers,
            reply_stats.reply_count,
            reaction_total,
        );
        if score <= 0.0 {
            continue;
        }

        let user_name = match message.user.as_deref() {
            Some(user_id) => cache.resolve_user_name(client, user_id).await,
            None => UNKNOWN_LABEL.to_string(),
        };
        let channel_name = cache.resolve_channel_name(client, channel_id).await;
        let permalink = match client.fetch_permalink(channel_id, &message.ts).await {
            Ok(permalink) => permalink,
            Err(error) => {
                tracing::warn!(
                    channel_id,
                    ts = %message.ts,
                    %error,
                    "falling back to placeholder permalink"
                );
                UNKNOWN_LABEL.to_string()
            }
        };

        scored.push(ScoredMessage {
            score,
            message: message.clone(),
            channel_name,
            user_name,
            permalink,
        });
    }
    scored
}
