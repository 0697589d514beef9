//! Channel discovery and paced history collection.

use std::time::Duration;

use pulse_slack::{ChannelInfo, HistoryPage, SlackMessage, WorkspaceClient};

/// Keeps channels the bot can actually read, optionally restricted to a set
/// of name prefixes. History fetches against non-member channels fail, so
/// they are dropped here.
pub(super) fn filter_member_channels(
    channels: Vec<ChannelInfo>,
    prefixes: &[String],
) -> Vec<ChannelInfo> {
    channels
        .into_iter()
        .filter(|channel| channel.is_member)
        .filter(|channel| {
            prefixes.is_empty()
                || prefixes
                    .iter()
                    .any(|prefix| channel.name.starts_with(prefix.as_str()))
        })
        .collect()
}

/// Fetches every history page for one channel, pausing `page_delay` before
/// each call. A failed call abandons the rest of the channel: the error is
/// logged and the pages gathered so far are returned, possibly none.
pub(super) async fn fetch_channel_pages(
    client: &dyn WorkspaceClient,
    channel_id: &str,
    oldest: &str,
    page_delay: Duration,
) -> Vec<HistoryPage> {
    let mut pages = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        tokio::time::sleep(page_delay).await;
        match client
            .fetch_history(channel_id, cursor.as_deref(), Some(oldest))
            .await
        {
            Ok(page) => {
                let next_cursor = page.next_cursor.clone();
                pages.push(page);
                match next_cursor {
                    Some(next) => cursor = Some(next),
                    None => return pages,
                }
            }
            Err(error) => {
                tracing::warn!(
                    channel_id,
                    %error,
                    "abandoning channel history after fetch failure"
                );
                return pages;
            }
        }
    }
}

/// Collects the lookback window across channels sequentially, pausing
/// `channel_delay` before each channel and stamping every message with its
/// source channel id. Output order is discovery order, then page order,
/// then platform-native message order; nothing is re-sorted here.
pub(super) async fn collect_messages(
    client: &dyn WorkspaceClient,
    channels: &[ChannelInfo],
    oldest: &str,
    page_delay: Duration,
    channel_delay: Duration,
) -> Vec<SlackMessage> {
    let mut collected = Vec::new();
    for channel in channels {
        tokio::time::sleep(channel_delay).await;
        tracing::debug!(channel = %channel.name, "collecting channel history");
        let pages = fetch_channel_pages(client, &channel.id, oldest, page_delay).await;
        for page in pages {
            for mut message in page.messages {
                message.channel_id = Some(channel.id.clone());
                collected.push(message);
            }
        }
    }
    collected
}
