//! Leaderboard rendering: fallback text plus Block Kit payloads. Pure
//! formatting; every decision about what ranks happens upstream.

use serde_json::{json, Value};

use pulse_slack::retry::truncate_for_error;

use super::engagement_scorer::ScoredMessage;
use super::lookup_cache::UNKNOWN_LABEL;
use super::top_n_ranker::RankingSlot;

const EXCERPT_MAX_CHARS: usize = 80;

/// A reaction slot with its fan names already resolved, ready to render.
#[derive(Debug, Clone)]
pub(super) struct RenderedReaction {
    pub(super) name: String,
    pub(super) count: u64,
    pub(super) fan_names: Vec<String>,
}

/// Renders the reaction leaderboard. With no filled slots the result is a
/// plain "nothing ranked" message and no blocks; the post still happens.
pub(super) fn render_reaction_ranking(
    slots: &[RankingSlot<RenderedReaction>],
) -> (String, Option<Value>) {
    if slots.iter().all(|slot| slot.as_filled().is_none()) {
        return (
            "No reaction activity was recorded in this collection window.".to_string(),
            None,
        );
    }

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": {"type": "plain_text", "text": "Reaction usage ranking", "emoji": true}
        }),
        json!({"type": "divider"}),
    ];
    for (index, slot) in slots.iter().enumerate() {
        let rank = index + 1;
        let body = match slot.as_filled() {
            None => format!("*{rank}.* no entry"),
            Some(reaction) => {
                let mut line = format!("*{rank}.* :{}: (*{}* uses)", reaction.name, reaction.count);
                if let Some(fan) = reaction.fan_names.first() {
                    line.push_str(&format!("\n:point_right: *{fan}* uses it the most"));
                }
                line
            }
        };
        blocks.push(json!({"type": "section", "text": {"type": "mrkdwn", "text": body}}));
        blocks.push(json!({"type": "divider"}));
    }

    (
        "Reaction usage ranking".to_string(),
        Some(Value::Array(blocks)),
    )
}

/// Renders the engagement leaderboard.
pub(super) fn render_engagement_ranking(
    slots: &[RankingSlot<ScoredMessage>],
) -> (String, Option<Value>) {
    if slots.iter().all(|slot| slot.as_filled().is_none()) {
        return (
            "No posts picked up any engagement in this collection window.".to_string(),
            None,
        );
    }

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": {"type": "plain_text", "text": "Most engaging posts", "emoji": true}
        }),
        json!({"type": "divider"}),
    ];
    for (index, slot) in slots.iter().enumerate() {
        let rank = index + 1;
        let body = match slot.as_filled() {
            None => format!("*{rank}.* no entry"),
            Some(scored) => {
                let excerpt = excerpt_for_ranking(scored.message.text.as_deref(), EXCERPT_MAX_CHARS);
                let link_line = if scored.permalink == UNKNOWN_LABEL {
                    format!("*{excerpt}*")
                } else {
                    format!("*<{}|{}>*", scored.permalink, excerpt)
                };
                format!(
                    "*{rank}.* (score: {:.2})\n{link_line}\n:bust_in_silhouette: *{}* | :speech_balloon: #{}",
                    scored.score, scored.user_name, scored.channel_name
                )
            }
        };
        blocks.push(json!({"type": "section", "text": {"type": "mrkdwn", "text": body}}));
        blocks.push(json!({"type": "divider"}));
    }

    (
        "Most engaging posts".to_string(),
        Some(Value::Array(blocks)),
    )
}

pub(super) fn failure_text(stage: &str, error: &anyhow::Error) -> String {
    format!(
        "Pulse could not finish the {stage}: {}",
        truncate_for_error(&format!("{error:#}"), 600)
    )
}

/// Strips Slack link markup: `<url|label>` keeps the label, `<url>` keeps
/// the url. Unterminated brackets pass through unchanged.
pub(super) fn strip_slack_link_markup(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        output.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('>') {
            Some(end) => {
                let inner = &after[..end];
                match inner.split_once('|') {
                    Some((_, label)) => output.push_str(label),
                    None => output.push_str(inner),
                }
                rest = &after[end + 1..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    output
}

/// Single-line excerpt for a ranking entry: link markup stripped, newlines
/// flattened, truncated with an ellipsis when it runs long.
pub(super) fn excerpt_for_ranking(text: Option<&str>, max_chars: usize) -> String {
    let Some(text) = text.filter(|text| !text.trim().is_empty()) else {
        return "(message unavailable)".to_string();
    };
    let stripped = strip_slack_link_markup(text);
    let flattened = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    let mut truncated: String = flattened.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}
