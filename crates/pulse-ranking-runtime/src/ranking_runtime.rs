//! Batch runtime that collects workspace activity and posts leaderboards.
//!
//! One invocation drives a single collection pass and derives up to two
//! rankings from it: reaction usage and post engagement. Pipeline failures
//! are contained here and surfaced as a posted notice, never a crash.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};

use pulse_core::{current_unix_timestamp, lookback_oldest_unix, slack_oldest_param};
use pulse_slack::{ChannelInfo, SlackMessage, WorkspaceClient};

mod channel_collector;
mod engagement_log;
mod engagement_scorer;
mod lookup_cache;
mod reaction_aggregator;
mod render_helpers;
mod top_n_ranker;


pub use engagement_log::EngagementLogRecord;
pub use engagement_scorer::ScoredMessage;
pub use reaction_aggregator::AggregatedReaction;
pub use top_n_ranker::RankingSlot;

use engagement_log::EngagementCsvLog;
use engagement_scorer::ReplyStats;
use lookup_cache::{LookupCache, UNKNOWN_LABEL};
use render_helpers::RenderedReaction;

/// Scoring weights for the engagement ranking. Taken as-is: deployed weight
/// sets have summed to more than 1.0, so no normalization happens here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub users: f64,
    pub replies: f64,
    pub reactions: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            users: 0.5,
            replies: 0.3,
            reactions: 0.2,
        }
    }
}

#[derive(Clone)]
/// Runtime configuration for one ranking invocation.
pub struct RankingRuntimeConfig {
    pub client: Arc<dyn WorkspaceClient>,
    pub post_channel_id: String,
    pub rank_in_limit: usize,
    pub reaction_fan_limit: usize,
    pub channel_prefixes: Vec<String>,
    pub lookback_seconds: u64,
    pub page_delay: Duration,
    pub channel_delay: Duration,
    pub replies_page_limit: u64,
    pub score_weights: ScoreWeights,
    pub engagement_log_path: Option<PathBuf>,
}

/// Drives the collection, aggregation, scoring, and posting pipelines. All
/// state is scoped to one invocation; nothing persists between runs except
/// the optional CSV engagement log.
pub struct RankingRuntime {
    config: RankingRuntimeConfig,
    lookup_cache: LookupCache,
}

impl RankingRuntime {
    pub fn new(config: RankingRuntimeConfig) -> Self {
        Self {
            config,
            lookup_cache: LookupCache::new(),
        }
    }

    /// Collects the lookback window once and posts both leaderboards. The
    /// two pipelines run concurrently over the same immutable snapshot;
    /// each failure is contained and posted as a notice.
    pub async fn run_ranking(&self) -> Result<()> {
        let messages = match self.collect_window_messages().await {
            Ok(messages) => messages,
            Err(error) => {
                eprintln!("pulse activity collection failed: {error:#}");
                self.post_failure("activity collection", &error).await;
                return Ok(());
            }
        };
        println!(
            "pulse ranking cycle: collected {} messages from the lookback window",
            messages.len()
        );

        let (reaction_result, engagement_result) = tokio::join!(
            self.reaction_pipeline(&messages),
            self.engagement_pipeline(&messages),
        );
        if let Err(error) = reaction_result {
            eprintln!("pulse reaction ranking failed: {error:#}");
            self.post_failure("reaction ranking", &error).await;
        }
        if let Err(error) = engagement_result {
            eprintln!("pulse engagement ranking failed: {error:#}");
            self.post_failure("engagement ranking", &error).await;
        }
        Ok(())
    }

    /// One incremental collection tick: observes the short lookback window
    /// and appends a CSV row per parent post with any engagement.
    pub async fn run_collect_tick(&self) -> Result<()> {
        let Some(log_path) = self.config.engagement_log_path.as_deref() else {
            bail!("collect mode requires an engagement log path");
        };
        let log = EngagementCsvLog::open(log_path)?;

        let messages = match self.collect_window_messages().await {
            Ok(messages) => messages,
            Err(error) => {
                eprintln!("pulse collect tick failed: {error:#}");
                return Ok(());
            }
        };
        let parents: Vec<SlackMessage> = messages
            .into_iter()
            .filter(SlackMessage::is_parent)
            .collect();

        let mut recorded = 0_usize;
        for message in &parents {
            let Some(channel_id) = message.channel_id.as_deref() else {
                continue;
            };
            let reaction_count = message.reaction_total();
            let reply_stats = if message.reply_count.unwrap_or(0) > 0 {
                engagement_scorer::fetch_reply_stats(
                    self.config.client.as_ref(),
                    channel_id,
                    &message.ts,
                    self.config.replies_page_limit,
                )
                .await
            } else {
                ReplyStats::default()
            };
            if reaction_count == 0 && reply_stats.reply_count == 0 {
                continue;
            }

            log.append(&EngagementLogRecord {
                logged_at_unix: current_unix_timestamp(),
                message_ts: message.ts.clone(),
                channel_id: channel_id.to_string(),
                user_id: message.user.clone().unwrap_or_default(),
                reaction_count,
                reply_count: reply_stats.reply_count,
                unique_reply_user_count: reply_stats.unique_repliers,
            })?;
            recorded += 1;
        }
        println!(
            "pulse collect tick: parents={} recorded={}",
            parents.len(),
            recorded
        );
        Ok(())
    }

    /// Ranks from a previously collected CSV log instead of a fresh
    /// collection pass. A missing log is a skip, not a failure.
    pub async fn run_ranking_from_log(&self) -> Result<()> {
        let Some(log_path) = self.config.engagement_log_path.as_deref() else {
            bail!("rank-from-log mode requires an engagement log path");
        };
        if !log_path.exists() {
            println!(
                "pulse: engagement log {} not found, skipping ranking",
                log_path.display()
            );
            return Ok(());
        }

        if let Err(error) = self.rank_from_log_records(log_path).await {
            eprintln!("pulse engagement log ranking failed: {error:#}");
            self.post_failure("engagement log ranking", &error).await;
        }
        Ok(())
    }

    async fn collect_window_messages(&self) -> Result<Vec<SlackMessage>> {
        let channels = self.discover_channels().await?;
        println!("pulse ranking cycle: targeting {} channels", channels.len());

        let oldest = slack_oldest_param(lookback_oldest_unix(
            current_unix_timestamp(),
            self.config.lookback_seconds,
        ));
        Ok(channel_collector::collect_messages(
            self.config.client.as_ref(),
            &channels,
            &oldest,
            self.config.page_delay,
            self.config.channel_delay,
        )
        .await)
    }

    async fn discover_channels(&self) -> Result<Vec<ChannelInfo>> {
        let channels = self
            .config
            .client
            .list_channels()
            .await
            .context("failed to list workspace channels")?;
        Ok(channel_collector::filter_member_channels(
            channels,
            &self.config.channel_prefixes,
        ))
    }

    async fn reaction_pipeline(&self, messages: &[SlackMessage]) -> Result<()> {
        let aggregated = reaction_aggregator::aggregate_reactions(messages);
        let slots = top_n_ranker::rank_top_n(aggregated, self.config.rank_in_limit, |reaction| {
            reaction.count as f64
        });
        let rendered = self.resolve_reaction_slots(slots).await;
        let (text, blocks) = render_helpers::render_reaction_ranking(&rendered);
        self.config
            .client
            .post_message(&self.config.post_channel_id, &text, blocks)
            .await
            .context("failed to post reaction ranking")?;
        Ok(())
    }

    async fn engagement_pipeline(&self, messages: &[SlackMessage]) -> Result<()> {
        let parents: Vec<SlackMessage> = messages
            .iter()
            .filter(|message| message.is_parent())
            .cloned()
            .collect();
        let scored = engagement_scorer::score_messages(
            self.config.client.as_ref(),
            &self.lookup_cache,
            &parents,
            &self.config.score_weights,
            self.config.replies_page_limit,
        )
        .await;
        let slots = top_n_ranker::rank_top_n(scored, self.config.rank_in_limit, |message| {
            message.score
        });
        let (text, blocks) = render_helpers::render_engagement_ranking(&slots);
        self.config
            .client
            .post_message(&self.config.post_channel_id, &text, blocks)
            .await
            .context("failed to post engagement ranking")?;
        Ok(())
    }

    async fn rank_from_log_records(&self, log_path: &std::path::Path) -> Result<()> {
        let records = engagement_log::load_engagement_log(log_path)?;
        println!(
            "pulse ranking cycle: {} unique posts in the engagement log",
            records.len()
        );

        let scored = self.score_log_records(records).await;
        let slots = top_n_ranker::rank_top_n(scored, self.config.rank_in_limit, |message| {
            message.score
        });
        let (text, blocks) = render_helpers::render_engagement_ranking(&slots);
        self.config
            .client
            .post_message(&self.config.post_channel_id, &text, blocks)
            .await
            .context("failed to post engagement ranking")?;
        Ok(())
    }

    async fn score_log_records(&self, records: Vec<EngagementLogRecord>) -> Vec<ScoredMessage> {
        let client = self.config.client.as_ref();
        let weights = &self.config.score_weights;
        let mut scored = Vec::new();
        for record in records {
            let score = engagement_scorer::weighted_score(
                weights,
                record.unique_reply_user_count,
                record.reply_count,
                record.reaction_count,
            );
            if score <= 0.0 {
                continue;
            }

            let user_name = if record.user_id.is_empty() {
                UNKNOWN_LABEL.to_string()
            } else {
                self.lookup_cache
                    .resolve_user_name(client, &record.user_id)
                    .await
            };
            let channel_name = self
                .lookup_cache
                .resolve_channel_name(client, &record.channel_id)
                .await;
            let text = match client
                .fetch_single_message(&record.channel_id, &record.message_ts)
                .await
            {
                Ok(Some(message)) => message.text,
                Ok(None) => None,
                Err(error) => {
                    tracing::warn!(
                        channel_id = %record.channel_id,
                        ts = %record.message_ts,
                        %error,
                        "could not re-fetch logged message text"
                    );
                    None
                }
            };
            let permalink = match client
                .fetch_permalink(&record.channel_id, &record.message_ts)
                .await
            {
                Ok(permalink) => permalink,
                Err(error) => {
                    tracing::warn!(
                        channel_id = %record.channel_id,
                        ts = %record.message_ts,
                        %error,
                        "falling back to placeholder permalink"
                    );
                    UNKNOWN_LABEL.to_string()
                }
            };

            scored.push(ScoredMessage {
                score,
                message: SlackMessage {
                    ts: record.message_ts,
                    user: (!record.user_id.is_empty()).then(|| record.user_id.clone()),
                    text,
                    channel_id: Some(record.channel_id),
                    thread_ts: None,
                    reply_count: Some(record.reply_count),
                    reactions: None,
                },
                channel_name,
                user_name,
                permalink,
            });
        }
        scored
    }

    async fn resolve_reaction_slots(
        &self,
        slots: Vec<RankingSlot<AggregatedReaction>>,
    ) -> Vec<RankingSlot<RenderedReaction>> {
        let client = self.config.client.as_ref();
        let mut resolved = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                RankingSlot::Empty => resolved.push(RankingSlot::Empty),
                RankingSlot::Filled(reaction) => {
                    let mut fan_names = Vec::new();
                    for (user_id, _uses) in reaction.ranked_fans(self.config.reaction_fan_limit) {
                        let name = self.lookup_cache.resolve_user_name(client, &user_id).await;
                        // A fan whose name cannot be resolved is omitted
                        // rather than shown as the sentinel.
                        if name != UNKNOWN_LABEL {
                            fan_names.push(name);
                        }
                    }
                    resolved.push(RankingSlot::Filled(RenderedReaction {
                        name: reaction.name,
                        count: reaction.count,
                        fan_names,
                    }));
                }
            }
        }
        resolved
    }

    async fn post_failure(&self, stage: &str, error: &anyhow::Error) {
        let text = render_helpers::failure_text(stage, error);
        if let Err(post_error) = self
            .config
            .client
            .post_message(&self.config.post_channel_id, &text, None)
            .await
        {
            eprintln!("pulse could not post the {stage} failure notice: {post_error}");
        }
    }
}
