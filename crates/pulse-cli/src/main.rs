//! Pulse CLI: collects Slack workspace activity and posts leaderboards.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use pulse_ranking_runtime::{RankingRuntime, RankingRuntimeConfig, ScoreWeights};
use pulse_slack::{SlackApiClient, WorkspaceClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliRunMode {
    /// Collect the lookback window and post both leaderboards.
    Rank,
    /// Append one engagement observation tick to the CSV log.
    Collect,
    /// Rank from a previously collected CSV engagement log.
    RankFromLog,
}

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_score_weight(value: &str) -> Result<f64, String> {
    let parsed = value
        .parse::<f64>()
        .map_err(|error| format!("failed to parse float: {error}"))?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err("value must be a finite number of at least 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "pulse",
    about = "Slack workspace activity leaderboards",
    version
)]
struct Cli {
    #[arg(
        long,
        env = "PULSE_SLACK_BOT_TOKEN",
        help = "Slack bot token used for Web API calls"
    )]
    bot_token: String,

    #[arg(
        long,
        env = "PULSE_API_BASE",
        default_value = "https://slack.com/api",
        help = "Slack Web API base URL"
    )]
    api_base: String,

    #[arg(
        long,
        env = "PULSE_POST_CHANNEL_ID",
        help = "Channel that receives the leaderboards"
    )]
    post_channel_id: String,

    #[arg(
        long,
        env = "PULSE_MODE",
        value_enum,
        default_value_t = CliRunMode::Rank,
        help = "What this invocation does"
    )]
    mode: CliRunMode,

    #[arg(
        long,
        env = "PULSE_RANK_IN_LIMIT",
        default_value_t = 5,
        value_parser = parse_positive_usize,
        help = "Number of leaderboard slots; short results are padded with explicit empty slots"
    )]
    rank_in_limit: usize,

    #[arg(
        long,
        env = "PULSE_REACTION_FAN_LIMIT",
        default_value_t = 1,
        value_parser = parse_positive_usize,
        help = "How many top fans to name per ranked reaction"
    )]
    reaction_fan_limit: usize,

    #[arg(
        long,
        env = "PULSE_LOOKBACK_DAYS",
        default_value_t = 7,
        value_parser = parse_positive_u64,
        help = "Trailing collection window for ranking runs, in days"
    )]
    lookback_days: u64,

    #[arg(
        long,
        env = "PULSE_COLLECT_LOOKBACK_MINUTES",
        default_value_t = 60,
        value_parser = parse_positive_u64,
        help = "Trailing collection window for collect ticks, in minutes"
    )]
    collect_lookback_minutes: u64,

    #[arg(
        long,
        env = "PULSE_PAGE_DELAY_MS",
        default_value_t = 1_000,
        help = "Pacing delay before each history page fetch"
    )]
    page_delay_ms: u64,

    #[arg(
        long,
        env = "PULSE_CHANNEL_DELAY_MS",
        default_value_t = 10_000,
        help = "Pacing delay before each channel's collection"
    )]
    channel_delay_ms: u64,

    #[arg(
        long,
        env = "PULSE_REPLIES_PAGE_LIMIT",
        default_value_t = 1_000,
        value_parser = parse_positive_u64,
        help = "Page size cap when fetching thread replies"
    )]
    replies_page_limit: u64,

    #[arg(
        long,
        env = "PULSE_SCORE_WEIGHT_USERS",
        default_value_t = 0.5,
        value_parser = parse_score_weight,
        help = "Engagement weight for distinct repliers. Weight sets are used as-is and are not required to sum to 1.0"
    )]
    score_weight_users: f64,

    #[arg(
        long,
        env = "PULSE_SCORE_WEIGHT_REPLIES",
        default_value_t = 0.3,
        value_parser = parse_score_weight,
        help = "Engagement weight for reply count"
    )]
    score_weight_replies: f64,

    #[arg(
        long,
        env = "PULSE_SCORE_WEIGHT_REACTIONS",
        default_value_t = 0.2,
        value_parser = parse_score_weight,
        help = "Engagement weight for total reactions"
    )]
    score_weight_reactions: f64,

    #[arg(
        long = "channel-prefix",
        env = "PULSE_CHANNEL_PREFIXES",
        value_delimiter = ',',
        help = "Restrict collection to channels whose name starts with one of these prefixes"
    )]
    channel_prefixes: Vec<String>,

    #[arg(
        long,
        env = "PULSE_ENGAGEMENT_LOG",
        help = "CSV engagement log path used by the collect and rank-from-log modes"
    )]
    engagement_log: Option<PathBuf>,

    #[arg(
        long,
        env = "PULSE_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Per-request timeout for Slack Web API calls"
    )]
    request_timeout_ms: u64,

    #[arg(
        long,
        env = "PULSE_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Attempts per Slack Web API call before giving up"
    )]
    retry_max_attempts: usize,

    #[arg(
        long,
        env = "PULSE_RETRY_BASE_DELAY_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Base backoff delay for retried Slack Web API calls"
    )]
    retry_base_delay_ms: u64,
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn lookback_seconds_for_mode(cli: &Cli) -> u64 {
    match cli.mode {
        CliRunMode::Collect => cli.collect_lookback_minutes.saturating_mul(60),
        CliRunMode::Rank | CliRunMode::RankFromLog => cli.lookback_days.saturating_mul(86_400),
    }
}

fn runtime_config_from_cli(cli: &Cli, client: Arc<dyn WorkspaceClient>) -> RankingRuntimeConfig {
    RankingRuntimeConfig {
        client,
        post_channel_id: cli.post_channel_id.clone(),
        rank_in_limit: cli.rank_in_limit,
        reaction_fan_limit: cli.reaction_fan_limit,
        channel_prefixes: cli.channel_prefixes.clone(),
        lookback_seconds: lookback_seconds_for_mode(cli),
        page_delay: Duration::from_millis(cli.page_delay_ms),
        channel_delay: Duration::from_millis(cli.channel_delay_ms),
        replies_page_limit: cli.replies_page_limit,
        score_weights: ScoreWeights {
            users: cli.score_weight_users,
            replies: cli.score_weight_replies,
            reactions: cli.score_weight_reactions,
        },
        engagement_log_path: cli.engagement_log.clone(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let client = SlackApiClient::new(
        cli.api_base.clone(),
        cli.bot_token.clone(),
        cli.request_timeout_ms,
        cli.retry_max_attempts,
        cli.retry_base_delay_ms,
    )
    .context("failed to create slack api client")?;

    let runtime = RankingRuntime::new(runtime_config_from_cli(&cli, Arc::new(client)));
    match cli.mode {
        CliRunMode::Rank => runtime.run_ranking().await,
        CliRunMode::Collect => runtime.run_collect_tick().await,
        CliRunMode::RankFromLog => runtime.run_ranking_from_log().await,
    }
}
