//! Workspace activity ranking runtime for Pulse.
//!
//! Collects channel history over a trailing window, aggregates reaction
//! usage, scores post engagement, and posts fixed-size leaderboards.

pub mod ranking_runtime;

pub use ranking_runtime::{
    AggregatedReaction, EngagementLogRecord, RankingRuntime, RankingRuntimeConfig, RankingSlot,
    ScoreWeights, ScoredMessage,
};
