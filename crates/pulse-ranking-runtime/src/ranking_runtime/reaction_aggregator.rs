//! Cross-channel merge of raw reaction records.

use std::collections::HashMap;

use pulse_slack::SlackMessage;

/// One reaction name merged across every message in the collection window.
///
/// `count` sums the platform-reported totals. `user_counts` tallies one per
/// appearance of a user id in a message's reaction sample; the platform may
/// truncate that sample below `count`, so these are occurrence counts over
/// the observed sample, not weighted totals.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedReaction {
    pub name: String,
    pub count: u64,
    pub user_counts: HashMap<String, u64>,
}

impl AggregatedReaction {
    /// Heaviest users of this reaction, ties broken by user id so the
    /// result is deterministic.
    pub fn ranked_fans(&self, limit: usize) -> Vec<(String, u64)> {
        let mut fans: Vec<(String, u64)> = self
            .user_counts
            .iter()
            .map(|(user_id, uses)| (user_id.clone(), *uses))
            .collect();
        fans.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0)));
        fans.truncate(limit);
        fans
    }
}

/// Merges every attached reaction into a name-keyed tally. Messages without
/// reactions contribute nothing. Per-name totals do not depend on message
/// order; the output lists each name in order of first appearance.
pub(super) fn aggregate_reactions(messages: &[SlackMessage]) -> Vec<AggregatedReaction> {
    let mut index_by_name: HashMap<String, usize> = HashMap::new();
    let mut aggregated: Vec<AggregatedReaction> = Vec::new();

    for message in messages {
        for reaction in message.reactions.as_deref().unwrap_or_default() {
            let index = match index_by_name.get(&reaction.name) {
                Some(index) => *index,
                None => {
                    index_by_name.insert(reaction.name.clone(), aggregated.len());
                    aggregated.push(AggregatedReaction {
                        name: reaction.name.clone(),
                        count: 0,
                        user_counts: HashMap::new(),
                    });
                    aggregated.len() - 1
                }
            };

            let entry = &mut aggregated[index];
            entry.count = entry.count.saturating_add(reaction.count);
            for user_id in &reaction.users {
                *entry.user_counts.entry(user_id.clone()).or_default() += 1;
            }
        }
    }

    aggregated
}
