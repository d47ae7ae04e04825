use std::collections::HashMap;

use itertools::Itertools;

use crate::models::VoteEvent;

/// Most recent vote of every voter seen in one scan, by sequence number.
#[derive(Debug, Default)]
pub struct LatestVotes {
    by_voter: HashMap<String, VoteEvent>,
}

impl LatestVotes {
    /// Keeps `vote` unless a newer one is already known for its voter.
    /// Returns whether the entry changed.
    pub fn observe(&mut self, vote: VoteEvent) -> bool {
        match self.by_voter.get(&vote.voter) {
            Some(current) if current.seq_num >= vote.seq_num => false,
            _ => {
                self.by_voter.insert(vote.voter.clone(), vote);
                true
            }
        }
    }

    #[cfg(test)]
    pub fn get(&self, voter: &str) -> Option<&VoteEvent> {
        self.by_voter.get(voter)
    }

    pub fn len(&self) -> usize {
        self.by_voter.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_voter.is_empty()
    }

    /// Oldest vote first.
    pub fn into_sorted(self) -> Vec<VoteEvent> {
        self.by_voter
            .into_values()
            .sorted_by(|a, b| {
                a.block_time
                    .cmp(&b.block_time)
                    .then_with(|| a.seq_num.cmp(&b.seq_num))
            })
            .collect()
    }
}
