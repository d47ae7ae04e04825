use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::models::VoteEvent;

/// What to do when a vote's sequence number is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Keep the stored row and carry on.
    Goon,
    /// Stop the scan at the first duplicate.
    Term,
    /// Ask the operator for every duplicate.
    Query,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "goon" => Ok(Self::Goon),
            "term" => Ok(Self::Term),
            "query" => Ok(Self::Query),
            other => Err(format!(
                "unknown duplicate policy `{other}`, expected goon/term/query"
            )),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Goon => "goon",
            Self::Term => "term",
            Self::Query => "query",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Overwrite,
    Keep,
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptAnswer {
    OverwriteOnce,
    IgnoreOnce,
    TerminateAll,
    GoonAll,
}

pub trait DuplicatePrompt: Send {
    fn ask(&mut self, vote: &VoteEvent) -> Result<PromptAnswer>;
}

/// Interactive prompt on the controlling terminal.
pub struct TerminalPrompt;

const CHOICES: [(&str, PromptAnswer); 4] = [
    ("overwrite this time (o)", PromptAnswer::OverwriteOnce),
    ("ignore this time (i)", PromptAnswer::IgnoreOnce),
    ("terminate for all (t)", PromptAnswer::TerminateAll),
    ("goon for all (g)", PromptAnswer::GoonAll),
];

impl DuplicatePrompt for TerminalPrompt {
    fn ask(&mut self, vote: &VoteEvent) -> Result<PromptAnswer> {
        let items: Vec<_> = CHOICES.iter().map(|(label, _)| *label).collect();
        let selected = tokio::task::block_in_place(|| {
            dialoguer::Select::new()
                .with_prompt(format!(
                    "found duplicated vote @ SeqNum {} (block {})",
                    vote.seq_num, vote.block_num
                ))
                .items(&items)
                .default(1)
                .interact()
        })
        .context("Failed to read duplicate reaction")?;
        Ok(CHOICES[selected].1)
    }
}

/// Applies a [`DuplicatePolicy`], remembering sticky answers of the prompt.
pub struct DuplicateResolver {
    policy: DuplicatePolicy,
    prompt: Box<dyn DuplicatePrompt>,
    sticky: Option<Resolution>,
}

impl DuplicateResolver {
    pub fn new(policy: DuplicatePolicy, prompt: Box<dyn DuplicatePrompt>) -> Self {
        Self {
            policy,
            prompt,
            sticky: None,
        }
    }

    pub fn resolve(&mut self, vote: &VoteEvent) -> Result<Resolution> {
        match self.policy {
            DuplicatePolicy::Goon => Ok(Resolution::Keep),
            DuplicatePolicy::Term => Ok(Resolution::Terminate),
            DuplicatePolicy::Query => {
                if let Some(resolution) = self.sticky {
                    return Ok(resolution);
                }
                Ok(match self.prompt.ask(vote)? {
                    PromptAnswer::OverwriteOnce => Resolution::Overwrite,
                    PromptAnswer::IgnoreOnce => Resolution::Keep,
                    PromptAnswer::TerminateAll => {
                        self.sticky = Some(Resolution::Terminate);
                        Resolution::Terminate
                    }
                    PromptAnswer::GoonAll => {
                        self.sticky = Some(Resolution::Keep);
                        Resolution::Keep
                    }
                })
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::fakes::ScriptedPrompt;
    use super::*;

    fn vote(seq_num: u64) -> VoteEvent {
        VoteEvent {
            seq_num,
            block_num: 1,
            quantity: 1,
            block_time: NaiveDate::from_ymd_opt(2018, 7, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            voter: "alice".to_string(),
            bp_name: "jiqix".to_string(),
            symbol: "EOS".to_string(),
        }
    }

    #[test]
    fn parses_policy_names() {
        assert_eq!("goon".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::Goon));
        assert_eq!("term".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::Term));
        assert_eq!("query".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::Query));
        assert!("ask".parse::<DuplicatePolicy>().is_err());
    }

    #[test]
    fn batch_policies_never_prompt() {
        let prompt = ScriptedPrompt::default();
        let mut goon = DuplicateResolver::new(DuplicatePolicy::Goon, Box::new(prompt.clone()));
        let mut term = DuplicateResolver::new(DuplicatePolicy::Term, Box::new(prompt.clone()));

        assert_eq!(goon.resolve(&vote(1)).unwrap(), Resolution::Keep);
        assert_eq!(term.resolve(&vote(1)).unwrap(), Resolution::Terminate);
        assert!(prompt.asked.lock().is_empty());
    }

    #[test]
    fn one_shot_answers_are_asked_again() {
        let prompt =
            ScriptedPrompt::new([PromptAnswer::OverwriteOnce, PromptAnswer::IgnoreOnce]);
        let mut resolver =
            DuplicateResolver::new(DuplicatePolicy::Query, Box::new(prompt.clone()));

        assert_eq!(resolver.resolve(&vote(1)).unwrap(), Resolution::Overwrite);
        assert_eq!(resolver.resolve(&vote(2)).unwrap(), Resolution::Keep);
        assert_eq!(*prompt.asked.lock(), vec![1, 2]);
    }

    #[test]
    fn goon_for_all_is_sticky() {
        let prompt = ScriptedPrompt::new([PromptAnswer::GoonAll]);
        let mut resolver =
            DuplicateResolver::new(DuplicatePolicy::Query, Box::new(prompt.clone()));

        for seq_num in 1..=3 {
            assert_eq!(resolver.resolve(&vote(seq_num)).unwrap(), Resolution::Keep);
        }
        assert_eq!(*prompt.asked.lock(), vec![1]);
    }
}
