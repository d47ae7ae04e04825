use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};

use crate::api::{ActionEntry, ChainApi, VoteArgs};
use crate::asset::{parse_quantity, Asset};
use crate::error::ScanError;
use crate::models::VoteEvent;
use crate::pagination::{ActionLog, Paginator};
use crate::settings;
use crate::sqlx_client::SqlxClient;

pub use self::policy::{
    DuplicatePolicy, DuplicatePrompt, DuplicateResolver, PromptAnswer, Resolution, TerminalPrompt,
};
pub use self::tracker::LatestVotes;

mod policy;
mod tracker;

/// Format of the `--begin-time`/`--end-time` flags.
pub const BOUND_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Format of `block_time` in action traces, optionally with fractions.
const BLOCK_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Actions a producer account routinely receives that carry no vote.
const IGNORED_ACTIONS: [&str; 5] = ["newaccount", "claim", "unfreeze", "transfer", "updatebp"];
const VOTE_ACTION: &str = "vote";

#[derive(Debug, Clone)]
pub struct ScanBounds {
    /// First position to read; positions advance by the page size.
    pub from_pos: u64,
    /// Stop at the first action below this block. `0` disables the bound.
    pub begin_num: u64,
    /// Stop at the first action older than this.
    pub begin_time: NaiveDateTime,
    /// Skip actions newer than this.
    pub end_time: NaiveDateTime,
}

impl Default for ScanBounds {
    fn default() -> Self {
        Self {
            from_pos: 0,
            begin_num: 0,
            begin_time: midnight(2018, 6, 1),
            end_time: midnight(2200, 1, 1),
        }
    }
}

fn midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

pub fn parse_bound(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, BOUND_TIME_FORMAT)
        .with_context(|| format!("`{value}` invalid, should be like '2006-01-02 15:04:05'"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The log ran out of actions.
    Exhausted,
    /// A block number or time lower bound was crossed.
    BoundReached,
    /// The duplicate policy asked to stop.
    TerminatedOnDuplicate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub pages: usize,
    pub recorded: usize,
    pub duplicates_kept: usize,
    pub skipped: usize,
}

#[derive(Debug)]
pub struct ScanReport {
    pub outcome: ScanOutcome,
    pub stats: ScanStats,
    /// Latest vote of every voter, oldest first.
    pub votes: Vec<VoteEvent>,
}

enum Step {
    Continue,
    Stop(ScanOutcome),
}

pub struct VoteIndexer {
    config: settings::Config,
    api: Arc<dyn ChainApi>,
    sqlx_client: Option<SqlxClient>,
    resolver: DuplicateResolver,
}

impl VoteIndexer {
    /// Without a store, votes are only reported, never persisted.
    pub fn new(
        config: settings::Config,
        api: Arc<dyn ChainApi>,
        sqlx_client: Option<SqlxClient>,
        resolver: DuplicateResolver,
    ) -> Self {
        Self {
            config,
            api,
            sqlx_client,
            resolver,
        }
    }

    /// Reads the action history of `bp` and reconstructs each voter's latest
    /// vote for it.
    pub async fn scan(&mut self, bp: &str, bounds: &ScanBounds) -> Result<ScanReport> {
        let api = self.api.clone();
        let log = ActionLog {
            api: api.as_ref(),
            account: bp.to_string(),
            offset: self.config.action_page_size,
        };
        let mut pages = Paginator::new(log, bounds.from_pos, self.config.request_retry());
        let mut latest = LatestVotes::default();
        let mut stats = ScanStats::default();
        // get_actions windows are inclusive, so neighbouring pages share an action.
        let mut seen = HashSet::new();

        let outcome = 'pages: loop {
            let actions = match pages.next_page().await? {
                Some(actions) => actions,
                None => break ScanOutcome::Exhausted,
            };
            for action in &actions {
                let seq_num = action.global_action_seq;
                if !seen.insert(seq_num) {
                    tracing::debug!("action #{seq_num} already read in this scan");
                    continue;
                }
                if let Step::Stop(outcome) =
                    self.process(action, bounds, &mut latest, &mut stats).await?
                {
                    break 'pages outcome;
                }
            }
        };
        stats.pages = pages.pages();
        if latest.is_empty() {
            tracing::warn!("no vote for `{bp}` found");
        }

        tracing::info!(
            "scan of `{}` finished ({:?}): {} voters, {} recorded, {} duplicates kept, {} skipped",
            bp,
            outcome,
            latest.len(),
            stats.recorded,
            stats.duplicates_kept,
            stats.skipped
        );
        let votes = latest.into_sorted();
        log_votes(&votes);

        Ok(ScanReport {
            outcome,
            stats,
            votes,
        })
    }

    async fn process(
        &mut self,
        action: &ActionEntry,
        bounds: &ScanBounds,
        latest: &mut LatestVotes,
        stats: &mut ScanStats,
    ) -> Result<Step> {
        if bounds.begin_num > 0 && action.block_num < bounds.begin_num {
            tracing::info!(
                "block {} below begin_num {}, terminate backtrace",
                action.block_num,
                bounds.begin_num
            );
            return Ok(Step::Stop(ScanOutcome::BoundReached));
        }

        let block_time =
            match NaiveDateTime::parse_from_str(&action.block_time, BLOCK_TIME_FORMAT) {
                Ok(block_time) => block_time,
                Err(e) => {
                    tracing::warn!(
                        "action #{}: bad block time `{}`: {e}",
                        action.global_action_seq,
                        action.block_time
                    );
                    stats.skipped += 1;
                    return Ok(Step::Continue);
                }
            };
        if block_time < bounds.begin_time {
            tracing::info!(
                "block time '{}' before begin time '{}', terminate",
                block_time,
                bounds.begin_time
            );
            return Ok(Step::Stop(ScanOutcome::BoundReached));
        }
        if block_time > bounds.end_time {
            tracing::info!(
                "block time '{}' after end time '{}', ignore",
                block_time,
                bounds.end_time
            );
            stats.skipped += 1;
            return Ok(Step::Continue);
        }

        let vote = match self.decode_vote(action, block_time)? {
            Some(vote) => vote,
            None => {
                stats.skipped += 1;
                return Ok(Step::Continue);
            }
        };

        if let Some(db) = &self.sqlx_client {
            let resolution = if db.vote_exists(vote.seq_num).await? {
                self.resolver.resolve(&vote)?
            } else {
                Resolution::Overwrite
            };
            match resolution {
                Resolution::Overwrite => {
                    db.save_vote(&vote).await?;
                    stats.recorded += 1;
                }
                Resolution::Keep => {
                    tracing::info!("vote #{} already stored, keeping it", vote.seq_num);
                    stats.duplicates_kept += 1;
                }
                Resolution::Terminate => {
                    tracing::info!("terminate by duplicate at vote #{}", vote.seq_num);
                    return Ok(Step::Stop(ScanOutcome::TerminatedOnDuplicate));
                }
            }
        } else {
            stats.recorded += 1;
        }

        latest.observe(vote);
        Ok(Step::Continue)
    }

    /// `Ok(None)` marks an action that is skipped; errors abort the scan.
    fn decode_vote(
        &self,
        action: &ActionEntry,
        block_time: NaiveDateTime,
    ) -> Result<Option<VoteEvent>, ScanError> {
        let seq_num = action.global_action_seq;
        let act = &action.action_trace.act;
        if IGNORED_ACTIONS.contains(&act.name.as_str()) {
            return Ok(None);
        }
        if act.name != VOTE_ACTION {
            tracing::warn!("unknown action `{}` at #{}", act.name, seq_num);
            return Ok(None);
        }

        let args: VoteArgs = match act.data.decode() {
            Ok(args) => args,
            Err(e) => {
                match act.data.packed_bytes() {
                    Some(bytes) => {
                        tracing::warn!("vote #{seq_num}: {} packed bytes, no abi", bytes.len())
                    }
                    None => tracing::warn!("vote #{seq_num}: {e}"),
                }
                return Ok(None);
            }
        };

        let (quantity, symbol) = match args.stake.trim().split_once(' ') {
            Some(parts) => parts,
            None => {
                tracing::warn!("vote #{seq_num}: malformed stake `{}`", args.stake);
                return Ok(None);
            }
        };
        if symbol != self.config.symbol {
            tracing::warn!(
                "vote #{seq_num}: symbol `{symbol}` is not `{}`",
                self.config.symbol
            );
            return Ok(None);
        }
        let quantity = match parse_quantity(quantity) {
            Ok(quantity) => quantity,
            Err(e) => {
                tracing::warn!("vote #{seq_num}: {e}");
                return Ok(None);
            }
        };

        if args.voter.is_empty() {
            return Err(ScanError::Invariant {
                seq_num,
                reason: "vote without voter".to_string(),
            });
        }

        Ok(Some(VoteEvent {
            seq_num,
            block_num: action.block_num,
            quantity,
            block_time,
            voter: args.voter,
            bp_name: args.bpname,
            symbol: symbol.to_string(),
        }))
    }
}

fn log_votes(votes: &[VoteEvent]) {
    tracing::info!(
        "{:<12} -> {:<12}  {:>20} @ {}",
        "VOTER",
        "BP",
        "QUANTITY",
        "LAST VOTE DATE"
    );
    for vote in votes {
        let stake = Asset {
            amount: vote.quantity,
            symbol: vote.symbol.clone(),
        };
        tracing::info!(
            "{:<12} -> {:<12}  {:>20} @ {}",
            vote.voter,
            vote.bp_name,
            stake.to_string(),
            vote.block_time.format(BOUND_TIME_FORMAT)
        );
    }
}
