use std::path::PathBuf;

use argh::FromArgs;

use crate::notifier::RetryMode;
use crate::votes::DuplicatePolicy;

#[derive(FromArgs, Debug)]
/// Balance snapshots, advertisement transfers and vote statistics for EOSForce.
pub struct Cli {
    /// yaml configuration file, overridden by EOSFORCE_* variables
    #[argh(option)]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
pub enum Command {
    Snapshot(SnapshotArgs),
    Broadcast(BroadcastArgs),
    Airdrop(AirdropArgs),
    Votes(VotesArgs),
}

#[derive(FromArgs, Debug)]
/// Copy every account balance into a local sqlite file.
#[argh(subcommand, name = "snapshot")]
pub struct SnapshotArgs {
    /// sqlite file to write
    #[argh(option, default = "PathBuf::from(\"./account.db\")")]
    pub db: PathBuf,
}

#[derive(FromArgs, Debug)]
/// Send a zero transfer with a memo to every stored account above a threshold.
#[argh(subcommand, name = "broadcast")]
pub struct BroadcastArgs {
    /// sqlite file written by `snapshot`
    #[argh(option)]
    pub db: PathBuf,

    /// sending account
    #[argh(option)]
    pub from: String,

    /// only notify accounts holding at least this many tokens
    #[argh(option, default = "String::from(\"100\")")]
    pub valve: String,

    /// memo text
    #[argh(option)]
    pub adv: Option<String>,

    /// what to do when a transfer keeps failing: abort or forever
    #[argh(option, default = "RetryMode::Abort")]
    pub retry: RetryMode,
}

#[derive(FromArgs, Debug)]
/// Send a transfer with a memo to every genesis snapshot holder, once.
#[argh(subcommand, name = "airdrop")]
pub struct AirdropArgs {
    /// json file remembering notified accounts
    #[argh(option)]
    pub his: PathBuf,

    /// genesis snapshot csv
    #[argh(option)]
    pub snap: PathBuf,

    /// sending account
    #[argh(option)]
    pub from: String,

    /// only notify accounts holding at least this many tokens
    #[argh(option, default = "String::from(\"100\")")]
    pub valve: String,

    /// memo text
    #[argh(option)]
    pub adv: Option<String>,

    /// what to do when a transfer keeps failing: abort or forever
    #[argh(option, default = "RetryMode::Forever")]
    pub retry: RetryMode,
}

#[derive(FromArgs, Debug)]
/// Rebuild the latest vote of every voter of a block producer.
#[argh(subcommand, name = "votes")]
pub struct VotesArgs {
    /// block producer to scan
    #[argh(option)]
    pub bp: String,

    /// sqlite file to record votes in; votes are only reported when omitted
    #[argh(option)]
    pub db: Option<PathBuf>,

    /// stop at the first action below this block number, 0 for no limit
    #[argh(option, default = "0")]
    pub begin_num: u64,

    /// action position to start from
    #[argh(option, default = "0")]
    pub from_pos: u64,

    /// stop at the first action older than this, e.g. '2018-06-01 00:00:00'
    #[argh(option, default = "String::from(\"2018-06-01 00:00:00\")")]
    pub begin_time: String,

    /// ignore actions newer than this
    #[argh(option, default = "String::from(\"2200-01-01 00:00:00\")")]
    pub end_time: String,

    /// history api host, e.g. w1.eosforce.cn
    #[argh(option)]
    pub server: Option<String>,

    /// on an already stored vote: goon, term or query
    #[argh(option, default = "DuplicatePolicy::Query")]
    pub ondup: DuplicatePolicy,
}
