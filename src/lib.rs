use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use self::sqlx_client::*;
use crate::api::HttpChainApi;
use crate::asset::parse_quantity;
use crate::cli::{AirdropArgs, BroadcastArgs, Cli, Command, SnapshotArgs, VotesArgs};
use crate::error::{StoreInitError, UsageError};
use crate::name::PackedName;
use crate::notifier::{CleosTransfer, Message, NotifierPool, RetryMode};
use crate::settings::Config;
use crate::snapshot::BalanceIndexer;
use crate::votes::{DuplicateResolver, ScanBounds, TerminalPrompt, VoteIndexer};

pub mod api;
pub mod asset;
pub mod cli;
pub mod error;
pub mod models;
pub mod name;
pub mod notifier;
pub mod pagination;
pub mod retry;
pub mod settings;
pub mod snapshot;
pub mod sqlx_client;
pub mod votes;

pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(atty::is(atty::Stream::Stdout))
        .init();
}

pub async fn start_service(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Snapshot(args) => snapshot(config, args).await,
        Command::Broadcast(args) => broadcast(config, args).await,
        Command::Airdrop(args) => airdrop(config, args).await,
        Command::Votes(args) => votes(config, args).await,
    }
}

async fn open_store(path: &Path, pool_size: u32) -> Result<SqlxClient> {
    SqlxClient::connect(path, pool_size)
        .await
        .map_err(|source| {
            StoreInitError {
                path: path.display().to_string(),
                source: source.into(),
            }
            .into()
        })
}

fn chain_api(config: &Config) -> Result<Arc<HttpChainApi>> {
    Ok(Arc::new(HttpChainApi::new(
        &config.table_endpoint,
        &config.history_server,
        config.request_timeout(),
    )?))
}

fn min_amount(valve: &str) -> Result<u64> {
    parse_quantity(valve)
        .map_err(|e| UsageError(format!("valve `{valve}` invalid: {e}")).into())
}

fn notifier_pool(config: &Config, retry: RetryMode) -> NotifierPool {
    NotifierPool {
        workers: config.workers,
        idle_timeout: config.worker_idle_timeout(),
        retry: match retry {
            RetryMode::Abort => config.send_retry_abort(),
            RetryMode::Forever => config.send_retry_forever(),
        },
    }
}

fn cleos(config: &Config) -> Arc<CleosTransfer> {
    Arc::new(CleosTransfer {
        program: config.cleos_path.clone(),
        wallet_url: config.wallet_url.clone(),
        api_url: config.cleos_api_url.clone(),
    })
}

async fn snapshot(config: Config, args: SnapshotArgs) -> Result<()> {
    let db = open_store(&args.db, 1).await?;
    let api = chain_api(&config)?;

    let summary = BalanceIndexer::new(config, api, Arc::new(PackedName), db.clone())
        .update()
        .await
        .context("Balance snapshot failed")?;
    db.close().await;

    tracing::info!("snapshot done: {} accounts", summary.rows);
    Ok(())
}

async fn broadcast(config: Config, args: BroadcastArgs) -> Result<()> {
    let min_amount = min_amount(&args.valve)?;
    let db = open_store(&args.db, config.workers as u32).await?;
    let message = Message {
        from: args.from,
        quantity: config.broadcast_amount.clone(),
        memo: args
            .adv
            .unwrap_or_else(|| notifier::DEFAULT_BROADCAST_MEMO.to_string()),
    };
    let pool = notifier_pool(&config, args.retry);

    let summary =
        notifier::broadcast(&pool, db.clone(), min_amount, message, cleos(&config)).await;
    db.close().await;

    let summary = summary?;
    tracing::info!("broadcast done: {} of {} delivered", summary.delivered, summary.queued);
    Ok(())
}

async fn airdrop(config: Config, args: AirdropArgs) -> Result<()> {
    let min_amount = min_amount(&args.valve)?;
    let message = Message {
        from: args.from,
        quantity: config.airdrop_amount.clone(),
        memo: args
            .adv
            .filter(|memo| !memo.is_empty())
            .unwrap_or_else(|| notifier::DEFAULT_AIRDROP_MEMO.to_string()),
    };
    let pool = notifier_pool(&config, args.retry);

    let summary = notifier::airdrop(
        &pool,
        &args.snap,
        &args.his,
        config.history_checkpoint_every,
        min_amount,
        message,
        cleos(&config),
    )
    .await?;

    tracing::info!("airdrop done: {} of {} delivered", summary.delivered, summary.queued);
    Ok(())
}

async fn votes(mut config: Config, args: VotesArgs) -> Result<()> {
    if args.bp.is_empty() {
        return Err(UsageError("missing bp param".to_string()).into());
    }
    let bounds = ScanBounds {
        from_pos: args.from_pos,
        begin_num: args.begin_num,
        begin_time: votes::parse_bound(&args.begin_time)
            .map_err(|e| UsageError(format!("begin_time {e}")))?,
        end_time: votes::parse_bound(&args.end_time)
            .map_err(|e| UsageError(format!("end_time {e}")))?,
    };
    if let Some(server) = args.server {
        config.history_server = server;
    }

    let db = match &args.db {
        Some(path) => Some(open_store(path, 1).await?),
        None => None,
    };
    let api = chain_api(&config)?;
    let resolver = DuplicateResolver::new(args.ondup, Box::new(TerminalPrompt));

    let report = VoteIndexer::new(config, api, db.clone(), resolver)
        .scan(&args.bp, &bounds)
        .await
        .with_context(|| format!("Vote scan of `{}` failed", args.bp));
    if let Some(db) = db {
        db.close().await;
    }

    let report = report?;
    tracing::info!(
        "{} voters, {} votes recorded ({:?})",
        report.votes.len(),
        report.stats.recorded,
        report.outcome
    );
    Ok(())
}
