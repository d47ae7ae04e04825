use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_channel::Receiver;
use async_trait::async_trait;

use crate::asset::parse_quantity;
use crate::error::{InputError, NotifyError};
use crate::retry::{retry, RetryPolicy};
use crate::sqlx_client::SqlxClient;

pub use self::history::{HistoryError, HistoryLog, SendHistory};
pub use self::transfer::{CleosTransfer, Transfer, TransferError, TransferRequest};

mod history;
mod transfer;

/// Memo used by `airdrop` when none is given.
pub const DEFAULT_AIRDROP_MEMO: &str = concat!(
    "EosForce is the first DPOS chain based on EOS that voter can share revenue with BP,",
    "It's far more fair than original one.It comply with genesis snapshot.",
    "So we are waiting for U come back eargly @ eosforce.io,",
    "and please vote imlianquan eosshuimu miduoduo."
);

/// Memo used by `broadcast` when none is given.
pub const DEFAULT_BROADCAST_MEMO: &str = "免费赚10万EOSC，微信搜索小程序“链圈挖钻助手”创建领地赚EOSC，由链圈超级节点打造DAPP小程序版本。";

/// Where successful deliveries are remembered.
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    async fn mark_sent(&self, account: &str) -> Result<()>;
}

#[async_trait]
impl DeliveryLog for SqlxClient {
    async fn mark_sent(&self, account: &str) -> Result<()> {
        self.mark_notified(account).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryMode {
    /// Give up after the configured attempts and abort the run.
    Abort,
    /// Keep retrying with a fixed delay.
    Forever,
}

impl std::str::FromStr for RetryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abort" => Ok(Self::Abort),
            "forever" => Ok(Self::Forever),
            other => Err(format!("unknown retry mode `{other}`, expected abort/forever")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub from: String,
    pub quantity: String,
    pub memo: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NotifySummary {
    pub queued: usize,
    pub delivered: usize,
}

struct Worker {
    transfer: Arc<dyn Transfer>,
    log: Arc<dyn DeliveryLog>,
    message: Message,
    retry: RetryPolicy,
    idle_timeout: Duration,
    aborted: AtomicBool,
}

impl Worker {
    async fn run(
        self: Arc<Self>,
        id: usize,
        accounts: Receiver<String>,
    ) -> Result<usize, NotifyError> {
        let mut delivered = 0;
        loop {
            let account = match tokio::time::timeout(self.idle_timeout, accounts.recv()).await {
                Ok(Ok(account)) => account,
                Ok(Err(_)) => break,
                Err(_) => {
                    tracing::info!("worker {id} idle for {:?}, exiting", self.idle_timeout);
                    break;
                }
            };
            if self.aborted.load(Ordering::SeqCst) {
                break;
            }
            if let Err(e) = self.deliver(&account).await {
                tracing::error!("worker {id}: {e}");
                // Stops the producer and every other worker.
                self.aborted.store(true, Ordering::SeqCst);
                accounts.close();
                return Err(e);
            }
            delivered += 1;
        }
        Ok(delivered)
    }

    async fn deliver(&self, account: &str) -> Result<(), NotifyError> {
        let request = TransferRequest {
            from: self.message.from.clone(),
            to: account.to_string(),
            quantity: self.message.quantity.clone(),
            memo: self.message.memo.clone(),
        };
        let what = format!("transfer {} -> {}", request.from, request.to);
        let output = retry(&what, self.retry, || self.transfer.transfer(&request))
            .await
            .map_err(|_| NotifyError::RetriesExhausted {
                account: account.to_string(),
                attempts: self.retry.attempts,
            })?;
        tracing::info!("{what} done: {}", output.trim());

        self.log
            .mark_sent(account)
            .await
            .map_err(|source| NotifyError::DeliveryLog {
                account: account.to_string(),
                source: source.into(),
            })
    }
}

/// Fixed set of workers draining one bounded queue of accounts.
pub struct NotifierPool {
    pub workers: usize,
    pub idle_timeout: Duration,
    pub retry: RetryPolicy,
}

impl NotifierPool {
    /// Delivers `message` to every account. Returns once all workers have
    /// exited; the first worker failure is returned after the others stop.
    pub async fn run(
        &self,
        accounts: Vec<String>,
        message: Message,
        transfer: Arc<dyn Transfer>,
        log: Arc<dyn DeliveryLog>,
    ) -> Result<NotifySummary> {
        let workers = self.workers.max(1);
        let (sender, receiver) = async_channel::bounded(workers);
        let worker = Arc::new(Worker {
            transfer,
            log,
            message,
            retry: self.retry,
            idle_timeout: self.idle_timeout,
            aborted: AtomicBool::new(false),
        });
        let handles: Vec<_> = (0..workers)
            .map(|id| tokio::spawn(worker.clone().run(id, receiver.clone())))
            .collect();
        drop(receiver);

        let mut queued = 0;
        for account in accounts {
            if sender.send(account).await.is_err() {
                tracing::warn!("queue closed, {queued} accounts queued");
                break;
            }
            queued += 1;
        }
        sender.close();

        let mut delivered = 0;
        let mut failure = None;
        for result in futures::future::join_all(handles).await {
            match result.context("Notifier worker panicked")? {
                Ok(count) => delivered += count,
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        if let Some(e) = failure {
            return Err(e.into());
        }

        tracing::info!("notified {delivered} of {queued} accounts");
        Ok(NotifySummary { queued, delivered })
    }
}

/// Notifies every stored account holding at least `min_amount` minor units
/// that has not been notified yet.
pub async fn broadcast(
    pool: &NotifierPool,
    db: SqlxClient,
    min_amount: u64,
    message: Message,
    transfer: Arc<dyn Transfer>,
) -> Result<NotifySummary> {
    let accounts: Vec<_> = db
        .get_pending_accounts(min_amount)
        .await?
        .into_iter()
        .map(|balance| balance.account)
        .collect();
    tracing::info!(
        "{} accounts hold at least {} minor units",
        accounts.len(),
        min_amount
    );

    pool.run(accounts, message, transfer, Arc::new(db)).await
}

/// Reads holders from a snapshot csv (`_,account,_,balance,...`, no header)
/// and keeps those at or above `min_amount` not yet in the history.
pub fn read_airdrop_targets(
    snapshot: &Path,
    min_amount: u64,
    history: &SendHistory,
) -> Result<Vec<String>, InputError> {
    let input_error = |source: crate::error::BoxError| InputError {
        path: snapshot.display().to_string(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(snapshot)
        .map_err(|e| input_error(e.into()))?;

    let mut targets = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| input_error(e.into()))?;
        tracing::debug!("{:?}", record);
        let (account, balance) = match (record.get(1), record.get(3)) {
            (Some(account), Some(balance)) => (account.trim(), balance.trim()),
            _ => {
                let reason = format!("line {}: too few columns", line + 1);
                return Err(input_error(reason.into()));
            }
        };
        let amount = parse_quantity(balance)
            .map_err(|e| input_error(format!("line {}: {e}", line + 1).into()))?;
        if amount < min_amount || history.is_sent(account) {
            continue;
        }
        targets.push(account.to_string());
    }
    Ok(targets)
}

/// Notifies snapshot holders once, remembering deliveries in `history_path`.
pub async fn airdrop(
    pool: &NotifierPool,
    snapshot: &Path,
    history_path: &Path,
    checkpoint_every: usize,
    min_amount: u64,
    message: Message,
    transfer: Arc<dyn Transfer>,
) -> Result<NotifySummary> {
    let history = SendHistory::load_or_default(history_path);
    let accounts = read_airdrop_targets(snapshot, min_amount, &history)?;
    tracing::info!("{} snapshot accounts still to notify", accounts.len());

    let log = Arc::new(HistoryLog::new(
        history_path.to_path_buf(),
        history,
        checkpoint_every,
    ));
    let result = pool.run(accounts, message, transfer, log.clone()).await;
    log.save()
        .with_context(|| format!("Failed to save history `{}`", history_path.display()))?;
    result
}

#[cfg(test)]
mod tests;
