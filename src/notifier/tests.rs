use std::collections::HashMap;
use std::io::Write;

use parking_lot::Mutex;

use super::*;
use crate::error::exit_code_for;
use crate::models::AccountBalance;
use crate::sqlx_client::test_helpers::memory_client;

/// Fails the first `n` transfers to an account, then succeeds.
#[derive(Default)]
struct FakeTransfer {
    failures: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<TransferRequest>>,
}

impl FakeTransfer {
    fn failing(account: &str, times: usize) -> Self {
        let fake = Self::default();
        fake.failures.lock().insert(account.to_string(), times);
        fake
    }

    fn calls_to(&self, account: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|request| request.to == account)
            .count()
    }
}

#[async_trait]
impl Transfer for FakeTransfer {
    async fn transfer(&self, request: &TransferRequest) -> Result<String, TransferError> {
        self.calls.lock().push(request.clone());
        let mut failures = self.failures.lock();
        match failures.get_mut(&request.to) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Err(TransferError::Rejected {
                    from: request.from.clone(),
                    to: request.to.clone(),
                    status: Some(1),
                    output: "Error 3080004: transaction exceeded the current CPU usage limit"
                        .to_string(),
                })
            }
            _ => Ok(format!("executed transaction: {}", request.to)),
        }
    }
}

fn pool(workers: usize, attempts: u32) -> NotifierPool {
    NotifierPool {
        workers,
        idle_timeout: Duration::from_secs(10),
        retry: RetryPolicy::bounded(attempts, Duration::ZERO),
    }
}

fn message() -> Message {
    Message {
        from: "imlianquan".to_string(),
        quantity: "0.0000 EOS".to_string(),
        memo: "hello".to_string(),
    }
}

async fn seeded_db(balances: &[(&str, u64)]) -> SqlxClient {
    let db = memory_client().await;
    for (account, amount) in balances {
        db.upsert_account_balance(&AccountBalance {
            account: account.to_string(),
            amount: *amount,
            notified: false,
        })
        .await
        .unwrap();
    }
    db
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn broadcast_only_reaches_accounts_above_threshold() {
    let db = seeded_db(&[("alice", 1_200_000), ("bob", 500_000)]).await;
    let transfer = Arc::new(FakeTransfer::default());

    let summary = broadcast(&pool(40, 10), db.clone(), 1_000_000, message(), transfer.clone())
        .await
        .unwrap();

    assert_eq!(summary, NotifySummary { queued: 1, delivered: 1 });
    let calls = transfer.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].to, "alice");
    assert_eq!(calls[0].from, "imlianquan");
    assert!(db.get_account("alice").await.unwrap().unwrap().notified);
    assert!(!db.get_account("bob").await.unwrap().unwrap().notified);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn broadcast_skips_already_notified() {
    let db = seeded_db(&[("alice", 1_200_000)]).await;
    db.mark_notified("alice").await.unwrap();
    let transfer = Arc::new(FakeTransfer::default());

    let summary = broadcast(&pool(4, 10), db, 0, message(), transfer.clone())
        .await
        .unwrap();

    assert_eq!(summary.queued, 0);
    assert!(transfer.calls.lock().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_account_is_delivered_once() {
    let accounts: Vec<_> = (0..100).map(|i| format!("acct{i}")).collect();
    let balances: Vec<_> = accounts.iter().map(|a| (a.as_str(), 1u64)).collect();
    let db = seeded_db(&balances).await;
    let transfer = Arc::new(FakeTransfer::failing("acct7", 3));

    let summary = pool(8, 10)
        .run(accounts.clone(), message(), transfer.clone(), Arc::new(db.clone()))
        .await
        .unwrap();

    assert_eq!(summary, NotifySummary { queued: 100, delivered: 100 });
    assert_eq!(transfer.calls_to("acct7"), 4);
    for account in &accounts {
        if account != "acct7" {
            assert_eq!(transfer.calls_to(account), 1);
        }
    }
    assert!(db.get_pending_accounts(0).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn exhausted_retries_abort_the_run() {
    let db = seeded_db(&[("alice", 1_200_000)]).await;
    let transfer = Arc::new(FakeTransfer::failing("alice", usize::MAX));

    let err = broadcast(&pool(2, 10), db.clone(), 0, message(), transfer.clone())
        .await
        .unwrap_err();

    assert_eq!(exit_code_for(&err), crate::error::exit_code::SEND);
    assert_eq!(transfer.calls_to("alice"), 10);
    assert!(!db.get_account("alice").await.unwrap().unwrap().notified);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failure_stops_remaining_deliveries() {
    let db = seeded_db(&[("alice", 1), ("bob", 1), ("carol", 1), ("dave", 1)]).await;
    let transfer = Arc::new(FakeTransfer::failing("alice", usize::MAX));
    let accounts = ["alice", "bob", "carol", "dave"].map(String::from).to_vec();

    let err = pool(1, 3)
        .run(accounts, message(), transfer.clone(), Arc::new(db.clone()))
        .await
        .unwrap_err();

    assert_eq!(exit_code_for(&err), crate::error::exit_code::SEND);
    assert_eq!(transfer.calls_to("alice"), 3);
    assert_eq!(transfer.calls.lock().len(), 3);
    assert_eq!(db.get_pending_accounts(0).await.unwrap().len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn idle_workers_exit_while_queue_stays_open() {
    let db = seeded_db(&[("alice", 1)]).await;
    let transfer = Arc::new(FakeTransfer::default());
    let worker = Arc::new(Worker {
        transfer: transfer.clone(),
        log: Arc::new(db.clone()),
        message: message(),
        retry: RetryPolicy::bounded(1, Duration::ZERO),
        idle_timeout: Duration::from_millis(50),
        aborted: AtomicBool::new(false),
    });
    let (sender, receiver) = async_channel::bounded(4);
    let handles: Vec<_> = (0..3)
        .map(|id| tokio::spawn(worker.clone().run(id, receiver.clone())))
        .collect();
    sender.send("alice".to_string()).await.unwrap();

    let results = tokio::time::timeout(
        Duration::from_secs(5),
        futures::future::join_all(handles),
    )
    .await
    .expect("workers kept waiting on an idle queue");

    let delivered: usize = results.into_iter().map(|r| r.unwrap().unwrap()).sum();
    assert_eq!(delivered, 1);
    assert!(!sender.is_closed());
    assert!(db.get_account("alice").await.unwrap().unwrap().notified);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn forever_policy_outlasts_failures() {
    let transfer = Arc::new(FakeTransfer::failing("alice", 25));
    let pool = NotifierPool {
        workers: 1,
        idle_timeout: Duration::from_secs(10),
        retry: RetryPolicy::forever(Duration::ZERO),
    };
    let db = seeded_db(&[("alice", 1)]).await;

    let summary = pool
        .run(vec!["alice".to_string()], message(), transfer.clone(), Arc::new(db))
        .await
        .unwrap();

    assert_eq!(summary.delivered, 1);
    assert_eq!(transfer.calls_to("alice"), 26);
}

fn snapshot_file(lines: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn airdrop_skips_history_and_small_holders() {
    let snapshot = snapshot_file(&[
        "0x01,alice,EOS5abc,150.0000",
        "0x02,bob,EOS5def,99.9999",
        "0x03,carol,EOS5ghi,100.0000",
        "0x04,dave,EOS5jkl,5000.0000",
    ]);
    let dir = tempfile::tempdir().unwrap();
    let history_path = dir.path().join("history.json");
    let mut history = SendHistory::default();
    history.mark_sent("dave");
    history.save(&history_path).unwrap();
    let transfer = Arc::new(FakeTransfer::default());

    let summary = airdrop(
        &pool(4, 10),
        snapshot.path(),
        &history_path,
        10,
        1_000_000,
        message(),
        transfer.clone(),
    )
    .await
    .unwrap();

    assert_eq!(summary.delivered, 2);
    assert_eq!(transfer.calls_to("alice"), 1);
    assert_eq!(transfer.calls_to("carol"), 1);
    assert_eq!(transfer.calls_to("bob") + transfer.calls_to("dave"), 0);

    let saved = SendHistory::load(&history_path).unwrap();
    assert!(saved.is_sent("alice") && saved.is_sent("carol") && saved.is_sent("dave"));
    assert!(!saved.is_sent("bob"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unwritable_history_is_a_delivery_log_failure() {
    let snapshot = snapshot_file(&["0x01,alice,EOS5abc,150.0000"]);
    let dir = tempfile::tempdir().unwrap();
    let history_path = dir.path().join("missing").join("history.json");
    let transfer = Arc::new(FakeTransfer::default());

    let err = airdrop(
        &pool(2, 10),
        snapshot.path(),
        &history_path,
        10,
        0,
        message(),
        transfer.clone(),
    )
    .await
    .unwrap_err();

    assert_eq!(exit_code_for(&err), crate::error::exit_code::DELIVERY_LOG);
    assert_eq!(transfer.calls_to("alice"), 1);
}

#[test]
fn malformed_snapshot_row_is_an_input_error() {
    let snapshot = snapshot_file(&["0x01,alice,EOS5abc,150.0000", "0x02,bob"]);
    let err = read_airdrop_targets(snapshot.path(), 0, &SendHistory::default()).unwrap_err();
    assert!(err.source.to_string().contains("line 2"));

    let snapshot = snapshot_file(&["0x01,alice,EOS5abc,lots"]);
    assert!(read_airdrop_targets(snapshot.path(), 0, &SendHistory::default()).is_err());
}

#[test]
fn parses_retry_modes() {
    assert_eq!("abort".parse::<RetryMode>(), Ok(RetryMode::Abort));
    assert_eq!("forever".parse::<RetryMode>(), Ok(RetryMode::Forever));
    assert!("sometimes".parse::<RetryMode>().is_err());
}

#[test]
fn default_airdrop_memo_is_unchanged() {
    let memo = DEFAULT_AIRDROP_MEMO;
    assert!(memo.starts_with("EosForce is the first DPOS chain"));
    assert!(memo.contains("with BP,It's far more fair than original one.It comply"));
    assert!(memo.contains("snapshot.So we are"));
    assert!(memo.ends_with("eosforce.io,and please vote imlianquan eosshuimu miduoduo."));
}
