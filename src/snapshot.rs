use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::ChainApi;
use crate::asset::Asset;
use crate::error::ScanError;
use crate::models::AccountBalance;
use crate::name::NameCodec;
use crate::pagination::{BalanceTable, Paginator};
use crate::settings;
use crate::sqlx_client::SqlxClient;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub pages: usize,
    pub rows: usize,
}

pub struct BalanceIndexer {
    config: settings::Config,
    api: Arc<dyn ChainApi>,
    codec: Arc<dyn NameCodec>,
    sqlx_client: SqlxClient,
}

impl BalanceIndexer {
    pub fn new(
        config: settings::Config,
        api: Arc<dyn ChainApi>,
        codec: Arc<dyn NameCodec>,
        sqlx_client: SqlxClient,
    ) -> Self {
        Self {
            config,
            api,
            codec,
            sqlx_client,
        }
    }

    /// Walks the whole balance table and upserts every row with
    /// `notified = false`. Any undecodable row aborts the run.
    pub async fn update(&self) -> Result<SnapshotSummary> {
        let table = BalanceTable {
            api: self.api.as_ref(),
            codec: self.codec.as_ref(),
            code: self.config.table_code.clone(),
            scope: self.config.table_scope.clone(),
            limit: self.config.table_page_limit,
        };
        let mut pages = Paginator::new(table, String::new(), self.config.request_retry());
        let mut rows = 0;

        while let Some(page) = pages.next_page().await? {
            for row in page {
                let asset: Asset = row.available.parse().map_err(|source| ScanError::Balance {
                    account: row.name.clone(),
                    source,
                })?;
                tracing::info!("{:<12} [{:>12}] ({})", row.name, asset.amount, row.available);

                self.sqlx_client
                    .upsert_account_balance(&AccountBalance {
                        account: row.name.clone(),
                        amount: asset.amount,
                        notified: false,
                    })
                    .await
                    .with_context(|| format!("Failed to store balance of `{}`", row.name))?;
                rows += 1;
            }
        }

        tracing::info!("accounts - done, {} rows in {} pages", rows, pages.pages());
        Ok(SnapshotSummary {
            pages: pages.pages(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BalanceRow, TableRowsPage};
    use crate::error::exit_code_for;
    use crate::name::PackedName;
    use crate::pagination::fakes::FakeChainApi;
    use crate::sqlx_client::test_helpers::memory_client;

    fn page(more: bool, rows: &[(&str, &str)]) -> Result<TableRowsPage, ()> {
        Ok(TableRowsPage {
            more,
            rows: rows
                .iter()
                .map(|(name, available)| BalanceRow {
                    name: name.to_string(),
                    available: available.to_string(),
                })
                .collect(),
        })
    }

    fn indexer(api: Arc<FakeChainApi>, db: SqlxClient) -> BalanceIndexer {
        let config = settings::Config {
            request_retry_delay_ms: 0,
            ..Default::default()
        };
        BalanceIndexer::new(config, api, Arc::new(PackedName), db)
    }

    fn balance(account: &str, amount: u64) -> AccountBalance {
        AccountBalance {
            account: account.to_string(),
            amount,
            notified: false,
        }
    }

    #[tokio::test]
    async fn two_pages_land_in_store() {
        let api = Arc::new(FakeChainApi::default());
        api.table_pages.lock().extend([
            page(true, &[("alice", "120.0000 EOS")]),
            page(false, &[("bob", "50.0000 EOS")]),
        ]);
        let db = memory_client().await;

        let summary = indexer(api, db.clone()).update().await.unwrap();

        assert_eq!(summary, SnapshotSummary { pages: 2, rows: 2 });
        assert_eq!(
            db.get_all_accounts().await.unwrap(),
            vec![balance("alice", 1_200_000), balance("bob", 500_000)]
        );
    }

    #[tokio::test]
    async fn rerun_resets_notified_and_is_idempotent() {
        let db = memory_client().await;
        let script = || {
            [
                page(true, &[("alice", "120.0000 EOS")]),
                page(false, &[("alice", "120.0000 EOS"), ("bob", "50.0000 EOS")]),
            ]
        };

        let api = Arc::new(FakeChainApi::default());
        api.table_pages.lock().extend(script());
        indexer(api, db.clone()).update().await.unwrap();
        let first = db.get_all_accounts().await.unwrap();

        db.mark_notified("alice").await.unwrap();

        let api = Arc::new(FakeChainApi::default());
        api.table_pages.lock().extend(script());
        indexer(api, db.clone()).update().await.unwrap();

        assert_eq!(db.get_all_accounts().await.unwrap(), first);
        assert!(first.iter().all(|balance| !balance.notified));
    }

    #[tokio::test]
    async fn undecodable_row_aborts_the_run() {
        let api = Arc::new(FakeChainApi::default());
        api.table_pages.lock().extend([page(
            false,
            &[("alice", "1.0000 EOS"), ("bob", "lots EOS"), ("carol", "2.0000 EOS")],
        )]);
        let db = memory_client().await;

        let err = indexer(api, db.clone()).update().await.unwrap_err();

        assert_eq!(exit_code_for(&err), crate::error::exit_code::SCAN);
        assert!(db.get_account("carol").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_table_is_a_clean_run() {
        let api = Arc::new(FakeChainApi::default());
        let db = memory_client().await;

        let summary = indexer(api, db.clone()).update().await.unwrap();

        assert_eq!(summary.rows, 0);
        assert!(db.get_all_accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_failure_exits_as_store_error() {
        let api = Arc::new(FakeChainApi::default());
        api.table_pages
            .lock()
            .extend([page(false, &[("alice", "1.0000 EOS")])]);
        let db = memory_client().await;
        db.close().await;

        let err = indexer(api, db).update().await.unwrap_err();

        assert_eq!(exit_code_for(&err), crate::error::exit_code::STORE);
    }
}
