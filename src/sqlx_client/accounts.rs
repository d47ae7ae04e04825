use anyhow::{Context, Result};

use crate::models::*;
use crate::sqlx_client::*;

impl SqlxClient {
    /// Insert-or-replace: the latest snapshot wins and resets `notified`.
    pub async fn upsert_account_balance(&self, balance: &AccountBalance) -> Result<()> {
        sqlx::query(
            r#"INSERT OR REPLACE INTO account_info
            (account, amount, notified)
            VALUES (?, ?, ?)"#,
        )
        .bind(&balance.account)
        .bind(balance.amount as i64)
        .bind(balance.notified)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert account `{}`", balance.account))?;

        Ok(())
    }

    pub async fn get_pending_accounts(&self, min_amount: u64) -> Result<Vec<AccountBalance>> {
        let rows = sqlx::query_as::<_, AccountBalanceRow>(
            r#"SELECT account, amount, notified
               FROM account_info
               WHERE amount >= ? AND notified = 0
               ORDER BY account"#,
        )
        .bind(min_amount as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to get pending accounts")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn mark_notified(&self, account: &str) -> Result<()> {
        sqlx::query(r#"UPDATE account_info SET notified = 1 WHERE account = ?"#)
            .bind(account)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to mark `{account}` as notified"))?;

        Ok(())
    }

    pub async fn get_account(&self, account: &str) -> Result<Option<AccountBalance>> {
        let row = sqlx::query_as::<_, AccountBalanceRow>(
            r#"SELECT account, amount, notified FROM account_info WHERE account = ?"#,
        )
        .bind(account)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to get account `{account}`"))?;

        Ok(row.map(Into::into))
    }

    pub async fn get_all_accounts(&self) -> Result<Vec<AccountBalance>> {
        let rows = sqlx::query_as::<_, AccountBalanceRow>(
            r#"SELECT account, amount, notified FROM account_info ORDER BY account"#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
