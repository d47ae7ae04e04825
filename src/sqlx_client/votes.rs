use anyhow::{Context, Result};

use crate::models::*;
use crate::sqlx_client::*;

impl SqlxClient {
    pub async fn vote_exists(&self, seq_num: u64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM vote_info WHERE seq_num = ?"#)
            .bind(seq_num as i64)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to look up vote #{seq_num}"))?;

        Ok(count > 0)
    }

    pub async fn save_vote(&self, vote: &VoteEvent) -> Result<()> {
        sqlx::query(
            r#"INSERT OR REPLACE INTO vote_info
            (seq_num, block_num, quantity, block_time, voter, bp_name, symbol)
            VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(vote.seq_num as i64)
        .bind(vote.block_num as i64)
        .bind(vote.quantity as i64)
        .bind(vote.block_time)
        .bind(&vote.voter)
        .bind(&vote.bp_name)
        .bind(&vote.symbol)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save vote #{}", vote.seq_num))?;

        Ok(())
    }

    pub async fn get_vote(&self, seq_num: u64) -> Result<Option<VoteEvent>> {
        let row = sqlx::query_as::<_, VoteEventRow>(
            r#"SELECT seq_num, block_num, quantity, block_time, voter, bp_name, symbol
               FROM vote_info
               WHERE seq_num = ?"#,
        )
        .bind(seq_num as i64)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to get vote #{seq_num}"))?;

        Ok(row.map(Into::into))
    }

    pub async fn get_votes(&self) -> Result<Vec<VoteEvent>> {
        let rows = sqlx::query_as::<_, VoteEventRow>(
            r#"SELECT seq_num, block_num, quantity, block_time, voter, bp_name, symbol
               FROM vote_info
               ORDER BY seq_num"#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list votes")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
