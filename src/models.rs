use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: String,
    /// Minor units.
    pub amount: u64,
    pub notified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEvent {
    pub seq_num: u64,
    pub block_num: u64,
    /// Minor units.
    pub quantity: u64,
    pub block_time: NaiveDateTime,
    pub voter: String,
    pub bp_name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendHistoryRecord {
    #[serde(rename = "Account")]
    pub account: String,
    #[serde(rename = "Sent")]
    pub sent: bool,
}

#[derive(sqlx::FromRow)]
pub(crate) struct AccountBalanceRow {
    pub account: String,
    pub amount: i64,
    pub notified: bool,
}

impl From<AccountBalanceRow> for AccountBalance {
    fn from(row: AccountBalanceRow) -> Self {
        Self {
            account: row.account,
            amount: row.amount as u64,
            notified: row.notified,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct VoteEventRow {
    pub seq_num: i64,
    pub block_num: i64,
    pub quantity: i64,
    pub block_time: NaiveDateTime,
    pub voter: String,
    pub bp_name: String,
    pub symbol: String,
}

impl From<VoteEventRow> for VoteEvent {
    fn from(row: VoteEventRow) -> Self {
        Self {
            seq_num: row.seq_num as u64,
            block_num: row.block_num as u64,
            quantity: row.quantity as u64,
            block_time: row.block_time,
            voter: row.voter,
            bp_name: row.bp_name,
            symbol: row.symbol,
        }
    }
}
