use std::fmt::Debug;

use async_trait::async_trait;

use crate::api::{ActionEntry, ActionsRequest, ApiError, BalanceRow, ChainApi, TableRowsRequest};
use crate::error::ScanError;
use crate::name::NameCodec;
use crate::retry::{retry, RetryPolicy};

pub struct Page<T, C> {
    pub items: Vec<T>,
    /// `None` when the remote listing is exhausted.
    pub next: Option<C>,
}

/// One remote listing that can be read page by page from a cursor.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Cursor: Clone + Debug + Send + Sync;
    type Item: Send;

    fn name(&self) -> &str;

    async fn fetch(
        &self,
        cursor: &Self::Cursor,
    ) -> Result<Page<Self::Item, Self::Cursor>, ApiError>;
}

pub struct Paginator<S: PageSource> {
    source: S,
    cursor: Option<S::Cursor>,
    retry: RetryPolicy,
    pages: usize,
}

impl<S: PageSource> Paginator<S> {
    pub fn new(source: S, start: S::Cursor, retry: RetryPolicy) -> Self {
        Self {
            source,
            cursor: Some(start),
            retry,
            pages: 0,
        }
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Fetches the page under the cursor and advances it. Returns `None` once
    /// the listing is exhausted or a page comes back empty.
    pub async fn next_page(&mut self) -> Result<Option<Vec<S::Item>>, ScanError> {
        let cursor = match self.cursor.take() {
            Some(cursor) => cursor,
            None => return Ok(None),
        };
        tracing::info!("{} - fetching page from {:?}", self.source.name(), cursor);

        let source = &self.source;
        let page = retry(source.name(), self.retry, || source.fetch(&cursor))
            .await
            .map_err(|source| ScanError::RetriesExhausted {
                what: self.source.name().to_string(),
                attempts: self.retry.attempts,
                source,
            })?;

        self.pages += 1;
        if page.items.is_empty() {
            tracing::info!("{} - no more items", self.source.name());
            return Ok(None);
        }
        self.cursor = page.next;
        Ok(Some(page.items))
    }
}

/// The balance table, keyed by account name.
pub struct BalanceTable<'a> {
    pub api: &'a dyn ChainApi,
    pub codec: &'a dyn NameCodec,
    pub code: String,
    pub scope: String,
    pub limit: u32,
}

#[async_trait]
impl<'a> PageSource for BalanceTable<'a> {
    type Cursor = String;
    type Item = BalanceRow;

    fn name(&self) -> &str {
        "accounts"
    }

    async fn fetch(&self, cursor: &String) -> Result<Page<BalanceRow, String>, ApiError> {
        let request = TableRowsRequest {
            json: true,
            scope: self.scope.clone(),
            code: self.code.clone(),
            table: "accounts".to_string(),
            limit: self.limit,
            lower_bound: self.codec.encode(cursor).to_string(),
        };
        let page = self.api.get_table_rows(&request).await?;

        let next = match (page.more, page.rows.last()) {
            (false, _) => None,
            (true, None) => {
                tracing::warn!("accounts - `more` set on an empty page, stopping");
                None
            }
            // lower_bound is inclusive, so a page holding only the cursor row
            // would be fetched forever.
            (true, Some(last)) if last.name == *cursor => {
                tracing::warn!("accounts - cursor `{cursor}` did not advance, stopping");
                None
            }
            (true, Some(last)) => Some(last.name.clone()),
        };

        Ok(Page {
            items: page.rows,
            next,
        })
    }
}

/// Action history of one account, addressed by position.
pub struct ActionLog<'a> {
    pub api: &'a dyn ChainApi,
    pub account: String,
    pub offset: u64,
}

#[async_trait]
impl<'a> PageSource for ActionLog<'a> {
    type Cursor = u64;
    type Item = ActionEntry;

    fn name(&self) -> &str {
        "actions"
    }

    async fn fetch(&self, pos: &u64) -> Result<Page<ActionEntry, u64>, ApiError> {
        let request = ActionsRequest {
            account_name: self.account.clone(),
            pos: pos.to_string(),
            offset: self.offset.to_string(),
        };
        let page = self.api.get_actions(&request).await?;
        tracing::debug!(
            "actions - {} at pos {pos}, last irreversible block {}",
            page.actions.len(),
            page.last_irreversible_block
        );

        let next = if page.actions.is_empty() {
            None
        } else {
            let next = pos.checked_add(self.offset);
            if next.is_none() {
                tracing::warn!("actions - position {pos} + {} overflows, stopping", self.offset);
            }
            next
        };
        Ok(Page {
            items: page.actions,
            next,
        })
    }
}
