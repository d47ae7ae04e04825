use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use super::DeliveryLog;
use crate::models::SendHistoryRecord;

#[derive(thiserror::Error, Debug)]
pub enum HistoryError {
    #[error("history file `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("history file `{path}` is not valid json: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Accounts already notified, persisted as a flat json map.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SendHistory {
    records: BTreeMap<String, SendHistoryRecord>,
}

impl SendHistory {
    pub fn load(path: &Path) -> Result<Self, HistoryError> {
        let buf = std::fs::read(path).map_err(|source| HistoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let records = serde_json::from_slice(&buf).map_err(|source| HistoryError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { records })
    }

    /// A missing or corrupt file starts an empty history.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("load history failed: {e}, starting empty");
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), HistoryError> {
        let buf = serde_json::to_vec(&self.records).map_err(|source| HistoryError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, buf).map_err(|source| HistoryError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn is_sent(&self, account: &str) -> bool {
        self.records
            .get(account)
            .map(|record| record.sent)
            .unwrap_or(false)
    }

    pub fn mark_sent(&mut self, account: &str) {
        self.records.insert(
            account.to_string(),
            SendHistoryRecord {
                account: account.to_string(),
                sent: true,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Records deliveries in a [`SendHistory`], saving it every
/// `checkpoint_every` deliveries.
pub struct HistoryLog {
    path: PathBuf,
    checkpoint_every: usize,
    state: Mutex<(SendHistory, usize)>,
}

impl HistoryLog {
    pub fn new(path: PathBuf, history: SendHistory, checkpoint_every: usize) -> Self {
        Self {
            path,
            checkpoint_every: checkpoint_every.max(1),
            state: Mutex::new((history, 0)),
        }
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> SendHistory {
        self.state.lock().0.clone()
    }

    pub fn save(&self) -> Result<(), HistoryError> {
        self.state.lock().0.save(&self.path)
    }
}

#[async_trait]
impl DeliveryLog for HistoryLog {
    async fn mark_sent(&self, account: &str) -> Result<()> {
        let mut state = self.state.lock();
        let (history, delivered) = &mut *state;
        history.mark_sent(account);
        *delivered += 1;
        if *delivered % self.checkpoint_every == 0 {
            history.save(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_existing_history_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(
            &path,
            r#"{"alice":{"Account":"alice","Sent":true},"bob":{"Account":"bob","Sent":false}}"#,
        )
        .unwrap();

        let history = SendHistory::load(&path).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.is_sent("alice"));
        assert!(!history.is_sent("bob"));
        assert!(!history.is_sent("carol"));
    }

    #[test]
    fn missing_or_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        assert!(SendHistory::load_or_default(&path).is_empty());

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            SendHistory::load(&path),
            Err(HistoryError::Json { .. })
        ));
        assert!(SendHistory::load_or_default(&path).is_empty());
    }

    #[tokio::test]
    async fn checkpoints_every_n_deliveries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let log = HistoryLog::new(path.clone(), SendHistory::default(), 2);

        log.mark_sent("alice").await.unwrap();
        assert!(!path.exists());

        log.mark_sent("bob").await.unwrap();
        let saved = SendHistory::load(&path).unwrap();
        assert!(saved.is_sent("alice") && saved.is_sent("bob"));

        log.mark_sent("carol").await.unwrap();
        assert!(!SendHistory::load(&path).unwrap().is_sent("carol"));

        log.save().unwrap();
        assert_eq!(SendHistory::load(&path).unwrap(), log.snapshot());
    }
}
