use crate::api::ApiError;
use crate::asset::AssetError;
use crate::notifier::HistoryError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("`{what}` failed {attempts} times in a row")]
    RetriesExhausted {
        what: String,
        attempts: u32,
        #[source]
        source: ApiError,
    },
    #[error("account `{account}` has an undecodable balance")]
    Balance {
        account: String,
        #[source]
        source: AssetError,
    },
    #[error("invariant violated at action #{seq_num}: {reason}")]
    Invariant { seq_num: u64, reason: String },
}

#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    #[error("transfer to `{account}` failed {attempts} times, giving up")]
    RetriesExhausted { account: String, attempts: u32 },
    #[error("failed to record delivery to `{account}`")]
    DeliveryLog {
        account: String,
        #[source]
        source: BoxError,
    },
}

/// Store initialisation failures are wrapped so the binary can tell them apart.
#[derive(thiserror::Error, Debug)]
#[error("failed to open store `{path}`")]
pub struct StoreInitError {
    pub path: String,
    #[source]
    pub source: BoxError,
}

#[derive(thiserror::Error, Debug)]
#[error("failed to read input `{path}`")]
pub struct InputError {
    pub path: String,
    #[source]
    pub source: BoxError,
}

#[derive(thiserror::Error, Debug)]
#[error("{0}")]
pub struct UsageError(pub String);

pub mod exit_code {
    pub const USAGE: i32 = 1;
    pub const SCAN: i32 = 2;
    /// Opening, migrating or writing the sqlite store.
    pub const STORE: i32 = 3;
    pub const INVARIANT: i32 = 4;
    pub const INPUT: i32 = 5;
    pub const SEND: i32 = 10;
    pub const DELIVERY_LOG: i32 = 11;
}

/// Maps the root cause of a failed run to the process exit code.
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    for cause in error.chain() {
        if let Some(err) = cause.downcast_ref::<ScanError>() {
            return match err {
                ScanError::Invariant { .. } => exit_code::INVARIANT,
                _ => exit_code::SCAN,
            };
        }
        if let Some(err) = cause.downcast_ref::<NotifyError>() {
            return match err {
                NotifyError::RetriesExhausted { .. } => exit_code::SEND,
                NotifyError::DeliveryLog { .. } => exit_code::DELIVERY_LOG,
            };
        }
        if cause.is::<StoreInitError>() || cause.is::<sqlx::Error>() {
            return exit_code::STORE;
        }
        if cause.is::<HistoryError>() {
            return exit_code::DELIVERY_LOG;
        }
        if cause.is::<InputError>() {
            return exit_code::INPUT;
        }
        if cause.is::<UsageError>() || cause.is::<config::ConfigError>() {
            return exit_code::USAGE;
        }
    }
    exit_code::SCAN
}
