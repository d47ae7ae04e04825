use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::retry::RetryPolicy;

/// Environment variables with this prefix override file and default values,
/// e.g. `EOSFORCE_WORKERS=8`.
pub const ENV_PREFIX: &str = "EOSFORCE";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Endpoint serving `/v1/chain/get_table_rows`.
    pub table_endpoint: String,
    /// Host serving `/v1/history/get_actions`, without scheme.
    pub history_server: String,
    pub table_code: String,
    pub table_scope: String,
    pub table_page_limit: u32,
    pub action_page_size: u64,

    pub symbol: String,
    pub request_timeout_sec: u64,
    pub request_attempts: u32,
    pub request_retry_delay_ms: u64,

    pub cleos_path: String,
    pub wallet_url: String,
    pub cleos_api_url: String,
    pub broadcast_amount: String,
    pub airdrop_amount: String,

    pub workers: usize,
    pub worker_idle_timeout_sec: u64,
    pub send_attempts: u32,
    pub send_retry_delay_ms: u64,
    pub forever_retry_delay_ms: u64,
    pub history_checkpoint_every: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_endpoint: "https://w2.eosforce.cn".to_string(),
            history_server: "w1.eosforce.cn".to_string(),
            table_code: "eosio".to_string(),
            table_scope: "eosio".to_string(),
            table_page_limit: 500,
            action_page_size: 100,

            symbol: "EOS".to_string(),
            request_timeout_sec: 60,
            request_attempts: 10,
            request_retry_delay_ms: 1000,

            cleos_path: "/usr/local/bin/cleos".to_string(),
            wallet_url: "http://127.0.0.1:8900".to_string(),
            cleos_api_url: "https://w1.eosforce.cn".to_string(),
            broadcast_amount: "0.0000 EOS".to_string(),
            airdrop_amount: "0.0001 EOS".to_string(),

            workers: 40,
            worker_idle_timeout_sec: 10,
            send_attempts: 10,
            send_retry_delay_ms: 0,
            forever_retry_delay_ms: 5000,
            history_checkpoint_every: 10,
        }
    }
}

impl Config {
    /// Defaults, then the optional YAML file, then `EOSFORCE_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }
        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_sec)
    }

    pub fn request_retry(&self) -> RetryPolicy {
        RetryPolicy::bounded(
            self.request_attempts,
            Duration::from_millis(self.request_retry_delay_ms),
        )
    }

    pub fn worker_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_idle_timeout_sec)
    }

    pub fn send_retry_abort(&self) -> RetryPolicy {
        RetryPolicy::bounded(
            self.send_attempts,
            Duration::from_millis(self.send_retry_delay_ms),
        )
    }

    pub fn send_retry_forever(&self) -> RetryPolicy {
        RetryPolicy::forever(Duration::from_millis(self.forever_retry_delay_ms))
    }
}
