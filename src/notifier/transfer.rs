use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub from: String,
    pub to: String,
    /// Asset string, e.g. `0.0000 EOS`.
    pub quantity: String,
    pub memo: String,
}

#[derive(thiserror::Error, Debug)]
pub enum TransferError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("transfer {from} -> {to} exited with {status:?}: {output}")]
    Rejected {
        from: String,
        to: String,
        status: Option<i32>,
        output: String,
    },
}

/// Pushes a signed transfer to the chain, returning the tool's output.
#[async_trait]
pub trait Transfer: Send + Sync {
    async fn transfer(&self, request: &TransferRequest) -> Result<String, TransferError>;
}

/// Transfers through the `cleos` wallet CLI.
pub struct CleosTransfer {
    pub program: String,
    pub wallet_url: String,
    pub api_url: String,
}

impl CleosTransfer {
    fn args<'a>(&'a self, request: &'a TransferRequest) -> [&'a str; 9] {
        [
            "--wallet-url",
            &self.wallet_url,
            "-u",
            &self.api_url,
            "transfer",
            &request.from,
            &request.to,
            &request.quantity,
            &request.memo,
        ]
    }
}

#[async_trait]
impl Transfer for CleosTransfer {
    async fn transfer(&self, request: &TransferRequest) -> Result<String, TransferError> {
        let output = Command::new(&self.program)
            .args(self.args(request))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| TransferError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(TransferError::Rejected {
                from: request.from.clone(),
                to: request.to.clone(),
                status: output.status.code(),
                output: combined.trim().to_string(),
            });
        }
        Ok(combined)
    }
}
