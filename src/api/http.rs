use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{ActionsPage, ActionsRequest, ApiError, ChainApi, TableRowsPage, TableRowsRequest};

pub struct HttpChainApi {
    client: reqwest::Client,
    table_endpoint: String,
    history_endpoint: String,
}

impl HttpChainApi {
    /// `table_endpoint` carries its scheme; `history_server` is a bare host
    /// reached over https.
    pub fn new(table_endpoint: &str, history_server: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .context("Failed to build http client")?;

        Ok(Self {
            client,
            table_endpoint: table_endpoint.trim_end_matches('/').to_string(),
            history_endpoint: format!("https://{}", history_server.trim_end_matches('/')),
        })
    }

    async fn post<B, T>(&self, url: String, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                url,
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        serde_json::from_slice(&bytes).map_err(|source| {
            tracing::debug!("undecodable body: {}", String::from_utf8_lossy(&bytes));
            ApiError::Decode { url, source }
        })
    }
}

#[async_trait]
impl ChainApi for HttpChainApi {
    async fn get_table_rows(&self, request: &TableRowsRequest) -> Result<TableRowsPage, ApiError> {
        let url = format!("{}/v1/chain/get_table_rows", self.table_endpoint);
        self.post(url, request).await
    }

    async fn get_actions(&self, request: &ActionsRequest) -> Result<ActionsPage, ApiError> {
        let url = format!("{}/v1/history/get_actions", self.history_endpoint);
        self.post(url, request).await
    }
}
