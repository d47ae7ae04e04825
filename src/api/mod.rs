use async_trait::async_trait;

mod http;
mod responses;

pub use self::http::HttpChainApi;
pub use self::responses::*;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("request to `{url}` failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("`{url}` answered {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode response from `{url}`: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Read side of the chain's public HTTP API.
#[async_trait]
pub trait ChainApi: Send + Sync {
    async fn get_table_rows(&self, request: &TableRowsRequest) -> Result<TableRowsPage, ApiError>;

    async fn get_actions(&self, request: &ActionsRequest) -> Result<ActionsPage, ApiError>;
}
