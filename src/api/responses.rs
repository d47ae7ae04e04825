use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct TableRowsRequest {
    pub json: bool,
    pub scope: String,
    pub code: String,
    pub table: String,
    pub limit: u32,
    /// Packed account name, sent as a decimal string.
    pub lower_bound: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableRowsPage {
    #[serde(default)]
    pub more: bool,
    #[serde(default)]
    pub rows: Vec<BalanceRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceRow {
    pub name: String,
    pub available: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionsRequest {
    pub account_name: String,
    pub pos: String,
    pub offset: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionsPage {
    #[serde(default)]
    pub last_irreversible_block: u64,
    #[serde(default)]
    pub actions: Vec<ActionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionEntry {
    pub global_action_seq: u64,
    pub block_num: u64,
    pub block_time: String,
    pub action_trace: ActionTrace,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionTrace {
    pub act: Action,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(default)]
    pub data: ActionData,
}

/// Nodes return decoded action arguments when they know the contract ABI and
/// the packed hex payload otherwise.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ActionData {
    Object(serde_json::Map<String, serde_json::Value>),
    Packed(String),
    Missing,
}

impl Default for ActionData {
    fn default() -> Self {
        ActionData::Missing
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VoteArgs {
    pub voter: String,
    pub bpname: String,
    pub stake: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ActionDataError {
    #[error("action carries packed data `{0}` instead of decoded arguments")]
    Packed(String),
    #[error("action carries no data")]
    Missing,
    #[error("unexpected argument shape: {0}")]
    Shape(#[from] serde_json::Error),
}

impl ActionData {
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, ActionDataError> {
        match self {
            ActionData::Object(map) => {
                Ok(serde_json::from_value(serde_json::Value::Object(map.clone()))?)
            }
            ActionData::Packed(raw) => Err(ActionDataError::Packed(raw.clone())),
            ActionData::Missing => Err(ActionDataError::Missing),
        }
    }

    /// Raw bytes of a packed payload, if it is valid hex.
    pub fn packed_bytes(&self) -> Option<Vec<u8>> {
        match self {
            ActionData::Packed(raw) => hex::decode(raw).ok(),
            _ => None,
        }
    }
}
