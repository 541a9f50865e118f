use ledger_core::{Block, Transaction};
use serde::{Deserialize, Serialize};

/// One JSON object per connection: `{"type": ..., "data": ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WireMessage {
    Block(Block),
    Tx(Transaction),
    GetChain,
    Chain(Vec<Block>),
}

impl WireMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Block(_) => "block",
            WireMessage::Tx(_) => "tx",
            WireMessage::GetChain => "get_chain",
            WireMessage::Chain(_) => "chain",
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
