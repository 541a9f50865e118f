use crate::constants::*;
use ledger_core::constants::DEFAULT_DIFFICULTY;
use std::time::Duration;

/// Limits for outbound peer exchanges.
#[derive(Clone, Copy, Debug)]
pub struct TransportConfig {
    /// Port used for peers that do not name one.
    pub port: u16,
    /// Bounds connecting and writing.
    pub timeout: Duration,
    /// Bounds the read phase of a chain request.
    pub chain_read_timeout: Duration,
    pub max_chain_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(DEFAULT_PEER_TIMEOUT_SECS),
            chain_read_timeout: Duration::from_secs(DEFAULT_CHAIN_READ_TIMEOUT_SECS),
            max_chain_bytes: DEFAULT_MAX_CHAIN_BYTES,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    /// Required leading zero characters in an inbound block hash.
    pub difficulty: u32,
    pub max_connections: usize,
    pub max_message_bytes: usize,
    pub transport: TransportConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            difficulty: DEFAULT_DIFFICULTY,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            transport: TransportConfig::default(),
        }
    }
}
