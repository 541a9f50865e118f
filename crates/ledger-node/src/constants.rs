pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_PEERS_FILE: &str = "peers.txt";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_PEER_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_CHAIN_READ_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_CONNECTIONS: usize = 256;
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 8 * 1024 * 1024;
pub const DEFAULT_MAX_CHAIN_BYTES: usize = 64 * 1024 * 1024;
pub(crate) const READ_CHUNK_SIZE: usize = 8192;
