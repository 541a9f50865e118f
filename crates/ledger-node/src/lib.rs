//! Peer-to-peer half of the ledger node: the JSON wire protocol, outbound peer
//! transport, fork-resolving sync, and the inbound connection server.

pub mod config;
pub mod constants;
pub mod error;
pub mod http;
pub mod ledger;
pub mod message;
pub mod peers;
pub mod server;
pub mod sync;
pub mod transport;

pub use config::{NodeConfig, TransportConfig};
pub use error::{HandleError, TransportError};
pub use ledger::{AppendOutcome, Ledger};
pub use message::WireMessage;
pub use peers::{load_peers, PeerAddress};
pub use server::{NodeServer, Outcome};
pub use sync::sync_with_peers;
pub use transport::PeerTransport;
