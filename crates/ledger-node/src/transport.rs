//! Outbound peer exchanges. Each request uses its own short-lived connection.

use crate::{
    config::TransportConfig, error::TransportError, message::WireMessage, peers::PeerAddress,
};
use ledger_core::{Block, Transaction};
use std::io;
use tokio::{
    io::{AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::{debug, warn};

/// Write `bytes` and shut down the write half.
pub(crate) async fn write_and_close<S>(stream: &mut S, bytes: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(bytes).await?;
    stream.shutdown().await
}

#[derive(Clone, Debug, Default)]
pub struct PeerTransport {
    config: TransportConfig,
}

impl PeerTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    async fn connect(&self, peer: &PeerAddress) -> Result<TcpStream, TransportError> {
        let (host, port) = peer.resolve(self.config.port);
        Ok(timeout(self.config.timeout, TcpStream::connect((host.as_str(), port))).await??)
    }

    /// Write one message and close. Nothing is read back.
    async fn push(&self, peer: &PeerAddress, message: &WireMessage) -> Result<(), TransportError> {
        let bytes = message.to_bytes()?;
        let mut stream = self.connect(peer).await?;
        timeout(self.config.timeout, write_and_close(&mut stream, &bytes)).await??;
        Ok(())
    }

    pub async fn send_block(&self, peer: &PeerAddress, block: &Block) -> Result<(), TransportError> {
        self.push(peer, &WireMessage::Block(block.clone())).await
    }

    pub async fn send_transaction(
        &self,
        peer: &PeerAddress,
        tx: &Transaction,
    ) -> Result<(), TransportError> {
        self.push(peer, &WireMessage::Tx(tx.clone())).await
    }

    /// Ask `peer` for its full chain. The response ends when the peer closes.
    pub async fn fetch_chain(&self, peer: &PeerAddress) -> Result<Vec<Block>, TransportError> {
        let request = WireMessage::GetChain.to_bytes()?;
        let mut stream = self.connect(peer).await?;
        // Half-close so peers that read to end-of-stream see the request end.
        timeout(self.config.timeout, write_and_close(&mut stream, &request)).await??;

        let limit = self.config.max_chain_bytes;
        let mut buf = Vec::new();
        let mut limited = (&mut stream).take(limit as u64 + 1);
        timeout(self.config.chain_read_timeout, limited.read_to_end(&mut buf)).await??;
        if buf.len() > limit {
            return Err(TransportError::TooLarge { limit });
        }

        match WireMessage::from_slice(&buf)? {
            WireMessage::Chain(chain) => Ok(chain),
            other => Err(TransportError::UnexpectedResponse(other.kind())),
        }
    }

    /// `fetch_chain`, with any failure logged and turned into `None`.
    pub async fn request_chain(&self, peer: &PeerAddress) -> Option<Vec<Block>> {
        match self.fetch_chain(peer).await {
            Ok(chain) => {
                debug!(%peer, len = chain.len(), "received chain");
                Some(chain)
            }
            Err(err) => {
                warn!(%peer, %err, "failed to get chain from peer");
                None
            }
        }
    }

    /// Push `block` to every peer in order. Returns how many sends succeeded.
    pub async fn broadcast_block(&self, peers: &[PeerAddress], block: &Block) -> usize {
        let mut delivered = 0;
        for peer in peers {
            match self.send_block(peer, block).await {
                Ok(()) => delivered += 1,
                Err(err) => warn!(%peer, %err, index = block.index, "failed to send block"),
            }
        }
        delivered
    }

    /// Push `tx` to every peer in order. Returns how many sends succeeded.
    pub async fn broadcast_transaction(&self, peers: &[PeerAddress], tx: &Transaction) -> usize {
        let mut delivered = 0;
        for peer in peers {
            match self.send_transaction(peer, tx).await {
                Ok(()) => delivered += 1,
                Err(err) => warn!(%peer, %err, "failed to send transaction"),
            }
        }
        delivered
    }
}
