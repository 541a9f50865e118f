use crate::{
    config::NodeConfig,
    constants::READ_CHUNK_SIZE,
    error::HandleError,
    ledger::{AppendOutcome, Ledger},
    message::WireMessage,
    peers::PeerAddress,
    sync::sync_with_peers,
    transport::{write_and_close, PeerTransport},
};
use ledger_core::{validate_block, Block, Transaction};
use std::{fmt::Display, io, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite},
    net::TcpListener,
    sync::Semaphore,
    time::timeout,
};
use tracing::{debug, info, warn};

/// What a single inbound connection ended up doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    BlockApplied,
    BlockRejected,
    ForkSyncTriggered { reorganized: bool },
    TxAdded,
    TxDuplicate,
    ChainSent,
    /// A message with no inbound meaning, such as an unsolicited `chain`.
    Ignored,
}

pub struct NodeServer {
    config: NodeConfig,
    ledger: Arc<Ledger>,
    peers: Arc<[PeerAddress]>,
    transport: PeerTransport,
    connections: Arc<Semaphore>,
}

impl NodeServer {
    pub fn new(config: NodeConfig, ledger: Arc<Ledger>, peers: Vec<PeerAddress>) -> Self {
        let transport = PeerTransport::new(config.transport);
        let connections = Arc::new(Semaphore::new(config.max_connections.max(1)));
        Self {
            config,
            ledger,
            peers: peers.into(),
            transport,
            connections,
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn peers(&self) -> &[PeerAddress] {
        &self.peers
    }

    pub fn transport(&self) -> &PeerTransport {
        &self.transport
    }

    pub async fn bind(&self) -> io::Result<TcpListener> {
        TcpListener::bind((self.config.host.as_str(), self.config.port)).await
    }

    /// Accept connections forever, one task per connection, at most
    /// `max_connections` in flight.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "node listening");
        }
        loop {
            let Ok(permit) = Arc::clone(&self.connections).acquire_owned().await else {
                return;
            };
            let (stream, remote) = match listener.accept().await {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(%err, "accept failed");
                    continue;
                }
            };
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                let _permit = permit;
                match server.handle_connection(stream, remote).await {
                    Ok(outcome) => debug!(%remote, ?outcome, "connection closed"),
                    Err(err) => warn!(%remote, error = ?err, "error handling connection"),
                }
            });
        }
    }

    /// Read one message, act on it, and close. Errors never outlive the connection.
    pub async fn handle_connection<S>(
        &self,
        mut stream: S,
        remote: impl Display,
    ) -> Result<Outcome, HandleError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let message = read_message(
            &mut stream,
            self.config.max_message_bytes,
            self.config.transport.timeout,
        )
        .await?;
        debug!(%remote, kind = message.kind(), "decoded message");

        match message {
            WireMessage::Block(block) => Ok(self.ingest_block(block, &remote).await),
            WireMessage::Tx(tx) => Ok(self.ingest_transaction(tx, &remote).await),
            WireMessage::GetChain => self.serve_chain(&mut stream, &remote).await,
            WireMessage::Chain(chain) => {
                debug!(%remote, len = chain.len(), "ignoring unsolicited chain");
                Ok(Outcome::Ignored)
            }
        }
    }

    async fn ingest_block(&self, block: Block, remote: &impl Display) -> Outcome {
        if let Err(err) = validate_block(&block, self.config.difficulty) {
            warn!(%remote, %err, "invalid block received");
            return Outcome::BlockRejected;
        }

        match self.ledger.try_append(block).await {
            AppendOutcome::Appended { index } => {
                info!(%remote, index, "new valid block added");
                Outcome::BlockApplied
            }
            AppendOutcome::NotLinked { index, expected } => {
                info!(
                    %remote,
                    index,
                    expected,
                    "potential fork detected, synchronizing with peers"
                );
                let reorganized = sync_with_peers(&self.ledger, &self.peers, &self.transport).await;
                Outcome::ForkSyncTriggered { reorganized }
            }
        }
    }

    async fn ingest_transaction(&self, tx: Transaction, remote: &impl Display) -> Outcome {
        if self.ledger.add_transaction(tx).await {
            info!(%remote, "transaction received");
            Outcome::TxAdded
        } else {
            debug!(%remote, "duplicate transaction");
            Outcome::TxDuplicate
        }
    }

    async fn serve_chain<S>(
        &self,
        stream: &mut S,
        remote: &impl Display,
    ) -> Result<Outcome, HandleError>
    where
        S: AsyncWrite + Unpin,
    {
        let chain = self.ledger.snapshot().await;
        let len = chain.len();
        let bytes = WireMessage::Chain(chain).to_bytes()?;
        timeout(
            self.config.transport.chain_read_timeout,
            write_and_close(stream, &bytes),
        )
        .await??;
        info!(%remote, len, "sent chain");
        Ok(Outcome::ChainSent)
    }
}

async fn read_message<S>(
    stream: &mut S,
    max_bytes: usize,
    limit: Duration,
) -> Result<WireMessage, HandleError>
where
    S: AsyncRead + Unpin,
{
    timeout(limit, read_until_complete(stream, max_bytes)).await?
}

/// Read until the bytes form one complete message or the peer closes, whichever
/// comes first. Works with senders that half-close and with ones that wait.
/// Parsing is only attempted when a read leaves `}` at the end of the buffer.
async fn read_until_complete<S>(stream: &mut S, max_bytes: usize) -> Result<WireMessage, HandleError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK_SIZE);
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Err(HandleError::Empty);
            }
            return Ok(WireMessage::from_slice(&buf)?);
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > max_bytes {
            return Err(HandleError::TooLarge { limit: max_bytes });
        }
        // A message can only be complete once the buffer ends in a closing brace.
        if buf.trim_ascii_end().last() != Some(&b'}') {
            continue;
        }
        match WireMessage::from_slice(&buf) {
            Ok(message) => return Ok(message),
            Err(err) if err.is_eof() => continue,
            Err(err) => return Err(err.into()),
        }
    }
}
