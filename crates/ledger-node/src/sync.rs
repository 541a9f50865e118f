use crate::{ledger::Ledger, peers::PeerAddress, transport::PeerTransport};
use tracing::{debug, info};

/// Ask each peer for its chain, in list order, and adopt the first one fork choice
/// prefers. Later peers are not consulted once one qualifies.
pub async fn sync_with_peers(
    ledger: &Ledger,
    peers: &[PeerAddress],
    transport: &PeerTransport,
) -> bool {
    for peer in peers {
        let Some(peer_chain) = transport.request_chain(peer).await else {
            continue;
        };
        let new_len = peer_chain.len();
        match ledger.reorganize(peer_chain).await {
            Some(old_len) => {
                info!(%peer, old_len, new_len, "reorganized chain from peer");
                return true;
            }
            None => debug!(%peer, len = new_len, "peer chain not preferred"),
        }
    }
    false
}
