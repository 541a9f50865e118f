use std::{fmt, fs, io, net::SocketAddr, path::Path};
use tracing::{info, warn};

/// A peer host, optionally with its own port (`host:port` or a socket address).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeerAddress(String);

impl PeerAddress {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Host and port to dial, falling back to the shared `default_port`.
    pub fn resolve(&self, default_port: u16) -> (String, u16) {
        if let Ok(addr) = self.0.parse::<SocketAddr>() {
            return (addr.ip().to_string(), addr.port());
        }
        if let Some((host, port)) = self.0.rsplit_once(':') {
            // A bare IPv6 literal has more than one colon and no port.
            if !host.contains(':') {
                if let Ok(port) = port.parse() {
                    return (host.to_string(), port);
                }
            }
        }
        (self.0.clone(), default_port)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

/// Parse a peers file: one peer per line, blank lines and `#` comments skipped.
pub fn parse_peers(contents: &str) -> Vec<PeerAddress> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(PeerAddress::new)
        .collect()
}

/// Load the peer list. A missing or unreadable file yields no peers.
pub fn load_peers(path: &Path) -> Vec<PeerAddress> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let peers = parse_peers(&contents);
            info!(path = %path.display(), count = peers.len(), "loaded peers");
            peers
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "no peers file found");
            Vec::new()
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "could not read peers file");
            Vec::new()
        }
    }
}
