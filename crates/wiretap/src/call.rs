use std::fmt;
use std::net::SocketAddr;

use wiretap_types::UNKNOWN_PEER;

/// What the interceptor knows about a call when it is dispatched: the fully
/// qualified method and, if the transport exposes it, the remote address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallInfo {
    method: String,
    peer: Option<String>,
}

impl CallInfo {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            peer: None,
        }
    }

    pub fn with_peer(mut self, peer: impl fmt::Display) -> Self {
        self.peer = Some(peer.to_string());
        self
    }

    /// Attaches a socket address when the transport has one.
    pub fn with_socket_addr(mut self, addr: Option<SocketAddr>) -> Self {
        self.peer = addr.map(|addr| addr.to_string());
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Best-effort remote address, `"unknown"` when the transport had none.
    pub fn peer_address(&self) -> &str {
        self.peer.as_deref().unwrap_or(UNKNOWN_PEER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_defaults_to_unknown() {
        let info = CallInfo::new("/demo.Demo/Hello");
        assert_eq!(info.peer_address(), "unknown");
        assert_eq!(info.with_socket_addr(None).peer_address(), "unknown");
    }

    #[test]
    fn socket_addr_is_rendered() {
        let addr: SocketAddr = "10.1.2.3:50051".parse().expect("fixture addr should parse");
        let info = CallInfo::new("/demo.Demo/Hello").with_socket_addr(Some(addr));
        assert_eq!(info.peer_address(), "10.1.2.3:50051");
    }
}
