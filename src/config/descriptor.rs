//! Connection descriptor.
//!
//! Immutable parameters captured at session creation. A descriptor is only
//! obtainable through [`DescriptorBuilder::build`], so every descriptor in
//! circulation has passed validation.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;

use rustls::{ProtocolVersion, SupportedProtocolVersion};
use serde::{Deserialize, Serialize};
use url::Url;

use super::builder::DescriptorBuilder;
use super::encoding::TextEncoding;

// ============================================================================
// Constants
// ============================================================================

/// Largest inbound WebSocket message accepted by default (100 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Default size of a single stream read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

// ============================================================================
// TransportKind
// ============================================================================

/// Framing model of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Byte stream without message boundaries (TCP, optionally TLS).
    Stream,
    /// Message-oriented transport (WebSocket).
    Message,
}

// ============================================================================
// Target
// ============================================================================

/// Where a session connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Raw TCP endpoint.
    Stream {
        /// Host name or IP literal.
        host: String,
        /// TCP port.
        port: u16,
    },
    /// WebSocket endpoint (`ws://` or `wss://`).
    WebSocket {
        /// Full endpoint URI.
        uri: Url,
    },
}

impl Target {
    /// Returns the framing model for this target.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Stream { .. } => TransportKind::Stream,
            Self::WebSocket { .. } => TransportKind::Message,
        }
    }

    /// Returns the host part of the target.
    #[must_use]
    pub fn host(&self) -> &str {
        match self {
            Self::Stream { host, .. } => host,
            Self::WebSocket { uri } => uri.host_str().unwrap_or_default(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream { host, port } if host.contains(':') => write!(f, "[{host}]:{port}"),
            Self::Stream { host, port } => write!(f, "{host}:{port}"),
            Self::WebSocket { uri } => write!(f, "{uri}"),
        }
    }
}

// ============================================================================
// AddressFamily
// ============================================================================

/// Address family preference used when resolving the target host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressFamily {
    /// Try every resolved address, IPv4 and IPv6.
    #[default]
    DualStack,
    /// Only IPv4 addresses.
    Ipv4,
    /// Only IPv6 addresses.
    Ipv6,
}

impl AddressFamily {
    /// Returns `true` if `addr` may be used under this preference.
    #[inline]
    #[must_use]
    pub fn accepts(&self, addr: &SocketAddr) -> bool {
        match self {
            Self::DualStack => true,
            Self::Ipv4 => addr.is_ipv4(),
            Self::Ipv6 => addr.is_ipv6(),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DualStack => "dual-stack",
            Self::Ipv4 => "IPv4",
            Self::Ipv6 => "IPv6",
        })
    }
}

// ============================================================================
// TlsProtocol
// ============================================================================

/// TLS protocol version that may be negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TlsProtocol {
    /// TLS 1.2.
    #[serde(rename = "tls1.2")]
    Tls12,
    /// TLS 1.3.
    #[serde(rename = "tls1.3")]
    Tls13,
}

impl TlsProtocol {
    /// Every version the TLS stack supports, oldest first.
    pub const ALL: [Self; 2] = [Self::Tls12, Self::Tls13];

    /// Returns the human-readable protocol name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Tls12 => "TLS 1.2",
            Self::Tls13 => "TLS 1.3",
        }
    }

    /// Maps a negotiated wire version back to a protocol.
    #[must_use]
    pub fn from_wire(version: ProtocolVersion) -> Option<Self> {
        match version {
            ProtocolVersion::TLSv1_2 => Some(Self::Tls12),
            ProtocolVersion::TLSv1_3 => Some(Self::Tls13),
            _ => None,
        }
    }

    pub(crate) fn rustls_version(&self) -> &'static SupportedProtocolVersion {
        match self {
            Self::Tls12 => &rustls::version::TLS12,
            Self::Tls13 => &rustls::version::TLS13,
        }
    }
}

impl fmt::Display for TlsProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// ConnectionDescriptor
// ============================================================================

/// Immutable configuration of one transport session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub(super) target: Target,
    pub(super) address_family: AddressFamily,
    pub(super) encoding: TextEncoding,
    pub(super) tls: bool,
    pub(super) ignore_certificate_errors: bool,
    pub(super) tls_protocols: Vec<TlsProtocol>,
    pub(super) server_name: Option<String>,
    pub(super) root_certificates: Vec<Vec<u8>>,
    pub(super) max_message_size: usize,
    pub(super) read_chunk_size: usize,
}

impl ConnectionDescriptor {
    /// Starts a builder for a raw TCP target.
    #[inline]
    #[must_use]
    pub fn stream(host: impl Into<String>, port: u16) -> DescriptorBuilder {
        DescriptorBuilder::new().host(host).port(port)
    }

    /// Starts a builder for a WebSocket target.
    #[inline]
    #[must_use]
    pub fn websocket(uri: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder::new().uri(uri)
    }

    /// Returns the connection target.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Returns the framing model.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        self.target.kind()
    }

    /// Returns the address family preference.
    #[inline]
    #[must_use]
    pub fn address_family(&self) -> AddressFamily {
        self.address_family
    }

    /// Returns the text encoding.
    #[inline]
    #[must_use]
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Returns `true` if the connection is TLS-wrapped.
    ///
    /// Streams follow the TLS flag; WebSockets follow the `wss` scheme.
    #[must_use]
    pub fn uses_tls(&self) -> bool {
        match &self.target {
            Target::Stream { .. } => self.tls,
            Target::WebSocket { uri } => uri.scheme() == "wss",
        }
    }

    /// Returns `true` if certificate validation errors are ignored.
    #[inline]
    #[must_use]
    pub fn ignore_certificate_errors(&self) -> bool {
        self.ignore_certificate_errors
    }

    /// Returns the enabled TLS protocol versions.
    #[inline]
    #[must_use]
    pub fn tls_protocols(&self) -> &[TlsProtocol] {
        &self.tls_protocols
    }

    /// Returns the name used for SNI and certificate validation.
    #[must_use]
    pub fn tls_server_name(&self) -> &str {
        self.server_name
            .as_deref()
            .unwrap_or_else(|| self.target.host())
    }

    /// Returns additional DER-encoded trust anchors.
    #[inline]
    #[must_use]
    pub fn root_certificates(&self) -> &[Vec<u8>] {
        &self.root_certificates
    }

    /// Returns the inbound message size limit in bytes.
    #[inline]
    #[must_use]
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Returns the stream read size in bytes.
    #[inline]
    #[must_use]
    pub fn read_chunk_size(&self) -> usize {
        self.read_chunk_size
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.target, self.tls) {
            (Target::Stream { .. }, true) => write!(f, "{} (TCP+TLS)", self.target),
            (Target::Stream { .. }, false) => write!(f, "{} (TCP)", self.target),
            (Target::WebSocket { .. }, _) => write!(f, "{} (WebSocket)", self.target),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_target_display() {
        let v4 = Target::Stream {
            host: "127.0.0.1".into(),
            port: 7,
        };
        let v6 = Target::Stream {
            host: "::1".into(),
            port: 7,
        };
        assert_eq!(v4.to_string(), "127.0.0.1:7");
        assert_eq!(v6.to_string(), "[::1]:7");
    }

    #[test]
    fn test_target_kind_and_host() {
        let ws = Target::WebSocket {
            uri: Url::parse("wss://echo.test/socket").unwrap(),
        };
        assert_eq!(ws.kind(), TransportKind::Message);
        assert_eq!(ws.host(), "echo.test");
    }

    #[test]
    fn test_address_family_accepts() {
        let v4 = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 1);
        let v6 = SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 1);

        assert!(AddressFamily::DualStack.accepts(&v4));
        assert!(AddressFamily::DualStack.accepts(&v6));
        assert!(AddressFamily::Ipv4.accepts(&v4));
        assert!(!AddressFamily::Ipv4.accepts(&v6));
        assert!(AddressFamily::Ipv6.accepts(&v6));
        assert!(!AddressFamily::Ipv6.accepts(&v4));
    }

    #[test]
    fn test_tls_protocol_from_wire() {
        assert_eq!(
            TlsProtocol::from_wire(ProtocolVersion::TLSv1_3),
            Some(TlsProtocol::Tls13)
        );
        assert_eq!(TlsProtocol::from_wire(ProtocolVersion::TLSv1_0), None);
        assert_eq!(TlsProtocol::Tls12.to_string(), "TLS 1.2");
    }

    #[test]
    fn test_descriptor_display() {
        let descriptor = ConnectionDescriptor::stream("localhost", 443)
            .tls(true)
            .build()
            .unwrap();
        assert_eq!(descriptor.to_string(), "localhost:443 (TCP+TLS)");
    }

    #[test]
    fn test_uses_tls_follows_scheme() {
        let plain = ConnectionDescriptor::websocket("ws://localhost/").build().unwrap();
        let secure = ConnectionDescriptor::websocket("wss://localhost/").build().unwrap();
        assert!(!plain.uses_tls());
        assert!(secure.uses_tls());
    }

    #[test]
    fn test_server_name_defaults_to_host() {
        let descriptor = ConnectionDescriptor::stream("example.test", 443)
            .build()
            .unwrap();
        assert_eq!(descriptor.tls_server_name(), "example.test");

        let overridden = ConnectionDescriptor::stream("10.0.0.1", 443)
            .server_name("internal.test")
            .build()
            .unwrap();
        assert_eq!(overridden.tls_server_name(), "internal.test");
    }
}
