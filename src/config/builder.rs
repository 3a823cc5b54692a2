//! Builder pattern for connection descriptors.
//!
//! Provides a fluent API for configuring and validating a
//! [`ConnectionDescriptor`]. The builder is also `serde`-enabled so hosts can
//! keep connection presets as JSON.
//!
//! # Example
//!
//! ```no_run
//! use duplex_session::{ConnectionDescriptor, DescriptorBuilder};
//!
//! # fn example() -> duplex_session::Result<()> {
//! let descriptor = ConnectionDescriptor::websocket("wss://echo.example/socket")
//!     .ignore_certificate_errors(true)
//!     .build()?;
//!
//! let preset = DescriptorBuilder::from_json(r#"{ "host": "localhost", "port": 7 }"#)?
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

use super::descriptor::{
    AddressFamily, ConnectionDescriptor, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_READ_CHUNK_SIZE,
    Target, TlsProtocol,
};
use super::encoding::TextEncoding;

// ============================================================================
// DescriptorBuilder
// ============================================================================

/// Builder for a [`ConnectionDescriptor`].
///
/// Use [`ConnectionDescriptor::stream`] or [`ConnectionDescriptor::websocket`]
/// to start one.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DescriptorBuilder {
    /// Stream target host.
    host: Option<String>,
    /// Stream target port.
    port: Option<u16>,
    /// WebSocket target URI.
    uri: Option<String>,
    /// Address family preference.
    address_family: AddressFamily,
    /// Encoding label.
    encoding: Option<String>,
    /// Wrap the stream in TLS.
    tls: bool,
    /// Accept any server certificate.
    ignore_certificate_errors: bool,
    /// Enabled TLS versions.
    tls_protocols: Option<Vec<TlsProtocol>>,
    /// SNI / validation name override.
    server_name: Option<String>,
    /// Extra DER trust anchors.
    #[serde(skip)]
    root_certificates: Vec<Vec<u8>>,
    /// Inbound message size limit.
    max_message_size: Option<usize>,
    /// Stream read size.
    read_chunk_size: Option<usize>,
}

// ============================================================================
// DescriptorBuilder Implementation
// ============================================================================

impl DescriptorBuilder {
    /// Creates an empty builder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a builder from a JSON preset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the preset is malformed or has unknown keys.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the stream target host.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the stream target port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the WebSocket target URI.
    #[inline]
    #[must_use]
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Sets the address family preference.
    #[inline]
    #[must_use]
    pub fn address_family(mut self, family: AddressFamily) -> Self {
        self.address_family = family;
        self
    }

    /// Sets the text encoding by label (e.g. `"utf-8"`, `"windows-1252"`).
    #[inline]
    #[must_use]
    pub fn encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = Some(label.into());
        self
    }

    /// Enables or disables TLS on a stream target.
    #[inline]
    #[must_use]
    pub fn tls(mut self, enabled: bool) -> Self {
        self.tls = enabled;
        self
    }

    /// Accepts any server certificate when set.
    #[inline]
    #[must_use]
    pub fn ignore_certificate_errors(mut self, ignore: bool) -> Self {
        self.ignore_certificate_errors = ignore;
        self
    }

    /// Sets the enabled TLS protocol versions.
    #[inline]
    #[must_use]
    pub fn tls_protocols(mut self, protocols: impl IntoIterator<Item = TlsProtocol>) -> Self {
        self.tls_protocols = Some(protocols.into_iter().collect());
        self
    }

    /// Overrides the name used for SNI and certificate validation.
    #[inline]
    #[must_use]
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Trusts an additional DER-encoded certificate.
    #[inline]
    #[must_use]
    pub fn root_certificate(mut self, der: impl Into<Vec<u8>>) -> Self {
        self.root_certificates.push(der.into());
        self
    }

    /// Sets the inbound message size limit in bytes.
    #[inline]
    #[must_use]
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = Some(bytes);
        self
    }

    /// Sets the stream read size in bytes.
    #[inline]
    #[must_use]
    pub fn read_chunk_size(mut self, bytes: usize) -> Self {
        self.read_chunk_size = Some(bytes);
        self
    }

    /// Builds the descriptor with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the target is missing, ambiguous or inconsistent
    /// - [`Error::Url`] if the WebSocket URI does not parse
    /// - [`Error::UnknownEncoding`] if the encoding label is unknown
    pub fn build(self) -> Result<ConnectionDescriptor> {
        let target = self.validate_target()?;
        let encoding = self.validate_encoding()?;
        let tls_protocols = self.validate_protocols()?;

        if self.tls && matches!(target, Target::WebSocket { .. }) {
            return Err(Error::config(
                "TLS flag applies to stream targets only. Use a wss:// URI instead.",
            ));
        }

        let max_message_size = self.max_message_size.unwrap_or(DEFAULT_MAX_MESSAGE_SIZE);
        if max_message_size == 0 {
            return Err(Error::config("max_message_size must be greater than zero"));
        }

        let read_chunk_size = self.read_chunk_size.unwrap_or(DEFAULT_READ_CHUNK_SIZE);
        if read_chunk_size == 0 {
            return Err(Error::config("read_chunk_size must be greater than zero"));
        }

        Ok(ConnectionDescriptor {
            target,
            address_family: self.address_family,
            encoding,
            tls: self.tls,
            ignore_certificate_errors: self.ignore_certificate_errors,
            tls_protocols,
            server_name: self.server_name,
            root_certificates: self.root_certificates,
            max_message_size,
            read_chunk_size,
        })
    }
}

// ============================================================================
// Validation
// ============================================================================

impl DescriptorBuilder {
    /// Validates the target configuration.
    fn validate_target(&self) -> Result<Target> {
        match (&self.host, self.port, &self.uri) {
            (Some(_), _, Some(_)) | (_, Some(_), Some(_)) => Err(Error::config(
                "Both a stream endpoint and a WebSocket URI are set. Pick one.",
            )),

            (None, None, Some(uri)) => {
                let uri = Url::parse(uri)?;
                if !matches!(uri.scheme(), "ws" | "wss") {
                    return Err(Error::config(format!(
                        "Unsupported WebSocket scheme '{}'. Expected ws:// or wss://",
                        uri.scheme()
                    )));
                }
                if uri.host_str().is_none() {
                    return Err(Error::config("WebSocket URI has no host"));
                }
                Ok(Target::WebSocket { uri })
            }

            (Some(host), Some(port), None) => {
                let host = host.trim();
                if host.is_empty() {
                    return Err(Error::config("Host must not be empty"));
                }
                if port == 0 {
                    return Err(Error::config("Port must be between 1 and 65535"));
                }
                Ok(Target::Stream {
                    host: host.to_owned(),
                    port,
                })
            }

            (Some(_), None, None) => Err(Error::config("Stream target requires a port")),
            (None, Some(_), None) => Err(Error::config("Stream target requires a host")),

            (None, None, None) => Err(Error::config(
                "Target is required. Use ConnectionDescriptor::stream() or ::websocket().\n\
                 Example: ConnectionDescriptor::stream(\"127.0.0.1\", 7)",
            )),
        }
    }

    /// Validates the encoding label.
    fn validate_encoding(&self) -> Result<TextEncoding> {
        match &self.encoding {
            Some(label) => TextEncoding::for_label(label),
            None => Ok(TextEncoding::UTF8),
        }
    }

    /// Validates and normalizes the protocol set.
    fn validate_protocols(&self) -> Result<Vec<TlsProtocol>> {
        let mut protocols = self
            .tls_protocols
            .clone()
            .unwrap_or_else(|| TlsProtocol::ALL.to_vec());
        protocols.sort_unstable();
        protocols.dedup();

        if protocols.is_empty() {
            return Err(Error::config("At least one TLS protocol must be enabled"));
        }
        Ok(protocols)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::TransportKind;

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = DescriptorBuilder::new();
        assert!(builder.host.is_none());
        assert!(builder.uri.is_none());
        assert!(!builder.tls);
    }

    #[test]
    fn test_stream_defaults() {
        let descriptor = ConnectionDescriptor::stream("127.0.0.1", 7).build().unwrap();
        assert_eq!(descriptor.kind(), TransportKind::Stream);
        assert_eq!(descriptor.encoding(), TextEncoding::UTF8);
        assert_eq!(descriptor.address_family(), AddressFamily::DualStack);
        assert_eq!(descriptor.tls_protocols(), &TlsProtocol::ALL);
        assert_eq!(descriptor.max_message_size(), DEFAULT_MAX_MESSAGE_SIZE);
        assert_eq!(descriptor.read_chunk_size(), DEFAULT_READ_CHUNK_SIZE);
        assert!(!descriptor.uses_tls());
    }

    #[test]
    fn test_build_without_target_fails() {
        let err = DescriptorBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_build_with_both_targets_fails() {
        let err = ConnectionDescriptor::stream("localhost", 80)
            .uri("ws://localhost/")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Pick one"));
    }

    #[test]
    fn test_port_zero_rejected() {
        let err = ConnectionDescriptor::stream("localhost", 0).build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_blank_host_rejected() {
        let err = ConnectionDescriptor::stream("  ", 80).build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_websocket_scheme_checked() {
        let err = ConnectionDescriptor::websocket("http://localhost/")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported WebSocket scheme"));
    }

    #[test]
    fn test_websocket_uri_parse_error() {
        let err = ConnectionDescriptor::websocket("::nope").build().unwrap_err();
        assert!(matches!(err, Error::Url(_)));
    }

    #[test]
    fn test_tls_flag_rejected_for_websocket() {
        let err = ConnectionDescriptor::websocket("ws://localhost/")
            .tls(true)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("wss://"));
    }

    #[test]
    fn test_unknown_encoding_rejected() {
        let err = ConnectionDescriptor::stream("localhost", 7)
            .encoding("ebcdic-klingon")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::UnknownEncoding { .. }));
    }

    #[test]
    fn test_empty_protocol_set_rejected() {
        let err = ConnectionDescriptor::stream("localhost", 443)
            .tls(true)
            .tls_protocols(Vec::<TlsProtocol>::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("TLS protocol"));
    }

    #[test]
    fn test_protocols_deduplicated_and_sorted() {
        let descriptor = ConnectionDescriptor::stream("localhost", 443)
            .tls_protocols([TlsProtocol::Tls13, TlsProtocol::Tls12, TlsProtocol::Tls13])
            .build()
            .unwrap();
        assert_eq!(
            descriptor.tls_protocols(),
            &[TlsProtocol::Tls12, TlsProtocol::Tls13]
        );
    }

    #[test]
    fn test_zero_limits_rejected() {
        assert!(
            ConnectionDescriptor::websocket("ws://localhost/")
                .max_message_size(0)
                .build()
                .is_err()
        );
        assert!(
            ConnectionDescriptor::stream("localhost", 7)
                .read_chunk_size(0)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_from_json_preset() {
        let json = r#"{
            "host": "localhost",
            "port": 6000,
            "address_family": "ipv6",
            "encoding": "windows-1252",
            "tls": true,
            "ignore_certificate_errors": true,
            "tls_protocols": ["tls1.3"]
        }"#;
        let descriptor = DescriptorBuilder::from_json(json).unwrap().build().unwrap();

        assert_eq!(descriptor.address_family(), AddressFamily::Ipv6);
        assert_eq!(descriptor.encoding().name(), "windows-1252");
        assert!(descriptor.uses_tls());
        assert!(descriptor.ignore_certificate_errors());
        assert_eq!(descriptor.tls_protocols(), &[TlsProtocol::Tls13]);
    }

    #[test]
    fn test_from_json_rejects_unknown_keys() {
        let err = DescriptorBuilder::from_json(r#"{ "hots": "localhost" }"#).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
