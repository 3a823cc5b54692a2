//! TLS negotiation for stream transports.
//!
//! Builds a `rustls` client configuration from a [`ConnectionDescriptor`],
//! performs the handshake over an established TCP stream and summarizes the
//! negotiated parameters for display.
//!
//! # Certificate Validation
//!
//! | `ignore_certificate_errors` | Verifier |
//! |-----------------------------|----------|
//! | `false` | webpki roots plus any extra trust anchors from the descriptor |
//! | `true` | [`AcceptAnyCertificate`]: chain and name are not checked, handshake signatures still are |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{
    ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme,
    SupportedProtocolVersion,
};
use sha2::{Digest, Sha256};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info, warn};

use crate::config::{ConnectionDescriptor, TlsProtocol};
use crate::error::{Error, Result};

// ============================================================================
// Client Configuration
// ============================================================================

/// Builds the client configuration for `descriptor`.
///
/// Shared by the stream negotiator and `wss://` WebSocket connections.
///
/// # Errors
///
/// Returns [`Error::Tls`] if the protocol set is unsupported or an extra
/// trust anchor is not a valid certificate.
pub fn client_config(descriptor: &ConnectionDescriptor) -> Result<Arc<ClientConfig>> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let versions: Vec<&'static SupportedProtocolVersion> = descriptor
        .tls_protocols()
        .iter()
        .map(TlsProtocol::rustls_version)
        .collect();

    let builder =
        ClientConfig::builder_with_provider(Arc::clone(&provider)).with_protocol_versions(&versions)?;

    let config = if descriptor.ignore_certificate_errors() {
        warn!(
            target_name = descriptor.tls_server_name(),
            "Certificate validation disabled"
        );
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate::new(provider)))
            .with_no_client_auth()
    } else {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        for der in descriptor.root_certificates() {
            roots.add(CertificateDer::from(der.clone()))?;
        }
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    Ok(Arc::new(config))
}

/// Parses the SNI / validation name.
///
/// # Errors
///
/// Returns [`Error::InvalidServerName`] for names that are neither DNS names
/// nor IP literals.
pub fn server_name(name: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(name.to_owned()).map_err(|_| Error::invalid_server_name(name))
}

// ============================================================================
// Negotiation
// ============================================================================

/// Performs the TLS handshake over `tcp`.
///
/// On failure the partially established TLS state and `tcp` are dropped
/// before the error is returned, so no half-open socket survives.
///
/// # Errors
///
/// - [`Error::Tls`] / [`Error::InvalidServerName`] for configuration problems
/// - [`Error::TlsHandshake`] if the handshake itself fails
pub async fn negotiate(
    tcp: TcpStream,
    descriptor: &ConnectionDescriptor,
) -> Result<(TlsStream<TcpStream>, TlsSummary)> {
    let config = client_config(descriptor)?;
    let name = server_name(descriptor.tls_server_name())?;

    debug!(
        target_name = descriptor.tls_server_name(),
        protocols = ?descriptor.tls_protocols(),
        "Starting TLS handshake"
    );

    let stream = TlsConnector::from(config)
        .connect(name, tcp)
        .await
        .map_err(|e| {
            warn!(error = %e, "TLS handshake failed");
            Error::tls_handshake(e.to_string())
        })?;

    let summary = TlsSummary::from_connection(stream.get_ref().1);
    info!(
        protocol = ?summary.protocol,
        cipher = %summary.cipher_suite,
        "TLS negotiated"
    );

    Ok((stream, summary))
}

// ============================================================================
// TlsSummary
// ============================================================================

/// Negotiated TLS parameters.
///
/// `Display` renders the single status line reported to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSummary {
    /// Negotiated protocol version.
    pub protocol: Option<TlsProtocol>,
    /// Negotiated cipher suite name.
    pub cipher_suite: String,
    /// Peer leaf certificate details, if one was presented.
    pub certificate: Option<CertificateSummary>,
}

/// Peer certificate details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    /// Upper-case hex SHA-256 digest of the DER certificate.
    pub fingerprint: String,
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// End of the validity period.
    pub not_after: String,
}

impl TlsSummary {
    /// Extracts the summary from an established client connection.
    #[must_use]
    pub fn from_connection(connection: &ClientConnection) -> Self {
        let protocol = connection
            .protocol_version()
            .and_then(TlsProtocol::from_wire);
        let cipher_suite = connection
            .negotiated_cipher_suite()
            .map_or_else(|| "unknown".to_owned(), |suite| format!("{:?}", suite.suite()));
        let certificate = connection
            .peer_certificates()
            .and_then(|chain| chain.first())
            .map(|leaf| CertificateSummary::from_der(leaf.as_ref()));

        Self {
            protocol,
            cipher_suite,
            certificate,
        }
    }
}

impl CertificateSummary {
    /// Summarizes a DER certificate.
    ///
    /// Certificates that do not parse still get a fingerprint.
    #[must_use]
    pub fn from_der(der: &[u8]) -> Self {
        let fingerprint = hex::encode_upper(Sha256::digest(der));

        match x509_parser::parse_x509_certificate(der) {
            Ok((_, cert)) => Self {
                fingerprint,
                subject: cert.subject().to_string(),
                issuer: cert.issuer().to_string(),
                not_after: cert.validity().not_after.to_string(),
            },
            Err(e) => {
                debug!(error = %e, "Peer certificate did not parse");
                Self {
                    fingerprint,
                    subject: "unparsable".to_owned(),
                    issuer: "unparsable".to_owned(),
                    not_after: "unknown".to_owned(),
                }
            }
        }
    }
}

impl fmt::Display for TlsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let protocol = self.protocol.map_or("unknown protocol", |p| p.name());
        write!(f, "TLS negotiated: {protocol}, cipher {}", self.cipher_suite)?;
        match &self.certificate {
            Some(cert) => write!(
                f,
                "; certificate SHA-256 {}, subject {}, issuer {}, expires {}",
                cert.fingerprint, cert.subject, cert.issuer, cert.not_after
            ),
            None => f.write_str("; no peer certificate"),
        }
    }
}

// ============================================================================
// AcceptAnyCertificate
// ============================================================================

/// Verifier used when certificate errors are ignored.
///
/// Accepts any chain and any name. Handshake signatures are still checked
/// against the presented certificate.
#[derive(Debug)]
pub struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl AcceptAnyCertificate {
    /// Creates a verifier using `provider`'s signature algorithms.
    #[must_use]
    pub fn new(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

// ============================================================================
// Tests
// ============================================================================
