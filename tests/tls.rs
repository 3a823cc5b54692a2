//! TLS negotiation against in-process rustls peers with rcgen certificates.

mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::version::{TLS12, TLS13};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::accept_async;

use duplex_session::session::{STATUS_ABORTED, STATUS_FAILED};
use duplex_session::{AddressFamily, ConnectionDescriptor, SessionState, TlsProtocol};

use common::{
    Captured, capture_until, capture_until_finished, drain_ready, init_tracing, listener,
    open_session, spawn_silent_peer,
};

// ============================================================================
// Certificates
// ============================================================================

/// Self-signed certificate for `localhost` and its PKCS#8 key.
fn self_signed() -> Result<(CertificateDer<'static>, PrivateKeyDer<'static>)> {
    let mut params = CertificateParams::new(vec!["localhost".to_owned()])?;
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "duplex-session test peer");
    params.distinguished_name = dn;

    let key_pair = KeyPair::generate()?;
    let certificate = params.self_signed(&key_pair)?;
    let key = PrivatePkcs8KeyDer::from(key_pair.serialize_der());

    Ok((certificate.der().clone(), PrivateKeyDer::Pkcs8(key)))
}

fn server_config(
    cert: CertificateDer<'static>,
    key: PrivateKeyDer<'static>,
    versions: &[&'static rustls::SupportedProtocolVersion],
) -> Result<Arc<ServerConfig>> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(versions)?
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .context("server certificate rejected")?;
    Ok(Arc::new(config))
}

// ============================================================================
// Peers
// ============================================================================

/// TLS echo peer. Resolves to `false` if the client aborted the handshake.
async fn spawn_tls_echo(config: Arc<ServerConfig>) -> Result<(u16, JoinHandle<Result<bool>>)> {
    let (listener, port) = listener().await?;
    let handle = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await?;
        let Ok(stream) = TlsAcceptor::from(config).accept(tcp).await else {
            return Ok::<_, anyhow::Error>(false);
        };
        let (mut read, mut write) = tokio::io::split(stream);
        let _ = tokio::io::copy(&mut read, &mut write).await;
        Ok(true)
    });
    Ok((port, handle))
}

/// `wss://` echo peer.
async fn spawn_wss_echo(config: Arc<ServerConfig>) -> Result<u16> {
    let (listener, port) = listener().await?;
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await?;
        let stream = TlsAcceptor::from(config).accept(tcp).await?;
        let mut ws = accept_async(stream).await?;
        while let Some(Ok(message)) = ws.next().await {
            if message.is_text() || message.is_binary() {
                ws.send(message).await?;
            }
        }
        Ok::<_, anyhow::Error>(())
    });
    Ok(port)
}

fn tls_descriptor(port: u16) -> duplex_session::DescriptorBuilder {
    ConnectionDescriptor::stream("127.0.0.1", port)
        .tls(true)
        .server_name("localhost")
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_tls_with_trusted_certificate() -> Result<()> {
    init_tracing();
    let (cert, key) = self_signed()?;
    let fingerprint = hex::encode_upper(Sha256::digest(cert.as_ref()));
    let (port, _peer) = spawn_tls_echo(server_config(cert.clone(), key, &[&TLS12])?).await?;

    let descriptor = tls_descriptor(port)
        .root_certificate(cert.as_ref().to_vec())
        .build()?;
    let (session, mut events) = open_session(descriptor);

    session.start()?;
    session.send("secure\n")?;

    let mut captured = Captured::default();
    capture_until(&mut events, &mut captured, |c| c.inbound() == "secure\n").await?;

    assert!(captured.has_status("TLS negotiated: TLS 1.2"));
    assert!(captured.has_status(&format!("certificate SHA-256 {fingerprint}")));
    assert!(captured.has_status("duplex-session test peer"));
    assert_eq!(session.state(), SessionState::Open);

    session.stop().await;
    drain_ready(&mut events, &mut captured);
    assert_eq!(captured.finished, 1);
    assert_ne!(session.state(), SessionState::Faulted);
    Ok(())
}

#[tokio::test]
async fn test_tls_ignore_certificate_errors() -> Result<()> {
    init_tracing();
    let (cert, key) = self_signed()?;
    let (port, peer) = spawn_tls_echo(server_config(cert, key, &[&TLS13])?).await?;

    let descriptor = tls_descriptor(port).ignore_certificate_errors(true).build()?;
    let (session, mut events) = open_session(descriptor);

    session.start()?;
    session.send("anyway")?;

    let mut captured = Captured::default();
    capture_until(&mut events, &mut captured, |c| c.inbound() == "anyway").await?;
    assert!(captured.has_status("TLS negotiated: TLS 1.3"));

    session.stop().await;
    assert!(peer.await??);
    Ok(())
}

#[tokio::test]
async fn test_tls_untrusted_certificate_fails() -> Result<()> {
    init_tracing();
    let (cert, key) = self_signed()?;
    let (port, peer) = spawn_tls_echo(server_config(cert, key, &[&TLS12, &TLS13])?).await?;

    let (session, mut events) = open_session(tls_descriptor(port).build()?);
    session.start()?;
    let captured = capture_until_finished(&mut events).await?;

    assert!(captured.has_status("TLS handshake failed"));
    assert!(!captured.has_status("TLS negotiated"));
    assert_eq!(captured.last_status(), Some(STATUS_FAILED));
    assert_eq!(session.state(), SessionState::Faulted);
    assert!(!peer.await??);
    Ok(())
}

#[tokio::test]
async fn test_tls_protocol_mismatch_fails() -> Result<()> {
    init_tracing();
    let (cert, key) = self_signed()?;
    let (port, _peer) = spawn_tls_echo(server_config(cert, key, &[&TLS12])?).await?;

    let descriptor = tls_descriptor(port)
        .ignore_certificate_errors(true)
        .tls_protocols([TlsProtocol::Tls13])
        .build()?;
    let (session, mut events) = open_session(descriptor);

    session.start()?;
    let captured = capture_until_finished(&mut events).await?;

    assert!(captured.has_status("TLS handshake failed"));
    assert_eq!(session.state(), SessionState::Faulted);
    Ok(())
}

#[tokio::test]
async fn test_secure_websocket_round_trip() -> Result<()> {
    init_tracing();
    let (cert, key) = self_signed()?;
    let port = spawn_wss_echo(server_config(cert, key, &[&TLS13])?).await?;

    let descriptor = ConnectionDescriptor::websocket(format!("wss://localhost:{port}/"))
        .address_family(AddressFamily::Ipv4)
        .ignore_certificate_errors(true)
        .build()?;
    let (session, mut events) = open_session(descriptor);

    session.start()?;
    session.send("over wss")?;

    let mut captured = Captured::default();
    capture_until(&mut events, &mut captured, |c| c.inbound() == "over wss").await?;
    assert!(captured.has_status("TLS negotiated: TLS 1.3"));

    session.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_stop_during_tls_handshake() -> Result<()> {
    init_tracing();
    let (port, peer) = spawn_silent_peer().await?;
    let descriptor = tls_descriptor(port).ignore_certificate_errors(true).build()?;
    let (session, mut events) = open_session(descriptor);

    session.start()?;
    let mut captured = Captured::default();
    capture_until(&mut events, &mut captured, |c| c.has_status("Negotiating TLS")).await?;
    assert_eq!(session.state(), SessionState::TlsNegotiating);

    timeout(Duration::from_secs(5), session.stop()).await?;
    drain_ready(&mut events, &mut captured);

    assert_eq!(captured.finished, 1);
    assert_eq!(captured.last_status(), Some(STATUS_ABORTED));
    assert!(!captured.has_status("TLS handshake failed"));
    assert_eq!(session.state(), SessionState::Closed);
    timeout(Duration::from_secs(5), peer).await???;
    Ok(())
}
