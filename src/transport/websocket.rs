//! WebSocket connection establishment.
//!
//! Opens the TCP connection ourselves so the descriptor's address family is
//! honored, then runs the client handshake through `tokio-tungstenite`. For
//! `wss://` targets TLS uses the same client configuration as stream targets.

// ============================================================================
// Imports
// ============================================================================

use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream, client_async_tls_with_config};
use tracing::{debug, info};
use url::Url;

use crate::config::ConnectionDescriptor;
use crate::error::{Error, Result};

use super::connect::connect_tcp;
use super::tls::{self, TlsSummary};

// ============================================================================
// Types
// ============================================================================

/// WebSocket stream over plain or TLS-wrapped TCP.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// Connect
// ============================================================================

/// Connects and performs the WebSocket handshake for `uri`.
///
/// Returns the TLS summary for `wss://` targets.
///
/// # Errors
///
/// - [`Error::Config`] if the URI lacks a host or port
/// - [`Error::Connection`] / [`Error::AddressResolution`] for TCP failures
/// - [`Error::TlsHandshake`] if the `wss://` TLS handshake fails
/// - [`Error::Connection`] if the WebSocket upgrade is rejected
pub async fn connect(
    descriptor: &ConnectionDescriptor,
    uri: &Url,
) -> Result<(WsStream, Option<TlsSummary>)> {
    let host = uri
        .host_str()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
        .ok_or_else(|| Error::config("WebSocket URI has no host"))?;
    let port = uri
        .port_or_known_default()
        .ok_or_else(|| Error::config("WebSocket URI has no port"))?;

    let tcp = connect_tcp(host, port, descriptor.address_family()).await?;

    let connector = if descriptor.uses_tls() {
        Connector::Rustls(tls::client_config(descriptor)?)
    } else {
        Connector::Plain
    };

    let limit = descriptor.max_message_size();
    let config = WebSocketConfig::default()
        .max_message_size(Some(limit))
        .max_frame_size(Some(limit));

    debug!(%uri, max_message_size = limit, "Starting WebSocket handshake");

    let (ws, response) =
        client_async_tls_with_config(uri.as_str(), tcp, Some(config), Some(connector))
            .await
            .map_err(|e| match e {
                WsError::Tls(e) => Error::tls_handshake(e.to_string()),
                WsError::Io(e) if descriptor.uses_tls() => Error::tls_handshake(e.to_string()),
                other => Error::connection(format!("WebSocket handshake failed: {other}")),
            })?;

    info!(%uri, status = %response.status(), "WebSocket connection established");

    let summary = match ws.get_ref() {
        MaybeTlsStream::Rustls(stream) => Some(TlsSummary::from_connection(stream.get_ref().1)),
        _ => None,
    };

    Ok((ws, summary))
}
