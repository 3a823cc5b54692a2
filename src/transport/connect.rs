//! TCP connection establishment.
//!
//! Resolves the target host, filters the results by the configured
//! [`AddressFamily`] and tries each address in resolver order.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;

use tokio::net::{TcpStream, lookup_host};
use tracing::{debug, warn};

use crate::config::AddressFamily;
use crate::error::{Error, Result};

// ============================================================================
// Connect
// ============================================================================

/// Opens a TCP connection to `host:port`.
///
/// Every resolved address accepted by `family` is attempted in turn; the
/// first successful connection wins. `TCP_NODELAY` is enabled so small
/// debugging payloads leave immediately.
///
/// # Errors
///
/// - [`Error::Connection`] if resolution fails or every attempt is refused
/// - [`Error::AddressResolution`] if no address matches `family`
pub async fn connect_tcp(host: &str, port: u16, family: AddressFamily) -> Result<TcpStream> {
    let candidates = resolve(host, port, family).await?;

    let mut last_error = None;
    for addr in candidates {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!(peer = %addr, error = %e, "Failed to set TCP_NODELAY");
                }
                debug!(peer = %addr, "TCP connection established");
                return Ok(stream);
            }
            Err(e) => {
                debug!(peer = %addr, error = %e, "TCP connect attempt failed");
                last_error = Some(e);
            }
        }
    }

    let reason = last_error.map_or_else(|| "no address attempted".to_owned(), |e| e.to_string());
    Err(Error::connection(format!("{host}:{port}: {reason}")))
}

/// Resolves `host:port` to the addresses permitted by `family`.
async fn resolve(host: &str, port: u16, family: AddressFamily) -> Result<Vec<SocketAddr>> {
    let resolved = lookup_host((host, port))
        .await
        .map_err(|e| Error::connection(format!("failed to resolve {host}: {e}")))?;

    let candidates: Vec<SocketAddr> = resolved.filter(|addr| family.accepts(addr)).collect();
    if candidates.is_empty() {
        return Err(Error::address_resolution(host, family));
    }

    debug!(host, count = candidates.len(), %family, "Resolved target");
    Ok(candidates)
}

// ============================================================================
// Tests
// ============================================================================
