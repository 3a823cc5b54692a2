//! Send pipeline.
//!
//! Single consumer of the outbound queue and sole writer to the transport.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::transport::FramedWriter;

use super::core::{SessionInner, cancellable};

// ============================================================================
// Outbound
// ============================================================================

/// Item queued by the session's command surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outbound {
    /// Text to encode and write.
    Text(String),
    /// Half-close the write direction and stop consuming.
    Close,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Runs the send pipeline until cancelled, faulted or half-closed.
///
/// Items are written strictly in queue order. Cancellation while waiting
/// exits silently. A write failure is reported once and faults the session.
pub(crate) async fn run(
    inner: Arc<SessionInner>,
    mut writer: FramedWriter,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) {
    let session = inner.id;
    debug!(%session, "Send pipeline started");

    loop {
        let item = tokio::select! {
            biased;
            _ = inner.io.cancelled() => {
                debug!(%session, "Send pipeline cancelled");
                break;
            }
            item = rx.recv() => item,
        };

        match item {
            Some(Outbound::Text(text)) => {
                let mut scratch = inner.pool.take();
                let written = cancellable(&inner.io, writer.send_text(&text, &mut scratch)).await;
                drop(scratch);

                match written {
                    Ok(()) => {
                        trace!(%session, chars = text.len(), "Outbound item written");
                        inner.events.echo(text);
                    }
                    Err(e) if e.is_cancelled() => break,
                    Err(e) => {
                        inner.fail("Send failed", &e);
                        break;
                    }
                }
            }

            Some(Outbound::Close) => {
                match cancellable(&inner.io, writer.shutdown_write()).await {
                    Ok(()) => inner.events.status("Send channel closed"),
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => inner.fail("Send channel close failed", &e),
                }
                debug!(%session, "Send pipeline finished after half-close");
                return;
            }

            None => {
                debug!(%session, "Outbound queue closed");
                break;
            }
        }
    }

    writer.close().await;
    debug!(%session, "Send pipeline terminated");
}

// ============================================================================
// Tests
// ============================================================================
