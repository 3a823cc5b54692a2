//! Receive pipeline.
//!
//! The session task: establishes the transport, starts the send pipeline as
//! a child task, reads until the peer ends or the scope is cancelled, joins
//! the child and reports completion.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::Target;
use crate::error::Result;
use crate::transport::{FramedIo, FramedReader, Inbound, connect_tcp, tls, websocket};

use super::core::{SessionInner, cancellable};
use super::send::{self, Outbound};
use super::state::SessionState;

// ============================================================================
// Session Task
// ============================================================================

/// Runs the whole session lifecycle.
///
/// Never returns an error: every failure becomes a status notification.
pub(crate) async fn run(inner: Arc<SessionInner>, rx: mpsc::UnboundedReceiver<Outbound>) {
    let session = inner.id;
    debug!(%session, target = %inner.descriptor, "Session task started");

    match establish(&inner).await {
        Ok(io) => {
            inner.state.transition(SessionState::Open);
            info!(%session, target = %inner.descriptor, "Session open");

            let (reader, writer) = io.split(&inner.descriptor);
            let sender = tokio::spawn(send::run(Arc::clone(&inner), writer, rx));

            read_loop(&inner, reader).await;

            inner.state.transition(SessionState::Closing);
            inner.io.cancel();
            if let Err(e) = sender.await {
                error!(%session, error = %e, "Send pipeline panicked");
                inner.mark_faulted();
            }
        }
        Err(e) => {
            if e.is_cancelled() {
                debug!(%session, "Connect cancelled");
            } else {
                inner.fail(&format!("Unable to connect to {}", inner.descriptor), &e);
            }
            drop(rx);
            inner.state.transition(SessionState::Closing);
        }
    }

    let (state, text) = inner.final_outcome();
    inner.state.transition(state);
    inner.events.finish(text);
    inner.done.cancel();

    debug!(%session, %state, "Session task terminated");
}

/// Connects and, when requested, negotiates TLS.
async fn establish(inner: &SessionInner) -> Result<FramedIo> {
    let descriptor = &inner.descriptor;

    match descriptor.target() {
        Target::Stream { host, port } => {
            let tcp = cancellable(
                &inner.io,
                connect_tcp(host, *port, descriptor.address_family()),
            )
            .await?;
            let local = tcp.local_addr()?;
            let peer = tcp.peer_addr()?;
            inner
                .events
                .status(format!("Connection established: {local} -> {peer}"));

            if !descriptor.uses_tls() {
                return Ok(FramedIo::Stream(Box::new(tcp)));
            }

            inner.state.transition(SessionState::TlsNegotiating);
            inner.events.status(format!(
                "Negotiating TLS with {}",
                descriptor.tls_server_name()
            ));
            let (stream, summary) = cancellable(&inner.io, tls::negotiate(tcp, descriptor)).await?;
            inner.events.status(summary.to_string());

            Ok(FramedIo::Stream(Box::new(stream)))
        }

        Target::WebSocket { uri } => {
            let (ws, summary) = cancellable(&inner.io, websocket::connect(descriptor, uri)).await?;
            if let Some(summary) = summary {
                inner.events.status(summary.to_string());
            }
            inner
                .events
                .status(format!("Connection established: {uri}"));

            Ok(FramedIo::Message(ws))
        }
    }
}

/// Publishes inbound units until the peer ends or the scope is cancelled.
async fn read_loop(inner: &SessionInner, mut reader: FramedReader) {
    let session = inner.id;

    loop {
        let unit = tokio::select! {
            biased;
            _ = inner.io.cancelled() => {
                debug!(%session, "Receive pipeline cancelled");
                return;
            }
            unit = reader.next_unit() => unit,
        };

        match unit {
            Ok(Inbound::Data(text)) => inner.events.inbound(text),
            Ok(Inbound::End) => {
                debug!(%session, "Peer ended the stream");
                inner
                    .events
                    .status("Connection closing: peer closed the channel");
                return;
            }
            Ok(Inbound::Closed(reason)) => {
                debug!(%session, ?reason, "Peer sent close frame");
                let text = match reason {
                    Some(reason) => format!("Connection closing: peer closed the channel ({reason})"),
                    None => "Connection closing: peer closed the channel".to_owned(),
                };
                inner.events.status(text);
                return;
            }
            Err(e) => {
                inner.fail("Receive failed", &e);
                return;
            }
        }
    }
}
