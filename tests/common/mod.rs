//! Shared helpers for integration tests: in-process peers and event capture.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

use duplex_session::{
    ChannelObserver, ConnectionDescriptor, Notification, SessionEvent, TransportSession,
};

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(10);

// ============================================================================
// Logging
// ============================================================================

/// Installs a test subscriber once; honors `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("duplex_session=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(false)
        .try_init();
}

// ============================================================================
// Sessions
// ============================================================================

/// Creates a session with a channel observer.
pub fn open_session(
    descriptor: ConnectionDescriptor,
) -> (TransportSession, UnboundedReceiver<SessionEvent>) {
    let (observer, events) = ChannelObserver::new();
    (
        TransportSession::with_observer(descriptor, Arc::new(observer)),
        events,
    )
}

/// Collected notifications plus how many finished events were seen.
#[derive(Debug, Default)]
pub struct Captured {
    pub notes: Vec<Notification>,
    pub finished: usize,
}

impl Captured {
    /// Status lines in order.
    pub fn statuses(&self) -> Vec<&str> {
        self.notes
            .iter()
            .filter(|n| n.is_status)
            .map(|n| n.text.as_str())
            .collect()
    }

    /// Concatenated inbound text.
    pub fn inbound(&self) -> String {
        self.notes
            .iter()
            .filter(|n| n.is_inbound())
            .map(|n| n.text.as_str())
            .collect()
    }

    /// Echo texts in order.
    pub fn echoes(&self) -> Vec<&str> {
        self.notes
            .iter()
            .filter(|n| n.is_echo)
            .map(|n| n.text.as_str())
            .collect()
    }

    /// Returns `true` if any status line contains `needle`.
    pub fn has_status(&self, needle: &str) -> bool {
        self.statuses().iter().any(|s| s.contains(needle))
    }

    /// Last status line.
    pub fn last_status(&self) -> Option<&str> {
        self.statuses().last().copied()
    }
}

/// Receives events until `done` holds for the captured set.
pub async fn capture_until(
    events: &mut UnboundedReceiver<SessionEvent>,
    captured: &mut Captured,
    done: impl Fn(&Captured) -> bool,
) -> Result<()> {
    while !done(captured) {
        let event = timeout(WAIT, events.recv())
            .await
            .with_context(|| format!("timed out; captured so far: {captured:?}"))?;
        match event {
            Some(SessionEvent::Notification(n)) => captured.notes.push(n),
            Some(SessionEvent::Finished) => captured.finished += 1,
            None => bail!("event channel closed; captured so far: {captured:?}"),
        }
    }
    Ok(())
}

/// Receives events until the finished signal.
pub async fn capture_until_finished(
    events: &mut UnboundedReceiver<SessionEvent>,
) -> Result<Captured> {
    let mut captured = Captured::default();
    capture_until(events, &mut captured, |c| c.finished > 0).await?;
    Ok(captured)
}

/// Drains whatever is already queued without waiting.
pub fn drain_ready(events: &mut UnboundedReceiver<SessionEvent>, captured: &mut Captured) {
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::Notification(n) => captured.notes.push(n),
            SessionEvent::Finished => captured.finished += 1,
        }
    }
}

// ============================================================================
// TCP Peers
// ============================================================================

/// Binds a loopback listener on an ephemeral port.
pub async fn listener() -> Result<(TcpListener, u16)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    Ok((listener, port))
}

/// Peer that echoes every byte back until the client half-closes.
pub async fn spawn_echo_peer() -> Result<(u16, JoinHandle<Result<()>>)> {
    let (listener, port) = listener().await?;
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        let (mut read, mut write) = stream.into_split();
        tokio::io::copy(&mut read, &mut write).await?;
        let _ = write.shutdown().await;
        Ok::<_, anyhow::Error>(())
    });
    Ok((port, handle))
}

/// Peer that records everything until EOF, then replies and closes.
///
/// Returns the received bytes.
pub async fn spawn_capture_peer(reply: &'static [u8]) -> Result<(u16, JoinHandle<Result<Vec<u8>>>)> {
    let (listener, port) = listener().await?;
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await?;
        let mut received = Vec::new();
        stream.read_to_end(&mut received).await?;
        stream.write_all(reply).await?;
        let _ = stream.shutdown().await;
        Ok::<_, anyhow::Error>(received)
    });
    Ok((port, handle))
}

/// Peer that accepts and never writes; returns once the client goes away.
pub async fn spawn_silent_peer() -> Result<(u16, JoinHandle<Result<()>>)> {
    let (listener, port) = listener().await?;
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await?;
        let mut sink = Vec::new();
        let _ = stream.read_to_end(&mut sink).await;
        Ok::<_, anyhow::Error>(())
    });
    Ok((port, handle))
}

/// Returns a loopback port with nothing listening on it.
pub async fn closed_port() -> Result<u16> {
    let (listener, port) = listener().await?;
    drop(listener);
    Ok(port)
}
