//! Duplex Session - Cancellable text sessions over TCP, TLS and WebSocket.
//!
//! This library provides the connection core of a network debugging tool:
//! open an ad-hoc connection, exchange text with the peer, and report every
//! lifecycle step as a human-readable notification.
//!
//! # Architecture
//!
//! Each [`TransportSession`] owns exactly one connection:
//!
//! - **Receive pipeline**: the session task; connects, negotiates TLS, reads
//! - **Send pipeline**: child task; sole writer, drains the outbound queue
//! - **Observer**: receives notifications through a caller-chosen [`Dispatcher`]
//!
//! Key design principles:
//!
//! - One cancellation scope per session, fired only by [`TransportSession::stop`]
//! - Failures never cross the session boundary; they become status lines
//! - "finished" fires exactly once, after both pipelines have unwound
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use duplex_session::{ChannelObserver, ConnectionDescriptor, Result, SessionEvent, TransportSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let descriptor = ConnectionDescriptor::stream("example.com", 443)
//!         .tls(true)
//!         .build()?;
//!
//!     let (observer, mut events) = ChannelObserver::new();
//!     let session = TransportSession::with_observer(descriptor, Arc::new(observer));
//!     session.start()?;
//!     session.send("HEAD / HTTP/1.0\r\nHost: example.com\r\n\r\n")?;
//!
//!     while let Some(SessionEvent::Notification(n)) = events.recv().await {
//!         println!("{}", n.text);
//!     }
//!
//!     session.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | [`ConnectionDescriptor`] and its builder |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | [`SessionId`] |
//! | [`session`] | [`TransportSession`], observers, dispatchers |
//! | [`transport`] | Connect, TLS and framed I/O (internal) |

// ============================================================================
// Modules
// ============================================================================

/// Connection configuration.
///
/// Use [`ConnectionDescriptor::stream`] or [`ConnectionDescriptor::websocket`]
/// to start a builder.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Transport session and notification surface.
pub mod session;

/// Connection establishment and framed I/O.
///
/// Internal module used by the session pipelines.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration types
pub use config::{
    AddressFamily, ConnectionDescriptor, DescriptorBuilder, Target, TextEncoding, TlsProtocol,
    TransportKind,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::SessionId;

// Session types
pub use session::{
    ChannelObserver, Dispatcher, FnObserver, InlineDispatcher, Notification, SessionEvent,
    SessionObserver, SessionState, TransportSession,
};

// Transport types
pub use transport::{CertificateSummary, TlsSummary};
