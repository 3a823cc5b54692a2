//! Transport layer.
//!
//! Establishes connections and hides framing differences between byte
//! streams and WebSockets.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   connect_tcp   ┌───────────┐   negotiate   ┌────────────┐
//! │ Stream target    │────────────────►│ TcpStream │──────────────►│ TlsStream  │
//! └──────────────────┘                 └─────┬─────┘   (optional)  └─────┬──────┘
//!                                            │                           │
//! ┌──────────────────┐  websocket::connect   │                           │
//! │ WebSocket target │───────────────┐       ▼                           ▼
//! └──────────────────┘               │  ┌─────────────────────────────────────┐
//!                                    └─►│ FramedIo → FramedReader/FramedWriter │
//!                                       └─────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `adapter` | Uniform framed reader/writer over stream or WebSocket |
//! | `connect` | TCP connect with address family filtering |
//! | `tls` | TLS client configuration, handshake and summary |
//! | `websocket` | WebSocket client handshake |

// ============================================================================
// Submodules
// ============================================================================

/// Uniform framed I/O over streams and WebSockets.
pub mod adapter;

/// TCP connection establishment.
pub mod connect;

/// TLS negotiation.
pub mod tls;

/// WebSocket connection establishment.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use adapter::{BoxedStream, CLOSE_GRACE_PERIOD, FramedIo, FramedReader, FramedWriter, Inbound};
pub use connect::connect_tcp;
pub use tls::{AcceptAnyCertificate, CertificateSummary, TlsSummary};
pub use websocket::WsStream;
