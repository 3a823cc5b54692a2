//! Error types for duplex sessions.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! Configuration and the synchronous command surface return [`Result<T>`]:
//!
//! ```ignore
//! use duplex_session::{ConnectionDescriptor, Result};
//!
//! fn descriptor() -> Result<ConnectionDescriptor> {
//!     ConnectionDescriptor::stream("127.0.0.1", 7).encoding("utf-8").build()
//! }
//! ```
//!
//! Failures inside a running session never surface as `Err`; the session
//! reports them as status notifications instead.
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::UnknownEncoding`] |
//! | Connection | [`Error::Connection`], [`Error::AddressResolution`], [`Error::ConnectionClosed`] |
//! | TLS | [`Error::TlsHandshake`], [`Error::InvalidServerName`], [`Error::Tls`] |
//! | Session | [`Error::InvalidState`], [`Error::SendChannelClosed`], [`Error::Cancelled`], [`Error::NoRuntime`] |
//! | Framing | [`Error::MessageTooLarge`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::session::SessionState;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when a connection descriptor is incomplete or inconsistent.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Encoding label does not name a known codec.
    #[error("Unknown text encoding: {label}")]
    UnknownEncoding {
        /// The label that failed to resolve.
        label: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connection could not be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Host resolved to no address usable with the requested family.
    #[error("No {family} address found for {host}")]
    AddressResolution {
        /// Host that was resolved.
        host: String,
        /// Address family that was requested.
        family: String,
    },

    /// Connection closed while an operation was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // TLS Errors
    // ========================================================================
    /// TLS handshake failed.
    #[error("TLS handshake failed: {message}")]
    TlsHandshake {
        /// Description of the handshake failure.
        message: String,
    },

    /// Target name cannot be used for SNI or certificate validation.
    #[error("Invalid TLS server name: {name}")]
    InvalidServerName {
        /// The rejected name.
        name: String,
    },

    /// TLS configuration error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// Operation not valid in the current session state.
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the session was in.
        state: SessionState,
    },

    /// Send channel already closed by `close_send_channel` or shutdown.
    #[error("Send channel closed")]
    SendChannelClosed,

    /// Operation cancelled by session shutdown.
    #[error("Operation cancelled")]
    Cancelled,

    /// `start` called outside a Tokio runtime.
    #[error("No Tokio runtime available")]
    NoRuntime,

    // ========================================================================
    // Framing Errors
    // ========================================================================
    /// Inbound message exceeded the configured size limit.
    #[error("Message exceeds the maximum size of {max_size} bytes")]
    MessageTooLarge {
        /// Configured limit in bytes.
        max_size: usize,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// URI parse error.
    #[error("Invalid URI: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an unknown encoding error.
    #[inline]
    pub fn unknown_encoding(label: impl Into<String>) -> Self {
        Self::UnknownEncoding {
            label: label.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates an address resolution error.
    #[inline]
    pub fn address_resolution(host: impl Into<String>, family: impl ToString) -> Self {
        Self::AddressResolution {
            host: host.into(),
            family: family.to_string(),
        }
    }

    /// Creates a TLS handshake error.
    #[inline]
    pub fn tls_handshake(message: impl Into<String>) -> Self {
        Self::TlsHandshake {
            message: message.into(),
        }
    }

    /// Creates an invalid server name error.
    #[inline]
    pub fn invalid_server_name(name: impl Into<String>) -> Self {
        Self::InvalidServerName { name: name.into() }
    }

    /// Creates an invalid state error.
    #[inline]
    pub fn invalid_state(operation: &'static str, state: SessionState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Creates a message too large error.
    #[inline]
    pub fn message_too_large(max_size: usize) -> Self {
        Self::MessageTooLarge { max_size }
    }

    /// Converts a WebSocket error, folding capacity overflows into
    /// [`Error::MessageTooLarge`].
    pub fn from_websocket(err: WsError, max_size: usize) -> Self {
        match err {
            WsError::Capacity(_) => Self::MessageTooLarge { max_size },
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::ConnectionClosed,
            other => Self::WebSocket(other),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error stems from session cancellation.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::AddressResolution { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is a TLS error.
    #[inline]
    #[must_use]
    pub fn is_tls_error(&self) -> bool {
        matches!(
            self,
            Self::TlsHandshake { .. } | Self::InvalidServerName { .. } | Self::Tls(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
