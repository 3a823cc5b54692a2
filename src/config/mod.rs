//! Connection configuration.
//!
//! A session is configured once, up front, through an immutable
//! [`ConnectionDescriptor`]. Descriptors are produced by the fluent
//! [`DescriptorBuilder`], which can also be deserialized from JSON.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionDescriptor`] | Validated, immutable connection parameters |
//! | [`DescriptorBuilder`] | Fluent (and serde) configuration builder |
//! | [`Target`] | Stream endpoint or WebSocket URI |
//! | [`AddressFamily`] | Dual-stack, IPv4-only or IPv6-only resolution |
//! | [`TlsProtocol`] | Enabled TLS protocol versions |
//! | [`TextEncoding`] | Codec used to turn text into bytes and back |
//!
//! # Example
//!
//! ```no_run
//! use duplex_session::{ConnectionDescriptor, TlsProtocol};
//!
//! # fn example() -> duplex_session::Result<()> {
//! let descriptor = ConnectionDescriptor::stream("example.com", 443)
//!     .tls(true)
//!     .tls_protocols([TlsProtocol::Tls13])
//!     .encoding("windows-1252")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for descriptors.
pub mod builder;

/// Connection descriptor and its parts.
pub mod descriptor;

/// Text codecs.
pub mod encoding;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::DescriptorBuilder;
pub use descriptor::{
    AddressFamily, ConnectionDescriptor, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_READ_CHUNK_SIZE,
    Target, TlsProtocol, TransportKind,
};
pub use encoding::{TextDecoder, TextEncoding};
