//! Transport session.
//!
//! A [`TransportSession`] owns one connection and runs two pipelines over
//! it, reporting everything through a [`SessionObserver`].
//!
//! # Architecture
//!
//! ```text
//! start() ──► session task (receive pipeline)
//!               ├─ connect / TLS / WebSocket handshake
//!               ├─ spawn ──► send pipeline ◄── send() / close_send_channel()
//!               ├─ read loop ──► inbound notifications
//!               └─ join send pipeline ──► final status ──► finished
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`TransportSession`] command surface |
//! | `notification` | Observer, dispatcher and notification types |
//! | `state` | [`SessionState`] lifecycle |
//! | `buffer` | Pooled scratch buffers for encoding |

// ============================================================================
// Submodules
// ============================================================================

/// Pooled byte buffers.
pub mod buffer;

/// Session orchestrator.
pub mod core;

/// Notification routing.
mod events;

/// Observer and dispatcher surface.
pub mod notification;

/// Receive pipeline and session task.
mod receive;

/// Send pipeline.
mod send;

/// Lifecycle state.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use buffer::{BufferPool, PooledBuffer};
pub use core::{STATUS_ABORTED, STATUS_CLOSED, STATUS_FAILED, TransportSession};
pub use notification::{
    Action, ChannelObserver, Dispatcher, FnObserver, InlineDispatcher, Notification,
    NotificationHandler, SessionEvent, SessionObserver,
};
pub use state::SessionState;
