//! Notification surface.
//!
//! The narrow interface between a session and its host: what gets reported
//! ([`Notification`]), who receives it ([`SessionObserver`]) and on which
//! thread it is delivered ([`Dispatcher`]).
//!
//! # Delivery
//!
//! | Signal | Observer method | Channel event |
//! |--------|-----------------|---------------|
//! | Status line, inbound data, echo | `on_notification` | [`SessionEvent::Notification`] |
//! | Session fully unwound | `on_finished` | [`SessionEvent::Finished`] |

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Notification
// ============================================================================

/// One unit of information reported by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Text to display.
    pub text: String,
    /// Connection lifecycle or error line rather than payload.
    pub is_status: bool,
    /// Echo of locally sent data.
    pub is_echo: bool,
}

impl Notification {
    /// Creates a status notification.
    #[inline]
    #[must_use]
    pub fn status(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_status: true,
            is_echo: false,
        }
    }

    /// Creates a notification for data received from the peer.
    #[inline]
    #[must_use]
    pub fn inbound(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_status: false,
            is_echo: false,
        }
    }

    /// Creates an echo of data written to the peer.
    #[inline]
    #[must_use]
    pub fn echo(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_status: false,
            is_echo: true,
        }
    }

    /// Returns `true` for data received from the peer.
    #[inline]
    #[must_use]
    pub fn is_inbound(&self) -> bool {
        !self.is_status && !self.is_echo
    }
}

// ============================================================================
// SessionObserver
// ============================================================================

/// Receives everything a session reports.
///
/// Subscribe before calling [`TransportSession::start`](crate::TransportSession::start).
pub trait SessionObserver: Send + Sync + 'static {
    /// Called for each status line, inbound unit and echo.
    fn on_notification(&self, notification: Notification);

    /// Called exactly once, after all I/O and both pipelines have unwound.
    fn on_finished(&self);
}

/// Boxed observer callback for notifications.
pub type NotificationHandler = Box<dyn Fn(Notification) + Send + Sync>;

/// Observer built from closures.
pub struct FnObserver {
    on_notification: NotificationHandler,
    on_finished: Box<dyn Fn() + Send + Sync>,
}

impl FnObserver {
    /// Creates an observer from a notification and a finished callback.
    pub fn new(
        on_notification: impl Fn(Notification) + Send + Sync + 'static,
        on_finished: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_notification: Box::new(on_notification),
            on_finished: Box::new(on_finished),
        }
    }
}

impl SessionObserver for FnObserver {
    fn on_notification(&self, notification: Notification) {
        (self.on_notification)(notification);
    }

    fn on_finished(&self) {
        (self.on_finished)();
    }
}

// ============================================================================
// ChannelObserver
// ============================================================================

/// Event forwarded by a [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A notification.
    Notification(Notification),
    /// The session finished.
    Finished,
}

/// Observer that forwards events into an unbounded channel.
///
/// Events are dropped silently once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    /// Creates an observer and the receiver for its events.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SessionObserver for ChannelObserver {
    fn on_notification(&self, notification: Notification) {
        let _ = self.tx.send(SessionEvent::Notification(notification));
    }

    fn on_finished(&self) {
        let _ = self.tx.send(SessionEvent::Finished);
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Action handed to a [`Dispatcher`].
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// Runs session callbacks in the host's execution context.
///
/// A UI host marshals `action` onto its own thread; it may drop the action
/// if `cancel` has fired by the time it would run. Implementations must not
/// block the caller waiting for the action to finish.
pub trait Dispatcher: Send + Sync + 'static {
    /// Schedules `action`.
    fn invoke(&self, action: Action, cancel: &CancellationToken);
}

impl<F> Dispatcher for F
where
    F: Fn(Action, &CancellationToken) + Send + Sync + 'static,
{
    fn invoke(&self, action: Action, cancel: &CancellationToken) {
        self(action, cancel);
    }
}

/// Dispatcher that runs actions immediately on the calling task.
///
/// Actions whose token is already cancelled are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn invoke(&self, action: Action, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            return;
        }
        action();
    }
}

// ============================================================================
// Tests
// ============================================================================
