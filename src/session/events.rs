//! Routes session notifications through the host's dispatcher.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::notification::{Action, Dispatcher, Notification, SessionObserver};

// ============================================================================
// EventSink
// ============================================================================

/// Delivers notifications to an optional observer via a dispatcher.
///
/// Regular notifications carry the session's cancellation token, so a
/// dispatcher may drop them after a stop. The final status line and the
/// finished signal carry a fresh token and always go out.
pub(crate) struct EventSink {
    observer: Option<Arc<dyn SessionObserver>>,
    dispatcher: Arc<dyn Dispatcher>,
    cancel: CancellationToken,
    finished: AtomicBool,
}

impl EventSink {
    pub(crate) fn new(
        observer: Option<Arc<dyn SessionObserver>>,
        dispatcher: Arc<dyn Dispatcher>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            observer,
            dispatcher,
            cancel,
            finished: AtomicBool::new(false),
        }
    }

    /// Dispatches a status line.
    pub(crate) fn status(&self, text: impl Into<String>) {
        let notification = Notification::status(text);
        debug!(text = %notification.text, "Session status");
        self.notify(notification, &self.cancel);
    }

    /// Dispatches received data.
    pub(crate) fn inbound(&self, text: String) {
        trace!(chars = text.len(), "Inbound unit");
        self.notify(Notification::inbound(text), &self.cancel);
    }

    /// Dispatches an echo of sent data.
    pub(crate) fn echo(&self, text: String) {
        self.notify(Notification::echo(text), &self.cancel);
    }

    /// Dispatches an arbitrary action with the session token.
    pub(crate) fn dispatch(&self, action: Action) {
        self.dispatcher.invoke(action, &self.cancel);
    }

    /// Dispatches the final status line followed by the finished signal.
    ///
    /// Only the first call has an effect.
    pub(crate) fn finish(&self, final_status: impl Into<String>) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }

        let terminal = CancellationToken::new();
        let notification = Notification::status(final_status);
        debug!(text = %notification.text, "Session finished");
        self.notify(notification, &terminal);

        if let Some(observer) = &self.observer {
            let observer = Arc::clone(observer);
            self.dispatcher
                .invoke(Box::new(move || observer.on_finished()), &terminal);
        }
    }

    /// Returns `true` once [`finish`](Self::finish) has run.
    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn notify(&self, notification: Notification, cancel: &CancellationToken) {
        let Some(observer) = &self.observer else {
            return;
        };
        let observer = Arc::clone(observer);
        self.dispatcher.invoke(
            Box::new(move || observer.on_notification(notification)),
            cancel,
        );
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("has_observer", &self.observer.is_some())
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
