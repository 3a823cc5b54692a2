//! Transport session orchestrator.
//!
//! Owns the cancellation scope, the outbound queue and the session task.
//!
//! # Cancellation
//!
//! ```text
//! cancel (session scope, fired by stop/drop)
//!   └── io (both pipelines; also fired on natural end or fault)
//! done (fired once the session task has reported completion)
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConnectionDescriptor;
use crate::error::{Error, Result};
use crate::identifiers::SessionId;

use super::buffer::BufferPool;
use super::events::EventSink;
use super::notification::{Dispatcher, InlineDispatcher, SessionObserver};
use super::receive;
use super::send::Outbound;
use super::state::{SessionState, StateCell};

// ============================================================================
// Constants
// ============================================================================

/// Final status when the peer ended the session.
pub const STATUS_CLOSED: &str = "Connection closed";

/// Final status when the session was stopped locally.
pub const STATUS_ABORTED: &str = "Connection aborted";

/// Final status when the session ended because of a failure.
pub const STATUS_FAILED: &str = "Connection failed";

// ============================================================================
// SessionInner
// ============================================================================

/// State shared between the command surface and the session tasks.
pub(crate) struct SessionInner {
    pub(crate) id: SessionId,
    pub(crate) descriptor: ConnectionDescriptor,
    pub(crate) events: EventSink,
    pub(crate) state: StateCell,
    /// Session scope.
    pub(crate) cancel: CancellationToken,
    /// Pipeline scope, child of `cancel`.
    pub(crate) io: CancellationToken,
    /// Fired after the final notification.
    pub(crate) done: CancellationToken,
    pub(crate) pool: BufferPool,
    faulted: AtomicBool,
    stop_requested: AtomicBool,
}

impl SessionInner {
    pub(crate) fn new(
        descriptor: ConnectionDescriptor,
        observer: Option<Arc<dyn SessionObserver>>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        let id = SessionId::generate();
        let cancel = CancellationToken::new();
        let io = cancel.child_token();

        Self {
            id,
            events: EventSink::new(observer, dispatcher, cancel.clone()),
            state: StateCell::new(id),
            descriptor,
            cancel,
            io,
            done: CancellationToken::new(),
            pool: BufferPool::new(),
            faulted: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
        }
    }

    /// Reports the first failure of a running session and unwinds both
    /// pipelines.
    ///
    /// Failures observed after the pipeline scope fired are logged only.
    pub(crate) fn fail(&self, context: &str, err: &Error) {
        if self.io.is_cancelled() || self.faulted.swap(true, Ordering::AcqRel) {
            debug!(session = %self.id, error = %err, "{context} during shutdown");
            return;
        }

        warn!(session = %self.id, error = %err, "{context}");
        self.events.status(format!("{context}: {err}"));
        self.io.cancel();
    }

    /// Marks the session faulted without a notification.
    pub(crate) fn mark_faulted(&self) {
        self.faulted.store(true, Ordering::Release);
    }

    /// Terminal state and final status line for the current outcome.
    ///
    /// A reported failure outranks a later stop request.
    pub(crate) fn final_outcome(&self) -> (SessionState, &'static str) {
        if self.faulted.load(Ordering::Acquire) {
            (SessionState::Faulted, STATUS_FAILED)
        } else if self.stop_requested.load(Ordering::Acquire) {
            (SessionState::Closed, STATUS_ABORTED)
        } else {
            (SessionState::Closed, STATUS_CLOSED)
        }
    }

    /// Ends a session whose task never ran.
    fn abandon(&self) {
        self.state.transition(SessionState::Closed);
        self.events.finish(STATUS_ABORTED);
        self.done.cancel();
    }
}

impl fmt::Debug for SessionInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionInner")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .field("faulted", &self.faulted.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Runs `fut` unless `token` fires first.
///
/// # Errors
///
/// Returns [`Error::Cancelled`] if the token fired, otherwise the future's
/// own result.
pub(crate) async fn cancellable<T, F>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

// ============================================================================
// Launch
// ============================================================================

/// Connect sequence handed to the dispatcher by
/// [`TransportSession::start`].
///
/// Spawns the session task on the runtime captured at `start`, so the
/// dispatcher may run it from any thread. Dropped without running, it ends
/// the session as aborted.
struct Launch {
    inner: Arc<SessionInner>,
    runtime: Handle,
    rx: Option<mpsc::UnboundedReceiver<Outbound>>,
}

impl Launch {
    fn run(mut self) {
        let Some(rx) = self.rx.take() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        let session = inner.id;

        let task = self.runtime.spawn(receive::run(Arc::clone(&inner), rx));
        self.runtime.spawn(async move {
            if let Err(e) = task.await {
                error!(%session, error = %e, "Session task panicked");
                inner.state.transition(SessionState::Faulted);
                inner.events.finish(STATUS_FAILED);
                inner.done.cancel();
            }
        });
    }
}

impl Drop for Launch {
    fn drop(&mut self) {
        if self.rx.is_some() {
            debug!(session = %self.inner.id, "Connect sequence dropped by dispatcher");
            self.inner.abandon();
        }
    }
}

// ============================================================================
// TransportSession
// ============================================================================

/// One duplex text session over TCP, TLS or WebSocket.
///
/// Created idle with a fixed descriptor. [`start`](Self::start) launches the
/// session task; everything the session does afterwards is reported through
/// the observer. Dropping a running session cancels it without waiting.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use duplex_session::{ChannelObserver, ConnectionDescriptor, SessionEvent, TransportSession};
///
/// # async fn example() -> duplex_session::Result<()> {
/// let descriptor = ConnectionDescriptor::stream("127.0.0.1", 7).build()?;
/// let (observer, mut events) = ChannelObserver::new();
/// let session = TransportSession::with_observer(descriptor, Arc::new(observer));
///
/// session.start()?;
/// session.send("hello\n")?;
///
/// while let Some(event) = events.recv().await {
///     match event {
///         SessionEvent::Notification(n) => println!("{}", n.text),
///         SessionEvent::Finished => break,
///     }
/// }
/// session.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct TransportSession {
    inner: Arc<SessionInner>,
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Outbound>>>,
    send_closed: AtomicBool,
}

impl TransportSession {
    /// Creates an idle session.
    ///
    /// `dispatcher` decides where observer callbacks run.
    #[must_use]
    pub fn new(
        descriptor: ConnectionDescriptor,
        observer: Option<Arc<dyn SessionObserver>>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        let inner = SessionInner::new(descriptor, observer, dispatcher);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        debug!(session = %inner.id, target = %inner.descriptor, "Session created");

        Self {
            inner: Arc::new(inner),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            send_closed: AtomicBool::new(false),
        }
    }

    /// Creates an idle session delivering callbacks inline.
    #[must_use]
    pub fn with_observer(descriptor: ConnectionDescriptor, observer: Arc<dyn SessionObserver>) -> Self {
        Self::new(descriptor, Some(observer), Arc::new(InlineDispatcher))
    }

    /// Returns the session ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.get()
    }

    /// Returns the connection descriptor.
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.inner.descriptor
    }

    /// Starts the session.
    ///
    /// Must be called from within a Tokio runtime. Returns immediately; the
    /// connect sequence is handed to the dispatcher with the session's
    /// cancellation token and spawns the session task when it runs.
    ///
    /// # Errors
    ///
    /// - [`Error::NoRuntime`] outside a Tokio runtime
    /// - [`Error::InvalidState`] unless the session is idle
    pub fn start(&self) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        if !self
            .inner
            .state
            .transition_from(SessionState::Idle, SessionState::Connecting)
        {
            return Err(Error::invalid_state("start", self.state()));
        }

        let Some(rx) = self.outbound_rx.lock().take() else {
            self.inner.abandon();
            return Err(Error::invalid_state("start", self.state()));
        };

        info!(session = %self.inner.id, target = %self.inner.descriptor, "Starting session");
        self.inner
            .events
            .status(format!("Connecting to {}", self.inner.descriptor));

        let launch = Launch {
            inner: Arc::clone(&self.inner),
            runtime,
            rx: Some(rx),
        };
        self.inner.events.dispatch(Box::new(move || launch.run()));
        Ok(())
    }

    /// Queues `text` for sending.
    ///
    /// Items are written in call order. Items queued before the connection
    /// opens are sent once it does.
    ///
    /// # Errors
    ///
    /// - [`Error::SendChannelClosed`] after [`close_send_channel`](Self::close_send_channel)
    /// - [`Error::InvalidState`] once the session is closing or closed
    pub fn send(&self, text: impl Into<String>) -> Result<()> {
        if self.send_closed.load(Ordering::Acquire) {
            return Err(Error::SendChannelClosed);
        }

        let state = self.state();
        if !state.accepts_sends() {
            return Err(Error::invalid_state("send", state));
        }

        self.outbound_tx
            .send(Outbound::Text(text.into()))
            .map_err(|_| Error::invalid_state("send", self.state()))
    }

    /// Queues the half-close sentinel.
    ///
    /// Once the send pipeline reaches it, the write direction is shut down
    /// while reading continues. Later [`send`](Self::send) calls are rejected.
    ///
    /// # Errors
    ///
    /// - [`Error::SendChannelClosed`] if already called
    /// - [`Error::InvalidState`] once the session is closing or closed
    pub fn close_send_channel(&self) -> Result<()> {
        let state = self.state();
        if !state.accepts_sends() {
            return Err(Error::invalid_state("close send channel", state));
        }

        if self.send_closed.swap(true, Ordering::AcqRel) {
            return Err(Error::SendChannelClosed);
        }

        self.outbound_tx
            .send(Outbound::Close)
            .map_err(|_| Error::invalid_state("close send channel", self.state()))
    }

    /// Cancels the session and waits for it to unwind.
    ///
    /// When this returns the transport is released, both pipelines have
    /// finished and the final status and finished signal were dispatched.
    /// Further calls return immediately.
    pub async fn stop(&self) {
        let session = self.inner.id;
        self.inner.stop_requested.store(true, Ordering::Release);
        self.inner.cancel.cancel();

        if self
            .inner
            .state
            .transition_from(SessionState::Idle, SessionState::Closed)
        {
            debug!(%session, "Stopped before start");
            self.inner.events.finish(STATUS_ABORTED);
            self.inner.done.cancel();
            return;
        }

        debug!(%session, "Waiting for session task");
        self.inner.done.cancelled().await;

        info!(%session, state = %self.state(), "Session stopped");
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        if !self.inner.done.is_cancelled() {
            debug!(session = %self.inner.id, "Session dropped while running; cancelling");
        }
        self.inner.cancel.cancel();
    }
}

impl fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSession")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("descriptor", &self.inner.descriptor)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
