//! Transport Channel: one session's outbound SSE stream.
//!
//! A channel moves `Connecting -> Open -> Closed` and never reopens. While
//! open it owns a keep-alive task that queues a comment frame every interval;
//! closing aborts that task and drops the sender, which ends the stream.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::response::sse::Event;
use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::session::SessionManager;

/// Outbound frames buffered per session.
const CHANNEL_CAPACITY: usize = 64;

pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(10);

/// One SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `event: endpoint` carrying the POST URL for this session.
    Endpoint(String),
    /// `event: message` carrying one serialized JSON-RPC message.
    Message(String),
    /// Comment-only heartbeat.
    KeepAlive,
}

impl Frame {
    pub fn into_event(self) -> Event {
        match self {
            Frame::Endpoint(url) => Event::default().event("endpoint").data(url),
            Frame::Message(json) => Event::default().event("message").data(json),
            Frame::KeepAlive => Event::default().comment("keep-alive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

struct Inner {
    state: ChannelState,
    sender: Option<mpsc::Sender<Frame>>,
    keep_alive: Option<JoinHandle<()>>,
}

pub struct TransportChannel {
    session_id: String,
    keep_alive_interval: Duration,
    inner: Mutex<Inner>,
}

impl TransportChannel {
    /// Create a channel in the `Connecting` state together with the receiving
    /// half of its frame queue.
    pub fn new(session_id: String, keep_alive_interval: Duration) -> (Self, mpsc::Receiver<Frame>) {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let channel = Self {
            session_id,
            keep_alive_interval,
            inner: Mutex::new(Inner {
                state: ChannelState::Connecting,
                sender: Some(sender),
                keep_alive: None,
            }),
        };
        (channel, receiver)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> ChannelState {
        self.inner.lock().state
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ChannelState::Closed
    }

    /// Queue the endpoint frame and start the keep-alive task. Has no effect
    /// unless the channel is still connecting.
    pub fn open(&self, endpoint: String) {
        let mut inner = self.inner.lock();
        if inner.state != ChannelState::Connecting {
            return;
        }
        let Some(sender) = inner.sender.clone() else {
            return;
        };
        // Freshly created queue, so there is room for the first frame.
        let _ = sender.try_send(Frame::Endpoint(endpoint));
        inner.keep_alive = Some(tokio::spawn(keep_alive(
            sender,
            self.keep_alive_interval,
            self.session_id.clone(),
        )));
        inner.state = ChannelState::Open;
    }

    /// Push one JSON-RPC message. Fails with a discardable error once the
    /// channel is closed or the client has gone away.
    pub async fn send(&self, message: String) -> Result<(), TransportError> {
        let sender = {
            let inner = self.inner.lock();
            match (inner.state, &inner.sender) {
                (ChannelState::Closed, _) | (_, None) => None,
                (_, Some(sender)) => Some(sender.clone()),
            }
        };
        let Some(sender) = sender else {
            return Err(TransportError::SessionClosed(self.session_id.clone()));
        };
        sender
            .send(Frame::Message(message))
            .await
            .map_err(|_| TransportError::SessionClosed(self.session_id.clone()))
    }

    /// Stop the keep-alive task and refuse further frames. Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ChannelState::Closed {
            return;
        }
        inner.state = ChannelState::Closed;
        inner.sender = None;
        if let Some(task) = inner.keep_alive.take() {
            task.abort();
            debug!(session_id = %self.session_id, "Keep-alive stopped");
        }
    }
}

impl Drop for TransportChannel {
    fn drop(&mut self) {
        if let Some(task) = self.inner.get_mut().keep_alive.take() {
            task.abort();
        }
    }
}

async fn keep_alive(sender: mpsc::Sender<Frame>, period: Duration, session_id: String) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match sender.try_send(Frame::KeepAlive) {
            Ok(()) => trace!(session_id = %session_id, "Keep-alive sent"),
            // A backlog already keeps the connection busy.
            Err(mpsc::error::TrySendError::Full(_)) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    }
}

/// The outbound half handed to the HTTP layer. Dropping it (client
/// disconnect or write failure) destroys the session.
pub struct SessionStream {
    channel: Arc<TransportChannel>,
    receiver: mpsc::Receiver<Frame>,
    sessions: SessionManager,
}

impl SessionStream {
    pub(crate) fn new(
        channel: Arc<TransportChannel>,
        receiver: mpsc::Receiver<Frame>,
        sessions: SessionManager,
    ) -> Self {
        Self {
            channel,
            receiver,
            sessions,
        }
    }
}

impl Stream for SessionStream {
    type Item = Frame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Frame>> {
        let this = self.get_mut();
        if this.channel.is_closed() {
            return Poll::Ready(None);
        }
        this.receiver.poll_recv(cx)
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        self.sessions.destroy(self.channel.session_id());
    }
}
