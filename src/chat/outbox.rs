//! Ordered, retrying delivery of chat persistence requests.
//!
//! The transcript is updated before anything is sent; the outbox then
//! delivers requests one at a time in submission order on a background
//! task. Each request gets a visible [`DeliveryStatus`]. Requests that
//! run out of attempts are handed to an optional [`DeadLetterSink`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chat::models::{DeliveryStatus, Outbound, PersistAck, PersistRequest};
use crate::client::{ApiClient, ApiError};
use crate::config::RetryConfig;

pub const CHAT_MESSAGE_ENDPOINT: &str = "/chat/message";

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn persist(&self, request: &PersistRequest) -> Result<PersistAck, ApiError>;
}

#[async_trait]
impl ChatTransport for ApiClient {
    async fn persist(&self, request: &PersistRequest) -> Result<PersistAck, ApiError> {
        self.post::<PersistAck, _>(CHAT_MESSAGE_ENDPOINT, request)
            .await
            .into_data()
    }
}

/// A request the outbox gave up on. `conversation` identifies the outbox
/// that produced it, so every letter from one widget replays into one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub conversation: Uuid,
    pub message_id: Uuid,
    pub request: PersistRequest,
    pub error: String,
    pub attempts: u32,
}

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn park(&self, letter: DeadLetter);

    /// Called once, when the conversation's first request is acknowledged.
    /// Letters parked before that point carry no session id.
    async fn session_established(&self, _conversation: Uuid, _session_id: &str) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Single attempt, no backoff.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay after the given failed attempt (1-based): doubles each time, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

#[derive(Debug, Default)]
struct OutboxState {
    statuses: Mutex<HashMap<Uuid, DeliveryStatus>>,
    session_id: RwLock<Option<String>>,
}

impl OutboxState {
    fn set_status(&self, id: Uuid, status: DeliveryStatus) {
        self.statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, status);
    }

    fn status(&self, id: &Uuid) -> Option<DeliveryStatus> {
        self.statuses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    fn session_id(&self) -> Option<String> {
        self.session_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The first id the backend hands out sticks for the lifetime of the
    /// outbox. Returns true when `returned` became the session.
    fn adopt_session(&self, returned: &str) -> bool {
        let mut guard = self.session_id.write().unwrap_or_else(|e| e.into_inner());
        match guard.as_deref() {
            None => {
                info!(session_id = returned, "chat session established");
                *guard = Some(returned.to_string());
                true
            }
            Some(current) if current != returned => {
                warn!(session_id = current, returned, "backend returned a different session id; keeping the first");
                false
            }
            Some(_) => false,
        }
    }
}

/// Counts of messages per delivery state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliverySummary {
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
}

enum Command {
    Deliver(Outbound),
    Flush(oneshot::Sender<()>),
}

/// Handle to the delivery task. Must be created inside a tokio runtime.
/// Dropping the handle aborts any delivery still in flight; call
/// [`Outbox::shutdown`] to drain first.
pub struct Outbox {
    conversation: Uuid,
    tx: Option<mpsc::UnboundedSender<Command>>,
    state: Arc<OutboxState>,
    worker: Option<JoinHandle<()>>,
}

impl Outbox {
    pub fn spawn(transport: Arc<dyn ChatTransport>, policy: RetryPolicy) -> Self {
        Self::spawn_with_sink(transport, policy, None)
    }

    pub fn spawn_with_sink(
        transport: Arc<dyn ChatTransport>,
        policy: RetryPolicy,
        sink: Option<Arc<dyn DeadLetterSink>>,
    ) -> Self {
        let conversation = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(OutboxState::default());
        let worker = tokio::spawn(run(conversation, rx, state.clone(), transport, policy, sink));

        Self {
            conversation,
            tx: Some(tx),
            state,
            worker: Some(worker),
        }
    }

    /// Queues a request without waiting for it.
    pub fn enqueue(&self, outbound: Outbound) {
        let id = outbound.message_id;
        self.state.set_status(id, DeliveryStatus::Pending);

        let sent = self
            .tx
            .as_ref()
            .map(|tx| tx.send(Command::Deliver(outbound)).is_ok())
            .unwrap_or(false);
        if !sent {
            error!(message_id = %id, "outbox is closed; message will not be delivered");
            self.state
                .set_status(id, DeliveryStatus::Failed("outbox closed".to_string()));
        }
    }

    pub fn status(&self, message_id: &Uuid) -> Option<DeliveryStatus> {
        self.state.status(message_id)
    }

    /// Key shared by every dead letter this outbox parks.
    pub fn conversation_id(&self) -> Uuid {
        self.conversation
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.session_id()
    }

    pub fn summary(&self) -> DeliverySummary {
        let statuses = self.state.statuses.lock().unwrap_or_else(|e| e.into_inner());
        statuses
            .values()
            .fold(DeliverySummary::default(), |mut acc, status| {
                match status {
                    DeliveryStatus::Pending => acc.pending += 1,
                    DeliveryStatus::Sent => acc.sent += 1,
                    DeliveryStatus::Failed(_) => acc.failed += 1,
                }
                acc
            })
    }

    /// Resolves once everything enqueued before the call has been settled.
    pub async fn flush(&self) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Stops accepting work, delivers what is queued, then joins the task.
    pub async fn shutdown(mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                error!(error = %e, "outbox worker ended abnormally");
            }
        }
    }
}

impl Drop for Outbox {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

async fn run(
    conversation: Uuid,
    mut rx: mpsc::UnboundedReceiver<Command>,
    state: Arc<OutboxState>,
    transport: Arc<dyn ChatTransport>,
    policy: RetryPolicy,
    sink: Option<Arc<dyn DeadLetterSink>>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Deliver(outbound) => {
                deliver(conversation, &state, transport.as_ref(), &policy, sink.as_deref(), outbound).await
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("outbox worker stopped");
}

async fn deliver(
    conversation: Uuid,
    state: &OutboxState,
    transport: &dyn ChatTransport,
    policy: &RetryPolicy,
    sink: Option<&dyn DeadLetterSink>,
    outbound: Outbound,
) {
    let Outbound {
        message_id,
        mut request,
    } = outbound;
    let mut attempt = 0;

    loop {
        attempt += 1;
        if request.session_id.is_none() {
            request.session_id = state.session_id();
        }

        match transport.persist(&request).await {
            Ok(ack) => {
                if state.adopt_session(&ack.session_id) {
                    if let Some(sink) = sink {
                        sink.session_established(conversation, &ack.session_id).await;
                    }
                }
                state.set_status(message_id, DeliveryStatus::Sent);
                debug!(%message_id, attempt, "chat message delivered");
                return;
            }
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    %message_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "chat message delivery failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(%message_id, attempt, error = %e, "chat message delivery failed");
                state.set_status(message_id, DeliveryStatus::Failed(e.to_string()));
                if let Some(sink) = sink {
                    sink.park(DeadLetter {
                        conversation,
                        message_id,
                        request,
                        error: e.to_string(),
                        attempts: attempt,
                    })
                    .await;
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(500));
        assert_eq!(policy.backoff(40), Duration::from_millis(500));
    }

    #[test]
    fn config_never_yields_zero_attempts() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            max_attempts: 0,
            initial_backoff_ms: 10,
            max_backoff_ms: 20,
        });
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn first_session_id_sticks() {
        let state = OutboxState::default();
        assert!(state.adopt_session("a"));
        assert!(!state.adopt_session("b"));
        assert!(!state.adopt_session("a"));
        assert_eq!(state.session_id().as_deref(), Some("a"));
    }
}
