use async_trait::async_trait;
use duckdb::Result as DbResult;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chat::models::PersistRequest;
use crate::chat::outbox::{ChatTransport, DeadLetter, DeadLetterSink};
use crate::db::{service::DbService, DbPool, StoredDeadLetter};

/// Parks undeliverable chat messages in the local `dead_letters` table so
/// `sitedesk outbox replay` can resend them later.
pub struct DbDeadLetterSink {
    pool: DbPool,
}

impl DbDeadLetterSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeadLetterSink for DbDeadLetterSink {
    async fn park(&self, letter: DeadLetter) {
        let payload = match serde_json::to_value(&letter.request) {
            Ok(payload) => payload,
            Err(e) => {
                error!(message_id = %letter.message_id, error = %e, "failed to encode dead letter");
                return;
            }
        };

        let conn = self.pool.lock().unwrap_or_else(|e| e.into_inner());
        match DbService::insert_dead_letter(
            &conn,
            letter.conversation,
            letter.message_id,
            &payload,
            &letter.error,
            letter.attempts,
        ) {
            Ok(id) => info!(message_id = %letter.message_id, dead_letter = id, "chat message parked for replay"),
            Err(e) => error!(message_id = %letter.message_id, error = %e, "failed to park chat message"),
        }
    }

    async fn session_established(&self, conversation: Uuid, session_id: &str) {
        let conn = self.pool.lock().unwrap_or_else(|e| e.into_inner());
        match DbService::assign_dead_letter_session(&conn, conversation, session_id) {
            Ok(0) => {}
            Ok(updated) => info!(%conversation, session_id, updated, "parked messages joined their session"),
            Err(e) => error!(%conversation, error = %e, "failed to record session on parked messages"),
        }
    }
}

/// Outcome of [`replay_dead_letters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub delivered: usize,
    /// Still parked after a failed attempt, or queued behind one.
    pub remaining: usize,
    /// Payloads that no longer decode; left in place.
    pub skipped: usize,
}

/// Resends parked messages conversation by conversation, oldest first.
///
/// Letters without a session id get the conversation's session: the one
/// recorded on the table, or else the one acknowledged for the first letter
/// that goes through. A failure keeps the rest of that conversation parked
/// so its messages never arrive out of order.
pub async fn replay_dead_letters(pool: &DbPool, transport: &dyn ChatTransport) -> DbResult<ReplaySummary> {
    let letters = {
        let conn = pool.lock().unwrap_or_else(|e| e.into_inner());
        DbService::list_dead_letters(&conn)?
    };

    let mut conversations: Vec<(Uuid, Vec<StoredDeadLetter>)> = Vec::new();
    for letter in letters {
        match conversations.iter_mut().find(|(id, _)| *id == letter.conversation_id) {
            Some((_, group)) => group.push(letter),
            None => conversations.push((letter.conversation_id, vec![letter])),
        }
    }

    let mut summary = ReplaySummary::default();
    for (conversation, letters) in conversations {
        let mut session = letters.iter().find_map(|l| l.session_id.clone());
        let mut blocked = false;

        for letter in letters {
            if blocked {
                summary.remaining += 1;
                continue;
            }

            let mut request: PersistRequest = match serde_json::from_value(letter.payload.clone()) {
                Ok(request) => request,
                Err(e) => {
                    warn!(dead_letter = letter.id, error = %e, "skipping undecodable dead letter");
                    summary.skipped += 1;
                    continue;
                }
            };
            if request.session_id.is_none() {
                request.session_id = session.clone();
            }

            match transport.persist(&request).await {
                Ok(ack) => {
                    let conn = pool.lock().unwrap_or_else(|e| e.into_inner());
                    if session.is_none() {
                        DbService::assign_dead_letter_session(&conn, conversation, &ack.session_id)?;
                        session = Some(ack.session_id.clone());
                    }
                    DbService::delete_dead_letter(&conn, letter.id)?;
                    info!(dead_letter = letter.id, session_id = %ack.session_id, "parked message delivered");
                    summary.delivered += 1;
                }
                Err(e) => {
                    warn!(dead_letter = letter.id, %conversation, error = %e, "parked message still failing");
                    summary.remaining += 1;
                    blocked = true;
                }
            }
        }
    }

    Ok(summary)
}
