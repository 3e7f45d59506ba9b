use crate::chat::models::PersistRequest;
use crate::db::models::{ChatSession, ChatTranscript, StoredChatMessage, StoredDeadLetter, StoredRecord};
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{params, Connection, Result as DbResult, Row};
use serde_json::Value;
use uuid::Uuid;

const SESSION_COLUMNS: &str = "CAST(id AS VARCHAR), page_url, name, email, completed, CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)";
const MESSAGE_COLUMNS: &str = "id, CAST(session_id AS VARCHAR), sender, content, page_url, CAST(created_at AS VARCHAR)";
const RECORD_COLUMNS: &str = "collection, id, CAST(data AS VARCHAR), CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)";
const DEAD_LETTER_COLUMNS: &str = "id, CAST(conversation_id AS VARCHAR), session_id, CAST(message_id AS VARCHAR), CAST(payload AS VARCHAR), error, attempts, CAST(created_at AS VARCHAR)";

/// DuckDB renders timestamps cast to text as `2024-05-01 10:11:12.123456`.
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
        .unwrap_or_else(Utc::now)
}

fn parse_json(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or(Value::Null)
}

/// Runs `work` inside a transaction, rolling back if it fails.
fn in_transaction<T>(conn: &Connection, work: impl FnOnce(&Connection) -> DbResult<T>) -> DbResult<T> {
    conn.execute_batch("BEGIN TRANSACTION")?;
    match work(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Stamps the record id into the stored document so clients always see it.
fn with_id(mut data: Value, id: &str) -> Value {
    if let Value::Object(map) = &mut data {
        map.remove("_id");
        map.insert("id".to_string(), Value::String(id.to_string()));
    }
    data
}

pub struct DbService;

impl DbService {
    fn row_to_session(row: &Row) -> DbResult<ChatSession> {
        Ok(ChatSession {
            id: row.get::<_, String>(0)?.parse().unwrap_or_default(),
            page_url: row.get(1)?,
            name: row.get(2)?,
            email: row.get(3)?,
            completed: row.get::<_, Option<bool>>(4)?.unwrap_or(false),
            created_at: parse_timestamp(&row.get::<_, String>(5)?),
            updated_at: parse_timestamp(&row.get::<_, String>(6)?),
        })
    }

    fn row_to_message(row: &Row) -> DbResult<StoredChatMessage> {
        Ok(StoredChatMessage {
            id: row.get(0)?,
            session_id: row.get::<_, String>(1)?.parse().unwrap_or_default(),
            sender: row.get(2)?,
            content: row.get(3)?,
            page_url: row.get(4)?,
            created_at: parse_timestamp(&row.get::<_, String>(5)?),
        })
    }

    fn row_to_record(row: &Row) -> DbResult<StoredRecord> {
        Ok(StoredRecord {
            collection: row.get(0)?,
            id: row.get(1)?,
            data: parse_json(&row.get::<_, String>(2)?),
            created_at: parse_timestamp(&row.get::<_, String>(3)?),
            updated_at: parse_timestamp(&row.get::<_, String>(4)?),
        })
    }

    fn row_to_dead_letter(row: &Row) -> DbResult<StoredDeadLetter> {
        Ok(StoredDeadLetter {
            id: row.get(0)?,
            conversation_id: row.get::<_, String>(1)?.parse().unwrap_or_default(),
            session_id: row.get(2)?,
            message_id: row.get::<_, String>(3)?.parse().unwrap_or_default(),
            payload: parse_json(&row.get::<_, String>(4)?),
            error: row.get(5)?,
            attempts: row.get(6)?,
            created_at: parse_timestamp(&row.get::<_, String>(7)?),
        })
    }

    // --- Chat Sessions ---

    pub fn get_chat_session(conn: &Connection, id: Uuid) -> DbResult<Option<ChatSession>> {
        let mut stmt = conn.prepare(&format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = ?"))?;
        let mut rows = stmt.query_map(params![id.to_string()], Self::row_to_session)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn list_chat_sessions(conn: &Connection, limit: usize, offset: usize) -> DbResult<Vec<ChatSession>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions ORDER BY updated_at DESC LIMIT ? OFFSET ?"
        ))?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], Self::row_to_session)?;
        rows.collect()
    }

    pub fn get_chat_messages(conn: &Connection, session_id: Uuid) -> DbResult<Vec<StoredChatMessage>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE session_id = ? ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(params![session_id.to_string()], Self::row_to_message)?;
        rows.collect()
    }

    pub fn get_transcript(conn: &Connection, session_id: Uuid) -> DbResult<Option<ChatTranscript>> {
        let Some(session) = Self::get_chat_session(conn, session_id)? else {
            return Ok(None);
        };
        let messages = Self::get_chat_messages(conn, session_id)?;
        Ok(Some(ChatTranscript { session, messages }))
    }

    /// Stores one message from the chat widget.
    ///
    /// The session is created when the request carries no id, an id that is
    /// not a uuid, or a uuid we have never seen. Name and email only ever fill
    /// in; a later request without them keeps what is stored.
    pub fn record_chat_message(
        conn: &Connection,
        request: &PersistRequest,
    ) -> DbResult<(ChatSession, StoredChatMessage)> {
        in_transaction(conn, |conn| {
            let requested = request
                .session_id
                .as_deref()
                .and_then(|raw| Uuid::parse_str(raw).ok());

            let completed = request.session_complete.unwrap_or(false);
            let session_id = match requested {
                Some(id) if Self::get_chat_session(conn, id)?.is_some() => {
                    conn.execute(
                        "UPDATE chat_sessions SET
                            name = COALESCE(?, name),
                            email = COALESCE(?, email),
                            completed = completed OR ?,
                            updated_at = CURRENT_TIMESTAMP
                         WHERE id = ?",
                        params![
                            request.name.as_deref(),
                            request.email.as_deref(),
                            completed,
                            id.to_string()
                        ],
                    )?;
                    id
                }
                other => {
                    let id = other.unwrap_or_else(Uuid::new_v4);
                    conn.execute(
                        "INSERT INTO chat_sessions (id, page_url, name, email, completed) VALUES (?, ?, ?, ?, ?)",
                        params![
                            id.to_string(),
                            request.page_url.as_deref(),
                            request.name.as_deref(),
                            request.email.as_deref(),
                            completed
                        ],
                    )?;
                    id
                }
            };

            let message_id: i64 = conn.query_row(
                "INSERT INTO chat_messages (session_id, sender, content, page_url) VALUES (?, ?, ?, ?) RETURNING id",
                params![
                    session_id.to_string(),
                    request.sender.as_str(),
                    request.message.as_str(),
                    request.page_url.as_deref()
                ],
                |row| row.get(0),
            )?;

            let session = Self::get_chat_session(conn, session_id)?.ok_or(duckdb::Error::QueryReturnedNoRows)?;
            let message = conn.query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE id = ?"),
                params![message_id],
                Self::row_to_message,
            )?;
            Ok((session, message))
        })
    }

    // --- Admin Records ---

    pub fn list_records(conn: &Connection, collection: &str) -> DbResult<Vec<StoredRecord>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE collection = ? ORDER BY created_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![collection], Self::row_to_record)?;
        rows.collect()
    }

    pub fn get_record(conn: &Connection, collection: &str, id: &str) -> DbResult<Option<StoredRecord>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE collection = ? AND id = ?"
        ))?;
        let mut rows = stmt.query_map(params![collection, id], Self::row_to_record)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn insert_record(conn: &Connection, collection: &str, data: Value) -> DbResult<StoredRecord> {
        let id = Uuid::new_v4().to_string();
        let data = with_id(data, &id);

        conn.execute(
            "INSERT INTO records (collection, id, data) VALUES (?, ?, ?)",
            params![collection, id, data.to_string()],
        )?;

        Self::get_record(conn, collection, &id)?.ok_or(duckdb::Error::QueryReturnedNoRows)
    }

    /// Replaces the stored document. Returns `None` when the record does not exist.
    pub fn update_record(
        conn: &Connection,
        collection: &str,
        id: &str,
        data: Value,
    ) -> DbResult<Option<StoredRecord>> {
        let data = with_id(data, id);
        let changed = conn.execute(
            "UPDATE records SET data = ?, updated_at = CURRENT_TIMESTAMP WHERE collection = ? AND id = ?",
            params![data.to_string(), collection, id],
        )?;

        if changed == 0 {
            return Ok(None);
        }
        Self::get_record(conn, collection, id)
    }

    pub fn delete_record(conn: &Connection, collection: &str, id: &str) -> DbResult<bool> {
        let changed = conn.execute(
            "DELETE FROM records WHERE collection = ? AND id = ?",
            params![collection, id],
        )?;
        Ok(changed > 0)
    }

    // --- Dead Letters ---

    /// Parks a request. A session already recorded for the conversation is
    /// carried over so later letters join it too.
    pub fn insert_dead_letter(
        conn: &Connection,
        conversation_id: Uuid,
        message_id: Uuid,
        payload: &Value,
        error: &str,
        attempts: u32,
    ) -> DbResult<i64> {
        let session_id = match payload.get("sessionId").and_then(|v| v.as_str()) {
            Some(id) => Some(id.to_string()),
            None => Self::dead_letter_session(conn, conversation_id)?,
        };

        conn.query_row(
            "INSERT INTO dead_letters (conversation_id, session_id, message_id, payload, error, attempts)
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
            params![
                conversation_id.to_string(),
                session_id,
                message_id.to_string(),
                payload.to_string(),
                error,
                attempts as i32
            ],
            |row| row.get(0),
        )
    }

    fn dead_letter_session(conn: &Connection, conversation_id: Uuid) -> DbResult<Option<String>> {
        let mut stmt = conn.prepare(
            "SELECT session_id FROM dead_letters
             WHERE conversation_id = ? AND session_id IS NOT NULL
             ORDER BY id ASC LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![conversation_id.to_string()], |row| row.get::<_, String>(0))?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Records the session of a conversation on its parked letters that have
    /// none yet. Returns how many letters were updated.
    pub fn assign_dead_letter_session(conn: &Connection, conversation_id: Uuid, session_id: &str) -> DbResult<usize> {
        conn.execute(
            "UPDATE dead_letters SET session_id = ? WHERE conversation_id = ? AND session_id IS NULL",
            params![session_id, conversation_id.to_string()],
        )
    }

    pub fn list_dead_letters(conn: &Connection) -> DbResult<Vec<StoredDeadLetter>> {
        let mut stmt = conn.prepare(&format!("SELECT {DEAD_LETTER_COLUMNS} FROM dead_letters ORDER BY id ASC"))?;
        let rows = stmt.query_map([], Self::row_to_dead_letter)?;
        rows.collect()
    }

    pub fn delete_dead_letter(conn: &Connection, id: i64) -> DbResult<bool> {
        let changed = conn.execute("DELETE FROM dead_letters WHERE id = ?", params![id])?;
        Ok(changed > 0)
    }
}
