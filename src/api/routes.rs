use actix_web::{get, post, web, HttpResponse, Result as WebResult};
use tracing::{error, info};
use uuid::Uuid;

use crate::api::models::PaginationQuery;
use crate::chat::models::{PersistAck, PersistRequest};
use crate::client::Envelope;
use crate::db::{service::DbService, DbPool};

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "healthy"}))
}

// --- Chat widget ---

#[post("/chat/message")]
pub async fn post_chat_message(
    pool: web::Data<DbPool>,
    req: web::Json<PersistRequest>,
) -> WebResult<HttpResponse> {
    let req = req.into_inner();
    if req.message.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(Envelope::<()>::failure("message is required")));
    }

    let conn = pool.lock().unwrap_or_else(|e| e.into_inner());
    match DbService::record_chat_message(&conn, &req) {
        Ok((session, message)) => {
            if req.session_id.is_none() {
                info!(session_id = %session.id, page_url = ?session.page_url, "chat session started");
            }
            let ack = PersistAck {
                session_id: session.id.to_string(),
                message_id: Some(message.id),
            };
            Ok(HttpResponse::Created().json(Envelope::ok(ack)))
        }
        Err(e) => {
            error!("Failed to store chat message: {}", e);
            Ok(HttpResponse::InternalServerError().json(Envelope::<()>::failure(e.to_string())))
        }
    }
}

// --- Captured transcripts ---

#[get("/chat/sessions")]
pub async fn list_chat_sessions(
    pool: web::Data<DbPool>,
    query: web::Query<PaginationQuery>,
) -> WebResult<HttpResponse> {
    let conn = pool.lock().unwrap_or_else(|e| e.into_inner());

    match DbService::list_chat_sessions(&conn, query.limit, query.offset) {
        Ok(sessions) => Ok(HttpResponse::Ok().json(Envelope::ok(sessions))),
        Err(e) => Ok(HttpResponse::InternalServerError().json(Envelope::<()>::failure(e.to_string()))),
    }
}

#[get("/chat/sessions/{id}")]
pub async fn get_chat_session(
    pool: web::Data<DbPool>,
    id: web::Path<Uuid>,
) -> WebResult<HttpResponse> {
    let conn = pool.lock().unwrap_or_else(|e| e.into_inner());

    match DbService::get_transcript(&conn, id.into_inner()) {
        Ok(Some(transcript)) => Ok(HttpResponse::Ok().json(Envelope::ok(transcript))),
        Ok(None) => Ok(HttpResponse::NotFound().json(Envelope::<()>::failure("Session not found"))),
        Err(e) => Ok(HttpResponse::InternalServerError().json(Envelope::<()>::failure(e.to_string()))),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(post_chat_message)
        .service(list_chat_sessions)
        .service(get_chat_session);
}
