use actix_web::{delete, get, post, put, web, HttpResponse, Result as WebResult};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::client::Envelope;
use crate::cms::COLLECTIONS;
use crate::db::{service::DbService, DbPool};

fn unknown_collection(collection: &str) -> HttpResponse {
    HttpResponse::NotFound().json(Envelope::<()>::failure(format!("Unknown collection: {collection}")))
}

fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(Envelope::<()>::failure("Record not found"))
}

fn db_error(e: duckdb::Error) -> HttpResponse {
    error!("Admin store error: {}", e);
    HttpResponse::InternalServerError().json(Envelope::<()>::failure(e.to_string()))
}

fn known(collection: &str) -> bool {
    COLLECTIONS.contains(&collection)
}

#[get("/admin/{collection}")]
pub async fn list_records(
    pool: web::Data<DbPool>,
    path: web::Path<String>,
) -> WebResult<HttpResponse> {
    let collection = path.into_inner();
    if !known(&collection) {
        return Ok(unknown_collection(&collection));
    }

    let conn = pool.lock().unwrap_or_else(|e| e.into_inner());
    match DbService::list_records(&conn, &collection) {
        Ok(records) => {
            let docs: Vec<Value> = records.into_iter().map(|r| r.data).collect();
            Ok(HttpResponse::Ok().json(Envelope::ok(docs)))
        }
        Err(e) => Ok(db_error(e)),
    }
}

#[get("/admin/{collection}/{id}")]
pub async fn get_record(
    pool: web::Data<DbPool>,
    path: web::Path<(String, String)>,
) -> WebResult<HttpResponse> {
    let (collection, id) = path.into_inner();
    if !known(&collection) {
        return Ok(unknown_collection(&collection));
    }

    let conn = pool.lock().unwrap_or_else(|e| e.into_inner());
    match DbService::get_record(&conn, &collection, &id) {
        Ok(Some(record)) => Ok(HttpResponse::Ok().json(Envelope::ok(record.data))),
        Ok(None) => Ok(not_found()),
        Err(e) => Ok(db_error(e)),
    }
}

#[post("/admin/{collection}")]
pub async fn create_record(
    pool: web::Data<DbPool>,
    path: web::Path<String>,
    body: web::Json<Value>,
) -> WebResult<HttpResponse> {
    let collection = path.into_inner();
    if !known(&collection) {
        return Ok(unknown_collection(&collection));
    }
    let data = body.into_inner();
    if !data.is_object() {
        return Ok(HttpResponse::BadRequest().json(Envelope::<()>::failure("Body must be a JSON object")));
    }

    let conn = pool.lock().unwrap_or_else(|e| e.into_inner());
    match DbService::insert_record(&conn, &collection, data) {
        Ok(record) => {
            info!(collection = %collection, id = %record.id, "record created");
            Ok(HttpResponse::Created().json(Envelope::ok_with_message(record.data, "Created")))
        }
        Err(e) => Ok(db_error(e)),
    }
}

#[put("/admin/{collection}/{id}")]
pub async fn update_record(
    pool: web::Data<DbPool>,
    path: web::Path<(String, String)>,
    body: web::Json<Value>,
) -> WebResult<HttpResponse> {
    let (collection, id) = path.into_inner();
    if !known(&collection) {
        return Ok(unknown_collection(&collection));
    }
    let data = body.into_inner();
    if !data.is_object() {
        return Ok(HttpResponse::BadRequest().json(Envelope::<()>::failure("Body must be a JSON object")));
    }

    let conn = pool.lock().unwrap_or_else(|e| e.into_inner());
    match DbService::update_record(&conn, &collection, &id, data) {
        Ok(Some(record)) => Ok(HttpResponse::Ok().json(Envelope::ok_with_message(record.data, "Updated"))),
        Ok(None) => Ok(not_found()),
        Err(e) => Ok(db_error(e)),
    }
}

#[delete("/admin/{collection}/{id}")]
pub async fn delete_record(
    pool: web::Data<DbPool>,
    path: web::Path<(String, String)>,
) -> WebResult<HttpResponse> {
    let (collection, id) = path.into_inner();
    if !known(&collection) {
        return Ok(unknown_collection(&collection));
    }

    let conn = pool.lock().unwrap_or_else(|e| e.into_inner());
    match DbService::delete_record(&conn, &collection, &id) {
        Ok(true) => Ok(HttpResponse::Ok().json(Envelope::ok_with_message(json!({ "id": id }), "Deleted"))),
        Ok(false) => Ok(not_found()),
        Err(e) => Ok(db_error(e)),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_records)
        .service(get_record)
        .service(create_record)
        .service(update_record)
        .service(delete_record);
}
