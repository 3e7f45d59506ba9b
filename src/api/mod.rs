pub mod admin;
pub mod middleware;
pub mod models;
pub mod routes;

use actix_web::{error, web, HttpResponse};

use crate::client::Envelope;

/// Malformed JSON bodies get the same envelope as every other failure.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        error::InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(Envelope::<()>::failure(message)),
        )
        .into()
    })
}

/// Registers every backend route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config());
    routes::configure(cfg);
    admin::configure(cfg);
}
