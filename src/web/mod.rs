pub mod admin;
pub mod application;
pub mod auth;
pub mod company;
pub mod internship;
pub mod messages;
pub mod notifications;
pub mod realtime_ws;

use crate::error::AppError;
use crate::realtime::Publisher;
use actix_web::web::{Data, JsonConfig, PathConfig, QueryConfig};
use actix_web::HttpResponse;
use serde::Serialize;
use std::sync::Arc;

/// Realtime publishing handle shared by every handler.
pub type PublisherData = Data<Arc<dyn Publisher>>;

pub(crate) fn channel(publisher: &PublisherData) -> Option<&dyn Publisher> {
    Some(publisher.get_ref().as_ref())
}

/// `200 {"success": true, "data": ...}`
pub fn success<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": data,
    }))
}

/// `201 {"success": true, "data": ...}`
pub fn created<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "data": data,
    }))
}

/// `200 {"success": true, "message": ...}`
pub fn message(msg: &str) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": msg,
    }))
}

/// Configures the web app by adding services from each web file.
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Malformed bodies, queries and paths get the same envelope as every other error.
    conf.app_data(
        JsonConfig::default().error_handler(|err, _| AppError::validation(err.to_string()).into()),
    )
    .app_data(
        QueryConfig::default().error_handler(|err, _| AppError::validation(err.to_string()).into()),
    )
    .app_data(
        PathConfig::default().error_handler(|err, _| AppError::not_found(err.to_string()).into()),
    );

    // Descending order. Order is important.
    // Route resolution will stop at the first match.
    auth::configure(conf);
    company::configure(conf);
    internship::configure(conf);
    application::configure(conf);
    notifications::configure(conf);
    messages::configure(conf);
    admin::configure(conf);
    realtime_ws::configure(conf);
}
