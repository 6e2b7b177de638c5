//! Direct messaging routes

use super::{channel, created, message, success, PublisherData};
use crate::conversations::{self, NewMessage};
use crate::error::AppError;
use crate::middleware::ClientCtx;
use actix_web::{delete, get, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(send_message)
        .service(search_conversations)
        .service(list_conversations)
        .service(unread_count)
        .service(view_thread)
        .service(mark_thread_read)
        .service(delete_conversation);
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[post("/api/messages")]
pub async fn send_message(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    publisher: PublisherData,
    form: web::Json<NewMessage>,
) -> Result<HttpResponse, AppError> {
    let sender = client.require_login()?;
    let message =
        conversations::send_message(&db, channel(&publisher), sender, form.into_inner()).await?;
    Ok(created(message))
}

#[get("/api/messages/conversations")]
pub async fn list_conversations(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let user = client.require_login()?;
    Ok(success(conversations::get_conversations(&db, user.id).await?))
}

#[get("/api/messages/conversations/search")]
pub async fn search_conversations(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    let user = client.require_login()?;
    Ok(success(
        conversations::search_conversations(&db, user.id, &query.q).await?,
    ))
}

#[get("/api/messages/unread-count")]
pub async fn unread_count(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let user = client.require_login()?;
    let count = conversations::count_unread_messages(&db, user.id).await?;
    Ok(success(serde_json::json!({ "count": count })))
}

/// GET /api/messages/user/{userId} - Thread with another user; marks it read
#[get("/api/messages/user/{user_id}")]
pub async fn view_thread(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    publisher: PublisherData,
    other_id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user = client.require_login()?;
    Ok(success(
        conversations::get_messages(&db, channel(&publisher), user.id, *other_id).await?,
    ))
}

#[put("/api/messages/read/{user_id}")]
pub async fn mark_thread_read(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    publisher: PublisherData,
    other_id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user = client.require_login()?;
    let count =
        conversations::mark_conversation_as_read(&db, channel(&publisher), user.id, *other_id)
            .await?;
    Ok(success(serde_json::json!({ "count": count })))
}

#[delete("/api/messages/conversations/{id}")]
pub async fn delete_conversation(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    publisher: PublisherData,
    id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user = client.require_login()?;
    conversations::delete_conversation(&db, channel(&publisher), user.id, *id).await?;
    Ok(message("Conversation deleted"))
}
