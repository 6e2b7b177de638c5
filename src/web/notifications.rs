/// Notification feed routes
use super::{channel, message, success, PublisherData};
use crate::error::AppError;
use crate::middleware::ClientCtx;
use crate::notifications::{self, NotificationFilter};
use actix_web::{delete, get, put, web, HttpResponse};
use sea_orm::DatabaseConnection;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_notifications)
        .service(unread_count)
        .service(mark_all_read)
        .service(mark_read)
        .service(delete_notification);
}

/// GET /api/notifications - Feed, filtered by `category`, `unread_only` and `limit`
#[get("/api/notifications")]
pub async fn view_notifications(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    query: web::Query<NotificationFilter>,
) -> Result<HttpResponse, AppError> {
    let user = client.require_login()?;
    let feed = notifications::list_notifications(&db, user, &query).await?;
    let unread = notifications::get_unread_count(&db, user.id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": feed,
        "unread_count": unread,
    })))
}

#[get("/api/notifications/unread-count")]
pub async fn unread_count(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let user = client.require_login()?;
    let count = notifications::get_unread_count(&db, user.id).await?;
    Ok(success(serde_json::json!({ "count": count })))
}

#[put("/api/notifications/mark-all-read")]
pub async fn mark_all_read(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    publisher: PublisherData,
) -> Result<HttpResponse, AppError> {
    let user = client.require_login()?;
    let count = notifications::mark_all_as_read(&db, channel(&publisher), user.id).await?;
    Ok(success(serde_json::json!({ "count": count })))
}

#[put("/api/notifications/{id}/read")]
pub async fn mark_read(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    publisher: PublisherData,
    id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user = client.require_login()?;
    let notification =
        notifications::mark_as_read(&db, channel(&publisher), *id, user.id).await?;
    Ok(success(notification))
}

#[delete("/api/notifications/{id}")]
pub async fn delete_notification(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    publisher: PublisherData,
    id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user = client.require_login()?;
    notifications::delete_notification(&db, channel(&publisher), *id, user.id).await?;
    Ok(message("Notification deleted"))
}
