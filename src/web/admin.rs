//! Administrator user management

use super::{message, success};
use crate::error::AppError;
use crate::middleware::ClientCtx;
use crate::user::{self, Role};
use actix_web::{delete, get, put, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(list_users)
        .service(update_user_status)
        .service(delete_user);
}

#[derive(Deserialize)]
pub struct UsersQuery {
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusForm {
    pub is_active: bool,
}

#[get("/api/admin/users")]
pub async fn list_users(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    query: web::Query<UsersQuery>,
) -> Result<HttpResponse, AppError> {
    client.require_role(Role::Admin)?;
    let role = match query.role.as_deref() {
        Some(role) => Some(
            Role::from_str(role)
                .ok_or_else(|| AppError::validation(format!("Unknown role {}", role)))?,
        ),
        None => None,
    };
    Ok(success(user::list_users(&db, role).await?))
}

/// PUT /api/admin/users/{id}/status - Activate or suspend
#[put("/api/admin/users/{id}/status")]
pub async fn update_user_status(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    id: web::Path<i32>,
    form: web::Json<StatusForm>,
) -> Result<HttpResponse, AppError> {
    let admin = client.require_role(Role::Admin)?;
    Ok(success(
        user::set_active(&db, admin.id, *id, form.is_active).await?,
    ))
}

#[delete("/api/admin/users/{id}")]
pub async fn delete_user(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let admin = client.require_role(Role::Admin)?;
    user::delete_user(&db, admin.id, *id).await?;
    Ok(message("User deleted"))
}
