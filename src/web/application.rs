//! Applications to internships

use super::{channel, created, message, success, PublisherData};
use crate::applications::{self, ApplicationInput};
use crate::error::AppError;
use crate::middleware::ClientCtx;
use crate::user::Role;
use actix_web::{delete, get, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(apply)
        .service(list_mine)
        .service(list_company)
        .service(update_status)
        .service(cancel);
}

#[derive(Deserialize)]
pub struct StatusForm {
    #[serde(default)]
    pub status: String,
}

#[post("/api/application")]
pub async fn apply(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    publisher: PublisherData,
    form: web::Json<ApplicationInput>,
) -> Result<HttpResponse, AppError> {
    let student = client.require_role(Role::Student)?;
    let application =
        applications::apply(&db, channel(&publisher), student, form.into_inner()).await?;
    Ok(created(application))
}

#[get("/api/application/mine")]
pub async fn list_mine(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let student = client.require_role(Role::Student)?;
    Ok(success(
        applications::list_my_applications(&db, student.id).await?,
    ))
}

#[get("/api/application/company")]
pub async fn list_company(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let owner = client.require_role(Role::Company)?;
    Ok(success(
        applications::list_company_applications(&db, owner.id).await?,
    ))
}

#[put("/api/application/{id}/status")]
pub async fn update_status(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    publisher: PublisherData,
    id: web::Path<i32>,
    form: web::Json<StatusForm>,
) -> Result<HttpResponse, AppError> {
    let owner = client.require_role(Role::Company)?;
    let application =
        applications::update_status(&db, channel(&publisher), owner, *id, &form.status).await?;
    Ok(success(application))
}

/// DELETE /api/application/{id} - Withdraw a pending application
#[delete("/api/application/{id}")]
pub async fn cancel(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    publisher: PublisherData,
    id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let student = client.require_role(Role::Student)?;
    applications::cancel(&db, channel(&publisher), student, *id).await?;
    Ok(message("Application cancelled"))
}
