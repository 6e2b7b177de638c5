//! Internship postings

use super::{channel, created, message, success, PublisherData};
use crate::error::AppError;
use crate::internships::{self, InternshipInput, InternshipUpdate};
use crate::middleware::ClientCtx;
use crate::user::Role;
use actix_web::{delete, get, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(list_mine)
        .service(list_internships)
        .service(create_internship)
        .service(view_internship)
        .service(update_internship)
        .service(delete_internship);
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub company_id: Option<i32>,
}

#[get("/api/internship")]
pub async fn list_internships(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    Ok(success(
        internships::list_internships(&db, client.get_user(), query.company_id).await?,
    ))
}

#[get("/api/internship/mine")]
pub async fn list_mine(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let owner = client.require_role(Role::Company)?;
    Ok(success(internships::list_my_internships(&db, owner.id).await?))
}

#[get("/api/internship/{id}")]
pub async fn view_internship(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    Ok(success(
        internships::get_internship(&db, client.get_user(), *id).await?,
    ))
}

#[post("/api/internship")]
pub async fn create_internship(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    publisher: PublisherData,
    form: web::Json<InternshipInput>,
) -> Result<HttpResponse, AppError> {
    let owner = client.require_role(Role::Company)?;
    let internship =
        internships::create_internship(&db, channel(&publisher), owner, form.into_inner()).await?;
    Ok(created(internship))
}

#[put("/api/internship/{id}")]
pub async fn update_internship(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    id: web::Path<i32>,
    form: web::Json<InternshipUpdate>,
) -> Result<HttpResponse, AppError> {
    let owner = client.require_role(Role::Company)?;
    Ok(success(
        internships::update_internship(&db, owner, *id, form.into_inner()).await?,
    ))
}

#[delete("/api/internship/{id}")]
pub async fn delete_internship(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user = client.require_login()?;
    internships::delete_internship(&db, user, *id).await?;
    Ok(message("Internship deleted"))
}
