//! Company profiles, approval decisions and follows

use super::{channel, created, message, success, PublisherData};
use crate::companies::{self, CompanyInput, CompanyUpdate, StatusAction};
use crate::error::AppError;
use crate::follows;
use crate::middleware::ClientCtx;
use crate::user::Role;
use actix_web::{delete, get, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Literal paths before `{id}`.
    conf.service(view_my_company)
        .service(update_my_company)
        .service(list_companies)
        .service(create_company)
        .service(view_company)
        .service(update_status)
        .service(follow_company)
        .service(unfollow_company)
        .service(view_followers);
}

#[derive(Deserialize)]
pub struct StatusForm {
    pub action: StatusAction,
    pub reason: Option<String>,
}

/// GET /api/company - Approved companies, or all of them for admins
#[get("/api/company")]
pub async fn list_companies(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    Ok(success(companies::list_companies(&db, client.get_user()).await?))
}

/// POST /api/company - Register the caller's company
#[post("/api/company")]
pub async fn create_company(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    publisher: PublisherData,
    form: web::Json<CompanyInput>,
) -> Result<HttpResponse, AppError> {
    let owner = client.require_role(Role::Company)?;
    let company =
        companies::create_company(&db, channel(&publisher), owner, form.into_inner()).await?;
    Ok(created(company))
}

#[get("/api/company/my-company")]
pub async fn view_my_company(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let owner = client.require_role(Role::Company)?;
    Ok(success(companies::get_my_company(&db, owner.id).await?))
}

#[put("/api/company/my-company")]
pub async fn update_my_company(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<CompanyUpdate>,
) -> Result<HttpResponse, AppError> {
    let owner = client.require_role(Role::Company)?;
    Ok(success(
        companies::update_my_company(&db, owner.id, form.into_inner()).await?,
    ))
}

#[get("/api/company/{id}")]
pub async fn view_company(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let company = companies::get_company(&db, client.get_user(), *id).await?;

    let following = match client.get_user() {
        Some(user) if Role::of(user) == Role::Student => {
            follows::is_following(&db, user.id, company.id).await?
        }
        _ => false,
    };

    Ok(success(serde_json::json!({
        "company": company,
        "following": following,
    })))
}

/// PUT /api/company/{id}/status - Approve, reject, revoke or reapprove
#[put("/api/company/{id}/status")]
pub async fn update_status(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    publisher: PublisherData,
    id: web::Path<i32>,
    form: web::Json<StatusForm>,
) -> Result<HttpResponse, AppError> {
    let admin = client.require_role(Role::Admin)?;
    let form = form.into_inner();

    let company = companies::apply_status_action(
        &db,
        channel(&publisher),
        admin,
        *id,
        form.action,
        form.reason,
    )
    .await?;

    Ok(match company {
        Some(company) => success(company),
        None => message("Company registration rejected and removed"),
    })
}

#[post("/api/company/{id}/follow")]
pub async fn follow_company(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    publisher: PublisherData,
    id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let student = client.require_role(Role::Student)?;
    let follow = follows::follow_company(&db, channel(&publisher), student, *id).await?;
    Ok(created(follow))
}

#[delete("/api/company/{id}/follow")]
pub async fn unfollow_company(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let student = client.require_role(Role::Student)?;
    follows::unfollow_company(&db, student.id, *id).await?;
    Ok(message("Unfollowed"))
}

/// GET /api/company/{id}/followers - Owner or admin only
#[get("/api/company/{id}/followers")]
pub async fn view_followers(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let user = client.require_login()?;
    let company = companies::find_by_id(&db, *id).await?;
    if company.created_by != user.id && Role::of(user) != Role::Admin {
        return Err(AppError::forbidden("Only the company owner can view followers"));
    }
    Ok(success(follows::list_followers(&db, company.id).await?))
}
