//! Registration, login and the caller's own profile

use super::{channel, created, success, PublisherData};
use crate::companies;
use crate::error::{AppError, AppResult};
use crate::middleware::ClientCtx;
use crate::orm::users;
use crate::session::TokenKeys;
use crate::user::{self, NewUser, ProfileUpdate, Role};
use actix_web::{get, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(register)
        .service(login)
        .service(view_me)
        .service(update_me);
}

#[derive(Deserialize, Validate)]
pub struct RegisterForm {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub institution: Option<String>,
    pub field_of_study: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
struct AuthPayload {
    token: String,
    user: users::Model,
}

fn issue(keys: &TokenKeys, user: users::Model) -> AppResult<AuthPayload> {
    Ok(AuthPayload {
        token: keys.issue(user.id, Role::of(&user))?,
        user,
    })
}

/// POST /api/auth/register - Create a student or company account
#[post("/api/auth/register")]
pub async fn register(
    db: web::Data<DatabaseConnection>,
    keys: web::Data<TokenKeys>,
    publisher: PublisherData,
    form: web::Json<RegisterForm>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    form.validate()?;

    let role = match form.role.as_deref().unwrap_or("student") {
        "student" => Role::Student,
        "company" => Role::Company,
        "admin" => return Err(AppError::forbidden("Admin accounts cannot be self-registered")),
        other => return Err(AppError::validation(format!("Unknown role {}", other))),
    };

    let user = user::register(
        &db,
        channel(&publisher),
        NewUser {
            name: form.name,
            email: form.email,
            password: form.password,
            role,
            phone: form.phone,
            institution: form.institution,
            field_of_study: form.field_of_study,
        },
    )
    .await?;

    Ok(created(issue(&keys, user)?))
}

/// POST /api/auth/login - Exchange credentials for a token
#[post("/api/auth/login")]
pub async fn login(
    db: web::Data<DatabaseConnection>,
    keys: web::Data<TokenKeys>,
    form: web::Json<LoginForm>,
) -> Result<HttpResponse, AppError> {
    let user = user::authenticate(&db, &form.email, &form.password).await?;
    log::debug!("User {} logged in", user.id);
    Ok(success(issue(&keys, user)?))
}

/// GET /api/auth/me - The caller, with their company if they have one
#[get("/api/auth/me")]
pub async fn view_me(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let user = client.require_login()?;
    let company = companies::find_by_owner(&db, user.id).await?;

    Ok(success(serde_json::json!({
        "user": user,
        "company": company,
    })))
}

/// PUT /api/auth/me - Edit the caller's profile
#[put("/api/auth/me")]
pub async fn update_me(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    form: web::Json<ProfileUpdate>,
) -> Result<HttpResponse, AppError> {
    let user = client.require_login()?;
    let user = user::update_profile(&db, user.id, form.into_inner()).await?;
    Ok(success(user))
}
