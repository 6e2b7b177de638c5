use crate::error::{AppError, AppResult};
use crate::notifications::dispatcher;
use crate::orm::{companies, users};
use crate::realtime::Publisher;
use crate::session::{hash_password, verify_password};
use chrono::Utc;
use sea_orm::{entity::*, query::*, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Company,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Company => "company",
            Self::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Self::Student),
            "company" => Some(Self::Company),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Role of a stored user. Unknown values are treated as students.
    pub fn of(user: &users::Model) -> Self {
        Self::from_str(&user.role).unwrap_or_else(|| {
            log::warn!("User {} has unknown role {:?}", user.id, user.role);
            Self::Student
        })
    }
}

/// Public view of a user, used wherever another user is shown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: String,
    /// Company name for company-role users that registered one.
    pub company_name: Option<String>,
}

impl UserSummary {
    fn new(user: users::Model, company_name: Option<String>) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            company_name,
        }
    }

    /// Fetches summaries for a set of ids in two queries.
    pub async fn load_many(
        db: &DatabaseConnection,
        ids: &[i32],
    ) -> AppResult<HashMap<i32, Self>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users = users::Entity::find()
            .filter(users::Column::Id.is_in(ids.to_vec()))
            .all(db)
            .await?;

        let mut company_names: HashMap<i32, String> = companies::Entity::find()
            .filter(companies::Column::CreatedBy.is_in(ids.to_vec()))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.created_by, c.name))
            .collect();

        Ok(users
            .into_iter()
            .map(|u| {
                let company_name = company_names.remove(&u.id);
                (u.id, Self::new(u, company_name))
            })
            .collect())
    }
}

/// Account creation input. Admin accounts cannot be self-registered.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
    pub institution: Option<String>,
    pub field_of_study: Option<String>,
}

/// Self-service profile changes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub institution: Option<String>,
    pub field_of_study: Option<String>,
    pub bio: Option<String>,
}

pub async fn find_by_id(db: &DatabaseConnection, id: i32) -> AppResult<users::Model> {
    users::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

pub async fn find_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> AppResult<Option<users::Model>> {
    Ok(users::Entity::find()
        .filter(users::Column::Email.eq(email.trim().to_lowercase()))
        .one(db)
        .await?)
}

/// Ids of every active admin.
pub async fn active_admin_ids(db: &DatabaseConnection) -> AppResult<Vec<i32>> {
    Ok(users::Entity::find()
        .filter(users::Column::Role.eq(Role::Admin.as_str()))
        .filter(users::Column::IsActive.eq(true))
        .all(db)
        .await?
        .into_iter()
        .map(|u| u.id)
        .collect())
}

/// Inserts a user row. Used by registration and by admin bootstrapping.
pub async fn insert_user(db: &DatabaseConnection, new_user: NewUser) -> AppResult<users::Model> {
    let email = new_user.email.trim().to_lowercase();
    if find_by_email(db, &email).await?.is_some() {
        return Err(AppError::conflict("Email is already registered"));
    }

    let now = Utc::now().naive_utc();
    let user = users::ActiveModel {
        name: Set(new_user.name.trim().to_owned()),
        email: Set(email),
        password: Set(hash_password(&new_user.password)?),
        role: Set(new_user.role.as_str().to_owned()),
        is_active: Set(true),
        phone: Set(new_user.phone),
        institution: Set(new_user.institution),
        field_of_study: Set(new_user.field_of_study),
        bio: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(user.insert(db).await?)
}

/// Registers a student or company account.
/// New students are announced to every active admin.
pub async fn register(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    new_user: NewUser,
) -> AppResult<users::Model> {
    if new_user.role == Role::Admin {
        return Err(AppError::forbidden("Admin accounts cannot be self-registered"));
    }

    let user = insert_user(db, new_user).await?;
    log::info!("Registered {} account {} ({})", user.role, user.id, user.email);

    if Role::of(&user) == Role::Student {
        dispatcher::notify_admins_new_student(db, publisher, &user).await;
    }

    Ok(user)
}

/// Checks credentials. Suspended accounts cannot log in.
pub async fn authenticate(
    db: &DatabaseConnection,
    email: &str,
    password: &str,
) -> AppResult<users::Model> {
    let invalid = || AppError::Authentication("Invalid email or password".to_string());

    let user = find_by_email(db, email).await?.ok_or_else(invalid)?;
    if !verify_password(password, &user.password) {
        return Err(invalid());
    }
    if !user.is_active {
        return Err(AppError::forbidden("Account is suspended"));
    }

    Ok(user)
}

pub async fn update_profile(
    db: &DatabaseConnection,
    user_id: i32,
    update: ProfileUpdate,
) -> AppResult<users::Model> {
    let user = find_by_id(db, user_id).await?;
    let mut active: users::ActiveModel = user.into();

    if let Some(name) = update.name {
        if name.trim().is_empty() {
            return Err(AppError::validation("Name cannot be empty"));
        }
        active.name = Set(name.trim().to_owned());
    }
    if let Some(phone) = update.phone {
        active.phone = Set(Some(phone));
    }
    if let Some(institution) = update.institution {
        active.institution = Set(Some(institution));
    }
    if let Some(field_of_study) = update.field_of_study {
        active.field_of_study = Set(Some(field_of_study));
    }
    if let Some(bio) = update.bio {
        active.bio = Set(Some(bio));
    }
    active.updated_at = Set(Utc::now().naive_utc());

    Ok(active.update(db).await?)
}

/// All users, newest first, optionally restricted to one role.
pub async fn list_users(
    db: &DatabaseConnection,
    role: Option<Role>,
) -> AppResult<Vec<users::Model>> {
    let mut query = users::Entity::find().order_by_desc(users::Column::CreatedAt);
    if let Some(role) = role {
        query = query.filter(users::Column::Role.eq(role.as_str()));
    }
    Ok(query.all(db).await?)
}

/// Activates or suspends an account. Admins cannot suspend themselves.
pub async fn set_active(
    db: &DatabaseConnection,
    admin_id: i32,
    user_id: i32,
    is_active: bool,
) -> AppResult<users::Model> {
    if admin_id == user_id && !is_active {
        return Err(AppError::validation("You cannot suspend your own account"));
    }

    let user = find_by_id(db, user_id).await?;
    let mut active: users::ActiveModel = user.into();
    active.is_active = Set(is_active);
    active.updated_at = Set(Utc::now().naive_utc());
    let user = active.update(db).await?;

    log::info!(
        "Admin {} {} user {}",
        admin_id,
        if is_active { "activated" } else { "suspended" },
        user_id
    );
    Ok(user)
}

/// Hard-deletes an account.
///
/// A company owner's internships are removed first through the internship
/// cascade; everything else owned by the user goes with the row.
pub async fn delete_user(db: &DatabaseConnection, admin_id: i32, user_id: i32) -> AppResult<()> {
    if admin_id == user_id {
        return Err(AppError::validation("You cannot delete your own account"));
    }

    let user = find_by_id(db, user_id).await?;

    if let Some(company) = companies::Entity::find()
        .filter(companies::Column::CreatedBy.eq(user.id))
        .one(db)
        .await?
    {
        crate::internships::delete_all_for_company(db, company.id).await?;
    }

    users::Entity::delete_by_id(user.id).exec(db).await?;
    log::info!("Admin {} deleted user {}", admin_id, user_id);
    Ok(())
}
