//! Internship postings

use crate::companies;
use crate::error::{AppError, AppResult};
use crate::notifications::dispatcher;
use crate::orm::{applications, companies as company_orm, internships, notifications, users};
use crate::realtime::Publisher;
use crate::user::Role;
use chrono::{NaiveDateTime, Utc};
use sea_orm::{entity::*, query::*, Condition, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Company details embedded in internship responses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompanyBrief {
    pub id: i32,
    pub name: String,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub approved: bool,
}

impl From<&company_orm::Model> for CompanyBrief {
    fn from(c: &company_orm::Model) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            industry: c.industry.clone(),
            location: c.location.clone(),
            approved: c.approved,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InternshipView {
    #[serde(flatten)]
    pub internship: internships::Model,
    pub company: CompanyBrief,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct InternshipInput {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub location: Option<String>,
    pub field: Option<String>,
    pub duration: Option<String>,
    pub requirements: Option<String>,
    #[validate(range(min = 1, message = "Slots must be positive"))]
    pub slots: Option<i32>,
    pub deadline: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct InternshipUpdate {
    #[validate(length(min = 1, max = 255, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Description cannot be empty"))]
    pub description: Option<String>,
    pub location: Option<String>,
    pub field: Option<String>,
    pub duration: Option<String>,
    pub requirements: Option<String>,
    #[validate(range(min = 1, message = "Slots must be positive"))]
    pub slots: Option<i32>,
    pub deadline: Option<NaiveDateTime>,
    pub is_active: Option<bool>,
}

pub async fn find_by_id(db: &DatabaseConnection, id: i32) -> AppResult<internships::Model> {
    internships::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Internship not found"))
}

/// Internship together with its company.
pub async fn find_with_company(
    db: &DatabaseConnection,
    id: i32,
) -> AppResult<(internships::Model, company_orm::Model)> {
    let internship = find_by_id(db, id).await?;
    let company = companies::find_by_id(db, internship.company_id).await?;
    Ok((internship, company))
}

async fn to_views(
    db: &DatabaseConnection,
    rows: Vec<internships::Model>,
) -> AppResult<Vec<InternshipView>> {
    let mut ids: Vec<i32> = rows.iter().map(|i| i.company_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let companies: HashMap<i32, CompanyBrief> = if ids.is_empty() {
        HashMap::new()
    } else {
        company_orm::Entity::find()
            .filter(company_orm::Column::Id.is_in(ids))
            .all(db)
            .await?
            .iter()
            .map(|c| (c.id, CompanyBrief::from(c)))
            .collect()
    };

    // Internships of deleted companies have nothing to show.
    Ok(rows
        .into_iter()
        .filter_map(|internship| {
            let company = companies.get(&internship.company_id)?.clone();
            Some(InternshipView {
                internship,
                company,
            })
        })
        .collect())
}

/// Posts an internship for the caller's company. The company must be approved.
pub async fn create_internship(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    owner: &users::Model,
    input: InternshipInput,
) -> AppResult<InternshipView> {
    if Role::of(owner) != Role::Company {
        return Err(AppError::forbidden("Only company accounts can post internships"));
    }
    let company = companies::find_by_owner(db, owner.id)
        .await?
        .ok_or_else(|| AppError::forbidden("Register a company before posting internships"))?;
    if !company.approved {
        return Err(AppError::forbidden(
            "Your company must be approved before posting internships",
        ));
    }
    input.validate()?;

    let now = Utc::now().naive_utc();
    let internship = internships::ActiveModel {
        company_id: Set(company.id),
        title: Set(input.title.trim().to_owned()),
        description: Set(input.description),
        location: Set(input.location),
        field: Set(input.field),
        duration: Set(input.duration),
        requirements: Set(input.requirements),
        slots: Set(input.slots),
        deadline: Set(input.deadline),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::info!(
        "Company {} posted internship {} ({})",
        company.id,
        internship.id,
        internship.title
    );

    dispatcher::notify_new_internship(db, publisher, &internship, &company).await;

    Ok(InternshipView {
        company: CompanyBrief::from(&company),
        internship,
    })
}

/// Postings visible to `viewer`, newest first.
///
/// Admins see everything. Others see active postings of approved companies.
pub async fn list_internships(
    db: &DatabaseConnection,
    viewer: Option<&users::Model>,
    company_id: Option<i32>,
) -> AppResult<Vec<InternshipView>> {
    let mut query = internships::Entity::find()
        .order_by_desc(internships::Column::CreatedAt)
        .order_by_desc(internships::Column::Id);

    if let Some(company_id) = company_id {
        query = query.filter(internships::Column::CompanyId.eq(company_id));
    }

    if !viewer.map_or(false, |v| Role::of(v) == Role::Admin) {
        query = query
            .inner_join(company_orm::Entity)
            .filter(company_orm::Column::Approved.eq(true))
            .filter(internships::Column::IsActive.eq(true));
    }

    to_views(db, query.all(db).await?).await
}

/// Every posting of the caller's company, including inactive ones.
pub async fn list_my_internships(
    db: &DatabaseConnection,
    owner_id: i32,
) -> AppResult<Vec<InternshipView>> {
    let company = companies::get_my_company(db, owner_id).await?;
    let rows = internships::Entity::find()
        .filter(internships::Column::CompanyId.eq(company.id))
        .order_by_desc(internships::Column::CreatedAt)
        .all(db)
        .await?;
    to_views(db, rows).await
}

/// One posting. Postings of unapproved companies are hidden from everyone
/// but admins and the owner.
pub async fn get_internship(
    db: &DatabaseConnection,
    viewer: Option<&users::Model>,
    id: i32,
) -> AppResult<InternshipView> {
    let (internship, company) = find_with_company(db, id).await?;
    if !companies::is_visible_to(&company, viewer) {
        return Err(AppError::not_found("Internship not found"));
    }
    Ok(InternshipView {
        company: CompanyBrief::from(&company),
        internship,
    })
}

pub async fn update_internship(
    db: &DatabaseConnection,
    owner: &users::Model,
    id: i32,
    update: InternshipUpdate,
) -> AppResult<InternshipView> {
    let (internship, company) = find_with_company(db, id).await?;
    if company.created_by != owner.id {
        return Err(AppError::forbidden("You can only edit your own internships"));
    }
    update.validate()?;

    let mut active: internships::ActiveModel = internship.into();
    if let Some(title) = update.title {
        active.title = Set(title.trim().to_owned());
    }
    if let Some(description) = update.description {
        active.description = Set(description);
    }
    if let Some(location) = update.location {
        active.location = Set(Some(location));
    }
    if let Some(field) = update.field {
        active.field = Set(Some(field));
    }
    if let Some(duration) = update.duration {
        active.duration = Set(Some(duration));
    }
    if let Some(requirements) = update.requirements {
        active.requirements = Set(Some(requirements));
    }
    if let Some(slots) = update.slots {
        active.slots = Set(Some(slots));
    }
    if let Some(deadline) = update.deadline {
        active.deadline = Set(Some(deadline));
    }
    if let Some(is_active) = update.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(Utc::now().naive_utc());

    let internship = active.update(db).await?;
    Ok(InternshipView {
        company: CompanyBrief::from(&company),
        internship,
    })
}

/// Removes an internship, its applications and every notification that
/// points at either.
async fn purge(db: &DatabaseConnection, internship_id: i32) -> AppResult<()> {
    let application_ids: Vec<i32> = applications::Entity::find()
        .filter(applications::Column::InternshipId.eq(internship_id))
        .all(db)
        .await?
        .into_iter()
        .map(|a| a.id)
        .collect();

    let mut refs = Condition::any().add(notifications::Column::RelatedInternship.eq(internship_id));
    if !application_ids.is_empty() {
        refs = refs.add(notifications::Column::RelatedApplication.is_in(application_ids));
    }
    let removed = notifications::Entity::delete_many()
        .filter(refs)
        .exec(db)
        .await?;

    let apps = applications::Entity::delete_many()
        .filter(applications::Column::InternshipId.eq(internship_id))
        .exec(db)
        .await?;

    internships::Entity::delete_by_id(internship_id)
        .exec(db)
        .await?;

    log::debug!(
        "Deleted internship {} with {} applications and {} notifications",
        internship_id,
        apps.rows_affected,
        removed.rows_affected
    );
    Ok(())
}

/// Deletes a posting. Allowed for the owning company and for admins.
pub async fn delete_internship(
    db: &DatabaseConnection,
    actor: &users::Model,
    id: i32,
) -> AppResult<()> {
    let (internship, company) = find_with_company(db, id).await?;
    if company.created_by != actor.id && Role::of(actor) != Role::Admin {
        return Err(AppError::forbidden("You can only delete your own internships"));
    }

    purge(db, internship.id).await?;
    log::info!("User {} deleted internship {}", actor.id, internship.id);
    Ok(())
}

/// Deletes every posting of a company. Used before the company's owner is removed.
pub async fn delete_all_for_company(db: &DatabaseConnection, company_id: i32) -> AppResult<u64> {
    let ids: Vec<i32> = internships::Entity::find()
        .filter(internships::Column::CompanyId.eq(company_id))
        .all(db)
        .await?
        .into_iter()
        .map(|i| i.id)
        .collect();

    for id in &ids {
        purge(db, *id).await?;
    }
    Ok(ids.len() as u64)
}
