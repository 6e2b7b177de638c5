//! Company profiles and the approval workflow

use crate::error::{AppError, AppResult};
use crate::notifications::dispatcher;
use crate::orm::{companies, users};
use crate::realtime::{publish_logged, CompanyStatusChange, Publisher, Room, ServerEvent};
use crate::user::Role;
use chrono::Utc;
use sea_orm::{entity::*, query::*, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Review state of a company.
///
/// `pending` -> `approved` <-> `revoked`. A pending company can also be
/// rejected, which deletes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    Pending,
    Approved,
    Revoked,
}

impl CompanyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Revoked => "revoked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }

    pub fn of(company: &companies::Model) -> Self {
        Self::from_str(&company.status).unwrap_or(if company.approved {
            Self::Approved
        } else {
            Self::Pending
        })
    }
}

/// Admin decision on a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusAction {
    Approve,
    Reject,
    Revoke,
    Reapprove,
}

impl StatusAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Revoke => "revoke",
            Self::Reapprove => "reapprove",
        }
    }

    /// State after applying this action to `from`. `None` means the company
    /// is deleted.
    pub fn transition(&self, from: CompanyStatus) -> AppResult<Option<CompanyStatus>> {
        use CompanyStatus::*;

        match (self, from) {
            (Self::Approve, Pending | Revoked) => Ok(Some(Approved)),
            (Self::Reject, Pending) => Ok(None),
            (Self::Revoke, Approved) => Ok(Some(Revoked)),
            (Self::Reapprove, Revoked) => Ok(Some(Approved)),
            (action, from) => Err(AppError::validation(format!(
                "Cannot {} a company that is {}",
                action.as_str(),
                from.as_str()
            ))),
        }
    }

    fn event(&self, change: CompanyStatusChange) -> ServerEvent {
        match self {
            Self::Approve => ServerEvent::CompanyApproved(change),
            Self::Reject => ServerEvent::CompanyRejected(change),
            Self::Revoke => ServerEvent::CompanyRevoked(change),
            Self::Reapprove => ServerEvent::CompanyReapproved(change),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CompanyInput {
    #[validate(length(min = 1, max = 255, message = "Company name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub industry: Option<String>,
    #[validate(length(max = 255))]
    pub website: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub trainings: Vec<String>,
    #[serde(default)]
    pub gallery: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CompanyUpdate {
    #[validate(length(min = 1, max = 255, message = "Company name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    #[validate(length(max = 255))]
    pub website: Option<String>,
    pub location: Option<String>,
    pub trainings: Option<Vec<String>>,
    pub gallery: Option<Vec<String>>,
}

pub async fn find_by_id(db: &DatabaseConnection, id: i32) -> AppResult<companies::Model> {
    companies::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Company not found"))
}

pub async fn find_by_owner(
    db: &DatabaseConnection,
    owner_id: i32,
) -> AppResult<Option<companies::Model>> {
    Ok(companies::Entity::find()
        .filter(companies::Column::CreatedBy.eq(owner_id))
        .one(db)
        .await?)
}

/// Whether `viewer` may see `company`. Admins and the owner always can.
pub fn is_visible_to(company: &companies::Model, viewer: Option<&users::Model>) -> bool {
    company.approved
        || viewer.map_or(false, |v| {
            v.id == company.created_by || Role::of(v) == Role::Admin
        })
}

/// Registers the caller's company in `pending` state and tells the admins.
pub async fn create_company(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    owner: &users::Model,
    input: CompanyInput,
) -> AppResult<companies::Model> {
    if Role::of(owner) != Role::Company {
        return Err(AppError::forbidden("Only company accounts can register a company"));
    }
    input.validate()?;
    if input.name.trim().is_empty() {
        return Err(AppError::validation("Company name is required"));
    }
    if find_by_owner(db, owner.id).await?.is_some() {
        return Err(AppError::conflict("You have already registered a company"));
    }

    let now = Utc::now().naive_utc();
    let company = companies::ActiveModel {
        created_by: Set(owner.id),
        name: Set(input.name.trim().to_owned()),
        description: Set(input.description),
        industry: Set(input.industry),
        website: Set(input.website),
        location: Set(input.location),
        trainings: Set(serde_json::json!(input.trainings)),
        gallery: Set(serde_json::json!(input.gallery)),
        approved: Set(false),
        status: Set(CompanyStatus::Pending.as_str().to_owned()),
        status_reason: Set(None),
        reviewed_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::info!("User {} registered company {} ({})", owner.id, company.id, company.name);

    dispatcher::notify_admins_new_company(db, publisher, &company).await;
    dispatcher::acknowledge_company_registration(db, publisher, &company).await;

    Ok(company)
}

pub async fn get_my_company(db: &DatabaseConnection, owner_id: i32) -> AppResult<companies::Model> {
    find_by_owner(db, owner_id)
        .await?
        .ok_or_else(|| AppError::not_found("You have not registered a company"))
}

/// Edits the caller's company. Approval state is untouched.
pub async fn update_my_company(
    db: &DatabaseConnection,
    owner_id: i32,
    update: CompanyUpdate,
) -> AppResult<companies::Model> {
    update.validate()?;
    let company = get_my_company(db, owner_id).await?;
    let mut active: companies::ActiveModel = company.into();

    if let Some(name) = update.name {
        if name.trim().is_empty() {
            return Err(AppError::validation("Company name cannot be empty"));
        }
        active.name = Set(name.trim().to_owned());
    }
    if let Some(description) = update.description {
        active.description = Set(Some(description));
    }
    if let Some(industry) = update.industry {
        active.industry = Set(Some(industry));
    }
    if let Some(website) = update.website {
        active.website = Set(Some(website));
    }
    if let Some(location) = update.location {
        active.location = Set(Some(location));
    }
    if let Some(trainings) = update.trainings {
        active.trainings = Set(serde_json::json!(trainings));
    }
    if let Some(gallery) = update.gallery {
        active.gallery = Set(serde_json::json!(gallery));
    }
    active.updated_at = Set(Utc::now().naive_utc());

    Ok(active.update(db).await?)
}

/// Admins see every company; everyone else only approved ones.
pub async fn list_companies(
    db: &DatabaseConnection,
    viewer: Option<&users::Model>,
) -> AppResult<Vec<companies::Model>> {
    let mut query = companies::Entity::find().order_by_desc(companies::Column::CreatedAt);
    if !viewer.map_or(false, |v| Role::of(v) == Role::Admin) {
        query = query.filter(companies::Column::Approved.eq(true));
    }
    Ok(query.all(db).await?)
}

/// A single company. Hidden companies are reported as missing.
pub async fn get_company(
    db: &DatabaseConnection,
    viewer: Option<&users::Model>,
    id: i32,
) -> AppResult<companies::Model> {
    let company = find_by_id(db, id).await?;
    if !is_visible_to(&company, viewer) {
        return Err(AppError::not_found("Company not found"));
    }
    Ok(company)
}

/// Applies an admin decision.
///
/// Returns the updated company, or `None` when it was rejected and deleted.
/// The owner is notified and receives the matching realtime event.
pub async fn apply_status_action(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    admin: &users::Model,
    company_id: i32,
    action: StatusAction,
    reason: Option<String>,
) -> AppResult<Option<companies::Model>> {
    if Role::of(admin) != Role::Admin {
        return Err(AppError::forbidden("Only administrators can review companies"));
    }

    let company = find_by_id(db, company_id).await?;
    let next = action.transition(CompanyStatus::of(&company))?;
    let reason = reason
        .map(|r| r.trim().to_owned())
        .filter(|r| !r.is_empty());

    let change = CompanyStatusChange {
        company_id: company.id,
        name: company.name.clone(),
        reason: reason.clone(),
    };
    let owner_id = company.created_by;

    let result = match next {
        Some(status) => {
            let mut active: companies::ActiveModel = company.into();
            active.approved = Set(status == CompanyStatus::Approved);
            active.status = Set(status.as_str().to_owned());
            active.status_reason = Set(reason.clone());
            active.reviewed_at = Set(Some(Utc::now().naive_utc()));
            active.updated_at = Set(Utc::now().naive_utc());
            let company = active.update(db).await?;

            dispatcher::notify_company_status(
                db,
                publisher,
                &company,
                admin.id,
                action,
                reason.as_deref(),
            )
            .await;
            Some(company)
        }
        None => {
            // Notify before the row goes away so the notification can be linked.
            dispatcher::notify_company_status(
                db,
                publisher,
                &company,
                admin.id,
                action,
                reason.as_deref(),
            )
            .await;
            companies::Entity::delete_by_id(company.id).exec(db).await?;
            None
        }
    };

    log::info!(
        "Admin {} applied {} to company {}",
        admin.id,
        action.as_str(),
        company_id
    );

    publish_logged(publisher, Room::User(owner_id), action.event(change)).await;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        use CompanyStatus::*;

        assert_eq!(StatusAction::Approve.transition(Pending).unwrap(), Some(Approved));
        assert_eq!(StatusAction::Approve.transition(Revoked).unwrap(), Some(Approved));
        assert_eq!(StatusAction::Reject.transition(Pending).unwrap(), None);
        assert_eq!(StatusAction::Revoke.transition(Approved).unwrap(), Some(Revoked));
        assert_eq!(StatusAction::Reapprove.transition(Revoked).unwrap(), Some(Approved));
    }

    #[test]
    fn test_illegal_transitions() {
        use CompanyStatus::*;

        for (action, from) in [
            (StatusAction::Approve, Approved),
            (StatusAction::Reject, Approved),
            (StatusAction::Reject, Revoked),
            (StatusAction::Revoke, Pending),
            (StatusAction::Revoke, Revoked),
            (StatusAction::Reapprove, Pending),
            (StatusAction::Reapprove, Approved),
        ] {
            assert!(
                matches!(action.transition(from), Err(AppError::Validation(_))),
                "{} from {} should fail",
                action.as_str(),
                from.as_str()
            );
        }
    }

    #[test]
    fn test_action_deserializes_lowercase() {
        let action: StatusAction = serde_json::from_str("\"reapprove\"").unwrap();
        assert_eq!(action, StatusAction::Reapprove);
    }
}
