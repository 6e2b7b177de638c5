//! Student applications to internships

use crate::companies;
use crate::error::{AppError, AppResult};
use crate::internships::{self, CompanyBrief};
use crate::notifications::dispatcher;
use crate::orm::{applications, internships as internship_orm, notifications, users};
use crate::realtime::Publisher;
use crate::user::{Role, UserSummary};
use chrono::{NaiveDateTime, Utc};
use sea_orm::{entity::*, query::*, sea_query::OnConflict, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationInput {
    pub internship_id: Option<i32>,
    pub cover_letter: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InternshipBrief {
    pub id: i32,
    pub title: String,
    pub company: CompanyBrief,
}

/// An application with the internship and applicant expanded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApplicationView {
    pub id: i32,
    pub status: String,
    pub cover_letter: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub internship: InternshipBrief,
    pub student: UserSummary,
}

async fn to_views(
    db: &DatabaseConnection,
    rows: Vec<applications::Model>,
) -> AppResult<Vec<ApplicationView>> {
    let internship_ids: Vec<i32> = rows.iter().map(|a| a.internship_id).collect();
    let student_ids: Vec<i32> = rows.iter().map(|a| a.student_id).collect();

    let internships: HashMap<i32, InternshipBrief> = if internship_ids.is_empty() {
        HashMap::new()
    } else {
        internship_orm::Entity::find()
            .filter(internship_orm::Column::Id.is_in(internship_ids))
            .find_also_related(crate::orm::companies::Entity)
            .all(db)
            .await?
            .into_iter()
            .filter_map(|(i, c)| {
                let company = CompanyBrief::from(&c?);
                Some((
                    i.id,
                    InternshipBrief {
                        id: i.id,
                        title: i.title,
                        company,
                    },
                ))
            })
            .collect()
    };
    let students = UserSummary::load_many(db, &student_ids).await?;

    Ok(rows
        .into_iter()
        .filter_map(|a| {
            Some(ApplicationView {
                internship: internships.get(&a.internship_id)?.clone(),
                student: students.get(&a.student_id)?.clone(),
                id: a.id,
                status: a.status,
                cover_letter: a.cover_letter,
                created_at: a.created_at,
                updated_at: a.updated_at,
            })
        })
        .collect())
}

/// Applies to an internship. A student can apply to each internship once;
/// concurrent duplicates are resolved by the pair's unique index.
pub async fn apply(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    student: &users::Model,
    input: ApplicationInput,
) -> AppResult<applications::Model> {
    if Role::of(student) != Role::Student {
        return Err(AppError::forbidden("Only students can apply to internships"));
    }
    let internship_id = input
        .internship_id
        .ok_or_else(|| AppError::validation("Internship is required"))?;

    let (internship, company) = internships::find_with_company(db, internship_id).await?;
    if !companies::is_visible_to(&company, Some(student)) {
        return Err(AppError::not_found("Internship not found"));
    }
    if !internship.is_active {
        return Err(AppError::validation("This internship is no longer accepting applications"));
    }

    let now = Utc::now().naive_utc();
    let inserted = applications::Entity::insert(applications::ActiveModel {
        student_id: Set(student.id),
        internship_id: Set(internship.id),
        status: Set(ApplicationStatus::Pending.as_str().to_owned()),
        cover_letter: Set(input.cover_letter.filter(|c| !c.trim().is_empty())),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            applications::Column::StudentId,
            applications::Column::InternshipId,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    if inserted == 0 {
        return Err(AppError::conflict("Already applied."));
    }

    let application = applications::Entity::find()
        .filter(applications::Column::StudentId.eq(student.id))
        .filter(applications::Column::InternshipId.eq(internship.id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::Server("Application vanished after insert".to_string()))?;

    log::info!(
        "Student {} applied to internship {} (application {})",
        student.id,
        internship.id,
        application.id
    );

    dispatcher::notify_new_application(db, publisher, &application, &internship, &company, student)
        .await;

    Ok(application)
}

/// The caller's applications, newest first.
pub async fn list_my_applications(
    db: &DatabaseConnection,
    student_id: i32,
) -> AppResult<Vec<ApplicationView>> {
    let rows = applications::Entity::find()
        .filter(applications::Column::StudentId.eq(student_id))
        .order_by_desc(applications::Column::CreatedAt)
        .order_by_desc(applications::Column::Id)
        .all(db)
        .await?;
    to_views(db, rows).await
}

/// Applications to any internship of the caller's company, newest first.
pub async fn list_company_applications(
    db: &DatabaseConnection,
    owner_id: i32,
) -> AppResult<Vec<ApplicationView>> {
    let company = companies::get_my_company(db, owner_id).await?;
    let rows = applications::Entity::find()
        .inner_join(internship_orm::Entity)
        .filter(internship_orm::Column::CompanyId.eq(company.id))
        .order_by_desc(applications::Column::CreatedAt)
        .order_by_desc(applications::Column::Id)
        .all(db)
        .await?;
    to_views(db, rows).await
}

/// Accepts or rejects an application. Only the owning company may decide,
/// and it may change its mind between the two outcomes.
pub async fn update_status(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    owner: &users::Model,
    application_id: i32,
    status: &str,
) -> AppResult<applications::Model> {
    let status = match ApplicationStatus::from_str(status) {
        Some(s @ (ApplicationStatus::Accepted | ApplicationStatus::Rejected)) => s,
        _ => {
            return Err(AppError::validation(
                "Status must be either accepted or rejected",
            ))
        }
    };

    let application = applications::Entity::find_by_id(application_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Application not found"))?;
    let (internship, company) = internships::find_with_company(db, application.internship_id).await?;
    if company.created_by != owner.id {
        return Err(AppError::forbidden(
            "You can only review applications to your own internships",
        ));
    }

    if application.status == status.as_str() {
        return Ok(application);
    }

    let mut active: applications::ActiveModel = application.into();
    active.status = Set(status.as_str().to_owned());
    active.updated_at = Set(Utc::now().naive_utc());
    let application = active.update(db).await?;

    log::info!(
        "Company {} marked application {} as {}",
        company.id,
        application.id,
        application.status
    );

    dispatcher::notify_status_update(db, publisher, &application, &internship, &company).await;
    Ok(application)
}

/// Withdraws a pending application. Notifications pointing at it are removed
/// and the company is told.
pub async fn cancel(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    student: &users::Model,
    application_id: i32,
) -> AppResult<()> {
    let application = applications::Entity::find_by_id(application_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Application not found"))?;
    if application.student_id != student.id {
        return Err(AppError::forbidden("You can only cancel your own applications"));
    }
    if application.status != ApplicationStatus::Pending.as_str() {
        return Err(AppError::validation("Only pending applications can be cancelled"));
    }

    notifications::Entity::delete_many()
        .filter(notifications::Column::RelatedApplication.eq(application.id))
        .exec(db)
        .await?;
    applications::Entity::delete_by_id(application.id)
        .exec(db)
        .await?;

    log::info!("Student {} cancelled application {}", student.id, application.id);

    match internships::find_with_company(db, application.internship_id).await {
        Ok((internship, company)) => {
            dispatcher::notify_application_cancelled(db, publisher, &internship, &company, student)
                .await;
        }
        Err(e) => log::warn!(
            "Could not load internship {} to report cancellation: {}",
            application.internship_id,
            e
        ),
    }

    Ok(())
}
