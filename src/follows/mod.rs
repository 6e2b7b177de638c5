//! Students following companies

use crate::companies;
use crate::error::{AppError, AppResult};
use crate::notifications::dispatcher;
use crate::orm::{company_follows, users};
use crate::realtime::Publisher;
use crate::user::{Role, UserSummary};
use chrono::Utc;
use sea_orm::{entity::*, query::*, sea_query::OnConflict, DatabaseConnection, Set};

/// Follows a visible company. A second follow of the same company fails
/// with a conflict and does not notify the owner again.
pub async fn follow_company(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    student: &users::Model,
    company_id: i32,
) -> AppResult<company_follows::Model> {
    if Role::of(student) != Role::Student {
        return Err(AppError::forbidden("Only students can follow companies"));
    }
    let company = companies::get_company(db, Some(student), company_id).await?;

    let inserted = company_follows::Entity::insert(company_follows::ActiveModel {
        student_id: Set(student.id),
        company_id: Set(company.id),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            company_follows::Column::StudentId,
            company_follows::Column::CompanyId,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    if inserted == 0 {
        return Err(AppError::conflict("Already following this company"));
    }

    let follow = company_follows::Entity::find()
        .filter(company_follows::Column::StudentId.eq(student.id))
        .filter(company_follows::Column::CompanyId.eq(company.id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::Server("Follow vanished after insert".to_string()))?;

    dispatcher::notify_new_follower(db, publisher, &company, student).await;
    Ok(follow)
}

pub async fn unfollow_company(
    db: &DatabaseConnection,
    student_id: i32,
    company_id: i32,
) -> AppResult<()> {
    let res = company_follows::Entity::delete_many()
        .filter(company_follows::Column::StudentId.eq(student_id))
        .filter(company_follows::Column::CompanyId.eq(company_id))
        .exec(db)
        .await?;

    if res.rows_affected == 0 {
        return Err(AppError::not_found("You are not following this company"));
    }
    Ok(())
}

pub async fn is_following(
    db: &DatabaseConnection,
    student_id: i32,
    company_id: i32,
) -> AppResult<bool> {
    Ok(company_follows::Entity::find()
        .filter(company_follows::Column::StudentId.eq(student_id))
        .filter(company_follows::Column::CompanyId.eq(company_id))
        .count(db)
        .await?
        > 0)
}

/// Students following a company, newest first.
pub async fn list_followers(
    db: &DatabaseConnection,
    company_id: i32,
) -> AppResult<Vec<UserSummary>> {
    let ids: Vec<i32> = company_follows::Entity::find()
        .filter(company_follows::Column::CompanyId.eq(company_id))
        .order_by_desc(company_follows::Column::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(|f| f.student_id)
        .collect();

    let mut summaries = UserSummary::load_many(db, &ids).await?;
    Ok(ids.iter().filter_map(|id| summaries.remove(id)).collect())
}
