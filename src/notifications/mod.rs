//! Notification records and their delivery to connected clients

pub mod dispatcher;
pub mod types;

use crate::app_config::NotificationsConfig;
use crate::conversations::count_unread_messages;
use crate::error::{AppError, AppResult};
use crate::orm::{companies, internships, notifications, users};
use crate::realtime::{publish_logged, Publisher, Room, ServerEvent, UnreadCounts};
use crate::user::{Role, UserSummary};
use chrono::{NaiveDateTime, Utc};
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use types::{NewNotification, NotificationCategory, NotificationKind, NotificationType};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InternshipRef {
    pub id: i32,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompanyRef {
    pub id: i32,
    pub name: String,
}

/// A notification with its references expanded for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NotificationView {
    pub id: i32,
    #[serde(rename = "type")]
    pub type_: String,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub read_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub sender: Option<UserSummary>,
    pub related_application: Option<i32>,
    pub related_internship: Option<InternshipRef>,
    pub related_company: Option<CompanyRef>,
    pub related_conversation: Option<i32>,
}

/// Feed query parameters.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NotificationFilter {
    pub category: Option<NotificationCategory>,
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<u64>,
}

/// Expands notifications with sender, internship and company details.
/// References that no longer resolve are left empty.
pub async fn expand(
    db: &DatabaseConnection,
    rows: Vec<notifications::Model>,
) -> AppResult<Vec<NotificationView>> {
    let sender_ids: Vec<i32> = rows.iter().filter_map(|n| n.sender_id).collect();
    let internship_ids: Vec<i32> = rows.iter().filter_map(|n| n.related_internship).collect();
    let company_ids: Vec<i32> = rows.iter().filter_map(|n| n.related_company).collect();

    let senders = UserSummary::load_many(db, &sender_ids).await?;

    let titles: HashMap<i32, String> = if internship_ids.is_empty() {
        HashMap::new()
    } else {
        internships::Entity::find()
            .filter(internships::Column::Id.is_in(internship_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|i| (i.id, i.title))
            .collect()
    };

    let names: HashMap<i32, String> = if company_ids.is_empty() {
        HashMap::new()
    } else {
        companies::Entity::find()
            .filter(companies::Column::Id.is_in(company_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect()
    };

    Ok(rows
        .into_iter()
        .map(|n| NotificationView {
            id: n.id,
            sender: n.sender_id.and_then(|id| senders.get(&id).cloned()),
            related_internship: n.related_internship.and_then(|id| {
                titles.get(&id).map(|title| InternshipRef {
                    id,
                    title: title.clone(),
                })
            }),
            related_company: n.related_company.and_then(|id| {
                names.get(&id).map(|name| CompanyRef {
                    id,
                    name: name.clone(),
                })
            }),
            related_application: n.related_application,
            related_conversation: n.related_conversation,
            type_: n.type_,
            title: n.title,
            message: n.message,
            read: n.read,
            read_at: n.read_at,
            created_at: n.created_at,
        })
        .collect())
}

/// Persists a notification and pushes it to the recipient's feed room.
///
/// Publishing is best-effort: failures are logged and the stored record is
/// returned regardless.
pub async fn create_notification(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    payload: NewNotification,
) -> AppResult<notifications::Model> {
    if payload.title.trim().is_empty() {
        return Err(AppError::validation("Notification title is required"));
    }
    if payload.message.trim().is_empty() {
        return Err(AppError::validation("Notification message is required"));
    }
    if users::Entity::find_by_id(payload.recipient)
        .one(db)
        .await?
        .is_none()
    {
        return Err(AppError::not_found("Notification recipient not found"));
    }

    let relations = payload.kind.relations();
    let notification = notifications::ActiveModel {
        recipient_id: Set(payload.recipient),
        sender_id: Set(payload.sender),
        type_: Set(payload.kind.notification_type().as_str().to_owned()),
        title: Set(payload.title),
        message: Set(payload.message),
        related_application: Set(relations.application),
        related_internship: Set(relations.internship),
        related_company: Set(relations.company),
        related_conversation: Set(relations.conversation),
        read: Set(false),
        read_at: Set(None),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    if publisher.is_some() {
        match expand(db, vec![notification.clone()]).await {
            Ok(mut views) => {
                if let Some(view) = views.pop() {
                    publish_logged(
                        publisher,
                        Room::Notifications(notification.recipient_id),
                        ServerEvent::NewNotification(view),
                    )
                    .await;
                }
            }
            Err(e) => log::warn!(
                "Could not expand notification {} for publishing: {}",
                notification.id,
                e
            ),
        }
        publish_unread_counts(db, publisher, notification.recipient_id).await;
    }

    Ok(notification)
}

/// Creates a notification as a side effect of another workflow.
/// Failures are logged and reported as `None`; the caller carries on.
pub async fn notify(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    payload: NewNotification,
) -> Option<notifications::Model> {
    let recipient = payload.recipient;
    let kind = payload.kind.notification_type();

    match create_notification(db, publisher, payload).await {
        Ok(notification) => Some(notification),
        Err(e) => {
            log::warn!(
                "Failed to create {} notification for user {}: {}",
                kind.as_str(),
                recipient,
                e
            );
            None
        }
    }
}

async fn find_owned(
    db: &DatabaseConnection,
    id: i32,
    user_id: i32,
) -> AppResult<notifications::Model> {
    let notification = notifications::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Notification not found"))?;

    if notification.recipient_id != user_id {
        return Err(AppError::forbidden("Not your notification"));
    }

    Ok(notification)
}

/// Marks one notification read. Marking an already-read one is a no-op.
pub async fn mark_as_read(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    id: i32,
    user_id: i32,
) -> AppResult<notifications::Model> {
    let notification = find_owned(db, id, user_id).await?;
    if notification.read {
        return Ok(notification);
    }

    let mut active: notifications::ActiveModel = notification.into();
    active.read = Set(true);
    active.read_at = Set(Some(Utc::now().naive_utc()));
    let notification = active.update(db).await?;

    publish_unread_counts(db, publisher, user_id).await;
    Ok(notification)
}

/// Marks every unread notification of a user read. Returns how many changed.
pub async fn mark_all_as_read(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    user_id: i32,
) -> AppResult<u64> {
    let res = notifications::Entity::update_many()
        .col_expr(notifications::Column::Read, Expr::value(true))
        .col_expr(
            notifications::Column::ReadAt,
            Expr::value(Utc::now().naive_utc()),
        )
        .filter(notifications::Column::RecipientId.eq(user_id))
        .filter(notifications::Column::Read.eq(false))
        .exec(db)
        .await?;

    if res.rows_affected > 0 {
        publish_unread_counts(db, publisher, user_id).await;
    }
    Ok(res.rows_affected)
}

pub async fn get_unread_count(db: &DatabaseConnection, user_id: i32) -> AppResult<u64> {
    Ok(notifications::Entity::find()
        .filter(notifications::Column::RecipientId.eq(user_id))
        .filter(notifications::Column::Read.eq(false))
        .count(db)
        .await?)
}

pub async fn delete_notification(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    id: i32,
    user_id: i32,
) -> AppResult<()> {
    let notification = find_owned(db, id, user_id).await?;
    notifications::Entity::delete_by_id(notification.id)
        .exec(db)
        .await?;

    if !notification.read {
        publish_unread_counts(db, publisher, user_id).await;
    }
    Ok(())
}

/// Page size for a feed request. Always at least one, even when the
/// configured maximum is zero.
fn feed_limit(requested: Option<u64>, config: &NotificationsConfig) -> u64 {
    requested
        .unwrap_or(config.feed_limit)
        .min(config.max_feed_limit)
        .max(1)
}

/// Newest-first feed for `user`, limited to the types their role can receive.
pub async fn list_notifications(
    db: &DatabaseConnection,
    user: &users::Model,
    filter: &NotificationFilter,
) -> AppResult<Vec<NotificationView>> {
    let limit = feed_limit(filter.limit, &crate::app_config::notifications());

    let mut types = NotificationType::for_role(Role::of(user));
    if let Some(category) = filter.category {
        let wanted = category.types();
        types.retain(|t| wanted.contains(t));
    }
    if types.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = notifications::Entity::find()
        .filter(notifications::Column::RecipientId.eq(user.id))
        .filter(
            notifications::Column::Type.is_in(types.iter().map(|t| t.as_str()).collect::<Vec<_>>()),
        )
        .order_by_desc(notifications::Column::CreatedAt)
        .order_by_desc(notifications::Column::Id)
        .limit(limit);

    if filter.unread_only {
        query = query.filter(notifications::Column::Read.eq(false));
    }

    expand(db, query.all(db).await?).await
}

/// Both unread counters for a user.
pub async fn unread_counts(db: &DatabaseConnection, user_id: i32) -> AppResult<UnreadCounts> {
    Ok(UnreadCounts {
        notifications: get_unread_count(db, user_id).await?,
        messages: count_unread_messages(db, user_id).await?,
    })
}

/// Pushes fresh unread counters to the user's feed room.
pub async fn publish_unread_counts(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    user_id: i32,
) {
    if publisher.is_none() {
        return;
    }

    match unread_counts(db, user_id).await {
        Ok(counts) => {
            publish_logged(
                publisher,
                Room::Notifications(user_id),
                ServerEvent::NotificationUpdate(counts),
            )
            .await;
        }
        Err(e) => log::warn!("Could not count unread items for user {}: {}", user_id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(feed_limit: u64, max_feed_limit: u64) -> NotificationsConfig {
        NotificationsConfig {
            feed_limit,
            max_feed_limit,
        }
    }

    #[test]
    fn test_feed_limit_bounds() {
        let config = limits(50, 200);
        assert_eq!(feed_limit(None, &config), 50);
        assert_eq!(feed_limit(Some(10), &config), 10);
        assert_eq!(feed_limit(Some(1000), &config), 200);
        assert_eq!(feed_limit(Some(0), &config), 1);
    }

    #[test]
    fn test_zero_maximum_still_returns_a_page() {
        assert_eq!(feed_limit(None, &limits(50, 0)), 1);
        assert_eq!(feed_limit(Some(5), &limits(0, 0)), 1);
    }
}
