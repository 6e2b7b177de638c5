//! One-to-one conversations and direct messages

use crate::error::{AppError, AppResult};
use crate::notifications::{dispatcher, publish_unread_counts};
use crate::orm::{conversations, messages, users};
use crate::realtime::{publish_logged, Publisher, Room, ServerEvent};
use crate::user::UserSummary;
use chrono::{NaiveDateTime, Utc};
use sea_orm::{
    entity::*, query::*, sea_query::Expr, sea_query::OnConflict, Condition, DatabaseConnection,
    Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A message with both ends expanded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub id: i32,
    pub conversation_id: i32,
    pub subject: String,
    pub content: String,
    pub read: bool,
    pub created_at: NaiveDateTime,
    pub sender: UserSummary,
    pub recipient: UserSummary,
}

/// Inbox entry for one conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConversationSummary {
    pub id: i32,
    pub other_participant: UserSummary,
    pub last_message: Option<messages::Model>,
    pub unread_count: u64,
    pub updated_at: NaiveDateTime,
}

/// Body of a send request. The recipient is optional so that a missing one
/// is reported as a validation failure.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewMessage {
    pub recipient_id: Option<i32>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub content: String,
}

fn ordered_pair(a: i32, b: i32) -> (i32, i32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

async fn find_conversation(
    db: &DatabaseConnection,
    a: i32,
    b: i32,
) -> AppResult<Option<conversations::Model>> {
    let (one, two) = ordered_pair(a, b);
    Ok(conversations::Entity::find()
        .filter(conversations::Column::ParticipantOne.eq(one))
        .filter(conversations::Column::ParticipantTwo.eq(two))
        .one(db)
        .await?)
}

/// Returns the conversation between two users, creating it if needed.
///
/// Concurrent callers race on the pair's unique index; the loser's insert is
/// a no-op and both read back the same row.
pub async fn find_or_create_conversation(
    db: &DatabaseConnection,
    a: i32,
    b: i32,
) -> AppResult<conversations::Model> {
    let (one, two) = ordered_pair(a, b);
    let now = Utc::now().naive_utc();

    let inserted = conversations::Entity::insert(conversations::ActiveModel {
        participant_one: Set(one),
        participant_two: Set(two),
        last_message_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            conversations::Column::ParticipantOne,
            conversations::Column::ParticipantTwo,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(db)
    .await?;

    if inserted > 0 {
        log::debug!("Created conversation between users {} and {}", one, two);
    }

    find_conversation(db, one, two)
        .await?
        .ok_or_else(|| AppError::Server(format!("Conversation {}-{} vanished after upsert", one, two)))
}

pub async fn is_participant(
    db: &DatabaseConnection,
    user_id: i32,
    conversation_id: i32,
) -> AppResult<bool> {
    Ok(conversations::Entity::find_by_id(conversation_id)
        .one(db)
        .await?
        .map_or(false, |c| c.has_participant(user_id)))
}

async fn to_views(
    db: &DatabaseConnection,
    rows: Vec<messages::Model>,
) -> AppResult<Vec<MessageView>> {
    let mut ids: Vec<i32> = rows
        .iter()
        .flat_map(|m| [m.sender_id, m.recipient_id])
        .collect();
    ids.sort_unstable();
    ids.dedup();
    let users = UserSummary::load_many(db, &ids).await?;

    Ok(rows
        .into_iter()
        .filter_map(|m| {
            let sender = users.get(&m.sender_id)?.clone();
            let recipient = users.get(&m.recipient_id)?.clone();
            Some(MessageView {
                id: m.id,
                conversation_id: m.conversation_id,
                subject: m.subject,
                content: m.content,
                read: m.read,
                created_at: m.created_at,
                sender,
                recipient,
            })
        })
        .collect())
}

/// Sends a direct message, creating the conversation on first contact.
pub async fn send_message(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    sender: &users::Model,
    input: NewMessage,
) -> AppResult<MessageView> {
    let recipient_id = input
        .recipient_id
        .ok_or_else(|| AppError::validation("Recipient is required"))?;
    if input.subject.trim().is_empty() {
        return Err(AppError::validation("Subject is required"));
    }
    if input.content.trim().is_empty() {
        return Err(AppError::validation("Message content is required"));
    }
    if recipient_id == sender.id {
        return Err(AppError::conflict("You cannot send a message to yourself"));
    }
    if users::Entity::find_by_id(recipient_id).one(db).await?.is_none() {
        return Err(AppError::not_found("Recipient not found"));
    }

    let conversation = find_or_create_conversation(db, sender.id, recipient_id).await?;
    let now = Utc::now().naive_utc();

    let message = messages::ActiveModel {
        conversation_id: Set(conversation.id),
        sender_id: Set(sender.id),
        recipient_id: Set(recipient_id),
        subject: Set(input.subject.clone()),
        content: Set(input.content),
        read: Set(false),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    conversations::Entity::update_many()
        .col_expr(conversations::Column::LastMessageId, Expr::value(message.id))
        .col_expr(conversations::Column::UpdatedAt, Expr::value(now))
        .filter(conversations::Column::Id.eq(conversation.id))
        .exec(db)
        .await?;

    let view = to_views(db, vec![message])
        .await?
        .pop()
        .ok_or_else(|| AppError::Server("Message participants could not be loaded".to_string()))?;

    // The notification also refreshes the recipient's unread counters.
    let notified = dispatcher::notify_new_message(
        db,
        publisher,
        sender,
        recipient_id,
        conversation.id,
        input.subject.trim(),
    )
    .await;
    if notified == 0 {
        publish_unread_counts(db, publisher, recipient_id).await;
    }

    publish_logged(
        publisher,
        Room::User(recipient_id),
        ServerEvent::NewMessage(view.clone()),
    )
    .await;
    publish_logged(
        publisher,
        Room::Conversation(conversation.id),
        ServerEvent::MessageSent(view.clone()),
    )
    .await;

    Ok(view)
}

async fn mark_read_in(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    conversation: &conversations::Model,
    reader_id: i32,
) -> AppResult<u64> {
    let res = messages::Entity::update_many()
        .col_expr(messages::Column::Read, Expr::value(true))
        .filter(messages::Column::ConversationId.eq(conversation.id))
        .filter(messages::Column::RecipientId.eq(reader_id))
        .filter(messages::Column::Read.eq(false))
        .exec(db)
        .await?;

    if res.rows_affected > 0 {
        publish_logged(
            publisher,
            Room::User(conversation.other_participant(reader_id)),
            ServerEvent::MessagesRead {
                conversation_id: conversation.id,
                reader_id,
                count: res.rows_affected,
            },
        )
        .await;
        publish_unread_counts(db, publisher, reader_id).await;
    }

    Ok(res.rows_affected)
}

/// The thread between `user_id` and `other_id`, oldest first.
/// Messages addressed to `user_id` are marked read.
pub async fn get_messages(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    user_id: i32,
    other_id: i32,
) -> AppResult<Vec<MessageView>> {
    let conversation = match find_conversation(db, user_id, other_id).await? {
        Some(conversation) => conversation,
        None => return Ok(Vec::new()),
    };

    mark_read_in(db, publisher, &conversation, user_id).await?;

    let rows = messages::Entity::find()
        .filter(messages::Column::ConversationId.eq(conversation.id))
        .order_by_asc(messages::Column::CreatedAt)
        .order_by_asc(messages::Column::Id)
        .all(db)
        .await?;

    to_views(db, rows).await
}

/// Inbox for `user_id`, most recently active first.
pub async fn get_conversations(
    db: &DatabaseConnection,
    user_id: i32,
) -> AppResult<Vec<ConversationSummary>> {
    let rows = conversations::Entity::find()
        .filter(
            Condition::any()
                .add(conversations::Column::ParticipantOne.eq(user_id))
                .add(conversations::Column::ParticipantTwo.eq(user_id)),
        )
        .order_by_desc(conversations::Column::UpdatedAt)
        .order_by_desc(conversations::Column::Id)
        .all(db)
        .await?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let others: Vec<i32> = rows.iter().map(|c| c.other_participant(user_id)).collect();
    let users = UserSummary::load_many(db, &others).await?;

    let last_ids: Vec<i32> = rows.iter().filter_map(|c| c.last_message_id).collect();
    let mut last_messages: HashMap<i32, messages::Model> = if last_ids.is_empty() {
        HashMap::new()
    } else {
        messages::Entity::find()
            .filter(messages::Column::Id.is_in(last_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect()
    };

    let conversation_ids: Vec<i32> = rows.iter().map(|c| c.id).collect();
    let unread_rows: Vec<i32> = messages::Entity::find()
        .select_only()
        .column(messages::Column::ConversationId)
        .filter(messages::Column::ConversationId.is_in(conversation_ids))
        .filter(messages::Column::RecipientId.eq(user_id))
        .filter(messages::Column::Read.eq(false))
        .into_tuple()
        .all(db)
        .await?;
    let mut unread: HashMap<i32, u64> = HashMap::new();
    for conversation_id in unread_rows {
        *unread.entry(conversation_id).or_default() += 1;
    }

    Ok(rows
        .into_iter()
        .filter_map(|c| {
            let other_participant = users.get(&c.other_participant(user_id))?.clone();
            Some(ConversationSummary {
                id: c.id,
                other_participant,
                last_message: c.last_message_id.and_then(|id| last_messages.remove(&id)),
                unread_count: unread.get(&c.id).copied().unwrap_or(0),
                updated_at: c.updated_at,
            })
        })
        .collect())
}

/// Inbox entries whose other participant matches `query` by name, email or
/// company name, case-insensitively. An empty query matches everything.
pub async fn search_conversations(
    db: &DatabaseConnection,
    user_id: i32,
    query: &str,
) -> AppResult<Vec<ConversationSummary>> {
    let needle = query.trim().to_lowercase();
    let mut conversations = get_conversations(db, user_id).await?;
    if needle.is_empty() {
        return Ok(conversations);
    }

    conversations.retain(|c| {
        let other = &c.other_participant;
        other.name.to_lowercase().contains(&needle)
            || other.email.to_lowercase().contains(&needle)
            || other
                .company_name
                .as_ref()
                .map_or(false, |n| n.to_lowercase().contains(&needle))
    });
    Ok(conversations)
}

/// Marks the thread with `other_id` read for `user_id`. Returns how many
/// messages changed.
pub async fn mark_conversation_as_read(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    user_id: i32,
    other_id: i32,
) -> AppResult<u64> {
    match find_conversation(db, user_id, other_id).await? {
        Some(conversation) => mark_read_in(db, publisher, &conversation, user_id).await,
        None => Ok(0),
    }
}

/// Deletes a conversation and its messages. Participants only.
pub async fn delete_conversation(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    user_id: i32,
    conversation_id: i32,
) -> AppResult<()> {
    let conversation = conversations::Entity::find_by_id(conversation_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Conversation not found"))?;

    if !conversation.has_participant(user_id) {
        return Err(AppError::forbidden("Not a participant in this conversation"));
    }

    messages::Entity::delete_many()
        .filter(messages::Column::ConversationId.eq(conversation.id))
        .exec(db)
        .await?;
    conversations::Entity::delete_by_id(conversation.id)
        .exec(db)
        .await?;

    log::info!("User {} deleted conversation {}", user_id, conversation.id);

    for participant in [conversation.participant_one, conversation.participant_two] {
        publish_logged(
            publisher,
            Room::User(participant),
            ServerEvent::ConversationDeleted {
                conversation_id: conversation.id,
            },
        )
        .await;
        publish_unread_counts(db, publisher, participant).await;
    }

    Ok(())
}

/// Unread direct messages addressed to `user_id`.
pub async fn count_unread_messages(db: &DatabaseConnection, user_id: i32) -> AppResult<u64> {
    Ok(messages::Entity::find()
        .filter(messages::Column::RecipientId.eq(user_id))
        .filter(messages::Column::Read.eq(false))
        .count(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_pair() {
        assert_eq!(ordered_pair(7, 3), (3, 7));
        assert_eq!(ordered_pair(3, 7), (3, 7));
    }
}
