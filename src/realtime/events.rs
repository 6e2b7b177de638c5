//! Rooms and the event envelopes exchanged over the real-time channel.

use crate::conversations::MessageView;
use crate::notifications::NotificationView;
use serde::{Deserialize, Serialize};

/// A named broadcast group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Room {
    /// Personal notification feed, `notifications_<userId>`.
    Notifications(i32),
    /// Direct delivery to every connection of a user, the raw user id.
    User(i32),
    /// Thread-scoped events, `conversation_<conversationId>`.
    Conversation(i32),
}

impl Room {
    pub fn key(&self) -> String {
        match self {
            Room::Notifications(user_id) => format!("notifications_{}", user_id),
            Room::User(user_id) => user_id.to_string(),
            Room::Conversation(conversation_id) => format!("conversation_{}", conversation_id),
        }
    }
}

impl std::fmt::Display for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

/// Unread counters pushed after anything that changes them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UnreadCounts {
    pub notifications: u64,
    pub messages: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompanyStatusChange {
    pub company_id: i32,
    pub name: String,
    pub reason: Option<String>,
}

/// Server -> client events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    NewNotification(NotificationView),
    NotificationUpdate(UnreadCounts),
    NewMessage(MessageView),
    MessageSent(MessageView),
    MessagesRead {
        conversation_id: i32,
        reader_id: i32,
        count: u64,
    },
    ConversationJoined {
        conversation_id: i32,
    },
    ConversationDeleted {
        conversation_id: i32,
    },
    OnlineUsersUpdated {
        user_ids: Vec<i32>,
    },
    CompanyApproved(CompanyStatusChange),
    CompanyRejected(CompanyStatusChange),
    CompanyRevoked(CompanyStatusChange),
    CompanyReapproved(CompanyStatusChange),
    UserTyping {
        conversation_id: i32,
        user_id: i32,
    },
    UserStoppedTyping {
        conversation_id: i32,
        user_id: i32,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewNotification(_) => "new_notification",
            ServerEvent::NotificationUpdate(_) => "notification_update",
            ServerEvent::NewMessage(_) => "new_message",
            ServerEvent::MessageSent(_) => "message_sent",
            ServerEvent::MessagesRead { .. } => "messages_read",
            ServerEvent::ConversationJoined { .. } => "conversation_joined",
            ServerEvent::ConversationDeleted { .. } => "conversation_deleted",
            ServerEvent::OnlineUsersUpdated { .. } => "online_users_updated",
            ServerEvent::CompanyApproved(_) => "company_approved",
            ServerEvent::CompanyRejected(_) => "company_rejected",
            ServerEvent::CompanyRevoked(_) => "company_revoked",
            ServerEvent::CompanyReapproved(_) => "company_reapproved",
            ServerEvent::UserTyping { .. } => "user_typing",
            ServerEvent::UserStoppedTyping { .. } => "user_stopped_typing",
            ServerEvent::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Client -> server events.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    UserConnected { user_id: i32 },
    JoinNotifications { user_id: i32 },
    JoinConversation { conversation_id: i32 },
    LeaveConversation { conversation_id: i32 },
    TypingStart { conversation_id: i32 },
    TypingStop { conversation_id: i32 },
}
