//! Publishing seam between workflows and the real-time gateway.

use super::events::{Room, ServerEvent};
use async_trait::async_trait;

/// Why a publish did not reach the gateway.
#[derive(Debug)]
pub enum PublishError {
    /// The event could not be serialized.
    Encode(String),
    /// The gateway is gone or did not accept the event.
    Unavailable(String),
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::Encode(msg) => write!(f, "Encode error: {}", msg),
            PublishError::Unavailable(msg) => write!(f, "Gateway unavailable: {}", msg),
        }
    }
}

impl std::error::Error for PublishError {}

/// Sink for server events. Implemented by the websocket gateway actor.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, room: Room, event: ServerEvent) -> Result<(), PublishError>;
}

/// Outcome of a best-effort publish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// No channel was supplied by the caller.
    Skipped,
    /// The channel reported an error; it has been logged.
    Failed,
}

/// Publishes and logs the outcome. Never fails the caller.
pub async fn publish_logged(
    publisher: Option<&dyn Publisher>,
    room: Room,
    event: ServerEvent,
) -> Delivery {
    let publisher = match publisher {
        Some(publisher) => publisher,
        None => return Delivery::Skipped,
    };

    let name = event.name();
    match publisher.publish(room, event).await {
        Ok(()) => {
            log::debug!("Published {} to room {}", name, room);
            Delivery::Sent
        }
        Err(err) => {
            log::warn!("Failed to publish {} to room {}: {}", name, room, err);
            Delivery::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<(Room, &'static str)>>);

    #[async_trait]
    impl Publisher for Recorder {
        async fn publish(&self, room: Room, event: ServerEvent) -> Result<(), PublishError> {
            self.0.lock().unwrap().push((room, event.name()));
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl Publisher for Broken {
        async fn publish(&self, _: Room, _: ServerEvent) -> Result<(), PublishError> {
            Err(PublishError::Unavailable("gone".to_owned()))
        }
    }

    fn typing() -> ServerEvent {
        ServerEvent::UserTyping {
            conversation_id: 3,
            user_id: 1,
        }
    }

    #[actix_rt::test]
    async fn no_publisher_is_skipped() {
        assert_eq!(
            publish_logged(None, Room::Conversation(3), typing()).await,
            Delivery::Skipped
        );
    }

    #[actix_rt::test]
    async fn sent_event_reaches_room() {
        let recorder = Recorder(Mutex::new(Vec::new()));
        let delivery = publish_logged(Some(&recorder), Room::Conversation(3), typing()).await;

        assert_eq!(delivery, Delivery::Sent);
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![(Room::Conversation(3), "user_typing")]
        );
    }

    #[actix_rt::test]
    async fn gateway_error_is_swallowed() {
        assert_eq!(
            publish_logged(Some(&Broken), Room::User(1), typing()).await,
            Delivery::Failed
        );
    }
}
