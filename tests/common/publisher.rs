//! Publishers that record or refuse events
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Mutex;
use tvetlink::realtime::{PublishError, Publisher, Room, ServerEvent};

/// Keeps every published event in order.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(Room, ServerEvent)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Room, ServerEvent)> {
        self.events.lock().unwrap().clone()
    }

    /// Event names published to `room`, in order.
    pub fn names_for(&self, room: Room) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == room)
            .map(|(_, e)| e.name())
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e)| e.name() == name)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, room: Room, event: ServerEvent) -> Result<(), PublishError> {
        self.events.lock().unwrap().push((room, event));
        Ok(())
    }
}

/// Rejects everything, as if the gateway were down.
pub struct FailingPublisher;

#[async_trait]
impl Publisher for FailingPublisher {
    async fn publish(&self, _room: Room, _event: ServerEvent) -> Result<(), PublishError> {
        Err(PublishError::Unavailable("gateway down".to_string()))
    }
}
