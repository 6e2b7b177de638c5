//! Real-time event layer shared by workflows and the websocket gateway.
//!
//! Workflows publish [`ServerEvent`]s to [`Room`]s through the [`Publisher`]
//! seam. The actix gateway in `web::realtime_ws` is the production publisher.

pub mod events;
pub mod publisher;
pub mod registry;

pub use events::{ClientEvent, CompanyStatusChange, Room, ServerEvent, UnreadCounts};
pub use publisher::{publish_logged, Delivery, PublishError, Publisher};
pub use registry::{ConnectionRegistry, MemoryRegistry, RedisRegistry, RegistryError};
