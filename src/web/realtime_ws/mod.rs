//! Real-time event gateway over WebSocket
//!
//! ## Architecture
//!
//! - `RealtimeServer` actor owns room membership and fans events out
//! - `RealtimeConnection` actor handles one client socket
//! - Workflows publish through `Addr<RealtimeServer>` as a [`Publisher`](crate::realtime::Publisher)
//!
//! ## Usage
//!
//! 1. Client connects to `/api/realtime.ws` with a bearer token
//! 2. The connection is placed in its user's direct room
//! 3. The client joins its notification feed and conversations by event
//! 4. Events arrive as `{"event": ..., "data": ...}` JSON text frames

pub mod connection;
pub mod message;
pub mod server;

use crate::middleware::ClientCtx;
use actix::Addr;
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use sea_orm::DatabaseConnection;
use std::time::Duration;

pub use connection::RealtimeConnection;
pub use server::RealtimeServer;

pub fn configure(conf: &mut web::ServiceConfig) {
    conf.service(realtime_ws);
}

/// WebSocket endpoint for realtime events
///
/// GET /api/realtime.ws
///
/// Requires authentication, by header or `?token=`.
#[get("/api/realtime.ws")]
pub async fn realtime_ws(
    req: HttpRequest,
    stream: web::Payload,
    client: ClientCtx,
    server: web::Data<Addr<RealtimeServer>>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, Error> {
    let user = client.require_login()?;
    let config = crate::app_config::realtime();

    log::debug!("User {} connecting to realtime WebSocket", user.id);

    let connection = RealtimeConnection::new(
        user.id,
        server.get_ref().clone(),
        db.get_ref().clone(),
        Duration::from_secs(config.heartbeat_interval_secs),
        Duration::from_secs(config.client_timeout_secs),
    );

    ws::start(connection, &req, stream)
}
