//! RealtimeServer actor owning room membership
//!
//! Every connection is placed in its user's direct room on connect. Other
//! rooms are joined on request by the connection actor once it has checked
//! the user may enter them.

use super::message::{Connect, Disconnect, GetOnlineUsers, GetRoomSize, Join, Leave, Publish, Push};
use crate::realtime::{ConnectionRegistry, PublishError, Publisher, Room, ServerEvent};
use actix::prelude::*;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Stored connection information
struct Session {
    user_id: i32,
    /// Channel to send messages to this connection
    recipient: Recipient<Push>,
}

pub struct RealtimeServer {
    /// Connection ID counter
    next_id: usize,
    sessions: HashMap<usize, Session>,
    rooms: HashMap<Room, HashSet<usize>>,
    registry: Arc<dyn ConnectionRegistry>,
    /// Distinguishes this process's connections in a shared registry.
    instance_id: String,
    /// How often live connections are re-registered.
    refresh_interval: Duration,
    /// Numbers online-list reads in the order they were issued.
    presence_reads: Arc<AtomicU64>,
    /// Number of the latest online list sent to clients.
    presence_sent: u64,
}

impl RealtimeServer {
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        let instance_id = uuid::Uuid::new_v4().to_string();
        log::info!("RealtimeServer {} starting up.", instance_id);
        Self {
            next_id: 0,
            sessions: HashMap::new(),
            rooms: HashMap::new(),
            registry,
            instance_id,
            refresh_interval: Duration::from_secs(20),
            presence_reads: Arc::new(AtomicU64::new(0)),
            presence_sent: 0,
        }
    }

    /// Sets how often live connections are re-registered. Must be well under
    /// the registry's connection TTL.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval.max(Duration::from_secs(1));
        self
    }

    fn connection_key(&self, id: usize) -> String {
        format!("{}:{}", self.instance_id, id)
    }

    fn send_to_room(&self, room: &Room, payload: &str, skip: Option<usize>) -> usize {
        let mut sent = 0;
        if let Some(ids) = self.rooms.get(room) {
            for id in ids {
                if Some(*id) == skip {
                    continue;
                }
                if let Some(session) = self.sessions.get(id) {
                    session.recipient.do_send(Push(payload.to_owned()));
                    sent += 1;
                }
            }
        }
        sent
    }

    fn send_to_everyone(&self, payload: &str) {
        for session in self.sessions.values() {
            session.recipient.do_send(Push(payload.to_owned()));
        }
    }

    fn join(&mut self, id: usize, room: Room) {
        self.rooms.entry(room).or_default().insert(id);
    }

    fn leave_all(&mut self, id: usize) {
        for members in self.rooms.values_mut() {
            members.remove(&id);
        }
        self.rooms.retain(|_, members| !members.is_empty());
    }

    /// Runs a registry update and, if the set of online users changed,
    /// tells every connection. Runs alongside other messages; a list read
    /// before one that has already gone out is dropped.
    fn update_presence<F>(&mut self, ctx: &mut Context<Self>, change: F)
    where
        F: std::future::Future<Output = Result<bool, crate::realtime::RegistryError>> + 'static,
    {
        let registry = self.registry.clone();
        let reads = self.presence_reads.clone();
        async move {
            if !change.await? {
                return Ok(None);
            }
            let seq = reads.fetch_add(1, Ordering::SeqCst) + 1;
            registry.online_users().await.map(|ids| Some((seq, ids)))
        }
        .into_actor(self)
        .map(|res, act, _| match res {
            Ok(Some((seq, _))) if seq < act.presence_sent => {
                log::debug!("Dropping stale online users list {}", seq);
            }
            Ok(Some((seq, user_ids))) => match (ServerEvent::OnlineUsersUpdated { user_ids }).to_json() {
                Ok(payload) => {
                    act.presence_sent = seq;
                    act.send_to_everyone(&payload);
                }
                Err(e) => log::warn!("Failed to encode online users: {}", e),
            },
            Ok(None) => (),
            Err(e) => log::warn!("Online-user registry update failed: {}", e),
        })
        .spawn(ctx);
    }

    /// Keeps this instance's connections alive in a shared registry.
    fn refresh_connections(&self, ctx: &mut Context<Self>) {
        let connections: Vec<(i32, String)> = self
            .sessions
            .iter()
            .map(|(id, session)| (session.user_id, self.connection_key(*id)))
            .collect();
        if connections.is_empty() {
            return;
        }

        let registry = self.registry.clone();
        async move { registry.refresh(&connections).await }
            .into_actor(self)
            .map(|res, _, _| {
                if let Err(e) = res {
                    log::warn!("Failed to refresh realtime connections: {}", e);
                }
            })
            .spawn(ctx);
    }
}

impl Actor for RealtimeServer {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        ctx.set_mailbox_capacity(256);
        ctx.run_interval(self.refresh_interval, |act, ctx| act.refresh_connections(ctx));
        log::info!("RealtimeServer started");
    }
}

impl Handler<Connect> for RealtimeServer {
    type Result = usize;

    fn handle(&mut self, msg: Connect, ctx: &mut Context<Self>) -> Self::Result {
        let id = self.next_id;
        self.next_id += 1;

        self.sessions.insert(
            id,
            Session {
                user_id: msg.user_id,
                recipient: msg.addr,
            },
        );
        self.join(id, Room::User(msg.user_id));

        log::debug!(
            "User {} connected with connection ID {} (total connections: {})",
            msg.user_id,
            id,
            self.sessions.len()
        );

        let registry = self.registry.clone();
        let key = self.connection_key(id);
        let user_id = msg.user_id;
        self.update_presence(ctx, async move { registry.add(user_id, &key).await });

        id
    }
}

impl Handler<Disconnect> for RealtimeServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, ctx: &mut Context<Self>) {
        let session = match self.sessions.remove(&msg.id) {
            Some(session) => session,
            None => return,
        };
        self.leave_all(msg.id);

        log::debug!(
            "Connection {} disconnected (total connections: {})",
            msg.id,
            self.sessions.len()
        );

        let registry = self.registry.clone();
        let key = self.connection_key(msg.id);
        let user_id = session.user_id;
        self.update_presence(ctx, async move { registry.remove(user_id, &key).await });
    }
}

impl Handler<Join> for RealtimeServer {
    type Result = ();

    fn handle(&mut self, msg: Join, _: &mut Context<Self>) {
        if self.sessions.contains_key(&msg.id) {
            self.join(msg.id, msg.room);
            log::debug!("Connection {} joined room {}", msg.id, msg.room);
        }
    }
}

impl Handler<Leave> for RealtimeServer {
    type Result = ();

    fn handle(&mut self, msg: Leave, _: &mut Context<Self>) {
        if let Some(members) = self.rooms.get_mut(&msg.room) {
            members.remove(&msg.id);
            if members.is_empty() {
                self.rooms.remove(&msg.room);
            }
        }
    }
}

impl Handler<Publish> for RealtimeServer {
    type Result = usize;

    fn handle(&mut self, msg: Publish, _: &mut Context<Self>) -> Self::Result {
        self.send_to_room(&msg.room, &msg.payload, msg.skip)
    }
}

impl Handler<GetOnlineUsers> for RealtimeServer {
    type Result = ResponseFuture<Vec<i32>>;

    fn handle(&mut self, _: GetOnlineUsers, _: &mut Context<Self>) -> Self::Result {
        let registry = self.registry.clone();
        Box::pin(async move {
            registry.online_users().await.unwrap_or_else(|e| {
                log::warn!("Could not read online users: {}", e);
                Vec::new()
            })
        })
    }
}

impl Handler<GetRoomSize> for RealtimeServer {
    type Result = usize;

    fn handle(&mut self, msg: GetRoomSize, _: &mut Context<Self>) -> Self::Result {
        self.rooms.get(&msg.0).map_or(0, |members| members.len())
    }
}

impl Supervised for RealtimeServer {
    fn restarting(&mut self, _: &mut Context<RealtimeServer>) {
        log::warn!("Restarting the RealtimeServer.");
    }
}

#[async_trait]
impl Publisher for Addr<RealtimeServer> {
    async fn publish(&self, room: Room, event: ServerEvent) -> Result<(), PublishError> {
        let payload = event
            .to_json()
            .map_err(|e| PublishError::Encode(e.to_string()))?;

        self.send(Publish {
            room,
            payload,
            skip: None,
        })
        .await
        .map(|_| ())
        .map_err(|e| PublishError::Unavailable(e.to_string()))
    }
}
