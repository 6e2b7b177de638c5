//! WebSocket connection actor for realtime clients

use super::message::{Connect, Disconnect, Join, Leave, Publish, Push};
use super::server::RealtimeServer;
use crate::conversations::is_participant;
use crate::notifications::unread_counts;
use crate::realtime::{ClientEvent, Room, ServerEvent};
use actix::*;
use actix_web_actors::ws;
use sea_orm::DatabaseConnection;
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Represents a single authenticated WebSocket connection
pub struct RealtimeConnection {
    /// Connection ID (assigned by server)
    pub id: usize,
    pub user_id: i32,
    /// Last heartbeat timestamp
    pub hb: Instant,
    pub server: Addr<RealtimeServer>,
    db: DatabaseConnection,
    /// Conversations this connection has joined.
    conversations: HashSet<i32>,
    heartbeat_interval: Duration,
    client_timeout: Duration,
}

impl RealtimeConnection {
    pub fn new(
        user_id: i32,
        server: Addr<RealtimeServer>,
        db: DatabaseConnection,
        heartbeat_interval: Duration,
        client_timeout: Duration,
    ) -> Self {
        Self {
            id: 0,
            user_id,
            hb: Instant::now(),
            server,
            db,
            conversations: HashSet::new(),
            heartbeat_interval,
            client_timeout,
        }
    }

    /// Start heartbeat process
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.hb) > act.client_timeout {
                log::debug!("Realtime connection {} timed out", act.id);
                act.server.do_send(Disconnect { id: act.id });
                ctx.stop();
                return;
            }

            ctx.ping(b"");
        });
    }

    /// Register with server and start heartbeat
    fn start_connection(&self, ctx: &mut ws::WebsocketContext<Self>) {
        self.hb(ctx);

        self.server
            .send(Connect {
                addr: ctx.address().recipient(),
                user_id: self.user_id,
            })
            .into_actor(self)
            .then(|res, act, ctx| {
                match res {
                    Ok(id) => {
                        act.id = id;
                        log::debug!(
                            "Realtime connection established: id={}, user={}",
                            id,
                            act.user_id
                        );
                    }
                    Err(err) => {
                        log::warn!("Failed to register realtime connection: {:?}", err);
                        ctx.stop();
                    }
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    fn send_event(&self, ctx: &mut ws::WebsocketContext<Self>, event: ServerEvent) {
        match event.to_json() {
            Ok(payload) => ctx.text(payload),
            Err(e) => log::warn!("Failed to encode {} for connection {}: {}", event.name(), self.id, e),
        }
    }

    fn send_error(&self, ctx: &mut ws::WebsocketContext<Self>, message: &str) {
        self.send_event(
            ctx,
            ServerEvent::Error {
                message: message.to_owned(),
            },
        );
    }

    fn handle_event(&mut self, event: ClientEvent, ctx: &mut ws::WebsocketContext<Self>) {
        match event {
            ClientEvent::UserConnected { user_id } => {
                if user_id != self.user_id {
                    return self.send_error(ctx, "Cannot connect as another user");
                }
                // Already in the direct room since Connect; rejoining is harmless.
                self.server.do_send(Join {
                    id: self.id,
                    room: Room::User(self.user_id),
                });
            }
            ClientEvent::JoinNotifications { user_id } => {
                if user_id != self.user_id {
                    return self.send_error(ctx, "Cannot join another user's notifications");
                }
                self.server.do_send(Join {
                    id: self.id,
                    room: Room::Notifications(self.user_id),
                });

                // Bring the client's badge counters up to date.
                let db = self.db.clone();
                let user_id = self.user_id;
                async move { unread_counts(&db, user_id).await }
                    .into_actor(self)
                    .map(|res, act, ctx| match res {
                        Ok(counts) => act.send_event(ctx, ServerEvent::NotificationUpdate(counts)),
                        Err(e) => log::warn!("Could not count unread items for user {}: {}", act.user_id, e),
                    })
                    .wait(ctx);
            }
            ClientEvent::JoinConversation { conversation_id } => {
                let db = self.db.clone();
                let user_id = self.user_id;
                async move { is_participant(&db, user_id, conversation_id).await }
                    .into_actor(self)
                    .map(move |res, act, ctx| match res {
                        Ok(true) => {
                            act.conversations.insert(conversation_id);
                            act.server.do_send(Join {
                                id: act.id,
                                room: Room::Conversation(conversation_id),
                            });
                            act.send_event(ctx, ServerEvent::ConversationJoined { conversation_id });
                        }
                        Ok(false) => act.send_error(ctx, "Not a participant in this conversation"),
                        Err(e) => {
                            log::warn!(
                                "Could not check participation of user {} in conversation {}: {}",
                                act.user_id,
                                conversation_id,
                                e
                            );
                            act.send_error(ctx, "Could not join conversation");
                        }
                    })
                    .wait(ctx);
            }
            ClientEvent::LeaveConversation { conversation_id } => {
                if self.conversations.remove(&conversation_id) {
                    self.server.do_send(Leave {
                        id: self.id,
                        room: Room::Conversation(conversation_id),
                    });
                }
            }
            ClientEvent::TypingStart { conversation_id } => {
                self.relay_typing(ctx, conversation_id, true);
            }
            ClientEvent::TypingStop { conversation_id } => {
                self.relay_typing(ctx, conversation_id, false);
            }
        }
    }

    fn relay_typing(&self, ctx: &mut ws::WebsocketContext<Self>, conversation_id: i32, typing: bool) {
        if !self.conversations.contains(&conversation_id) {
            return self.send_error(ctx, "Join the conversation first");
        }

        let event = if typing {
            ServerEvent::UserTyping {
                conversation_id,
                user_id: self.user_id,
            }
        } else {
            ServerEvent::UserStoppedTyping {
                conversation_id,
                user_id: self.user_id,
            }
        };

        match event.to_json() {
            Ok(payload) => self.server.do_send(Publish {
                room: Room::Conversation(conversation_id),
                payload,
                skip: Some(self.id),
            }),
            Err(e) => log::warn!("Failed to encode typing event: {}", e),
        }
    }
}

impl Actor for RealtimeConnection {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.start_connection(ctx);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.server.do_send(Disconnect { id: self.id });
        Running::Stop
    }
}

/// Handle messages pushed from the realtime server
impl Handler<Push> for RealtimeConnection {
    type Result = ();

    fn handle(&mut self, msg: Push, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

/// Handle incoming WebSocket messages
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RealtimeConnection {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match msg {
            Err(_) => {
                ctx.stop();
                return;
            }
            Ok(msg) => msg,
        };

        match msg {
            ws::Message::Ping(data) => {
                self.hb = Instant::now();
                ctx.pong(&data);
            }
            ws::Message::Pong(_) => {
                self.hb = Instant::now();
            }
            ws::Message::Text(text) => {
                self.hb = Instant::now();
                let text = text.trim();
                if text == "ping" {
                    ctx.text(r#"{"event":"pong"}"#);
                    return;
                }

                match serde_json::from_str::<ClientEvent>(text) {
                    Ok(event) => self.handle_event(event, ctx),
                    Err(e) => {
                        log::debug!("Unreadable client event on connection {}: {}", self.id, e);
                        self.send_error(ctx, "Unrecognised event");
                    }
                }
            }
            ws::Message::Binary(_) => {
                // Ignore binary messages
            }
            ws::Message::Close(reason) => {
                log::debug!("Realtime client disconnecting: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            ws::Message::Continuation(_) => {
                ctx.stop();
            }
            ws::Message::Nop => (),
        }
    }
}
