//! Messages exchanged between the realtime server and its connections

use crate::realtime::Room;
use actix::prelude::*;

/// Server -> connection push of an encoded event.
pub struct Push(pub String);

impl Message for Push {
    type Result = ();
}

/// New websocket connection for an authenticated user.
pub struct Connect {
    /// Channel to send messages back to this connection
    pub addr: Recipient<Push>,
    pub user_id: i32,
}

impl Message for Connect {
    /// Returns connection ID
    type Result = usize;
}

pub struct Disconnect {
    /// Connection ID
    pub id: usize,
}

impl Message for Disconnect {
    type Result = ();
}

/// Adds a connection to a room.
pub struct Join {
    pub id: usize,
    pub room: Room,
}

impl Message for Join {
    type Result = ();
}

pub struct Leave {
    pub id: usize,
    pub room: Room,
}

impl Message for Leave {
    type Result = ();
}

/// Delivers an encoded event to every connection in a room.
pub struct Publish {
    pub room: Room,
    pub payload: String,
    /// Connection that should not receive its own event.
    pub skip: Option<usize>,
}

impl Message for Publish {
    /// Number of connections reached
    type Result = usize;
}

/// Ids of users with at least one live connection.
pub struct GetOnlineUsers;

impl Message for GetOnlineUsers {
    type Result = Vec<i32>;
}

/// Number of connections in a room.
pub struct GetRoomSize(pub Room);

impl Message for GetRoomSize {
    type Result = usize;
}
