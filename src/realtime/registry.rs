//! Online-user registry.
//!
//! Maps user ids to their live connection keys so any part of the system can
//! ask whether a user is online. `MemoryRegistry` serves a single process;
//! `RedisRegistry` is shared by every instance behind a load balancer.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use redis::{AsyncCommands, Script};
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug)]
pub enum RegistryError {
    Backend(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Backend(msg) => write!(f, "Registry backend error: {}", msg),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<redis::RedisError> for RegistryError {
    fn from(e: redis::RedisError) -> Self {
        RegistryError::Backend(e.to_string())
    }
}

#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Records a live connection. Returns true if the user just came online.
    async fn add(&self, user_id: i32, connection: &str) -> Result<bool, RegistryError>;
    /// Drops a connection. Returns true if the user has no connections left.
    async fn remove(&self, user_id: i32, connection: &str) -> Result<bool, RegistryError>;
    /// Extends the lifetime of live connections. Backends whose entries
    /// cannot outlive the process need not do anything.
    async fn refresh(&self, _connections: &[(i32, String)]) -> Result<(), RegistryError> {
        Ok(())
    }
    async fn is_online(&self, user_id: i32) -> Result<bool, RegistryError>;
    async fn online_users(&self) -> Result<Vec<i32>, RegistryError>;
}

/// In-process registry.
#[derive(Default)]
pub struct MemoryRegistry {
    users: DashMap<i32, HashSet<String>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionRegistry for MemoryRegistry {
    async fn add(&self, user_id: i32, connection: &str) -> Result<bool, RegistryError> {
        let mut entry = self.users.entry(user_id).or_default();
        let was_offline = entry.is_empty();
        entry.insert(connection.to_owned());
        Ok(was_offline)
    }

    async fn remove(&self, user_id: i32, connection: &str) -> Result<bool, RegistryError> {
        let now_offline = match self.users.get_mut(&user_id) {
            Some(mut entry) => {
                entry.remove(connection);
                entry.is_empty()
            }
            None => return Ok(false),
        };

        if now_offline {
            self.users.remove_if(&user_id, |_, conns| conns.is_empty());
        }
        Ok(now_offline)
    }

    async fn is_online(&self, user_id: i32) -> Result<bool, RegistryError> {
        Ok(self
            .users
            .get(&user_id)
            .map(|conns| !conns.is_empty())
            .unwrap_or(false))
    }

    async fn online_users(&self) -> Result<Vec<i32>, RegistryError> {
        let mut ids: Vec<i32> = self
            .users
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| *entry.key())
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

const ONLINE_USERS_KEY: &str = "tvetlink:online_users";
const CONNECTIONS_PREFIX: &str = "tvetlink:connections:";

fn connections_key(user_id: i32) -> String {
    format!("{}{}", CONNECTIONS_PREFIX, user_id)
}

// Connection sets are sorted sets scored by expiry time, so entries left by a
// crashed instance fall out once their TTL passes without a refresh.

/// KEYS: connections, online. ARGV: connection, now, expiry, user id.
static ADD_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', ARGV[2])
local was_offline = redis.call('ZCARD', KEYS[1]) == 0
redis.call('ZADD', KEYS[1], ARGV[3], ARGV[1])
redis.call('SADD', KEYS[2], ARGV[4])
if was_offline then return 1 end
return 0
",
    )
});

/// KEYS: connections, online. ARGV: connection, now, user id.
static REMOVE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
redis.call('ZREM', KEYS[1], ARGV[1])
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', ARGV[2])
if redis.call('ZCARD', KEYS[1]) > 0 then return 0 end
redis.call('DEL', KEYS[1])
return redis.call('SREM', KEYS[2], ARGV[3])
",
    )
});

/// KEYS: online. ARGV: now, connections key prefix.
static ONLINE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
local live = {}
for _, id in ipairs(redis.call('SMEMBERS', KEYS[1])) do
  local key = ARGV[2] .. id
  redis.call('ZREMRANGEBYSCORE', key, '-inf', ARGV[1])
  if redis.call('ZCARD', key) > 0 then
    table.insert(live, id)
  else
    redis.call('SREM', KEYS[1], id)
  end
end
return live
",
    )
});

/// Registry kept in Redis, shared across processes.
///
/// Adds and removes run as Lua scripts so concurrent instances cannot
/// interleave between the connection count and the online set.
pub struct RedisRegistry {
    client: redis::Client,
    ttl_secs: i64,
}

impl RedisRegistry {
    /// `ttl` is how long a connection stays registered without a refresh.
    pub fn new(url: &str, ttl: Duration) -> Result<Self, RegistryError> {
        Ok(Self {
            client: redis::Client::open(url)?,
            ttl_secs: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1),
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, RegistryError> {
        Ok(self.client.get_multiplexed_tokio_connection().await?)
    }

    /// Current time and the expiry a connection registered now would get.
    fn clock(&self) -> (i64, i64) {
        let now = Utc::now().timestamp();
        (now, now.saturating_add(self.ttl_secs))
    }
}

#[async_trait]
impl ConnectionRegistry for RedisRegistry {
    async fn add(&self, user_id: i32, connection: &str) -> Result<bool, RegistryError> {
        let mut con = self.connection().await?;
        let (now, expiry) = self.clock();
        let came_online: i64 = ADD_SCRIPT
            .key(connections_key(user_id))
            .key(ONLINE_USERS_KEY)
            .arg(connection)
            .arg(now)
            .arg(expiry)
            .arg(user_id)
            .invoke_async(&mut con)
            .await?;
        Ok(came_online > 0)
    }

    async fn remove(&self, user_id: i32, connection: &str) -> Result<bool, RegistryError> {
        let mut con = self.connection().await?;
        let (now, _) = self.clock();
        let went_offline: i64 = REMOVE_SCRIPT
            .key(connections_key(user_id))
            .key(ONLINE_USERS_KEY)
            .arg(connection)
            .arg(now)
            .arg(user_id)
            .invoke_async(&mut con)
            .await?;
        Ok(went_offline > 0)
    }

    async fn refresh(&self, connections: &[(i32, String)]) -> Result<(), RegistryError> {
        if connections.is_empty() {
            return Ok(());
        }

        let mut con = self.connection().await?;
        let (_, expiry) = self.clock();
        let mut pipe = redis::pipe();
        for (user_id, connection) in connections {
            pipe.zadd(connections_key(*user_id), connection, expiry)
                .ignore()
                .sadd(ONLINE_USERS_KEY, *user_id)
                .ignore();
        }
        pipe.query_async::<_, ()>(&mut con).await?;
        Ok(())
    }

    async fn is_online(&self, user_id: i32) -> Result<bool, RegistryError> {
        let mut con = self.connection().await?;
        let (now, _) = self.clock();
        let live: i64 = con
            .zcount(connections_key(user_id), format!("({}", now), "+inf")
            .await?;
        Ok(live > 0)
    }

    async fn online_users(&self) -> Result<Vec<i32>, RegistryError> {
        let mut con = self.connection().await?;
        let (now, _) = self.clock();
        let mut ids: Vec<i32> = ONLINE_SCRIPT
            .key(ONLINE_USERS_KEY)
            .arg(now)
            .arg(CONNECTIONS_PREFIX)
            .invoke_async(&mut con)
            .await?;
        ids.sort_unstable();
        Ok(ids)
    }
}
