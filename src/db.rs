//! Global database pool.

use once_cell::sync::OnceCell;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;

static DB_POOL: OnceCell<DatabaseConnection> = OnceCell::new();

/// Opens a connection pool for `url`.
pub async fn connect(url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(url.to_owned());
    opt.max_connections(max_connections)
        .connect_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    Database::connect(opt).await
}

/// Connects and stores the global pool.
/// Panics if the database is unreachable or the pool was already set.
pub async fn init_db(url: &str, max_connections: u32) -> &'static DatabaseConnection {
    let pool = connect(url, max_connections)
        .await
        .expect("Failed to connect to the database.");

    if DB_POOL.set(pool).is_err() {
        panic!("Database pool already initialized.");
    }

    get_db_pool()
}

/// Returns the global pool.
/// Panics if called before `init_db`.
pub fn get_db_pool() -> &'static DatabaseConnection {
    DB_POOL.get().expect("Database pool not initialized.")
}
