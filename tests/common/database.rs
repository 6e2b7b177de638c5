//! Test database setup and management
#![allow(dead_code)]

use sea_orm::{DatabaseConnection, DbErr};

/// Setup test database
///
/// Every call returns a fresh in-memory SQLite database with the full schema.
/// A single pooled connection keeps the in-memory database alive for the
/// whole test.
pub async fn setup_test_database() -> Result<DatabaseConnection, DbErr> {
    let db = tvetlink::db::connect("sqlite::memory:", 1).await?;
    tvetlink::schema::create_schema(&db).await?;
    Ok(db)
}
