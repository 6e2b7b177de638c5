pub mod app_config;
pub mod applications;
pub mod companies;
pub mod conversations;
pub mod db;
pub mod error;
pub mod follows;
pub mod internships;
pub mod middleware;
pub mod notifications;
pub mod orm;
pub mod realtime;
pub mod schema;
pub mod session;
pub mod user;
pub mod web;
