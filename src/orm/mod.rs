//! SeaORM entities, one module per table.

pub mod applications;
pub mod companies;
pub mod company_follows;
pub mod conversations;
pub mod internships;
pub mod messages;
pub mod notifications;
pub mod users;
