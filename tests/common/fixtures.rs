//! Test fixtures for creating test data
#![allow(dead_code)]

use chrono::Utc;
use sea_orm::{entity::*, ActiveValue::Set, DatabaseConnection};
use tvetlink::orm::{companies, internships, users};
use tvetlink::user::{insert_user, NewUser, Role};

pub const TEST_PASSWORD: &str = "password123";

/// Create a user with known credentials. The email is `<name>@test.com`.
pub async fn create_test_user(db: &DatabaseConnection, name: &str, role: Role) -> users::Model {
    insert_user(
        db,
        NewUser {
            name: name.to_string(),
            email: format!("{}@test.com", name.to_lowercase()),
            password: TEST_PASSWORD.to_string(),
            role,
            phone: None,
            institution: None,
            field_of_study: None,
        },
    )
    .await
    .expect("Failed to create test user")
}

pub async fn create_admin(db: &DatabaseConnection, name: &str) -> users::Model {
    create_test_user(db, name, Role::Admin).await
}

pub async fn create_student(db: &DatabaseConnection, name: &str) -> users::Model {
    create_test_user(db, name, Role::Student).await
}

/// Create a company-role user together with its company.
pub async fn create_company(
    db: &DatabaseConnection,
    name: &str,
    approved: bool,
) -> (users::Model, companies::Model) {
    let owner = create_test_user(db, &format!("{}Owner", name), Role::Company).await;
    let now = Utc::now().naive_utc();

    let company = companies::ActiveModel {
        created_by: Set(owner.id),
        name: Set(name.to_string()),
        description: Set(Some(format!("{} test company", name))),
        industry: Set(Some("Engineering".to_string())),
        website: Set(None),
        location: Set(Some("Nairobi".to_string())),
        trainings: Set(serde_json::json!(["Welding"])),
        gallery: Set(serde_json::json!([])),
        approved: Set(approved),
        status: Set(if approved { "approved" } else { "pending" }.to_string()),
        status_reason: Set(None),
        reviewed_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create test company");

    (owner, company)
}

/// Create an active internship directly, bypassing the approval gate.
pub async fn create_internship(
    db: &DatabaseConnection,
    company: &companies::Model,
    title: &str,
) -> internships::Model {
    let now = Utc::now().naive_utc();
    internships::ActiveModel {
        company_id: Set(company.id),
        title: Set(title.to_string()),
        description: Set(format!("{} description", title)),
        location: Set(Some("Mombasa".to_string())),
        field: Set(Some("Electrical".to_string())),
        duration: Set(Some("3 months".to_string())),
        requirements: Set(None),
        slots: Set(Some(2)),
        deadline: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create test internship")
}
