//! End-to-end tests through the HTTP routes and client context middleware

mod common;

use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::{test, App};
use common::database::setup_test_database;
use common::fixtures::create_admin;
use common::publisher::RecordingPublisher;
use serde_json::{json, Value};
use serial_test::serial;
use std::sync::Arc;
use tvetlink::middleware::ClientCtx;
use tvetlink::realtime::Publisher;
use tvetlink::session::TokenKeys;
use tvetlink::user::Role;

const SECRET: &[u8] = b"integration-test-secret-at-least-32-bytes";

macro_rules! init_app {
    ($db:expr, $keys:expr) => {{
        let publisher: Arc<dyn Publisher> = Arc::new(RecordingPublisher::new());
        test::init_service(
            App::new()
                .app_data(Data::new($db.clone()))
                .app_data(Data::new($keys.clone()))
                .app_data(Data::new(publisher))
                .wrap(ClientCtx::default())
                .configure(tvetlink::web::configure),
        )
        .await
    }};
}

/// Sends a request and returns the status with the decoded JSON body.
macro_rules! call {
    ($app:expr, $req:expr) => {{
        let resp = test::call_service(&$app, $req.to_request()).await;
        let status = resp.status();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }};
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

fn register(name: &str, email: &str, role: &str) -> test::TestRequest {
    test::TestRequest::post().uri("/api/auth/register").set_json(json!({
        "name": name,
        "email": email,
        "password": "secret123",
        "role": role,
    }))
}

#[actix_rt::test]
#[serial]
async fn test_company_must_be_approved_before_posting() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let keys = TokenKeys::new(SECRET, 1);
    let app = init_app!(db, keys);

    let (status, body) = call!(app, register("Acme Owner", "owner@acme.test", "company"));
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    let owner_token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/company")
            .insert_header(bearer(&owner_token))
            .set_json(json!({ "name": "Acme", "industry": "Manufacturing" }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["approved"], false);
    let company_id = body["data"]["id"].as_i64().unwrap();

    let posting = json!({
        "title": "Machinist",
        "description": "Lathe and milling work",
        "slots": 2,
    });

    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/internship")
            .insert_header(bearer(&owner_token))
            .set_json(posting.clone())
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let admin = create_admin(&db, "Root").await;
    let admin_token = keys.issue(admin.id, Role::Admin).unwrap();

    let (status, body) = call!(
        app,
        test::TestRequest::put()
            .uri(&format!("/api/company/{}/status", company_id))
            .insert_header(bearer(&admin_token))
            .set_json(json!({ "action": "approve" }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["approved"], true);

    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/internship")
            .insert_header(bearer(&owner_token))
            .set_json(posting)
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["title"], "Machinist");
    assert_eq!(body["data"]["company"]["approved"], true);
    assert_eq!(body["data"]["company"]["id"].as_i64(), Some(company_id));

    let (status, body) = call!(app, test::TestRequest::get().uri("/api/internship"));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[actix_rt::test]
#[serial]
async fn test_duplicate_application_is_rejected() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let keys = TokenKeys::new(SECRET, 1);
    let app = init_app!(db, keys);

    let (owner, company) = common::fixtures::create_company(&db, "Acme", true).await;
    let internship = common::fixtures::create_internship(&db, &company, "Welder").await;

    let (status, body) = call!(app, register("Sam", "sam@school.test", "student"));
    assert_eq!(status, StatusCode::CREATED);
    let student_token = body["data"]["token"].as_str().unwrap().to_string();

    let apply = || {
        test::TestRequest::post()
            .uri("/api/application")
            .insert_header(bearer(&student_token))
            .set_json(json!({ "internship_id": internship.id }))
    };

    let (status, body) = call!(app, apply());
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "pending");

    let (status, body) = call!(app, apply());
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Already applied.");

    // The company sees one application notification in its feed.
    let owner_token = keys.issue(owner.id, Role::Company).unwrap();
    let (status, body) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/notifications?category=applications")
            .insert_header(bearer(&owner_token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unread_count"], 1);
    let feed = body["data"].as_array().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["type"], "application");
    assert_eq!(feed[0]["related_internship"]["title"], "Welder");
}

#[actix_rt::test]
#[serial]
async fn test_authentication_failures_use_error_envelope() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let keys = TokenKeys::new(SECRET, 1);
    let app = init_app!(db, keys);

    let (status, body) = call!(app, test::TestRequest::get().uri("/api/notifications"));
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, body) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/auth/me")
            .insert_header(bearer("not-a-token"))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");

    // Tokens signed with another secret are refused.
    let other = TokenKeys::new(b"a-completely-different-secret-value!!", 1);
    let forged = other.issue(1, Role::Admin).unwrap();
    let (status, _) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/admin/users")
            .insert_header(bearer(&forged))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "email": "ghost@test.com", "password": "whatever" }))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");
}

#[actix_rt::test]
#[serial]
async fn test_register_and_login_round() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let keys = TokenKeys::new(SECRET, 1);
    let app = init_app!(db, keys);

    let (status, _) = call!(app, register("Sam", "Sam@School.test", "student"));
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call!(app, register("Sam Again", "sam@school.test", "student"));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email is already registered");

    let (status, _) = call!(app, register("Boss", "boss@school.test", "admin"));
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call!(
        app,
        test::TestRequest::post().uri("/api/auth/register").set_json(json!({
            "name": "Short",
            "email": "short@school.test",
            "password": "123",
        }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "email": "sam@school.test", "password": "secret123" }))
    );
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert!(body["data"]["user"].get("password").is_none());

    let (status, body) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/auth/me")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], "sam@school.test");
    assert_eq!(body["data"]["company"], Value::Null);
}

#[actix_rt::test]
#[serial]
async fn test_malformed_body_gets_error_envelope() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let keys = TokenKeys::new(SECRET, 1);
    let app = init_app!(db, keys);

    let (status, body) = call!(
        app,
        test::TestRequest::post()
            .uri("/api/auth/login")
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[actix_rt::test]
#[serial]
async fn test_query_token_is_ignored_outside_realtime() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let keys = TokenKeys::new(SECRET, 1);
    let app = init_app!(db, keys);
    let admin = create_admin(&db, "Root").await;
    let token = keys.issue(admin.id, Role::Admin).unwrap();

    let (status, body) = call!(
        app,
        test::TestRequest::get().uri(&format!("/api/auth/me?token={}", token))
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Login required");

    let (status, _) = call!(
        app,
        test::TestRequest::get()
            .uri("/api/auth/me")
            .insert_header(bearer(&token))
    );
    assert_eq!(status, StatusCode::OK);
}
