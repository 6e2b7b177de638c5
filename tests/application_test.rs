//! Integration tests for applying, reviewing and withdrawing applications

mod common;

use common::database::setup_test_database;
use common::fixtures::{create_company, create_internship, create_student};
use common::publisher::RecordingPublisher;
use sea_orm::{entity::*, query::*};
use serial_test::serial;
use tvetlink::applications::{self, ApplicationInput};
use tvetlink::error::AppError;
use tvetlink::internships::{self, InternshipUpdate};
use tvetlink::orm::{applications as application_orm, notifications};
use tvetlink::realtime::Room;

fn apply_to(internship_id: i32) -> ApplicationInput {
    ApplicationInput {
        internship_id: Some(internship_id),
        cover_letter: Some("I would love to join.".to_string()),
    }
}

#[actix_rt::test]
#[serial]
async fn test_apply_notifies_company_owner() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let (owner, company) = create_company(&db, "Acme", true).await;
    let internship = create_internship(&db, &company, "Welder").await;
    let student = create_student(&db, "Alice").await;
    let publisher = RecordingPublisher::new();

    let application = applications::apply(&db, Some(&publisher), &student, apply_to(internship.id))
        .await
        .expect("Failed to apply");
    assert_eq!(application.status, "pending");
    assert_eq!(application.student_id, student.id);

    let rows = notifications::Entity::find()
        .filter(notifications::Column::RecipientId.eq(owner.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].type_, "application");
    assert_eq!(rows[0].sender_id, Some(student.id));
    assert_eq!(rows[0].related_application, Some(application.id));
    assert_eq!(rows[0].related_internship, Some(internship.id));

    assert_eq!(
        publisher.names_for(Room::Notifications(owner.id)),
        vec!["new_notification", "notification_update"]
    );
}

#[actix_rt::test]
#[serial]
async fn test_second_application_is_a_conflict() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let (owner, company) = create_company(&db, "Acme", true).await;
    let internship = create_internship(&db, &company, "Welder").await;
    let student = create_student(&db, "Alice").await;

    applications::apply(&db, None, &student, apply_to(internship.id))
        .await
        .unwrap();

    match applications::apply(&db, None, &student, apply_to(internship.id)).await {
        Err(AppError::Conflict(msg)) => assert_eq!(msg, "Already applied."),
        other => panic!("Expected conflict, got {:?}", other),
    }

    assert_eq!(
        application_orm::Entity::find()
            .filter(application_orm::Column::StudentId.eq(student.id))
            .count(&db)
            .await
            .unwrap(),
        1
    );
    // The duplicate did not notify the company again.
    assert_eq!(
        notifications::Entity::find()
            .filter(notifications::Column::RecipientId.eq(owner.id))
            .count(&db)
            .await
            .unwrap(),
        1
    );
}

#[actix_rt::test]
#[serial]
async fn test_apply_requires_open_visible_internship() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let (owner, company) = create_company(&db, "Acme", true).await;
    let (_, pending) = create_company(&db, "Shady", false).await;
    let open = create_internship(&db, &company, "Welder").await;
    let hidden = create_internship(&db, &pending, "Painter").await;
    let student = create_student(&db, "Alice").await;

    let missing = ApplicationInput {
        internship_id: None,
        cover_letter: None,
    };
    assert!(matches!(
        applications::apply(&db, None, &student, missing).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        applications::apply(&db, None, &student, apply_to(9999)).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        applications::apply(&db, None, &student, apply_to(hidden.id)).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        applications::apply(&db, None, &owner, apply_to(open.id)).await,
        Err(AppError::Authorization(_))
    ));

    internships::update_internship(
        &db,
        &owner,
        open.id,
        InternshipUpdate {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(matches!(
        applications::apply(&db, None, &student, apply_to(open.id)).await,
        Err(AppError::Validation(_))
    ));
}

#[actix_rt::test]
#[serial]
async fn test_status_update_by_owner_only() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let (owner, company) = create_company(&db, "Acme", true).await;
    let (rival, _) = create_company(&db, "Rival", true).await;
    let internship = create_internship(&db, &company, "Welder").await;
    let student = create_student(&db, "Alice").await;

    let application = applications::apply(&db, None, &student, apply_to(internship.id))
        .await
        .unwrap();

    assert!(matches!(
        applications::update_status(&db, None, &rival, application.id, "accepted").await,
        Err(AppError::Authorization(_))
    ));
    assert!(matches!(
        applications::update_status(&db, None, &owner, application.id, "pending").await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        applications::update_status(&db, None, &owner, application.id, "maybe").await,
        Err(AppError::Validation(_))
    ));

    let publisher = RecordingPublisher::new();
    let accepted =
        applications::update_status(&db, Some(&publisher), &owner, application.id, "accepted")
            .await
            .unwrap();
    assert_eq!(accepted.status, "accepted");
    assert_eq!(
        publisher.names_for(Room::Notifications(student.id)),
        vec!["new_notification", "notification_update"]
    );

    // Repeating the same decision is a no-op.
    publisher.clear();
    applications::update_status(&db, Some(&publisher), &owner, application.id, "accepted")
        .await
        .unwrap();
    assert!(publisher.events().is_empty());

    let rejected = applications::update_status(&db, None, &owner, application.id, "rejected")
        .await
        .unwrap();
    assert_eq!(rejected.status, "rejected");

    let updates = notifications::Entity::find()
        .filter(notifications::Column::RecipientId.eq(student.id))
        .filter(notifications::Column::Type.eq("status_update"))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(updates, 2);
}

#[actix_rt::test]
#[serial]
async fn test_cancel_only_while_pending() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let (owner, company) = create_company(&db, "Acme", true).await;
    let first = create_internship(&db, &company, "Welder").await;
    let second = create_internship(&db, &company, "Fitter").await;
    let student = create_student(&db, "Alice").await;
    let other = create_student(&db, "Bob").await;

    let pending = applications::apply(&db, None, &student, apply_to(first.id))
        .await
        .unwrap();
    let decided = applications::apply(&db, None, &student, apply_to(second.id))
        .await
        .unwrap();
    applications::update_status(&db, None, &owner, decided.id, "accepted")
        .await
        .unwrap();

    assert!(matches!(
        applications::cancel(&db, None, &other, pending.id).await,
        Err(AppError::Authorization(_))
    ));
    assert!(matches!(
        applications::cancel(&db, None, &student, decided.id).await,
        Err(AppError::Validation(_))
    ));

    applications::update_status(&db, None, &owner, decided.id, "rejected")
        .await
        .unwrap();
    assert!(matches!(
        applications::cancel(&db, None, &student, decided.id).await,
        Err(AppError::Validation(_))
    ));

    let publisher = RecordingPublisher::new();
    applications::cancel(&db, Some(&publisher), &student, pending.id)
        .await
        .unwrap();

    assert!(application_orm::Entity::find_by_id(pending.id)
        .one(&db)
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        notifications::Entity::find()
            .filter(notifications::Column::RelatedApplication.eq(pending.id))
            .count(&db)
            .await
            .unwrap(),
        0
    );
    let cancelled = notifications::Entity::find()
        .filter(notifications::Column::RecipientId.eq(owner.id))
        .filter(notifications::Column::Type.eq("application_cancelled"))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].related_internship, Some(first.id));
    assert_eq!(publisher.count("new_notification"), 1);

    assert!(matches!(
        applications::cancel(&db, None, &student, pending.id).await,
        Err(AppError::NotFound(_))
    ));

    // Withdrawn applications can be resubmitted.
    applications::apply(&db, None, &student, apply_to(first.id))
        .await
        .expect("Re-applying after a withdrawal should succeed");
}

#[actix_rt::test]
#[serial]
async fn test_listings_expand_internship_and_student() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let (owner, company) = create_company(&db, "Acme", true).await;
    let internship = create_internship(&db, &company, "Welder").await;
    let alice = create_student(&db, "Alice").await;
    let bob = create_student(&db, "Bob").await;

    applications::apply(&db, None, &alice, apply_to(internship.id))
        .await
        .unwrap();
    applications::apply(&db, None, &bob, apply_to(internship.id))
        .await
        .unwrap();

    let mine = applications::list_my_applications(&db, alice.id).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].internship.title, "Welder");
    assert_eq!(mine[0].internship.company.name, "Acme");
    assert_eq!(mine[0].student.id, alice.id);

    let received = applications::list_company_applications(&db, owner.id)
        .await
        .unwrap();
    let mut students: Vec<i32> = received.iter().map(|a| a.student.id).collect();
    students.sort_unstable();
    assert_eq!(students, vec![alice.id, bob.id]);
}
