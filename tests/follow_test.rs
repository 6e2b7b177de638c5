//! Integration tests for students following companies

mod common;

use common::database::setup_test_database;
use common::fixtures::{create_company, create_student};
use common::publisher::RecordingPublisher;
use sea_orm::{entity::*, query::*};
use serial_test::serial;
use tvetlink::error::AppError;
use tvetlink::follows;
use tvetlink::orm::notifications;
use tvetlink::realtime::Room;

#[actix_rt::test]
#[serial]
async fn test_follow_notifies_owner_once() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let (owner, company) = create_company(&db, "Acme", true).await;
    let student = create_student(&db, "Alice").await;
    let publisher = RecordingPublisher::new();

    let follow = follows::follow_company(&db, Some(&publisher), &student, company.id)
        .await
        .expect("Failed to follow");
    assert_eq!(follow.student_id, student.id);
    assert!(follows::is_following(&db, student.id, company.id).await.unwrap());
    assert_eq!(
        publisher.names_for(Room::Notifications(owner.id)),
        vec!["new_notification", "notification_update"]
    );

    assert!(matches!(
        follows::follow_company(&db, Some(&publisher), &student, company.id).await,
        Err(AppError::Conflict(_))
    ));

    let count = notifications::Entity::find()
        .filter(notifications::Column::RecipientId.eq(owner.id))
        .filter(notifications::Column::Type.eq("new_follower"))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[actix_rt::test]
#[serial]
async fn test_follow_requires_student_and_visible_company() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let (owner, company) = create_company(&db, "Acme", true).await;
    let (_, pending) = create_company(&db, "Shady", false).await;
    let student = create_student(&db, "Alice").await;

    assert!(matches!(
        follows::follow_company(&db, None, &owner, company.id).await,
        Err(AppError::Authorization(_))
    ));
    assert!(matches!(
        follows::follow_company(&db, None, &student, pending.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        follows::follow_company(&db, None, &student, 9999).await,
        Err(AppError::NotFound(_))
    ));
}

#[actix_rt::test]
#[serial]
async fn test_unfollow_and_list_followers() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let (_, company) = create_company(&db, "Acme", true).await;
    let alice = create_student(&db, "Alice").await;
    let bob = create_student(&db, "Bob").await;

    follows::follow_company(&db, None, &alice, company.id).await.unwrap();
    follows::follow_company(&db, None, &bob, company.id).await.unwrap();

    let mut followers: Vec<i32> = follows::list_followers(&db, company.id)
        .await
        .unwrap()
        .iter()
        .map(|u| u.id)
        .collect();
    followers.sort_unstable();
    assert_eq!(followers, vec![alice.id, bob.id]);

    follows::unfollow_company(&db, alice.id, company.id).await.unwrap();
    assert!(!follows::is_following(&db, alice.id, company.id).await.unwrap());
    assert!(matches!(
        follows::unfollow_company(&db, alice.id, company.id).await,
        Err(AppError::NotFound(_))
    ));

    let followers = follows::list_followers(&db, company.id).await.unwrap();
    assert_eq!(followers.len(), 1);
    assert_eq!(followers[0].id, bob.id);

    // Following again after unfollowing is allowed.
    follows::follow_company(&db, None, &alice, company.id)
        .await
        .expect("Refollow should succeed");
}
