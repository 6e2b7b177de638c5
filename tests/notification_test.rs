//! Integration tests for notification storage, counters and delivery

mod common;

use common::database::setup_test_database;
use common::fixtures::{create_company, create_student};
use common::publisher::{FailingPublisher, RecordingPublisher};
use serial_test::serial;
use tvetlink::conversations;
use tvetlink::error::AppError;
use tvetlink::notifications::{
    self, NewNotification, NotificationCategory, NotificationFilter, NotificationKind,
};
use tvetlink::realtime::{Publisher, Room, ServerEvent};

fn follower_notice(recipient: i32, sender: i32, company_id: i32) -> NewNotification {
    NewNotification {
        recipient,
        sender: Some(sender),
        kind: NotificationKind::NewFollower { company_id },
        title: "New follower".to_string(),
        message: "Someone started following you.".to_string(),
    }
}

#[actix_rt::test]
#[serial]
async fn test_create_notification_publishes_to_feed_room() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let (owner, company) = create_company(&db, "Acme", true).await;
    let student = create_student(&db, "Alice").await;
    let publisher = RecordingPublisher::new();

    let notification = notifications::create_notification(
        &db,
        Some(&publisher),
        follower_notice(owner.id, student.id, company.id),
    )
    .await
    .expect("Failed to create notification");

    assert_eq!(notification.recipient_id, owner.id);
    assert_eq!(notification.type_, "new_follower");
    assert_eq!(notification.related_company, Some(company.id));
    assert!(!notification.read);

    assert_eq!(
        publisher.names_for(Room::Notifications(owner.id)),
        vec!["new_notification", "notification_update"]
    );

    let events = publisher.events();
    match &events[0].1 {
        ServerEvent::NewNotification(view) => {
            assert_eq!(view.id, notification.id);
            assert_eq!(view.sender.as_ref().map(|s| s.id), Some(student.id));
            assert_eq!(
                view.related_company.as_ref().map(|c| c.name.as_str()),
                Some("Acme")
            );
        }
        other => panic!("Unexpected event {:?}", other),
    }
    match &events[1].1 {
        ServerEvent::NotificationUpdate(counts) => assert_eq!(counts.notifications, 1),
        other => panic!("Unexpected event {:?}", other),
    }
}

#[actix_rt::test]
#[serial]
async fn test_create_notification_survives_publish_failure() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let (owner, company) = create_company(&db, "Acme", true).await;
    let student = create_student(&db, "Alice").await;

    let notification = notifications::create_notification(
        &db,
        Some(&FailingPublisher as &dyn Publisher),
        follower_notice(owner.id, student.id, company.id),
    )
    .await
    .expect("Publishing failures must not fail the write");

    assert_eq!(
        notifications::get_unread_count(&db, owner.id).await.unwrap(),
        1
    );
    assert_eq!(notification.recipient_id, owner.id);
}

#[actix_rt::test]
#[serial]
async fn test_create_notification_rejects_blank_and_unknown_recipient() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let (owner, company) = create_company(&db, "Acme", true).await;
    let student = create_student(&db, "Alice").await;

    let mut blank = follower_notice(owner.id, student.id, company.id);
    blank.title = "   ".to_string();
    assert!(matches!(
        notifications::create_notification(&db, None, blank).await,
        Err(AppError::Validation(_))
    ));

    let missing = follower_notice(9999, student.id, company.id);
    assert!(matches!(
        notifications::create_notification(&db, None, missing).await,
        Err(AppError::NotFound(_))
    ));

    // The fire-and-forget wrapper swallows the same failure.
    assert!(notifications::notify(&db, None, follower_notice(9999, student.id, company.id))
        .await
        .is_none());
}

#[actix_rt::test]
#[serial]
async fn test_unread_count_tracks_read_state() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let (owner, company) = create_company(&db, "Acme", true).await;
    let student = create_student(&db, "Alice").await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let n = notifications::create_notification(
            &db,
            None,
            follower_notice(owner.id, student.id, company.id),
        )
        .await
        .unwrap();
        ids.push(n.id);
    }
    assert_eq!(notifications::get_unread_count(&db, owner.id).await.unwrap(), 3);

    let publisher = RecordingPublisher::new();
    let read = notifications::mark_as_read(&db, Some(&publisher), ids[0], owner.id)
        .await
        .unwrap();
    assert!(read.read);
    assert!(read.read_at.is_some());
    assert_eq!(notifications::get_unread_count(&db, owner.id).await.unwrap(), 2);
    assert_eq!(publisher.count("notification_update"), 1);

    // Marking again changes nothing and publishes nothing.
    let again = notifications::mark_as_read(&db, Some(&publisher), ids[0], owner.id)
        .await
        .unwrap();
    assert_eq!(again.read_at, read.read_at);
    assert_eq!(publisher.count("notification_update"), 1);

    // Deleting an unread one lowers the count.
    notifications::delete_notification(&db, None, ids[1], owner.id)
        .await
        .unwrap();
    assert_eq!(notifications::get_unread_count(&db, owner.id).await.unwrap(), 1);

    let changed = notifications::mark_all_as_read(&db, None, owner.id).await.unwrap();
    assert_eq!(changed, 1);
    assert_eq!(notifications::get_unread_count(&db, owner.id).await.unwrap(), 0);
    assert_eq!(notifications::mark_all_as_read(&db, None, owner.id).await.unwrap(), 0);
}

#[actix_rt::test]
#[serial]
async fn test_notifications_belong_to_their_recipient() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let (owner, company) = create_company(&db, "Acme", true).await;
    let student = create_student(&db, "Alice").await;

    let n = notifications::create_notification(
        &db,
        None,
        follower_notice(owner.id, student.id, company.id),
    )
    .await
    .unwrap();

    assert!(matches!(
        notifications::mark_as_read(&db, None, n.id, student.id).await,
        Err(AppError::Authorization(_))
    ));
    assert!(matches!(
        notifications::delete_notification(&db, None, n.id, student.id).await,
        Err(AppError::Authorization(_))
    ));
    assert!(matches!(
        notifications::delete_notification(&db, None, 9999, owner.id).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(notifications::get_unread_count(&db, owner.id).await.unwrap(), 1);
}

#[actix_rt::test]
#[serial]
async fn test_feed_is_newest_first_and_filtered_by_role() {
    let db = setup_test_database().await.expect("Failed to setup database");
    let (owner, company) = create_company(&db, "Acme", true).await;
    let student = create_student(&db, "Alice").await;
    let thread = conversations::find_or_create_conversation(&db, owner.id, student.id)
        .await
        .unwrap();

    let first = notifications::create_notification(
        &db,
        None,
        follower_notice(owner.id, student.id, company.id),
    )
    .await
    .unwrap();
    let second = notifications::create_notification(
        &db,
        None,
        NewNotification {
            recipient: owner.id,
            sender: Some(student.id),
            kind: NotificationKind::Message {
                conversation_id: thread.id,
            },
            title: "New message from Alice".to_string(),
            message: "Hello".to_string(),
        },
    )
    .await
    .unwrap();
    // A kind companies never receive is stored but kept out of their feed.
    notifications::create_notification(
        &db,
        None,
        NewNotification {
            recipient: owner.id,
            sender: None,
            kind: NotificationKind::NewStudentRegistration,
            title: "New student registration".to_string(),
            message: "Bob registered".to_string(),
        },
    )
    .await
    .unwrap();

    let feed = notifications::list_notifications(&db, &owner, &NotificationFilter::default())
        .await
        .unwrap();
    let ids: Vec<i32> = feed.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let followers = notifications::list_notifications(
        &db,
        &owner,
        &NotificationFilter {
            category: Some(NotificationCategory::Followers),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(followers.len(), 1);
    assert_eq!(followers[0].type_, "new_follower");

    notifications::mark_as_read(&db, None, second.id, owner.id)
        .await
        .unwrap();
    let unread = notifications::list_notifications(
        &db,
        &owner,
        &NotificationFilter {
            unread_only: true,
            limit: Some(10),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].id, first.id);
}
