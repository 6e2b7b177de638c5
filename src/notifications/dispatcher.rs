//! Templated notifications raised by domain workflows
//!
//! Every function here is fire-and-forget: it logs failures and returns how
//! many notifications were created.

use super::{notify, NewNotification, NotificationKind};
use crate::companies::StatusAction;
use crate::orm::{applications, companies, company_follows, internships, users};
use crate::realtime::Publisher;
use crate::user::active_admin_ids;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

async fn notify_admins(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    sender: Option<i32>,
    kind: NotificationKind,
    title: &str,
    message: &str,
) -> usize {
    let admins = match active_admin_ids(db).await {
        Ok(admins) => admins,
        Err(e) => {
            log::warn!("Could not load admins to notify: {}", e);
            return 0;
        }
    };

    let mut sent = 0;
    for admin_id in admins {
        let payload = NewNotification {
            recipient: admin_id,
            sender,
            kind,
            title: title.to_owned(),
            message: message.to_owned(),
        };
        if notify(db, publisher, payload).await.is_some() {
            sent += 1;
        }
    }
    sent
}

pub async fn notify_admins_new_student(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    student: &users::Model,
) -> usize {
    notify_admins(
        db,
        publisher,
        Some(student.id),
        NotificationKind::NewStudentRegistration,
        "New student registration",
        &format!("{} ({}) registered as a student.", student.name, student.email),
    )
    .await
}

pub async fn notify_admins_new_company(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    company: &companies::Model,
) -> usize {
    notify_admins(
        db,
        publisher,
        Some(company.created_by),
        NotificationKind::NewCompanyRegistration {
            company_id: company.id,
        },
        "New company registration",
        &format!("{} registered and is waiting for approval.", company.name),
    )
    .await
}

/// Tells the owner their registration was received.
pub async fn acknowledge_company_registration(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    company: &companies::Model,
) -> usize {
    let payload = NewNotification {
        recipient: company.created_by,
        sender: None,
        kind: NotificationKind::CompanyRegistration {
            company_id: company.id,
        },
        title: "Company registration received".to_owned(),
        message: format!(
            "{} was submitted and will be reviewed by an administrator.",
            company.name
        ),
    };
    notify(db, publisher, payload).await.map_or(0, |_| 1)
}

/// Tells the owner about an approval decision.
///
/// A rejected company is deleted right after this call; the database then
/// clears the notification's company reference.
pub async fn notify_company_status(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    company: &companies::Model,
    admin_id: i32,
    action: StatusAction,
    reason: Option<&str>,
) -> usize {
    let (title, mut message) = match action {
        StatusAction::Approve => (
            "Company approved",
            format!("{} has been approved. You can now post internships.", company.name),
        ),
        StatusAction::Reject => (
            "Company registration rejected",
            format!("{} was not approved.", company.name),
        ),
        StatusAction::Revoke => (
            "Company approval revoked",
            format!("Approval for {} has been revoked.", company.name),
        ),
        StatusAction::Reapprove => (
            "Company reapproved",
            format!("{} has been approved again.", company.name),
        ),
    };
    if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
        message.push_str(&format!(" Reason: {}", reason.trim()));
    }

    let payload = NewNotification {
        recipient: company.created_by,
        sender: Some(admin_id),
        kind: NotificationKind::CompanyApproval {
            company_id: company.id,
        },
        title: title.to_owned(),
        message,
    };
    notify(db, publisher, payload).await.map_or(0, |_| 1)
}

pub async fn notify_new_application(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    application: &applications::Model,
    internship: &internships::Model,
    company: &companies::Model,
    student: &users::Model,
) -> usize {
    let payload = NewNotification {
        recipient: company.created_by,
        sender: Some(student.id),
        kind: NotificationKind::Application {
            application_id: application.id,
            internship_id: internship.id,
        },
        title: "New application".to_owned(),
        message: format!("{} applied for {}.", student.name, internship.title),
    };
    notify(db, publisher, payload).await.map_or(0, |_| 1)
}

pub async fn notify_application_cancelled(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    internship: &internships::Model,
    company: &companies::Model,
    student: &users::Model,
) -> usize {
    let payload = NewNotification {
        recipient: company.created_by,
        sender: Some(student.id),
        kind: NotificationKind::ApplicationCancelled {
            internship_id: internship.id,
        },
        title: "Application withdrawn".to_owned(),
        message: format!(
            "{} withdrew their application for {}.",
            student.name, internship.title
        ),
    };
    notify(db, publisher, payload).await.map_or(0, |_| 1)
}

pub async fn notify_status_update(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    application: &applications::Model,
    internship: &internships::Model,
    company: &companies::Model,
) -> usize {
    let payload = NewNotification {
        recipient: application.student_id,
        sender: Some(company.created_by),
        kind: NotificationKind::StatusUpdate {
            application_id: application.id,
            internship_id: internship.id,
        },
        title: "Application status updated".to_owned(),
        message: format!(
            "Your application for {} at {} was {}.",
            internship.title, company.name, application.status
        ),
    };
    notify(db, publisher, payload).await.map_or(0, |_| 1)
}

pub async fn notify_new_follower(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    company: &companies::Model,
    student: &users::Model,
) -> usize {
    let payload = NewNotification {
        recipient: company.created_by,
        sender: Some(student.id),
        kind: NotificationKind::NewFollower {
            company_id: company.id,
        },
        title: "New follower".to_owned(),
        message: format!("{} started following {}.", student.name, company.name),
    };
    notify(db, publisher, payload).await.map_or(0, |_| 1)
}

/// Announces a new posting to every active admin and every follower.
pub async fn notify_new_internship(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    internship: &internships::Model,
    company: &companies::Model,
) -> usize {
    let kind = NotificationKind::NewInternship {
        internship_id: internship.id,
        company_id: company.id,
    };
    let title = "New internship posted";
    let message = format!("{} posted {}.", company.name, internship.title);

    let mut sent = notify_admins(db, publisher, Some(company.created_by), kind, title, &message).await;

    let followers = match company_follows::Entity::find()
        .filter(company_follows::Column::CompanyId.eq(company.id))
        .all(db)
        .await
    {
        Ok(followers) => followers,
        Err(e) => {
            log::warn!("Could not load followers of company {}: {}", company.id, e);
            return sent;
        }
    };

    for follow in followers {
        let payload = NewNotification {
            recipient: follow.student_id,
            sender: Some(company.created_by),
            kind,
            title: title.to_owned(),
            message: message.clone(),
        };
        if notify(db, publisher, payload).await.is_some() {
            sent += 1;
        }
    }
    sent
}

pub async fn notify_new_message(
    db: &DatabaseConnection,
    publisher: Option<&dyn Publisher>,
    sender: &users::Model,
    recipient_id: i32,
    conversation_id: i32,
    subject: &str,
) -> usize {
    let payload = NewNotification {
        recipient: recipient_id,
        sender: Some(sender.id),
        kind: NotificationKind::Message { conversation_id },
        title: format!("New message from {}", sender.name),
        message: subject.to_owned(),
    };
    notify(db, publisher, payload).await.map_or(0, |_| 1)
}
