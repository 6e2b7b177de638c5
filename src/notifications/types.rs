//! Notification type definitions

use crate::user::Role;
use serde::{Deserialize, Serialize};

/// Closed set of notification kinds as stored in the `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Application,            // A student applied to your internship
    StatusUpdate,           // Your application was accepted or rejected
    CompanyRegistration,    // Your company registration was received
    CompanyApproval,        // Admin approved, rejected, revoked or reapproved your company
    Message,                // New direct message
    NewCompanyRegistration, // (admin) A company is waiting for review
    NewStudentRegistration, // (admin) A student signed up
    NewFollower,            // A student followed your company
    ApplicationCancelled,   // A student withdrew a pending application
    NewInternship,          // A followed company posted an internship
}

impl NotificationType {
    pub const ALL: [NotificationType; 10] = [
        Self::Application,
        Self::StatusUpdate,
        Self::CompanyRegistration,
        Self::CompanyApproval,
        Self::Message,
        Self::NewCompanyRegistration,
        Self::NewStudentRegistration,
        Self::NewFollower,
        Self::ApplicationCancelled,
        Self::NewInternship,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::StatusUpdate => "status_update",
            Self::CompanyRegistration => "company_registration",
            Self::CompanyApproval => "company_approval",
            Self::Message => "message",
            Self::NewCompanyRegistration => "new_company_registration",
            Self::NewStudentRegistration => "new_student_registration",
            Self::NewFollower => "new_follower",
            Self::ApplicationCancelled => "application_cancelled",
            Self::NewInternship => "new_internship",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    /// Roles that can ever receive this kind.
    pub fn audience(&self) -> &'static [Role] {
        match self {
            Self::Application
            | Self::CompanyRegistration
            | Self::CompanyApproval
            | Self::NewFollower
            | Self::ApplicationCancelled => &[Role::Company],
            Self::StatusUpdate => &[Role::Student],
            Self::NewCompanyRegistration | Self::NewStudentRegistration => &[Role::Admin],
            Self::NewInternship => &[Role::Student, Role::Admin],
            Self::Message => &[Role::Student, Role::Company, Role::Admin],
        }
    }

    pub fn category(&self) -> NotificationCategory {
        match self {
            Self::Application | Self::StatusUpdate | Self::ApplicationCancelled => {
                NotificationCategory::Applications
            }
            Self::Message => NotificationCategory::Messages,
            Self::CompanyRegistration | Self::CompanyApproval => NotificationCategory::Account,
            Self::NewFollower => NotificationCategory::Followers,
            Self::NewInternship => NotificationCategory::Internships,
            Self::NewCompanyRegistration | Self::NewStudentRegistration => {
                NotificationCategory::Registrations
            }
        }
    }

    /// Kinds a user with `role` can receive.
    pub fn for_role(role: Role) -> Vec<NotificationType> {
        Self::ALL
            .iter()
            .copied()
            .filter(|t| t.audience().contains(&role))
            .collect()
    }
}

/// Named feed filter exposed as the `category` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Applications,
    Messages,
    Account,
    Followers,
    Internships,
    Registrations,
}

impl NotificationCategory {
    pub fn types(&self) -> Vec<NotificationType> {
        NotificationType::ALL
            .iter()
            .copied()
            .filter(|t| t.category() == *self)
            .collect()
    }
}

/// Optional back-references a notification may carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Relations {
    pub application: Option<i32>,
    pub internship: Option<i32>,
    pub company: Option<i32>,
    pub conversation: Option<i32>,
}

/// What happened, with exactly the references that kind of event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Application {
        application_id: i32,
        internship_id: i32,
    },
    StatusUpdate {
        application_id: i32,
        internship_id: i32,
    },
    CompanyRegistration {
        company_id: i32,
    },
    CompanyApproval {
        company_id: i32,
    },
    Message {
        conversation_id: i32,
    },
    NewCompanyRegistration {
        company_id: i32,
    },
    NewStudentRegistration,
    NewFollower {
        company_id: i32,
    },
    ApplicationCancelled {
        internship_id: i32,
    },
    NewInternship {
        internship_id: i32,
        company_id: i32,
    },
}

impl NotificationKind {
    pub fn notification_type(&self) -> NotificationType {
        match self {
            Self::Application { .. } => NotificationType::Application,
            Self::StatusUpdate { .. } => NotificationType::StatusUpdate,
            Self::CompanyRegistration { .. } => NotificationType::CompanyRegistration,
            Self::CompanyApproval { .. } => NotificationType::CompanyApproval,
            Self::Message { .. } => NotificationType::Message,
            Self::NewCompanyRegistration { .. } => NotificationType::NewCompanyRegistration,
            Self::NewStudentRegistration => NotificationType::NewStudentRegistration,
            Self::NewFollower { .. } => NotificationType::NewFollower,
            Self::ApplicationCancelled { .. } => NotificationType::ApplicationCancelled,
            Self::NewInternship { .. } => NotificationType::NewInternship,
        }
    }

    pub fn relations(&self) -> Relations {
        match *self {
            Self::Application {
                application_id,
                internship_id,
            }
            | Self::StatusUpdate {
                application_id,
                internship_id,
            } => Relations {
                application: Some(application_id),
                internship: Some(internship_id),
                ..Default::default()
            },
            Self::CompanyRegistration { company_id }
            | Self::CompanyApproval { company_id }
            | Self::NewCompanyRegistration { company_id }
            | Self::NewFollower { company_id } => Relations {
                company: Some(company_id),
                ..Default::default()
            },
            Self::Message { conversation_id } => Relations {
                conversation: Some(conversation_id),
                ..Default::default()
            },
            Self::NewStudentRegistration => Relations::default(),
            Self::ApplicationCancelled { internship_id } => Relations {
                internship: Some(internship_id),
                ..Default::default()
            },
            Self::NewInternship {
                internship_id,
                company_id,
            } => Relations {
                internship: Some(internship_id),
                company: Some(company_id),
                ..Default::default()
            },
        }
    }
}

/// Input to `create_notification`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient: i32,
    pub sender: Option<i32>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}
