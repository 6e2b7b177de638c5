//! SeaORM Entity for notifications table

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub recipient_id: i32,
    pub sender_id: Option<i32>,
    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub type_: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub message: String,
    pub related_application: Option<i32>,
    pub related_internship: Option<i32>,
    pub related_company: Option<i32>,
    pub related_conversation: Option<i32>,
    pub read: bool,
    pub read_at: Option<DateTime>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::RecipientId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Recipient,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::SenderId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Sender,
    #[sea_orm(
        belongs_to = "super::applications::Entity",
        from = "Column::RelatedApplication",
        to = "super::applications::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Application,
    #[sea_orm(
        belongs_to = "super::internships::Entity",
        from = "Column::RelatedInternship",
        to = "super::internships::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Internship,
    #[sea_orm(
        belongs_to = "super::companies::Entity",
        from = "Column::RelatedCompany",
        to = "super::companies::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Company,
    #[sea_orm(
        belongs_to = "super::conversations::Entity",
        from = "Column::RelatedConversation",
        to = "super::conversations::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Conversation,
}

impl ActiveModelBehavior for ActiveModel {}
