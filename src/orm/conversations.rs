//! SeaORM Entity for conversations table
//!
//! A conversation is an unordered pair of users stored normalised so that
//! `participant_one < participant_two`. The pair carries a unique index.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "conversations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub participant_one: i32,
    pub participant_two: i32,
    /// Most recent message. Not a foreign key; messages reference conversations.
    pub last_message_id: Option<i32>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Model {
    /// Returns true if `user_id` is one of the two participants.
    pub fn has_participant(&self, user_id: i32) -> bool {
        self.participant_one == user_id || self.participant_two == user_id
    }

    /// Returns the participant that is not `user_id`.
    pub fn other_participant(&self, user_id: i32) -> i32 {
        if self.participant_one == user_id {
            self.participant_two
        } else {
            self.participant_one
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::ParticipantOne",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ParticipantOne,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::ParticipantTwo",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ParticipantTwo,
    #[sea_orm(has_many = "super::messages::Entity")]
    Messages,
}

impl Related<super::messages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
