//! SeaORM Entity for applications table
//!
//! `(student_id, internship_id)` carries a unique index, see `crate::schema`.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "applications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub student_id: i32,
    pub internship_id: i32,
    /// One of `pending`, `accepted`, `rejected`.
    pub status: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub cover_letter: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::StudentId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Student,
    #[sea_orm(
        belongs_to = "super::internships::Entity",
        from = "Column::InternshipId",
        to = "super::internships::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Internship,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::internships::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Internship.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
