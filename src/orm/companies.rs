//! SeaORM Entity for companies table

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "companies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Owning company-role user. One company per user.
    #[sea_orm(unique)]
    pub created_by: i32,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    /// JSON array of training programme names.
    pub trainings: Json,
    /// JSON array of picture URLs held by the external object store.
    pub gallery: Json,
    pub approved: bool,
    /// One of `pending`, `approved`, `revoked`. See [`crate::companies::CompanyStatus`].
    pub status: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub status_reason: Option<String>,
    pub reviewed_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::CreatedBy",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Owner,
    #[sea_orm(has_many = "super::internships::Entity")]
    Internships,
    #[sea_orm(has_many = "super::company_follows::Entity")]
    Followers,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::internships::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Internships.def()
    }
}

impl Related<super::company_follows::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Followers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
