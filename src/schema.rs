//! Table and index creation from the SeaORM entities.

use crate::orm::{
    applications, companies, company_follows, conversations, internships, messages,
    notifications, users,
};
use sea_orm::sea_query::{Index, IndexCreateStatement, TableCreateStatement};
use sea_orm::{ConnectionTrait, DbBackend, DbErr, EntityTrait, Schema};

fn get_seaorm_create_stmt<E: EntityTrait>(backend: DbBackend, e: E) -> TableCreateStatement {
    let schema = Schema::new(backend);
    schema.create_table_from_entity(e).if_not_exists().to_owned()
}

/// Compound unique indexes backing the find-or-create upserts.
fn unique_indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("uq_applications_student_internship")
            .table(applications::Entity)
            .col(applications::Column::StudentId)
            .col(applications::Column::InternshipId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("uq_conversations_pair")
            .table(conversations::Entity)
            .col(conversations::Column::ParticipantOne)
            .col(conversations::Column::ParticipantTwo)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("uq_company_follows_pair")
            .table(company_follows::Entity)
            .col(company_follows::Column::StudentId)
            .col(company_follows::Column::CompanyId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_notifications_recipient_read")
            .table(notifications::Entity)
            .col(notifications::Column::RecipientId)
            .col(notifications::Column::Read)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_messages_conversation")
            .table(messages::Entity)
            .col(messages::Column::ConversationId)
            .col(messages::Column::CreatedAt)
            .if_not_exists()
            .to_owned(),
    ]
}

/// Creates every table and index that does not exist yet.
pub async fn create_schema<C>(db: &C) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let backend = db.get_database_backend();

    // Parents before children.
    let stmts = vec![
        get_seaorm_create_stmt(backend, users::Entity),
        get_seaorm_create_stmt(backend, companies::Entity),
        get_seaorm_create_stmt(backend, internships::Entity),
        get_seaorm_create_stmt(backend, applications::Entity),
        get_seaorm_create_stmt(backend, company_follows::Entity),
        get_seaorm_create_stmt(backend, conversations::Entity),
        get_seaorm_create_stmt(backend, messages::Entity),
        get_seaorm_create_stmt(backend, notifications::Entity),
    ];

    for stmt in stmts {
        db.execute(backend.build(&stmt)).await?;
    }

    for stmt in unique_indexes() {
        db.execute(backend.build(&stmt)).await?;
    }

    log::info!("Database schema is up to date");
    Ok(())
}
