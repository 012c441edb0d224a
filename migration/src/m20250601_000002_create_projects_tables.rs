use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Projects {
    Table,
    Id,
    FarmerId,
    Title,
    Description,
    Location,
    WorkersNeeded,
    StartDate,
    EndDate,
    PaymentType,
    PaymentRate,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProjectApplications {
    Table,
    Id,
    ProjectId,
    WorkerId,
    Message,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Projects::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Projects::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Projects::FarmerId).uuid().not_null())
                    .col(ColumnDef::new(Projects::Title).string().not_null())
                    .col(ColumnDef::new(Projects::Description).text().not_null())
                    .col(ColumnDef::new(Projects::Location).string().not_null())
                    .col(ColumnDef::new(Projects::WorkersNeeded).integer().not_null())
                    .col(ColumnDef::new(Projects::StartDate).date().not_null())
                    .col(ColumnDef::new(Projects::EndDate).date().not_null())
                    .col(ColumnDef::new(Projects::PaymentType).string().not_null())
                    .col(ColumnDef::new(Projects::PaymentRate).big_integer().not_null())
                    .col(ColumnDef::new(Projects::Status).string().not_null())
                    .col(
                        ColumnDef::new(Projects::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Projects::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_farmer_id")
                            .from(Projects::Table, Projects::FarmerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProjectApplications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProjectApplications::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProjectApplications::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(ProjectApplications::WorkerId).uuid().not_null())
                    .col(ColumnDef::new(ProjectApplications::Message).text().not_null())
                    .col(ColumnDef::new(ProjectApplications::Status).string().not_null())
                    .col(
                        ColumnDef::new(ProjectApplications::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProjectApplications::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_applications_project_id")
                            .from(ProjectApplications::Table, ProjectApplications::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_applications_worker_id")
                            .from(ProjectApplications::Table, ProjectApplications::WorkerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One application per worker per project.
        manager
            .create_index(
                Index::create()
                    .name("idx_project_applications_project_worker_unique")
                    .table(ProjectApplications::Table)
                    .col(ProjectApplications::ProjectId)
                    .col(ProjectApplications::WorkerId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        if manager.get_database_backend() == DatabaseBackend::Postgres {
            manager
                .get_connection()
                .execute_unprepared(
                    "ALTER TABLE projects ADD CONSTRAINT chk_projects_shape CHECK (workers_needed >= 1 AND start_date <= end_date AND payment_rate > 0)",
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProjectApplications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await
    }
}
