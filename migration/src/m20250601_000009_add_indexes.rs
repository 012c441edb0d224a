use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum ProjectAssignments {
    Table,
    ProjectId,
    WorkerId,
    Status,
}

#[derive(DeriveIden)]
enum Contracts {
    Table,
    FarmerId,
    WorkerId,
    DriverId,
}

#[derive(DeriveIden)]
enum Payouts {
    Table,
    TransactionId,
    Status,
}

#[derive(DeriveIden)]
enum Deliveries {
    Table,
    FarmerId,
    DriverId,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Busy-worker check counts assignments by worker and status.
        manager
            .create_index(
                Index::create()
                    .name("idx_project_assignments_worker_status")
                    .table(ProjectAssignments::Table)
                    .col(ProjectAssignments::WorkerId)
                    .col(ProjectAssignments::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_project_assignments_project_id")
                    .table(ProjectAssignments::Table)
                    .col(ProjectAssignments::ProjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_contracts_farmer_id")
                    .table(Contracts::Table)
                    .col(Contracts::FarmerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_contracts_worker_id")
                    .table(Contracts::Table)
                    .col(Contracts::WorkerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_contracts_driver_id")
                    .table(Contracts::Table)
                    .col(Contracts::DriverId)
                    .to_owned(),
            )
            .await?;

        // Admin listing of outstanding payouts.
        manager
            .create_index(
                Index::create()
                    .name("idx_payouts_status")
                    .table(Payouts::Table)
                    .col(Payouts::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payouts_transaction_id")
                    .table(Payouts::Table)
                    .col(Payouts::TransactionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_deliveries_farmer_id")
                    .table(Deliveries::Table)
                    .col(Deliveries::FarmerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_deliveries_driver_id")
                    .table(Deliveries::Table)
                    .col(Deliveries::DriverId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "idx_project_assignments_worker_status",
            "idx_project_assignments_project_id",
            "idx_contracts_farmer_id",
            "idx_contracts_worker_id",
            "idx_contracts_driver_id",
            "idx_payouts_status",
            "idx_payouts_transaction_id",
            "idx_deliveries_farmer_id",
            "idx_deliveries_driver_id",
        ] {
            manager
                .drop_index(Index::drop().name(name).to_owned())
                .await?;
        }

        Ok(())
    }
}
