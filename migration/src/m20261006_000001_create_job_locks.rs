//! Named leases that keep a sync job from running twice at once.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(JobLocks::Table)
                    .if_not_exists()
                    .col(string_len(JobLocks::Name, 100).primary_key())
                    .col(string(JobLocks::Holder))
                    .col(timestamp_with_time_zone(JobLocks::AcquiredAt))
                    .col(timestamp_with_time_zone(JobLocks::LeaseUntil))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(JobLocks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum JobLocks {
    Table,
    Name,
    Holder,
    AcquiredAt,
    LeaseUntil,
}
