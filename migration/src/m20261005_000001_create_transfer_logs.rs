//! Append-only ERC-721 transfer log for player tokens.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TransferLogs::Table)
                    .if_not_exists()
                    .col(pk_auto(TransferLogs::Id))
                    .col(big_integer(TransferLogs::TokenId))
                    .col(string(TransferLogs::FromAddress))
                    .col(string(TransferLogs::ToAddress))
                    .col(big_integer(TransferLogs::BlockNumber))
                    .col(integer(TransferLogs::LogIndex))
                    .col(string(TransferLogs::TxHash))
                    .col(timestamp_with_time_zone(TransferLogs::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // A log is identified by its transaction and position within it
        manager
            .create_index(
                Index::create()
                    .name("idx_transfer_logs_tx_log")
                    .table(TransferLogs::Table)
                    .col(TransferLogs::TxHash)
                    .col(TransferLogs::LogIndex)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transfer_logs_token_order")
                    .table(TransferLogs::Table)
                    .col(TransferLogs::TokenId)
                    .col(TransferLogs::BlockNumber)
                    .col(TransferLogs::LogIndex)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transfer_logs_to_address")
                    .table(TransferLogs::Table)
                    .col(TransferLogs::ToAddress)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TransferLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TransferLogs {
    Table,
    Id,
    TokenId,
    FromAddress,
    ToAddress,
    BlockNumber,
    LogIndex,
    TxHash,
    CreatedAt,
}
