use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::Expr;

use crate::m20261019_000001_create_accounts::Accounts;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SellRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SellRequests::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SellRequests::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(SellRequests::WalletAddress)
                            .string_len(42)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SellRequests::Amount).big_integer().not_null())
                    .col(ColumnDef::new(SellRequests::Price).double().not_null())
                    .col(ColumnDef::new(SellRequests::Status).string_len(16).not_null())
                    .col(ColumnDef::new(SellRequests::Description).text().null())
                    .col(ColumnDef::new(SellRequests::AdminNotes).text().null())
                    .col(ColumnDef::new(SellRequests::ReviewedBy).big_integer().null())
                    .col(
                        ColumnDef::new(SellRequests::ReviewDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SellRequests::CompletedDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SellRequests::TransactionHash)
                            .string_len(66)
                            .null(),
                    )
                    .col(ColumnDef::new(SellRequests::Source).string_len(32).not_null())
                    .col(ColumnDef::new(SellRequests::Documents).json_binary().not_null())
                    .col(
                        ColumnDef::new(SellRequests::SubmittedDate)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sell_requests_user")
                            .from(SellRequests::Table, SellRequests::UserId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sell_requests_reviewer")
                            .from(SellRequests::Table, SellRequests::ReviewedBy)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .check(Expr::col(SellRequests::Amount).gte(1))
                    .check(Expr::col(SellRequests::Price).gte(0))
                    .to_owned(),
            )
            .await?;

        // Queue listings: owner, wallet and admin review order.
        manager
            .create_index(
                Index::create()
                    .name("idx_sell_requests_user_status")
                    .table(SellRequests::Table)
                    .col(SellRequests::UserId)
                    .col(SellRequests::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sell_requests_wallet_status")
                    .table(SellRequests::Table)
                    .col(SellRequests::WalletAddress)
                    .col(SellRequests::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sell_requests_status_submitted")
                    .table(SellRequests::Table)
                    .col(SellRequests::Status)
                    .col((SellRequests::SubmittedDate, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        // At most one live request per (user, wallet).
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS uq_sell_requests_live \
                 ON sell_requests (user_id, wallet_address) \
                 WHERE status IN ('pending', 'approved')",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SellRequests::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SellRequests {
    Table,
    Id,
    UserId,
    WalletAddress,
    Amount,
    Price,
    Status,
    Description,
    AdminNotes,
    ReviewedBy,
    ReviewDate,
    CompletedDate,
    TransactionHash,
    Source,
    Documents,
    SubmittedDate,
}
