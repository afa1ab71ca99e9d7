use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PaymentOrders::Table)
                    .if_not_exists()
                    .col(pk_uuid(PaymentOrders::Id))
                    .col(uuid(PaymentOrders::UserId).not_null())
                    .col(string(PaymentOrders::PlanId).not_null())
                    .col(string(PaymentOrders::PlanName).not_null())
                    // Minor currency units (e.g. VND has no subunit)
                    .col(big_integer(PaymentOrders::Amount).not_null())
                    .col(string_len(PaymentOrders::Currency, 8).not_null())
                    .col(string_len(PaymentOrders::OrderType, 32).not_null())
                    .col(integer(PaymentOrders::CreditsAdded).not_null())
                    .col(string_len(PaymentOrders::Status, 16).not_null())
                    .col(string_len(PaymentOrders::PaymentMethod, 32).not_null())
                    .col(string_len(PaymentOrders::TransactionCode, 32).not_null())
                    .col(small_integer(PaymentOrders::CodeVersion).not_null())
                    .col(
                        timestamp_with_time_zone(PaymentOrders::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(PaymentOrders::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // The settlement webhook joins on the memo reference
        manager
            .create_index(
                Index::create()
                    .name("idx_payment_orders_transaction_code")
                    .table(PaymentOrders::Table)
                    .col(PaymentOrders::TransactionCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payment_orders_user_status")
                    .table(PaymentOrders::Table)
                    .col(PaymentOrders::UserId)
                    .col(PaymentOrders::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PaymentOrders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PaymentOrders {
    Table,
    Id,
    UserId,
    PlanId,
    PlanName,
    Amount,
    Currency,
    OrderType,
    CreditsAdded,
    Status,
    PaymentMethod,
    TransactionCode,
    CodeVersion,
    CreatedAt,
    UpdatedAt,
}
