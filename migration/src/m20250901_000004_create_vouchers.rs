use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Vouchers::Table)
                    .if_not_exists()
                    .col(pk_uuid(Vouchers::Id))
                    .col(string_len(Vouchers::Code, 64).not_null())
                    .col(integer(Vouchers::DiscountPercent).not_null())
                    .col(boolean(Vouchers::IsActive).not_null().default(true))
                    .col(timestamp_with_time_zone_null(Vouchers::StartsAt))
                    .col(timestamp_with_time_zone_null(Vouchers::EndsAt))
                    .col(
                        timestamp_with_time_zone(Vouchers::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_vouchers_code")
                    .table(Vouchers::Table)
                    .col(Vouchers::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GiftCodes::Table)
                    .if_not_exists()
                    .col(pk_uuid(GiftCodes::Id))
                    .col(string_len(GiftCodes::Code, 64).not_null())
                    .col(integer(GiftCodes::Credits).not_null())
                    .col(integer(GiftCodes::ExtendDays).not_null().default(0))
                    .col(uuid_null(GiftCodes::RedeemedBy))
                    .col(timestamp_with_time_zone_null(GiftCodes::RedeemedAt))
                    .col(
                        timestamp_with_time_zone(GiftCodes::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_gift_codes_code")
                    .table(GiftCodes::Table)
                    .col(GiftCodes::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GiftCodes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Vouchers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Vouchers {
    Table,
    Id,
    Code,
    DiscountPercent,
    IsActive,
    StartsAt,
    EndsAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum GiftCodes {
    Table,
    Id,
    Code,
    Credits,
    ExtendDays,
    RedeemedBy,
    RedeemedAt,
    CreatedAt,
}
