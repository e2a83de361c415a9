use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
    SubscriptionStatus,
    StripeCustomerId,
    StripeSubscriptionId,
    PeriodStart,
    PeriodEnd,
    SentCount,
    TopupQuota,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Locations {
    Table,
    Id,
    AccountId,
    Name,
    Address,
    BusinessPhone,
    BusinessEmail,
    GoogleReviewUrl,
    ContactUsUrl,
    ShortCode,
    CreatedAt,
}

#[derive(DeriveIden)]
enum LinkEvents {
    Table,
    Id,
    AccountId,
    LocationId,
    Source,
    ContactId,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Accounts::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Accounts::SubscriptionStatus)
                            .string_len(64)
                            .not_null()
                            .default("none"),
                    )
                    .col(ColumnDef::new(Accounts::StripeCustomerId).string_len(255).null())
                    .col(
                        ColumnDef::new(Accounts::StripeSubscriptionId)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Accounts::PeriodStart)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Accounts::PeriodEnd)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Accounts::SentCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::TopupQuota)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Accounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Webhook events that carry no account metadata resolve via this lookup
        manager
            .create_index(
                Index::create()
                    .name("idx_accounts_stripe_customer_id")
                    .table(Accounts::Table)
                    .col(Accounts::StripeCustomerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Locations::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Locations::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Locations::AccountId).uuid().not_null())
                    .col(ColumnDef::new(Locations::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Locations::Address).string_len(512).not_null())
                    .col(ColumnDef::new(Locations::BusinessPhone).string_len(64).not_null())
                    .col(ColumnDef::new(Locations::BusinessEmail).string_len(255).not_null())
                    .col(ColumnDef::new(Locations::GoogleReviewUrl).text().not_null())
                    .col(ColumnDef::new(Locations::ContactUsUrl).text().null())
                    .col(ColumnDef::new(Locations::ShortCode).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Locations::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Hard uniqueness guarantee; the in-app collision check is only an
        // early rejection on top of this
        manager
            .create_index(
                Index::create()
                    .name("idx_locations_short_code")
                    .table(Locations::Table)
                    .col(Locations::ShortCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_locations_account_id")
                    .table(Locations::Table)
                    .col(Locations::AccountId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LinkEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LinkEvents::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LinkEvents::AccountId).uuid().not_null())
                    .col(ColumnDef::new(LinkEvents::LocationId).uuid().not_null())
                    .col(
                        ColumnDef::new(LinkEvents::Source)
                            .string_len(64)
                            .not_null()
                            .default("qr"),
                    )
                    .col(ColumnDef::new(LinkEvents::ContactId).uuid().null())
                    .col(
                        ColumnDef::new(LinkEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_link_events_account_created")
                    .table(LinkEvents::Table)
                    .col(LinkEvents::AccountId)
                    .col(LinkEvents::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LinkEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Locations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        Ok(())
    }
}
