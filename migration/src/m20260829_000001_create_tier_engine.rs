use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
    Email,
    DisplayName,
    Plan,
    PlanExpiresAt,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TierFeatures {
    Table,
    Id,
    Tier,
    FeatureName,
    UsageLimit,
    Enabled,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum FeatureUsage {
    Table,
    Id,
    AccountId,
    FeatureName,
    CurrentUsage,
    UsageLimit,
    LastResetAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TierHistory {
    Table,
    Id,
    AccountId,
    PreviousPlan,
    NewPlan,
    ChangeReason,
    ChangedBy,
    EffectiveDate,
    Notes,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ActionAudit {
    Table,
    Id,
    AccountId,
    Action,
    Success,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // enums
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("plan_tier"))
                    .values(vec![Alias::new("free"), Alias::new("premium")])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("tier_change_reason"))
                    .values(vec![
                        Alias::new("upgrade"),
                        Alias::new("downgrade"),
                        Alias::new("expiration"),
                        Alias::new("manual"),
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Accounts::Email)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Accounts::DisplayName).string_len(255).null())
                    .col(
                        ColumnDef::new(Accounts::Plan)
                            .custom(Alias::new("plan_tier"))
                            .not_null()
                            .default(Expr::cust("'free'::plan_tier")),
                    )
                    .col(
                        ColumnDef::new(Accounts::PlanExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Accounts::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Accounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Accounts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TierFeatures::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TierFeatures::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TierFeatures::Tier)
                            .custom(Alias::new("plan_tier"))
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TierFeatures::FeatureName)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(ColumnDef::new(TierFeatures::UsageLimit).big_integer().null())
                    .col(
                        ColumnDef::new(TierFeatures::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(TierFeatures::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TierFeatures::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uq_tier_features_tier_feature")
                    .table(TierFeatures::Table)
                    .col(TierFeatures::Tier)
                    .col(TierFeatures::FeatureName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FeatureUsage::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FeatureUsage::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FeatureUsage::AccountId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FeatureUsage::FeatureName)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FeatureUsage::CurrentUsage)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(FeatureUsage::UsageLimit).big_integer().null())
                    .col(
                        ColumnDef::new(FeatureUsage::LastResetAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FeatureUsage::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(FeatureUsage::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uq_feature_usage_account_feature")
                    .table(FeatureUsage::Table)
                    .col(FeatureUsage::AccountId)
                    .col(FeatureUsage::FeatureName)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TierHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TierHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TierHistory::AccountId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TierHistory::PreviousPlan)
                            .custom(Alias::new("plan_tier"))
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TierHistory::NewPlan)
                            .custom(Alias::new("plan_tier"))
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TierHistory::ChangeReason)
                            .custom(Alias::new("tier_change_reason"))
                            .not_null(),
                    )
                    .col(ColumnDef::new(TierHistory::ChangedBy).big_integer().null())
                    .col(
                        ColumnDef::new(TierHistory::EffectiveDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TierHistory::Notes).text().null())
                    .col(
                        ColumnDef::new(TierHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::cust("NOW()"))
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_tier_history_account_effective")
                    .table(TierHistory::Table)
                    .col(TierHistory::AccountId)
                    .col(TierHistory::EffectiveDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ActionAudit::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActionAudit::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ActionAudit::AccountId).big_integer().null())
                    .col(
                        ColumnDef::new(ActionAudit::Action)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActionAudit::Success)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ActionAudit::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActionAudit::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TierHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FeatureUsage::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TierFeatures::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(Alias::new("tier_change_reason")).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(Alias::new("plan_tier")).to_owned())
            .await?;
        Ok(())
    }
}
