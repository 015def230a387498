use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum ActionAudit {
    Table,
    AccountId,
    Action,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // The dedup check always looks up the latest entry for (account, action).
        manager
            .create_index(
                Index::create()
                    .name("idx_action_audit_account_action_created")
                    .table(ActionAudit::Table)
                    .col(ActionAudit::AccountId)
                    .col(ActionAudit::Action)
                    .col(ActionAudit::CreatedAt)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_action_audit_account_action_created")
                    .table(ActionAudit::Table)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
