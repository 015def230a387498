use crate::database::DbPool;
use crate::entities::{ChangeReason, PlanTier, tier_history_entity as th};
use crate::error::AppResult;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

/// Append-only plan change ledger. No update or delete surface exists; every
/// actual plan transition produces exactly one row here (the downgrade path
/// writes inside the same transaction that flips the plan).
#[derive(Clone)]
pub struct TierHistoryService {
    pool: DbPool,
}

impl TierHistoryService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append a ledger entry on an arbitrary connection, so callers can make
    /// it part of a larger transaction.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_in<C: ConnectionTrait>(
        conn: &C,
        account_id: i64,
        previous_plan: Option<PlanTier>,
        new_plan: PlanTier,
        reason: ChangeReason,
        effective_date: DateTime<Utc>,
        changed_by: Option<i64>,
        notes: Option<String>,
    ) -> AppResult<i64> {
        let entry = th::ActiveModel {
            account_id: Set(account_id),
            previous_plan: Set(previous_plan),
            new_plan: Set(new_plan),
            change_reason: Set(reason),
            changed_by: Set(changed_by),
            effective_date: Set(effective_date),
            notes: Set(notes),
            ..Default::default()
        };
        let model = entry.insert(conn).await?;
        Ok(model.id)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        account_id: i64,
        previous_plan: Option<PlanTier>,
        new_plan: PlanTier,
        reason: ChangeReason,
        effective_date: DateTime<Utc>,
        changed_by: Option<i64>,
        notes: Option<String>,
    ) -> AppResult<i64> {
        Self::record_in(
            &*self.pool,
            account_id,
            previous_plan,
            new_plan,
            reason,
            effective_date,
            changed_by,
            notes,
        )
        .await
    }

    /// Full change history for one account, oldest first. Consumed by
    /// support tooling, which relies on `effective_date` being monotonic.
    pub async fn history_for(&self, account_id: i64) -> AppResult<Vec<th::Model>> {
        let rows = th::Entity::find()
            .filter(th::Column::AccountId.eq(account_id))
            .order_by_asc(th::Column::EffectiveDate)
            .all(&*self.pool)
            .await?;
        Ok(rows)
    }
}
