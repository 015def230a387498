use crate::config::SchedulerConfig;
use crate::database::DbPool;
use crate::entities::{
    PlanTier, account_entity as accounts, feature_usage_entity as fu, tier_feature_entity as tf,
};
use crate::error::{AppError, AppResult};
use crate::external::NotificationDispatcher;
use crate::services::TierCatalog;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;

/// Per-account, per-feature usage bookkeeping against the tier catalog.
/// Counter rows are created lazily, reset when the configured cycle elapses
/// (checked before every increment) and unconditionally on tier change.
#[derive(Clone)]
pub struct QuotaService {
    pool: DbPool,
    dispatcher: Arc<dyn NotificationDispatcher>,
    reset_interval: Duration,
}

impl QuotaService {
    pub fn new(
        pool: DbPool,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            pool,
            dispatcher,
            reset_interval: Duration::days(config.usage_reset_days),
        }
    }

    /// Apply `delta` to the account's usage counter for `feature`, returning
    /// the new usage. Fails with `QuotaExceeded` when the snapshot limit
    /// would be passed; on the free tier that also triggers a best-effort
    /// upgrade prompt.
    pub async fn increment(&self, account_id: i64, feature: &str, delta: i64) -> AppResult<i64> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;

        let account = accounts::Entity::find_by_id(account_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account {account_id} not found")))?;
        let def = tf::Entity::find()
            .filter(tf::Column::Tier.eq(account.plan.clone()))
            .filter(tf::Column::FeatureName.eq(feature))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Feature '{feature}' is not defined for tier {}",
                    account.plan
                ))
            })?;
        if !def.enabled {
            txn.rollback().await?;
            return Err(AppError::FeatureDisabled(feature.to_string()));
        }

        // 行级锁：避免并发 increment 与调度器重置互相丢失更新
        let existing = fu::Entity::find()
            .filter(fu::Column::AccountId.eq(account_id))
            .filter(fu::Column::FeatureName.eq(feature))
            .lock_exclusive()
            .one(&txn)
            .await?;
        let usage = match existing {
            Some(u) => u,
            None => {
                fu::ActiveModel {
                    account_id: Set(account_id),
                    feature_name: Set(feature.to_string()),
                    current_usage: Set(0),
                    usage_limit: Set(def.usage_limit),
                    last_reset_at: Set(now),
                    ..Default::default()
                }
                .insert(&txn)
                .await?
            }
        };

        // Lazy cycle reset; the limit snapshot refreshes with it.
        let due = reset_due(usage.last_reset_at, now, self.reset_interval);
        let current = if due { 0 } else { usage.current_usage };
        let limit = if due { def.usage_limit } else { usage.usage_limit };

        if let Err(e) = check_quota(feature, current, delta, limit) {
            txn.rollback().await?;
            if account.plan == PlanTier::Free
                && let Err(send_err) = self.dispatcher.send_upgrade_prompt(&account, feature).await
            {
                log::warn!("Failed to send upgrade prompt to account {account_id}: {send_err}");
            }
            return Err(e);
        }

        let new_usage = current + delta;
        let mut am = usage.into_active_model();
        am.current_usage = Set(new_usage);
        if due {
            am.last_reset_at = Set(now);
            am.usage_limit = Set(def.usage_limit);
        }
        am.updated_at = Set(Some(now));
        am.update(&txn).await?;
        txn.commit().await?;

        Ok(new_usage)
    }

    /// Release usage, e.g. when a tracked resource is deleted. Never drops
    /// below zero; a missing counter row is a no-op.
    pub async fn decrement(&self, account_id: i64, feature: &str, delta: i64) -> AppResult<i64> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;
        let existing = fu::Entity::find()
            .filter(fu::Column::AccountId.eq(account_id))
            .filter(fu::Column::FeatureName.eq(feature))
            .lock_exclusive()
            .one(&txn)
            .await?;
        let Some(usage) = existing else {
            txn.rollback().await?;
            return Ok(0);
        };
        let new_usage = (usage.current_usage - delta).max(0);
        let mut am = usage.into_active_model();
        am.current_usage = Set(new_usage);
        am.updated_at = Set(Some(now));
        am.update(&txn).await?;
        txn.commit().await?;
        Ok(new_usage)
    }

    /// Reset one counter if the configured cycle has elapsed. Returns whether
    /// a reset happened.
    pub async fn reset_if_due(
        &self,
        account_id: i64,
        feature: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let txn = self.pool.begin().await?;
        let existing = fu::Entity::find()
            .filter(fu::Column::AccountId.eq(account_id))
            .filter(fu::Column::FeatureName.eq(feature))
            .lock_exclusive()
            .one(&txn)
            .await?;
        let Some(usage) = existing else {
            txn.rollback().await?;
            return Ok(false);
        };
        if !reset_due(usage.last_reset_at, now, self.reset_interval) {
            txn.rollback().await?;
            return Ok(false);
        }

        // Refresh the limit snapshot from the current tier definition.
        let account = accounts::Entity::find_by_id(account_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account {account_id} not found")))?;
        let def = tf::Entity::find()
            .filter(tf::Column::Tier.eq(account.plan))
            .filter(tf::Column::FeatureName.eq(feature))
            .one(&txn)
            .await?;

        let mut am = usage.into_active_model();
        am.current_usage = Set(0);
        am.usage_limit = Set(def.and_then(|d| d.usage_limit));
        am.last_reset_at = Set(now);
        am.updated_at = Set(Some(now));
        am.update(&txn).await?;
        txn.commit().await?;
        Ok(true)
    }

    /// Zero every counter for the account and re-snapshot limits from the new
    /// tier. Runs on the caller's connection so the scheduler can include it
    /// in the downgrade transaction (limits change the moment the tier does,
    /// even mid-cycle).
    pub async fn reset_account_usage<C: ConnectionTrait>(
        &self,
        conn: &C,
        catalog: &TierCatalog,
        account_id: i64,
        new_tier: &PlanTier,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let rows = fu::Entity::find()
            .filter(fu::Column::AccountId.eq(account_id))
            .all(conn)
            .await?;
        for row in rows {
            let snapshot = catalog.feature(new_tier, &row.feature_name);
            let mut am = row.into_active_model();
            am.current_usage = Set(0);
            am.usage_limit = Set(snapshot.and_then(|f| f.limit));
            am.last_reset_at = Set(now);
            am.updated_at = Set(Some(now));
            am.update(conn).await?;
        }
        Ok(())
    }
}

fn reset_due(last_reset_at: DateTime<Utc>, now: DateTime<Utc>, interval: Duration) -> bool {
    now.signed_duration_since(last_reset_at) >= interval
}

fn check_quota(feature: &str, current: i64, delta: i64, limit: Option<i64>) -> AppResult<()> {
    if let Some(limit) = limit
        && current + delta > limit
    {
        return Err(AppError::QuotaExceeded {
            feature: feature.to_string(),
            limit,
        });
    }
    Ok(())
}
