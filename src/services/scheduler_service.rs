use crate::config::SchedulerConfig;
use crate::database::DbPool;
use crate::entities::{ChangeReason, PlanTier, account_entity as accounts};
use crate::error::{AppError, AppResult};
use crate::external::NotificationDispatcher;
use crate::lifecycle::{LifecycleState, LifecycleWindows, classify};
use crate::services::{
    ActionDeduper, ActionTag, AuditService, QuotaService, TierCatalog, TierHistoryService,
};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use futures_util::stream;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration as StdDuration;

#[derive(Debug, Clone, Serialize)]
pub struct SweepError {
    pub account_id: i64,
    pub message: String,
}

/// Result of one sweep. `errors` carries the per-account failures; a single
/// failing account never aborts the rest of the sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepSummary {
    pub scanned: u64,
    pub warned: u64,
    pub graced: u64,
    pub downgraded: u64,
    pub errors: Vec<SweepError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccountOutcome {
    Noop,
    Warned,
    Graced,
    Downgraded,
}

/// Drives one lifecycle sweep over all active accounts. Safe to re-run at any
/// cadence: every "already happened" decision is derived from durable state
/// (audit trail, plan column), never from in-memory markers, so overlapping
/// or repeated runs cannot double-send or double-downgrade.
#[derive(Clone)]
pub struct SchedulerService {
    pool: DbPool,
    dispatcher: Arc<dyn NotificationDispatcher>,
    config: SchedulerConfig,
    deduper: ActionDeduper,
    quota_service: QuotaService,
    audit_service: AuditService,
}

impl SchedulerService {
    pub fn new(
        pool: DbPool,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: SchedulerConfig,
    ) -> Self {
        let deduper = ActionDeduper::new(pool.clone());
        let quota_service = QuotaService::new(pool.clone(), dispatcher.clone(), &config);
        let audit_service = AuditService::new(pool.clone());
        Self {
            pool,
            dispatcher,
            config,
            deduper,
            quota_service,
            audit_service,
        }
    }

    /// Run one sweep at `now`. Accounts are loaded page by page and processed
    /// with bounded concurrency; each page holds distinct accounts, so no two
    /// workers ever touch the same account at once.
    pub async fn run_once(&self, now: DateTime<Utc>) -> AppResult<SweepSummary> {
        let windows = self.config.windows();
        let catalog = TierCatalog::load(&*self.pool).await?;
        let account_timeout = StdDuration::from_secs(self.config.account_timeout_secs);
        let mut summary = SweepSummary::default();

        let mut pages = accounts::Entity::find()
            .filter(accounts::Column::Active.eq(true))
            .order_by_asc(accounts::Column::Id)
            .paginate(&*self.pool, self.config.page_size);

        while let Some(batch) = pages.fetch_and_next().await? {
            let results: Vec<(i64, AppResult<AccountOutcome>)> =
                stream::iter(batch.into_iter().map(|account| {
                    let windows = &windows;
                    let catalog = &catalog;
                    async move {
                        let account_id = account.id;
                        let result = match tokio::time::timeout(
                            account_timeout,
                            self.process_account(account, now, windows, catalog),
                        )
                        .await
                        {
                            Ok(r) => r,
                            Err(_) => Err(AppError::TimeoutError(format!(
                                "account {account_id} processing timed out"
                            ))),
                        };
                        (account_id, result)
                    }
                }))
                .buffer_unordered(self.config.concurrency.max(1))
                .collect()
                .await;

            for (account_id, result) in results {
                record_outcome(&mut summary, account_id, result);
            }
        }

        Ok(summary)
    }

    async fn process_account(
        &self,
        account: accounts::Model,
        now: DateTime<Utc>,
        windows: &LifecycleWindows,
        catalog: &TierCatalog,
    ) -> AppResult<AccountOutcome> {
        if account.plan == PlanTier::Free {
            return Ok(AccountOutcome::Noop);
        }
        // Premium without an expiry is a broken invariant, not a lifecycle
        // state; surface it and move on.
        let Some(expires_at) = account.plan_expires_at else {
            return Err(AppError::IntegrityError(format!(
                "premium account {} has no plan_expires_at",
                account.id
            )));
        };

        match classify(&account.plan, Some(expires_at), now, windows) {
            LifecycleState::Active | LifecycleState::GraceContinuing => Ok(AccountOutcome::Noop),
            LifecycleState::ExpiringSoon { days_left } => {
                let epoch_start = expires_at - windows.warning_window;
                if !self
                    .deduper
                    .should_fire(account.id, ActionTag::ExpiringWarning, epoch_start)
                    .await?
                {
                    return Ok(AccountOutcome::Noop);
                }
                let sent = match self
                    .dispatcher
                    .send_expiration_warning(&account, days_left)
                    .await
                {
                    Ok(()) => true,
                    Err(e) => {
                        log::warn!(
                            "Failed to send expiration warning to account {}: {e}",
                            account.id
                        );
                        false
                    }
                };
                self.audit_service
                    .record(Some(account.id), ActionTag::ExpiringWarning, sent, now)
                    .await?;
                Ok(if sent {
                    AccountOutcome::Warned
                } else {
                    AccountOutcome::Noop
                })
            }
            LifecycleState::GracePeriod { grace_until } => {
                // 宽限期通知的纪元从过期时刻开始
                let epoch_start = expires_at;
                if !self
                    .deduper
                    .should_fire(account.id, ActionTag::GracePeriod, epoch_start)
                    .await?
                {
                    return Ok(AccountOutcome::Noop);
                }
                let sent = match self.dispatcher.send_grace_period(&account, grace_until).await {
                    Ok(()) => true,
                    Err(e) => {
                        log::warn!(
                            "Failed to send grace period notice to account {}: {e}",
                            account.id
                        );
                        false
                    }
                };
                self.audit_service
                    .record(Some(account.id), ActionTag::GracePeriod, sent, now)
                    .await?;
                Ok(if sent {
                    AccountOutcome::Graced
                } else {
                    AccountOutcome::Noop
                })
            }
            LifecycleState::Downgraded => self.downgrade(account, now, catalog).await,
        }
    }

    /// Apply the expiry downgrade. Plan flip, history entry and quota reset
    /// commit as one transaction; notification and audit happen strictly
    /// after the commit, and a failed notification never rolls the plan back.
    /// Re-firing is structurally impossible: once the plan is free the
    /// account no longer classifies as `Downgraded`.
    async fn downgrade(
        &self,
        account: accounts::Model,
        now: DateTime<Utc>,
        catalog: &TierCatalog,
    ) -> AppResult<AccountOutcome> {
        let previous_plan = account.plan.clone();

        let txn = self.pool.begin().await?;
        let mut am = account.clone().into_active_model();
        am.plan = Set(PlanTier::Free);
        am.plan_expires_at = Set(None);
        am.updated_at = Set(Some(now));
        am.update(&txn).await?;
        TierHistoryService::record_in(
            &txn,
            account.id,
            Some(previous_plan.clone()),
            PlanTier::Free,
            ChangeReason::Expiration,
            now,
            None,
            Some("grace period elapsed without renewal".to_string()),
        )
        .await?;
        self.quota_service
            .reset_account_usage(&txn, catalog, account.id, &PlanTier::Free, now)
            .await?;
        txn.commit().await?;

        log::info!(
            "Account {} downgraded from {previous_plan} to free (expired)",
            account.id
        );

        let sent = match self
            .dispatcher
            .send_tier_change(
                &account,
                &previous_plan,
                &PlanTier::Free,
                &ChangeReason::Expiration,
            )
            .await
        {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "Failed to send tier change notice to account {}: {e}",
                    account.id
                );
                false
            }
        };
        self.audit_service
            .record(Some(account.id), ActionTag::Downgraded, sent, now)
            .await?;

        Ok(AccountOutcome::Downgraded)
    }
}

fn record_outcome(
    summary: &mut SweepSummary,
    account_id: i64,
    result: AppResult<AccountOutcome>,
) {
    summary.scanned += 1;
    match result {
        Ok(AccountOutcome::Warned) => summary.warned += 1,
        Ok(AccountOutcome::Graced) => summary.graced += 1,
        Ok(AccountOutcome::Downgraded) => summary.downgraded += 1,
        Ok(AccountOutcome::Noop) => {}
        Err(e) => {
            log::error!("Account {account_id} failed during sweep: {e}");
            summary.errors.push(SweepError {
                account_id,
                message: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        action_audit_entity as audit, feature_usage_entity as fu, tier_feature_entity as tf,
        tier_history_entity as th,
    };
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use std::sync::Mutex;

    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 8, 14, 15, 0).unwrap()
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationDispatcher for RecordingDispatcher {
        async fn send_expiration_warning(
            &self,
            account: &accounts::Model,
            days_left: i64,
        ) -> AppResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("warning:{}:{days_left}", account.id));
            Ok(())
        }

        async fn send_grace_period(
            &self,
            account: &accounts::Model,
            _grace_until: DateTime<Utc>,
        ) -> AppResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("grace:{}", account.id));
            Ok(())
        }

        async fn send_tier_change(
            &self,
            account: &accounts::Model,
            previous_plan: &PlanTier,
            new_plan: &PlanTier,
            _reason: &ChangeReason,
        ) -> AppResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("change:{}:{previous_plan}->{new_plan}", account.id));
            Ok(())
        }

        async fn send_upgrade_prompt(
            &self,
            account: &accounts::Model,
            feature: &str,
        ) -> AppResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("prompt:{}:{feature}", account.id));
            Ok(())
        }
    }

    fn account(id: i64, plan: PlanTier, expires_at: Option<DateTime<Utc>>) -> accounts::Model {
        accounts::Model {
            id,
            email: format!("acct{id}@example.com"),
            display_name: None,
            plan,
            plan_expires_at: expires_at,
            active: true,
            created_at: None,
            updated_at: None,
        }
    }

    fn service_with(
        db: DatabaseConnection,
        dispatcher: Arc<RecordingDispatcher>,
    ) -> SchedulerService {
        SchedulerService::new(Arc::new(db), dispatcher, SchedulerConfig::default())
    }

    #[tokio::test]
    async fn free_accounts_are_never_acted_upon() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let svc = service_with(db, dispatcher.clone());

        let outcome = svc
            .process_account(
                account(1, PlanTier::Free, None),
                t(),
                &LifecycleWindows::default(),
                &TierCatalog::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, AccountOutcome::Noop);
        assert!(dispatcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn premium_without_expiry_is_an_integrity_fault() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let svc = service_with(db, dispatcher.clone());

        let err = svc
            .process_account(
                account(2, PlanTier::Premium, None),
                t(),
                &LifecycleWindows::default(),
                &TierCatalog::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IntegrityError(_)));
        assert!(dispatcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn grace_continuing_implies_no_new_action() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let svc = service_with(db, dispatcher.clone());

        // T-2d: past the grace-notify window, inside the grace period.
        let outcome = svc
            .process_account(
                account(3, PlanTier::Premium, Some(t() - Duration::days(2))),
                t(),
                &LifecycleWindows::default(),
                &TierCatalog::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, AccountOutcome::Noop);
        assert!(dispatcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn warning_already_fired_this_epoch_is_suppressed() {
        let expires_at = t() + Duration::days(2);
        // An earlier sweep already recorded a successful warning inside the
        // current epoch.
        let prior = audit::Model {
            id: 7,
            account_id: Some(4),
            action: ActionTag::ExpiringWarning.as_str().to_string(),
            success: true,
            created_at: t() - Duration::hours(6),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![prior]])
            .into_connection();
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let svc = service_with(db, dispatcher.clone());

        let outcome = svc
            .process_account(
                account(4, PlanTier::Premium, Some(expires_at)),
                t(),
                &LifecycleWindows::default(),
                &TierCatalog::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, AccountOutcome::Noop);
        // No notification, no duplicate audit entry.
        assert!(dispatcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn grace_already_fired_this_epoch_is_suppressed() {
        let expires_at = t() - Duration::hours(6);
        let prior = audit::Model {
            id: 8,
            account_id: Some(5),
            action: ActionTag::GracePeriod.as_str().to_string(),
            success: true,
            created_at: t() - Duration::hours(3),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![prior]])
            .into_connection();
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let svc = service_with(db, dispatcher.clone());

        let outcome = svc
            .process_account(
                account(5, PlanTier::Premium, Some(expires_at)),
                t(),
                &LifecycleWindows::default(),
                &TierCatalog::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, AccountOutcome::Noop);
        assert!(dispatcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_past_grace_is_downgraded_with_ledger_and_usage_reset() {
        // T-10d: well past the grace period.
        let expires_at = t() - Duration::days(10);
        let before = account(10, PlanTier::Premium, Some(expires_at));
        let after = accounts::Model {
            plan: PlanTier::Free,
            plan_expires_at: None,
            updated_at: Some(t()),
            ..before.clone()
        };
        let ledger_row = th::Model {
            id: 1,
            account_id: 10,
            previous_plan: Some(PlanTier::Premium),
            new_plan: PlanTier::Free,
            change_reason: ChangeReason::Expiration,
            changed_by: None,
            effective_date: t(),
            notes: Some("grace period elapsed without renewal".to_string()),
            created_at: None,
        };
        let usage_before = fu::Model {
            id: 3,
            account_id: 10,
            feature_name: "products".to_string(),
            current_usage: 170,
            usage_limit: None,
            last_reset_at: t() - Duration::days(12),
            created_at: None,
            updated_at: None,
        };
        let usage_after = fu::Model {
            current_usage: 0,
            usage_limit: Some(100),
            last_reset_at: t(),
            updated_at: Some(t()),
            ..usage_before.clone()
        };
        let audit_row = audit::Model {
            id: 9,
            account_id: Some(10),
            action: ActionTag::Downgraded.as_str().to_string(),
            success: true,
            created_at: t(),
        };

        // The free tier caps products at 100; the reset re-snapshots that.
        let catalog_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![tf::Model {
                id: 1,
                tier: PlanTier::Free,
                feature_name: "products".to_string(),
                usage_limit: Some(100),
                enabled: true,
                created_at: None,
                updated_at: None,
            }]])
            .into_connection();
        let catalog = TierCatalog::load(&catalog_db).await.unwrap();

        // Inside the transaction: plan update, ledger insert, usage lookup,
        // usage reset. The audit insert follows the commit.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![after]])
            .append_query_results([vec![ledger_row]])
            .append_query_results([vec![usage_before]])
            .append_query_results([vec![usage_after]])
            .append_query_results([vec![audit_row]])
            .into_connection();
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let svc = service_with(db, dispatcher.clone());

        let outcome = svc
            .process_account(before, t(), &LifecycleWindows::default(), &catalog)
            .await
            .unwrap();
        assert_eq!(outcome, AccountOutcome::Downgraded);
        assert_eq!(
            dispatcher.calls.lock().unwrap().as_slice(),
            ["change:10:premium->free"]
        );
    }

    #[tokio::test]
    async fn run_once_pages_through_accounts_and_applies_the_epoch_guard() {
        // One page with a free account, a premium account already warned this
        // epoch (T+2d) and one deep in grace (T-2d). Nothing should fire.
        let prior = audit::Model {
            id: 11,
            account_id: Some(7),
            action: ActionTag::ExpiringWarning.as_str().to_string(),
            success: true,
            created_at: t() - Duration::hours(6),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<tf::Model>::new()])
            .append_query_results([vec![
                account(6, PlanTier::Free, None),
                account(7, PlanTier::Premium, Some(t() + Duration::days(2))),
                account(8, PlanTier::Premium, Some(t() - Duration::days(2))),
            ]])
            .append_query_results([vec![prior]])
            .append_query_results([Vec::<accounts::Model>::new()])
            .into_connection();
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let svc = service_with(db, dispatcher.clone());

        let summary = svc.run_once(t()).await.unwrap();
        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.warned, 0);
        assert_eq!(summary.graced, 0);
        assert_eq!(summary.downgraded, 0);
        assert!(summary.errors.is_empty());
        assert!(dispatcher.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn outcomes_tally_into_the_summary() {
        let mut summary = SweepSummary::default();
        record_outcome(&mut summary, 1, Ok(AccountOutcome::Warned));
        record_outcome(&mut summary, 2, Ok(AccountOutcome::Graced));
        record_outcome(&mut summary, 3, Ok(AccountOutcome::Downgraded));
        record_outcome(&mut summary, 4, Ok(AccountOutcome::Noop));
        record_outcome(
            &mut summary,
            5,
            Err(AppError::TimeoutError("account 5 processing timed out".into())),
        );

        assert_eq!(summary.scanned, 5);
        assert_eq!(summary.warned, 1);
        assert_eq!(summary.graced, 1);
        assert_eq!(summary.downgraded, 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].account_id, 5);
    }
}
