use crate::database::DbPool;
use crate::entities::action_audit_entity as audit;
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, Set};

/// Tags for the lifecycle actions recorded in the audit trail. The string
/// form is what lands in the `action` column and what the deduper filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTag {
    ExpiringWarning,
    GracePeriod,
    Downgraded,
}

impl ActionTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionTag::ExpiringWarning => "tier_expiring_warning",
            ActionTag::GracePeriod => "tier_grace_period",
            ActionTag::Downgraded => "tier_downgraded",
        }
    }
}

impl std::fmt::Display for ActionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone)]
pub struct AuditService {
    pool: DbPool,
}

impl AuditService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append one audit entry. `success` records the outcome of the
    /// notification the entry describes; only successful entries suppress
    /// re-firing. A persistence failure here means the action has no durable
    /// record and will be re-attempted on the next sweep.
    pub async fn record(
        &self,
        account_id: Option<i64>,
        tag: ActionTag,
        success: bool,
        at: DateTime<Utc>,
    ) -> AppResult<i64> {
        let entry = audit::ActiveModel {
            account_id: Set(account_id),
            action: Set(tag.as_str().to_string()),
            success: Set(success),
            created_at: Set(at),
            ..Default::default()
        };
        let model = entry
            .insert(&*self.pool)
            .await
            .map_err(|e| AppError::AuditWriteError(e.to_string()))?;
        Ok(model.id)
    }
}
