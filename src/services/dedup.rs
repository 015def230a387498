use crate::database::DbPool;
use crate::entities::action_audit_entity as audit;
use crate::error::AppResult;
use crate::services::ActionTag;
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};

/// Decides whether a lifecycle action may fire for an account, based on the
/// durable audit trail rather than in-memory state, so repeated sweeps and
/// process restarts never double-send.
///
/// An epoch is bound to the account's current `plan_expires_at`: the warning
/// epoch opens at `expires_at - warning_window`, the grace epoch at
/// `expires_at` itself. A renewal moves the expiry forward and thereby
/// re-arms both notifications.
#[derive(Clone)]
pub struct ActionDeduper {
    pool: DbPool,
}

impl ActionDeduper {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// True when no successful entry with this tag has been recorded for the
    /// account since `epoch_start`.
    pub async fn should_fire(
        &self,
        account_id: i64,
        tag: ActionTag,
        epoch_start: DateTime<Utc>,
    ) -> AppResult<bool> {
        let last = audit::Entity::find()
            .filter(audit::Column::AccountId.eq(account_id))
            .filter(audit::Column::Action.eq(tag.as_str()))
            .filter(audit::Column::Success.eq(true))
            .order_by_desc(audit::Column::CreatedAt)
            .one(&*self.pool)
            .await?;

        Ok(outside_epoch(last.map(|e| e.created_at), epoch_start))
    }
}

fn outside_epoch(last_fired: Option<DateTime<Utc>>, epoch_start: DateTime<Utc>) -> bool {
    match last_fired {
        None => true,
        Some(at) => at < epoch_start,
    }
}
