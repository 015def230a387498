use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// Action audit trail. Doubles as the durable dedup signal: the scheduler
/// asks for the latest successful entry per (account, action) and compares
/// its timestamp against the current expiry epoch.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "action_audit")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub account_id: Option<i64>,
    pub action: String,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
