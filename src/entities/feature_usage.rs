use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// Per-account, per-feature usage counter. `usage_limit` is a snapshot of the
/// tier definition taken at the last reset, so it may lag the catalog until
/// the next cycle or tier change. Rows are created lazily on first use.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "feature_usage")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub account_id: i64,
    pub feature_name: String,
    pub current_usage: i64,
    pub usage_limit: Option<i64>,
    pub last_reset_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
