use super::accounts::PlanTier;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// Per-tier feature limit definition. `usage_limit = NULL` means unlimited.
/// Reference data; (tier, feature_name) is unique.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "tier_features")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub tier: PlanTier,
    pub feature_name: String,
    pub usage_limit: Option<i64>,
    pub enabled: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
