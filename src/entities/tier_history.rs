use super::accounts::PlanTier;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Eq, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "tier_change_reason")]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    #[sea_orm(string_value = "upgrade")]
    Upgrade,
    #[sea_orm(string_value = "downgrade")]
    Downgrade,
    #[sea_orm(string_value = "expiration")]
    Expiration,
    #[sea_orm(string_value = "manual")]
    Manual,
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeReason::Upgrade => write!(f, "upgrade"),
            ChangeReason::Downgrade => write!(f, "downgrade"),
            ChangeReason::Expiration => write!(f, "expiration"),
            ChangeReason::Manual => write!(f, "manual"),
        }
    }
}

/// Append-only plan change ledger. Support tooling reads this and assumes
/// monotonically increasing `effective_date` per account with exactly one
/// row per actual plan transition.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "tier_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub account_id: i64,
    pub previous_plan: Option<PlanTier>,
    pub new_plan: PlanTier,
    pub change_reason: ChangeReason,
    pub changed_by: Option<i64>,
    pub effective_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
