use crate::entities::{PlanTier, tier_feature_entity as tf};
use crate::error::AppResult;
use sea_orm::{ConnectionTrait, EntityTrait};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureLimit {
    /// None = unlimited.
    pub limit: Option<i64>,
    pub enabled: bool,
}

/// In-memory snapshot of `tier_features`, loaded once per sweep. Reference
/// data only; concurrent reads need no synchronization.
#[derive(Debug, Clone, Default)]
pub struct TierCatalog {
    limits: HashMap<(PlanTier, String), FeatureLimit>,
}

impl TierCatalog {
    pub async fn load<C: ConnectionTrait>(conn: &C) -> AppResult<Self> {
        let rows = tf::Entity::find().all(conn).await?;
        let mut limits = HashMap::with_capacity(rows.len());
        for row in rows {
            limits.insert(
                (row.tier, row.feature_name),
                FeatureLimit {
                    limit: row.usage_limit,
                    enabled: row.enabled,
                },
            );
        }
        Ok(Self { limits })
    }

    pub fn feature(&self, tier: &PlanTier, name: &str) -> Option<&FeatureLimit> {
        self.limits.get(&(tier.clone(), name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }
}
