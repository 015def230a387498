pub mod accounts;
pub mod action_audit;
pub mod feature_usage;
pub mod tier_features;
pub mod tier_history;

pub use accounts as account_entity;
pub use action_audit as action_audit_entity;
pub use feature_usage as feature_usage_entity;
pub use tier_features as tier_feature_entity;
pub use tier_history as tier_history_entity;

pub use accounts::PlanTier;
pub use tier_history::ChangeReason;
