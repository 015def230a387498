pub mod audit_service;
pub mod dedup;
pub mod quota_service;
pub mod scheduler_service;
pub mod tier_catalog;
pub mod tier_history_service;

pub use audit_service::*;
pub use dedup::*;
pub use quota_service::*;
pub use scheduler_service::*;
pub use tier_catalog::*;
pub use tier_history_service::*;
