pub mod config;
pub mod database;
pub mod entities;
pub mod error;
pub mod external;
pub mod lifecycle;
pub mod services;
pub mod tasks;

pub use config::Config;
pub use error::{AppError, AppResult};
