pub mod api;
pub mod bootstrap;
pub mod config;
pub mod database;
pub mod models;
pub mod observability;
pub mod services;

pub use config::*;
pub use database::Database;
pub use models::*;
