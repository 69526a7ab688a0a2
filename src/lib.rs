pub mod api;
pub mod board;
pub mod config;
pub mod entities;
pub mod ingest;
pub mod metrics;
pub mod migrator;
pub mod model;
pub mod notifications;
pub mod portal;
pub mod realtime;
pub mod store;
pub mod telemetry;

pub use sea_orm;
pub use redis;
