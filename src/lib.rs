pub mod admin;
pub mod config;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod identity;
pub mod lock;
pub mod metrics;
pub mod snapshot;
pub mod store;
