pub mod api;
pub mod arena;
pub mod auth;
pub mod config;
pub mod creature;
pub mod gateway;
pub mod metrics;
pub mod rate_limit;
pub mod store;
