pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod metrics;
pub mod pricing;

pub mod error;
pub mod logger;
pub mod time;
