pub mod aliases;
pub mod cache_store;
pub mod config;
pub mod consolidate;
pub mod dataset;
pub mod demo_sources;
pub mod error;
pub mod export;
pub mod identity;
pub mod ingest;
pub mod league;
pub mod pipeline;
pub mod player;
pub mod profiles;
pub mod rating;
pub mod telemetry;
