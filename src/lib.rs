//! # FlowMetrics Library
//!
//! Multi-tenant workflow analytics over the n8n REST API: incremental
//! execution sync, production filtering, period rollups, and a cached query
//! surface.

pub mod aggregate;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod query;
pub mod remote;
pub mod repositories;
pub mod scheduler;
pub mod server;
pub mod sync;
pub mod tasks;
pub mod telemetry;
pub use migration;
