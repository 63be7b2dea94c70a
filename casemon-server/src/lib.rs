//! casemon-server: resilient database access and HTTP API
//!
//! Ingests transaction events and Grafana alert webhooks into PostgreSQL
//! through a bounded, self-healing connection pool:
//!
//! - [`db::PoolManager`] creates the pool with bounded startup retry
//! - [`db::LeaseGuard`] wraps every unit of work in one explicit transaction
//! - [`ops`] validates and authorizes before any connection is leased
//! - [`http`] exposes the operations as thin axum handlers

pub mod db;
pub mod http;
pub mod ops;

pub use db::{DbError, LeaseGuard, PoolManager};
pub use http::{run_server, ServerConfig, ServerError};
pub use ops::OpError;
