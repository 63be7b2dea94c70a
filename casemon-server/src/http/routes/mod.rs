//! Route handlers organized by endpoint

pub mod health;
pub mod ingest;
pub mod webhook;
