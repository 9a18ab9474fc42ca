//! Database layer - connection pool
//!
//! - Connection pool (max 5 connections by default), owned by the caller
//! - Read-only access; each page is one statement on one pooled connection

pub mod pool;

pub use pool::{create_pool, create_pool_from_config, create_pool_with_options};
