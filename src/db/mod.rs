//! Database abstraction layer.
//!
//! This module provides IoTDB access functionality:
//! - Backend session traits and the REST implementation
//! - Session pool management
//! - Query dispatch
//! - Schema introspection
//! - Type mappings

pub mod backend;
pub mod executor;
pub mod pool;
pub mod rest;
pub mod schema;
pub mod types;

pub use backend::{BackendSession, Connector, DataSet, RawRow};
pub use executor::QueryDispatcher;
pub use pool::{PoolOptions, PoolStatus, PooledSession, SessionPool};
pub use rest::{BufferedDataSet, RestConnector};
pub use schema::SchemaInspector;
pub use types::TimestampConverter;
