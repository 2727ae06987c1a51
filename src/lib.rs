//! IoTDB MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools for AI assistants
//! to query, inspect and export Apache IoTDB time-series data, in either the
//! tree or the table SQL dialect.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::DbError;
pub use mcp::IotdbService;
