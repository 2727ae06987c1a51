//! MCP server integration module.
//!
//! This module wires the IoTDB tool handlers into the MCP protocol using the
//! rmcp framework. The active tool set depends on the configured SQL dialect.

pub mod registry;
pub mod service;

pub use registry::ToolSet;
pub use service::IotdbService;
