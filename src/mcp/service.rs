//! MCP service implementation using rmcp.
//!
//! This module defines the IotdbService struct. Each dialect has its own tool
//! router; the service registers exactly one of them, chosen by [`ToolSet`].

use crate::config::Config;
use crate::db::{QueryDispatcher, SchemaInspector, SessionPool};
use crate::mcp::registry::ToolSet;
use crate::models::ExportArtifact;
use crate::tools::export::{ExportInput, ExportPipeline};
use crate::tools::query::{QueryInput, QueryOutput, QueryToolHandler};
use crate::tools::schema::{
    DescribeTableInput, DescribeTableOutput, ListTablesOutput, SchemaToolHandler,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::path::PathBuf;

#[derive(Clone)]
pub struct IotdbService {
    query: QueryToolHandler,
    schema: SchemaToolHandler,
    export: ExportPipeline,
    pool: SessionPool,
    tool_set: ToolSet,
    /// Router for the active dialect only
    tool_router: ToolRouter<Self>,
}

impl IotdbService {
    /// Create a service exposing `tool_set`, with every handler sharing one dispatcher.
    pub fn new(dispatcher: QueryDispatcher, export_dir: impl Into<PathBuf>, tool_set: ToolSet) -> Self {
        let dialect = tool_set.dialect();
        let tool_router = match tool_set {
            ToolSet::Tree => Self::tree_tool_router(),
            ToolSet::Table => Self::table_tool_router(),
        };

        Self {
            query: QueryToolHandler::new(dispatcher.clone(), dialect),
            schema: SchemaToolHandler::new(SchemaInspector::new(dispatcher.clone())),
            export: ExportPipeline::new(dispatcher.clone(), export_dir, dialect),
            pool: dispatcher.pool().clone(),
            tool_set,
            tool_router,
        }
    }

    pub fn from_config(dispatcher: QueryDispatcher, config: &Config) -> Self {
        Self::new(dispatcher, config.export_path.clone(), ToolSet::from_config(config))
    }

    pub fn tool_set(&self) -> ToolSet {
        self.tool_set
    }

    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }
}

#[tool_router(router = tree_tool_router)]
impl IotdbService {
    #[tool(
        description = "Execute a SHOW or COUNT statement on the IoTDB tree model.\nExamples: SHOW DATABASES, SHOW TIMESERIES root.ln.**, COUNT DEVICES root.**.\nOutput format: json (default), table, markdown or csv."
    )]
    async fn metadata_query(
        &self,
        Parameters(input): Parameters<QueryInput>,
    ) -> Result<Json<QueryOutput>, McpError> {
        self.query
            .metadata_query(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Execute a SELECT statement on the IoTDB tree model.\nExample: SELECT * FROM root.ln.wf01.wt01 WHERE time > 2017-11-01T00:08:00.000.\nOutput format: json (default), table, markdown or csv."
    )]
    async fn select_query(
        &self,
        Parameters(input): Parameters<QueryInput>,
    ) -> Result<Json<QueryOutput>, McpError> {
        self.query
            .select_query(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Run a SELECT or SHOW statement on the IoTDB tree model and write the full result to a file.\nformat: csv (default) or excel. filename is optional and must not contain directories.\nReturns the absolute path, row count, file size and a preview of the first rows."
    )]
    async fn export_query(
        &self,
        Parameters(input): Parameters<ExportInput>,
    ) -> Result<Json<ExportArtifact>, McpError> {
        self.export.export(input).await.map(Json).map_err(McpError::from)
    }
}

#[tool_router(router = table_tool_router)]
impl IotdbService {
    #[tool(
        description = "Execute a SELECT statement on the IoTDB table model.\nOutput format: json (default), table, markdown or csv."
    )]
    async fn read_query(
        &self,
        Parameters(input): Parameters<QueryInput>,
    ) -> Result<Json<QueryOutput>, McpError> {
        self.query
            .read_query(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "List all tables in the configured IoTDB database.")]
    async fn list_tables(&self) -> Result<Json<ListTablesOutput>, McpError> {
        self.schema.list_tables().await.map(Json).map_err(McpError::from)
    }

    #[tool(
        description = "Get the columns of a table: name, data type and category (TIME, TAG, ATTRIBUTE or FIELD)."
    )]
    async fn describe_table(
        &self,
        Parameters(input): Parameters<DescribeTableInput>,
    ) -> Result<Json<DescribeTableOutput>, McpError> {
        self.schema
            .describe_table(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Run a SELECT, SHOW or DESC statement on the IoTDB table model and write the full result to a file.\nformat: csv (default) or excel. filename is optional and must not contain directories.\nReturns the absolute path, row count, file size and a preview of the first rows."
    )]
    async fn export_table_query(
        &self,
        Parameters(input): Parameters<ExportInput>,
    ) -> Result<Json<ExportArtifact>, McpError> {
        self.export.export(input).await.map(Json).map_err(McpError::from)
    }
}

#[tool_handler]
impl ServerHandler for IotdbService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "iotdb-mcp-server".to_owned(),
                title: Some("IoTDB MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(self.tool_set.instructions()),
        }
    }
}
