use super::dispatch::{error_payload, ToolDispatcher};
use super::params::*;
use crate::types::AppError;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// MCP server exposing the memory system as tools
#[derive(Clone)]
pub struct MemoriaMcpServer {
    dispatcher: ToolDispatcher,
    #[allow(dead_code)]
    tool_router: ToolRouter<Self>,
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[tool_router]
impl MemoriaMcpServer {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self {
            dispatcher,
            tool_router: Self::tool_router(),
        }
    }

    /// Hand the call to the dispatcher; tool failures become error results,
    /// not protocol errors.
    async fn forward<P: Serialize>(&self, tool: &str, params: P) -> Result<CallToolResult, McpError> {
        let args = serde_json::to_value(params).map_err(|e| McpError::invalid_params(e.to_string(), None))?;
        match self.dispatcher.call(tool, args).await {
            Ok(value) => Ok(CallToolResult::success(vec![Content::text(pretty(&value))])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(pretty(&error_payload(&e)))])),
        }
    }

    #[tool(description = "Search conversations, curated memories, schedule and project history. \
        Uses semantic similarity when embeddings are available, text matching otherwise.")]
    async fn search_memories(
        &self,
        params: Parameters<SearchMemoriesParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward("search_memories", params.0).await
    }

    #[tool(description = "Store a conversation message, or a user/assistant exchange")]
    async fn store_conversation(
        &self,
        params: Parameters<StoreConversationParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward("store_conversation", params.0).await
    }

    #[tool(description = "Create a curated long-term memory")]
    async fn create_memory(&self, params: Parameters<CreateMemoryParams>) -> Result<CallToolResult, McpError> {
        self.forward("create_memory", params.0).await
    }

    #[tool(description = "Alias of create_memory")]
    async fn store_memory(&self, params: Parameters<CreateMemoryParams>) -> Result<CallToolResult, McpError> {
        self.forward("store_memory", params.0).await
    }

    #[tool(description = "Update content, importance, tags or type of a curated memory")]
    async fn update_memory(&self, params: Parameters<UpdateMemoryParams>) -> Result<CallToolResult, McpError> {
        self.forward("update_memory", params.0).await
    }

    #[tool(description = "Get the most recent conversation messages in chronological order")]
    async fn get_recent_context(
        &self,
        params: Parameters<RecentContextParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward("get_recent_context", params.0).await
    }

    #[tool(description = "Schedule an appointment")]
    async fn create_appointment(
        &self,
        params: Parameters<CreateAppointmentParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward("create_appointment", params.0).await
    }

    #[tool(description = "Create a reminder")]
    async fn create_reminder(
        &self,
        params: Parameters<CreateReminderParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward("create_reminder", params.0).await
    }

    #[tool(description = "Mark a reminder as completed")]
    async fn complete_reminder(
        &self,
        params: Parameters<CompleteReminderParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward("complete_reminder", params.0).await
    }

    #[tool(description = "List upcoming appointments and active reminders")]
    async fn get_upcoming_schedule(
        &self,
        params: Parameters<UpcomingScheduleParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward("get_upcoming_schedule", params.0).await
    }

    #[tool(description = "Report database, file monitor and embedding service health")]
    async fn get_system_health(&self, params: Parameters<EmptyParams>) -> Result<CallToolResult, McpError> {
        self.forward("get_system_health", params.0).await
    }

    #[tool(description = "Summarize tool usage over the last N days")]
    async fn get_tool_usage_summary(&self, params: Parameters<DaysParams>) -> Result<CallToolResult, McpError> {
        self.forward("get_tool_usage_summary", params.0).await
    }

    #[tool(description = "List recent tool calls, optionally for one tool")]
    async fn get_tool_call_history(
        &self,
        params: Parameters<ToolHistoryParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward("get_tool_call_history", params.0).await
    }

    #[tool(description = "Analyze recent tool usage and store insights and recommendations")]
    async fn reflect_on_tool_usage(&self, params: Parameters<ReflectParams>) -> Result<CallToolResult, McpError> {
        self.forward("reflect_on_tool_usage", params.0).await
    }

    #[tool(description = "Get stored self-reflections")]
    async fn get_ai_insights(&self, params: Parameters<AiInsightsParams>) -> Result<CallToolResult, McpError> {
        self.forward("get_ai_insights", params.0).await
    }

    #[tool(description = "Clean up old data, upgrade schemas and compact the databases")]
    async fn run_database_maintenance(
        &self,
        params: Parameters<MaintenanceParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward("run_database_maintenance", params.0).await
    }

    #[tool(description = "Record a development session for a workspace")]
    async fn save_development_session(
        &self,
        params: Parameters<DevelopmentSessionParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward("save_development_session", params.0).await
    }

    #[tool(description = "Store a development conversation, with decisions and code changes")]
    async fn store_development_conversation(
        &self,
        params: Parameters<DevelopmentConversationParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward("store_development_conversation", params.0).await
    }

    #[tool(description = "Store an insight about the current project")]
    async fn store_project_insight(
        &self,
        params: Parameters<ProjectInsightParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward("store_project_insight", params.0).await
    }

    #[tool(description = "Search development conversations, project insights and code context")]
    async fn search_project_history(
        &self,
        params: Parameters<ProjectSearchParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward("search_project_history", params.0).await
    }

    #[tool(description = "Describe a file or function and link it to project insights")]
    async fn link_code_context(&self, params: Parameters<CodeContextParams>) -> Result<CallToolResult, McpError> {
        self.forward("link_code_context", params.0).await
    }

    #[tool(description = "Get recent sessions, conversations, insights and code context to resume work")]
    async fn get_project_continuity(
        &self,
        params: Parameters<ProjectContinuityParams>,
    ) -> Result<CallToolResult, McpError> {
        self.forward("get_project_continuity", params.0).await
    }
}

#[tool_handler]
impl ServerHandler for MemoriaMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "memoria".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Persistent memory: store and search conversations, curated memories, \
                 schedule items and development project history"
                    .into(),
            ),
        }
    }
}

/// Serve the memory tools over stdio until the client disconnects.
pub async fn start_stdio_server(dispatcher: ToolDispatcher) -> crate::types::Result<()> {
    use rmcp::{ServiceExt, transport::io::stdio};

    let server = MemoriaMcpServer::new(dispatcher);
    let service = server
        .serve(stdio())
        .await
        .map_err(|e| AppError::Internal(format!("MCP server error: {}", e)))?;
    info!("MCP server listening on stdio");

    let reason = service
        .waiting()
        .await
        .map_err(|e| AppError::Internal(format!("MCP server task failed: {}", e)))?;
    info!(?reason, "MCP server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::DisabledEmbeddings;
    use crate::memory::MemorySystem;
    use crate::utils::toml_config::{ConfigManager, MemoriaConfig};
    use std::sync::Arc;

    async fn server() -> MemoriaMcpServer {
        let system = MemorySystem::open_in_memory(
            Arc::new(DisabledEmbeddings),
            ConfigManager::from_config(MemoriaConfig::default()),
        )
        .await
        .unwrap();
        MemoriaMcpServer::new(ToolDispatcher::new(Arc::new(system)))
    }

    #[tokio::test]
    async fn test_router_lists_every_tool() {
        let server = server().await;
        let tools = server.tool_router.list_all();
        assert_eq!(tools.len(), super::super::dispatch::TOOL_NAMES.len());
        for name in super::super::dispatch::TOOL_NAMES {
            assert!(tools.iter().any(|t| t.name == *name), "missing tool {}", name);
        }
    }

    #[tokio::test]
    async fn test_server_info() {
        let info = server().await.get_info();
        assert_eq!(info.server_info.name, "memoria");
        assert!(info.capabilities.tools.is_some());
    }

    #[tokio::test]
    async fn test_forward_maps_errors_to_error_result() {
        let server = server().await;
        let result = server
            .forward("update_memory", UpdateMemoryParams {
                memory_id: "missing".into(),
                content: Some("x".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));

        let ok = server
            .forward("create_memory", CreateMemoryParams {
                content: "Remember the milk".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_ne!(ok.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_tool_method_returns_pretty_json() {
        let server = server().await;
        let result = server
            .store_memory(Parameters(CreateMemoryParams {
                content: "Takes the early train".into(),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_ne!(result.is_error, Some(true));
        assert_eq!(result.content.len(), 1);
    }
}
