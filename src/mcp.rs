use std::sync::Arc;

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{error, live::LiveService, service::ReplyOutcome};

#[derive(Clone)]
pub struct AskbertMcpServer {
    live: Arc<LiveService>,
    tool_router: ToolRouter<Self>,
}

impl AskbertMcpServer {
    pub fn new(live: Arc<LiveService>) -> Self {
        Self {
            live,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl AskbertMcpServer {
    /// Answer a question from the knowledge base.
    #[tool(
        name = "ask",
        description = "Answer a question from the knowledge base. Returns the stored answer for the closest known question, or a fallback message when nothing is close enough."
    )]
    pub async fn ask(
        &self,
        params: Parameters<AskParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let question = params.0.question.unwrap_or_default();
        let service = self.live.snapshot();
        let unavailable = service.messages().unavailable.clone();

        let asked = question.clone();
        let outcome =
            tokio::task::spawn_blocking(move || service.answer(&asked))
                .await
                .map_err(|e| e.to_string())
                .and_then(|r| r.map_err(|e| e.to_string()));

        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "failed to answer question");
                let mut result = CallToolResult::default();
                result.content = vec![Content::text(unavailable)];
                result.structured_content = None;
                result.is_error = Some(true);
                result.meta = None;
                return Ok(result);
            }
        };

        let structured = serde_json::to_value(AskResponse {
            question,
            answer: reply.answer.clone(),
            outcome: reply.outcome,
        })
        .map_err(|e| mcp_error("failed to serialize answer", e))?;

        let mut result = CallToolResult::default();
        result.content = vec![Content::text(reply.answer)];
        result.structured_content = Some(structured);
        result.is_error = Some(false);
        result.meta = None;
        Ok(result)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for AskbertMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut server_info = Implementation::new("askbert", env!("CARGO_PKG_VERSION"));
        server_info.title = Some("askbert MCP".to_string());
        server_info.icons = None;
        server_info.website_url = None;

        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info = server_info;
        info.instructions = Some(
            "Use ask to look up the answer to a user's question in the knowledge base."
                .to_string(),
        );
        info
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AskParams {
    /// The question to answer. Empty or missing asks the user to ask one.
    pub question: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AskResponse {
    question: String,
    answer: String,
    outcome: ReplyOutcome,
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

pub fn run_mcp(live: Arc<LiveService>) -> error::Result<()> {
    let server = AskbertMcpServer::new(live);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            error::Error::Config(format!(
                "MCP server initialization failed: {e}"
            ))
        })?;
        running.waiting().await.map_err(|e| {
            error::Error::Config(format!("MCP server error: {e}"))
        })?;
        Ok(())
    })
}
