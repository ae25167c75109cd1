//! MCP Server Implementation
//!
//! Registers every booking tool with rmcp and serves them over stdio.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData, ServerHandler, ServiceExt,
};
use tracing::info;

use crate::handlers::{
    AnswerSessionInput, BookingTools, CancelReservationInput, ConfirmSessionInput,
    CreateReservationInput, ReservationLookupInput, ReviseSessionInput, RoomLookupInput,
    SearchRoomsInput, SendNotificationInput, SessionLookupInput, StartSessionInput, ToolReply,
};

impl From<ToolReply> for CallToolResult {
    fn from(reply: ToolReply) -> Self {
        let content = vec![Content::text(reply.text())];
        if reply.is_error {
            CallToolResult::error(content)
        } else {
            CallToolResult::success(content)
        }
    }
}

#[derive(Clone)]
pub struct RoombookMcpServer {
    tools: BookingTools,
    tool_router: ToolRouter<Self>,
}

impl RoombookMcpServer {
    pub fn new(tools: BookingTools) -> Self {
        Self { tools, tool_router: Self::tool_router() }
    }

    pub fn tools(&self) -> &BookingTools {
        &self.tools
    }

    /// Names of every registered tool, sorted.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names = self
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    /// Serves on stdin/stdout until the client disconnects.
    pub async fn run_stdio(self) -> anyhow::Result<()> {
        info!(event_name = "mcp.server_starting", transport = "stdio", "starting MCP server");

        let service = self.serve(rmcp::transport::stdio()).await?;
        let quit_reason = service.waiting().await?;

        info!(event_name = "mcp.server_stopped", reason = ?quit_reason, "MCP server shutdown complete");
        Ok(())
    }
}

#[tool_router]
impl RoombookMcpServer {
    #[tool(description = "Find rooms free for a time window with at least the given capacity")]
    async fn search_available_rooms(
        &self,
        Parameters(input): Parameters<SearchRoomsInput>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.tools.search_available_rooms(input).await.into())
    }

    #[tool(description = "Show one room by id or name with its current status and upcoming reservations")]
    async fn get_room_info(
        &self,
        Parameters(input): Parameters<RoomLookupInput>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.tools.get_room_info(input).await.into())
    }

    #[tool(description = "List every room with its current status plus room and reservation statistics")]
    async fn list_rooms(&self) -> Result<CallToolResult, ErrorData> {
        Ok(self.tools.list_rooms().await.into())
    }

    #[tool(description = "Book a room directly when every reservation detail is already known")]
    async fn create_reservation(
        &self,
        Parameters(input): Parameters<CreateReservationInput>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.tools.create_reservation(input).await.into())
    }

    #[tool(description = "Show a reservation together with the room it is in")]
    async fn get_reservation_details(
        &self,
        Parameters(input): Parameters<ReservationLookupInput>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.tools.get_reservation_details(input).await.into())
    }

    #[tool(description = "Cancel a reservation, subject to the cancellation notice period")]
    async fn cancel_reservation(
        &self,
        Parameters(input): Parameters<CancelReservationInput>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.tools.cancel_reservation(input).await.into())
    }

    #[tool(description = "Send a confirmation or reminder message for an existing reservation")]
    async fn send_notification(
        &self,
        Parameters(input): Parameters<SendNotificationInput>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.tools.send_notification(input).await.into())
    }

    #[tool(description = "Start a booking dialog from a free-form request and return the first question")]
    async fn start_reservation_session(
        &self,
        Parameters(input): Parameters<StartSessionInput>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.tools.start_reservation_session(input).await.into())
    }

    #[tool(description = "Answer the current question of a booking dialog")]
    async fn answer_session(
        &self,
        Parameters(input): Parameters<AnswerSessionInput>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.tools.answer_session(input).await.into())
    }

    #[tool(description = "Change an already answered field of a booking dialog")]
    async fn revise_session(
        &self,
        Parameters(input): Parameters<ReviseSessionInput>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.tools.revise_session(input).await.into())
    }

    #[tool(description = "Show what a booking dialog has collected and what it asks next")]
    async fn get_session_status(
        &self,
        Parameters(input): Parameters<SessionLookupInput>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.tools.get_session_status(input).await.into())
    }

    #[tool(description = "Commit the reservation collected by a complete booking dialog")]
    async fn confirm_session(
        &self,
        Parameters(input): Parameters<ConfirmSessionInput>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.tools.confirm_session(input).await.into())
    }

    #[tool(description = "Discard a booking dialog without reserving anything")]
    async fn abandon_session(
        &self,
        Parameters(input): Parameters<SessionLookupInput>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.tools.abandon_session(input).await.into())
    }
}

#[tool_handler]
impl ServerHandler for RoombookMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "roombook-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::from_build_env()
            },
            instructions: Some(
                "Meeting room booking. Search and book rooms directly, or run a booking dialog: \
                 start_reservation_session, answer_session until nothing is missing, then \
                 confirm_session."
                    .to_string(),
            ),
            ..ServerInfo::default()
        }
    }
}
