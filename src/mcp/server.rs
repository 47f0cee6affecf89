use crate::error::{GraphscopeError, Result};
use crate::investigate::Investigator;
use crate::mcp::tools;
use crate::mcp::types::*;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader as AsyncBufReader};

/// MCP Server implementation
pub struct McpServer {
    investigator: Investigator,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(investigator: Investigator) -> Self {
        Self { investigator }
    }

    /// Process an MCP JSON-RPC request
    ///
    /// # Returns
    /// * `Ok(Some(response))` - Response to send back to client
    /// * `Ok(None)` - Notification (no response needed)
    pub async fn process_mcp_request(
        &self,
        request: JsonRpcRequest,
        initialized: &mut bool,
    ) -> Result<Option<JsonRpcResponse>> {
        // Notifications carry no id and get no response
        let id = match &request.id {
            Some(id) => id.clone(),
            None => {
                if request.method == "notifications/initialized" {
                    *initialized = true;
                }
                return Ok(None);
            }
        };

        if request.jsonrpc != "2.0" {
            return Ok(Some(JsonRpcResponse::error(
                id,
                error_codes::INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", request.jsonrpc),
                None,
            )));
        }

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(&id, &request.params),
            "tools/list" => self.handle_tools_list(&id),
            "tools/call" => self.handle_tools_call(&id, &request.params).await,
            "shutdown" => Ok(JsonRpcResponse::result(&id, Value::Null)),
            _ => Ok(JsonRpcResponse::error(
                id.clone(),
                error_codes::METHOD_NOT_FOUND,
                format!("Unknown method: {}", request.method),
                None,
            )),
        };

        match response {
            Ok(resp) => Ok(Some(resp)),
            Err(e) => {
                let code = if e.is_backend_failure() {
                    error_codes::BACKEND_UNAVAILABLE
                } else {
                    error_codes::INTERNAL_ERROR
                };
                log::error!("{} failed: {}", request.method, e);
                Ok(Some(JsonRpcResponse::error(
                    id,
                    code,
                    e.to_string(),
                    Some(serde_json::json!({ "details": e.to_string() })),
                )))
            }
        }
    }

    /// Run the MCP server (reads from stdin, writes to stdout)
    pub async fn run(&self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdin_reader = AsyncBufReader::new(stdin);
        let mut stdout = tokio::io::stdout();

        let mut line = String::new();
        let mut initialized = false;

        // stdout carries protocol frames only
        log::info!(
            "Graphscope MCP server v{} starting (strategy: {})",
            env!("CARGO_PKG_VERSION"),
            self.investigator.strategy_name()
        );

        loop {
            line.clear();
            let bytes_read = stdin_reader.read_line(&mut line).await?;

            // EOF - client disconnected
            if bytes_read == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(req) => req,
                Err(e) => {
                    let id = extract_id_from_line(trimmed).unwrap_or(Value::Null);
                    let error_response = JsonRpcResponse::error(
                        id,
                        error_codes::PARSE_ERROR,
                        format!("Parse error: {}", e),
                        None,
                    );
                    send_response(&mut stdout, &error_response).await?;
                    continue;
                }
            };

            let was_initialized = initialized;
            if let Some(response) = self.process_mcp_request(request, &mut initialized).await? {
                send_response(&mut stdout, &response).await?;
            } else if initialized && !was_initialized {
                log::info!("Client initialized");
            }
        }

        log::info!("MCP server shutting down");
        Ok(())
    }

    fn handle_initialize(&self, id: &JsonRpcId, params: &Option<Value>) -> Result<JsonRpcResponse> {
        let params: InitializeParams =
            serde_json::from_value(params.clone().unwrap_or(serde_json::json!({})))
                .map_err(|e| GraphscopeError::McpProtocol(format!("Invalid initialize params: {}", e)))?;

        // Support protocol version 2024-11-05 and 2025-06-18
        let protocol_version = if params.protocol_version.starts_with("2024")
            || params.protocol_version.starts_with("2025")
        {
            "2024-11-05".to_string()
        } else {
            params.protocol_version.clone()
        };

        let result = InitializeResult {
            protocol_version,
            capabilities: serde_json::json!({
                "tools": {}
            }),
            server_info: ServerInfo {
                name: "graphscope".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        Ok(JsonRpcResponse::result(id, serde_json::to_value(&result)?))
    }

    fn handle_tools_list(&self, id: &JsonRpcId) -> Result<JsonRpcResponse> {
        let result = ToolsListResult {
            tools: tools::get_tool_definitions(),
        };
        Ok(JsonRpcResponse::result(id, serde_json::to_value(&result)?))
    }

    async fn handle_tools_call(
        &self,
        id: &JsonRpcId,
        params: &Option<Value>,
    ) -> Result<JsonRpcResponse> {
        let params: ToolsCallParams = serde_json::from_value(params.clone().ok_or_else(|| {
            GraphscopeError::McpProtocol("Missing params for tools/call".to_string())
        })?)
        .map_err(|e| GraphscopeError::McpProtocol(format!("Invalid tools/call params: {}", e)))?;

        let result = match params.name.as_str() {
            tools::INVESTIGATE_TOOL => {
                tools::handle_investigate(&self.investigator, &params.arguments).await?
            }
            tools::LIST_TOOL => {
                tools::handle_list(self.investigator.store(), &params.arguments).await?
            }
            _ => {
                return Ok(JsonRpcResponse::error(
                    id.clone(),
                    error_codes::INVALID_PARAMS,
                    format!("Unknown tool: {}", params.name),
                    None,
                ));
            }
        };

        Ok(JsonRpcResponse::result(id, serde_json::to_value(&result)?))
    }
}

/// Send JSON-RPC response to stdout (newline-delimited)
async fn send_response(stdout: &mut tokio::io::Stdout, response: &JsonRpcResponse) -> Result<()> {
    let json = serde_json::to_string(response)?;
    stdout.write_all(json.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

/// Extract ID from JSON line (for error handling)
fn extract_id_from_line(line: &str) -> Option<Value> {
    let id_start = line.find(r#""id":"#)?;
    let id_str = &line[id_start + 5..];
    let id_end = id_str.find([',', '}'])?;
    let id_val = id_str[..id_end].trim();
    if id_val.len() >= 2 && id_val.starts_with('"') && id_val.ends_with('"') {
        Some(Value::String(id_val[1..id_val.len() - 1].to_string()))
    } else {
        id_val.parse::<i64>().ok().map(|num| Value::Number(num.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::investigate::InvestigationSettings;
    use crate::store::MemoryStore;
    use crate::testutil::GraphFixture;
    use std::sync::Arc;

    fn server_with(store: Arc<MemoryStore>) -> McpServer {
        McpServer::new(Investigator::new(store, InvestigationSettings::default()).unwrap())
    }

    fn triangle_store() -> Arc<MemoryStore> {
        Arc::new(
            GraphFixture::new()
                .entity("A", "Alpha", &["Company"])
                .entity("B", "Beta", &["Person"])
                .entity("C", "Gamma", &["Account"])
                .edge("A", "OWNED_BY", "B")
                .edge("B", "CONTACTED_VIA", "C")
                .edge("C", "OWNED_BY", "A")
                .memory_store(),
        )
    }

    async fn call(server: &McpServer, raw: &str) -> Value {
        let request: JsonRpcRequest = serde_json::from_str(raw).unwrap();
        let mut initialized = true;
        let response = server
            .process_mcp_request(request, &mut initialized)
            .await
            .unwrap()
            .unwrap();
        serde_json::to_value(&response).unwrap()
    }

    #[test]
    fn test_extract_id_from_line() {
        let line = r#"{"jsonrpc":"2.0","id":"test-123","method":"test"}"#;
        assert_eq!(extract_id_from_line(line), Some(Value::String("test-123".to_string())));

        let line = r#"{"jsonrpc":"2.0","id":42,"method":"test"}"#;
        assert_eq!(extract_id_from_line(line), Some(Value::Number(42.into())));

        let line = r#"{"jsonrpc":"2.0","method":"x","id":9}"#;
        assert_eq!(extract_id_from_line(line), Some(Value::Number(9.into())));
    }

    #[test]
    fn test_json_rpc_request_parsing() {
        let json = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#;
        let request: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.method, "initialize");
        assert_eq!(request.jsonrpc, "2.0");
    }

    #[tokio::test]
    async fn test_initialize_and_notification() {
        let server = server_with(triangle_store());
        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-06-18"}}"#,
        )
        .await;
        assert_eq!(response["result"]["serverInfo"]["name"], "graphscope");
        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");

        let notification: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        let mut initialized = false;
        let none = server
            .process_mcp_request(notification, &mut initialized)
            .await
            .unwrap();
        assert!(none.is_none());
        assert!(initialized);
    }

    #[tokio::test]
    async fn test_tools_call_investigate() {
        let server = server_with(triangle_store());
        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"graphscope_investigate","arguments":{"query":"A","depth":3}}}"#,
        )
        .await;

        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        let body: Value = serde_json::from_str(text).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["metadata"]["cyclesDetected"], 1);
        assert_eq!(body["connections"][0]["relationshipType"], "OWNED_BY");
        assert_eq!(body["connections"][0]["hopDistance"], 1);
    }

    #[tokio::test]
    async fn test_tools_call_invalid_depth_is_tool_error() {
        let server = server_with(triangle_store());
        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"graphscope_investigate","arguments":{"query":"A","depth":0}}}"#,
        )
        .await;
        assert_eq!(response["result"]["isError"], true);
    }

    #[tokio::test]
    async fn test_backend_failure_is_json_rpc_error() {
        let store = triangle_store();
        store.set_unavailable(true);
        let server = server_with(store);
        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"graphscope_investigate","arguments":{"query":"A"}}}"#,
        )
        .await;
        assert_eq!(response["error"]["code"], error_codes::BACKEND_UNAVAILABLE);
        assert!(response.get("result").is_none());
    }

    #[tokio::test]
    async fn test_unknown_method_and_tool() {
        let server = server_with(triangle_store());
        let response = call(&server, r#"{"jsonrpc":"2.0","id":5,"method":"resources/list"}"#).await;
        assert_eq!(response["error"]["code"], error_codes::METHOD_NOT_FOUND);

        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"graphscope_search","arguments":{}}}"#,
        )
        .await;
        assert_eq!(response["error"]["code"], error_codes::INVALID_PARAMS);

        let response = call(&server, r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#).await;
        assert_eq!(response["result"]["tools"].as_array().unwrap().len(), 2);
    }
}
