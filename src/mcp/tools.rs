use crate::error::{GraphscopeError, Result};
use crate::investigate::{InvestigationRequest, Investigator};
use crate::mcp::types::{Tool, ToolsCallResult};
use crate::store::EntityStore;
use serde::Deserialize;
use serde_json::{json, Value};

pub const INVESTIGATE_TOOL: &str = "graphscope_investigate";
pub const LIST_TOOL: &str = "graphscope_list";

/// Get all tool definitions for tools/list
pub fn get_tool_definitions() -> Vec<Tool> {
    vec![
        Tool {
            name: INVESTIGATE_TOOL.to_string(),
            description: "Multi-hop investigation from a start entity: every connection within the requested depth, with cycle and size metadata".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Entity id or name to start from. Exact id wins over exact name, which wins over a partial name match."
                    },
                    "depth": {
                        "type": "integer",
                        "description": "Number of hops to expand",
                        "default": 1,
                        "minimum": 1,
                        "maximum": 3
                    },
                    "relationshipTypes": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Only traverse these relationship types. Omit or pass [] for all. Call graphscope_list with list_type=relationship_types to see available values."
                    }
                },
                "required": ["query"]
            }),
        },
        Tool {
            name: LIST_TOOL.to_string(),
            description: "List the relationship types or entity labels present in the graph".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "list_type": {
                        "type": "string",
                        "description": "Type of list to return",
                        "enum": ["relationship_types", "labels"]
                    }
                },
                "required": ["list_type"]
            }),
        },
    ]
}

/// Handle graphscope_investigate.
///
/// Caller mistakes come back as an `isError` tool result; store failures propagate as errors.
pub async fn handle_investigate(
    investigator: &Investigator,
    arguments: &Value,
) -> Result<ToolsCallResult> {
    let request: InvestigationRequest = match serde_json::from_value(arguments.clone()) {
        Ok(request) => request,
        Err(e) => {
            return Ok(ToolsCallResult::error(format!(
                "Invalid investigate params: {}",
                e
            )))
        }
    };

    match investigator.investigate(&request).await {
        Ok(result) => Ok(ToolsCallResult::text(result.to_json()?)),
        Err(e @ (GraphscopeError::InvalidDepth(_) | GraphscopeError::InvalidInput(_))) => {
            log::info!("Rejected investigate call: {}", e);
            Ok(ToolsCallResult::error(e.to_string()))
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Deserialize)]
struct ListParams {
    list_type: String,
}

/// Handle graphscope_list
pub async fn handle_list(store: &dyn EntityStore, arguments: &Value) -> Result<ToolsCallResult> {
    let params: ListParams = match serde_json::from_value(arguments.clone()) {
        Ok(params) => params,
        Err(e) => return Ok(ToolsCallResult::error(format!("Invalid list params: {}", e))),
    };

    let (noun, values) = match params.list_type.as_str() {
        "relationship_types" => ("relationship types", store.relationship_types().await?),
        "labels" => ("labels", store.labels().await?),
        other => {
            return Ok(ToolsCallResult::error(format!(
                "Unknown list_type: {} (expected relationship_types or labels)",
                other
            )))
        }
    };

    let mut text = format!("Found {} {}:\n\n", values.len(), noun);
    for value in values {
        text.push_str(&format!("- {}\n", value));
    }
    Ok(ToolsCallResult::text(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::investigate::InvestigationSettings;
    use crate::testutil::GraphFixture;
    use std::sync::Arc;

    fn fixture() -> GraphFixture {
        GraphFixture::new()
            .entity("A", "Acme", &["Company"])
            .entity("B", "Bob", &["Person"])
            .edge("A", "OWNED_BY", "B")
    }

    #[test]
    fn test_tool_definitions() {
        let tools = get_tool_definitions();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![INVESTIGATE_TOOL, LIST_TOOL]);
        assert_eq!(tools[0].input_schema["properties"]["depth"]["maximum"], 3);
    }

    #[tokio::test]
    async fn test_investigate_invalid_depth_is_tool_error() {
        let store = Arc::new(fixture().memory_store());
        let investigator = Investigator::new(store, InvestigationSettings::default()).unwrap();

        let result = handle_investigate(&investigator, &json!({"query": "A", "depth": 5}))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        assert!(result.content[0].text.contains("Invalid depth"));

        let missing = handle_investigate(&investigator, &json!({"depth": 1}))
            .await
            .unwrap();
        assert_eq!(missing.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_investigate_backend_failure_is_error() {
        let store = Arc::new(fixture().memory_store());
        store.set_unavailable(true);
        let investigator = Investigator::new(store, InvestigationSettings::default()).unwrap();

        let err = handle_investigate(&investigator, &json!({"query": "A"}))
            .await
            .unwrap_err();
        assert!(err.is_backend_failure());
    }

    #[tokio::test]
    async fn test_list_relationship_types_and_labels() {
        let store = fixture().memory_store();

        let types = handle_list(&store, &json!({"list_type": "relationship_types"}))
            .await
            .unwrap();
        assert!(types.content[0].text.contains("- OWNED_BY"));

        let labels = handle_list(&store, &json!({"list_type": "labels"})).await.unwrap();
        assert!(labels.content[0].text.starts_with("Found 2 labels"));

        let unknown = handle_list(&store, &json!({"list_type": "agents"})).await.unwrap();
        assert_eq!(unknown.is_error, Some(true));
    }
}
