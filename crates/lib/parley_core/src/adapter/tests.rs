//! Tests for discovery and proxied invocation against an in-memory server.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{Map, Value, json};

    use crate::adapter::{ProxyTool, build_tools, is_denied};
    use crate::agent::AgentTool;
    use crate::failure::FailureClass;
    use crate::mcp::{McpError, ToolDescriptor, ToolResponse, ToolServer};

    type Call = (String, Option<Map<String, Value>>);

    /// In-memory Tool Server that records every call.
    struct FakeServer {
        tools: Option<Vec<ToolDescriptor>>,
        response: Mutex<Option<Result<Value, String>>>,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeServer {
        fn with_tools(tools: Vec<ToolDescriptor>) -> Arc<Self> {
            Arc::new(Self {
                tools: Some(tools),
                response: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing_discovery() -> Arc<Self> {
            Arc::new(Self {
                tools: None,
                response: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn respond(&self, response: Result<Value, String>) {
            *self.response.lock().unwrap() = Some(response);
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolServer for FakeServer {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
            self.tools
                .clone()
                .ok_or_else(|| McpError::Discovery("connection closed".into()))
        }

        async fn call_tool(
            &self,
            name: &str,
            arguments: Option<Map<String, Value>>,
        ) -> Result<ToolResponse, McpError> {
            self.calls
                .lock()
                .unwrap()
                .push((name.to_string(), arguments));
            match self.response.lock().unwrap().clone() {
                Some(Ok(value)) => Ok(ToolResponse::from_value(value)),
                Some(Err(message)) => Err(McpError::CallFailed(message)),
                None => Ok(ToolResponse::Structured(json!([]))),
            }
        }
    }

    fn descriptor(name: &str, schema: Value) -> ToolDescriptor {
        ToolDescriptor {
            name: name.into(),
            description: format!("{name} description"),
            parameter_schema: schema,
        }
    }

    fn supabase_tools() -> Vec<ToolDescriptor> {
        vec![
            descriptor(
                "list_tables",
                json!({
                    "type": "object",
                    "properties": { "project_id": { "type": "string" } },
                    "required": ["project_id"],
                }),
            ),
            descriptor(
                "execute_sql",
                json!({
                    "type": "object",
                    "properties": {
                        "project_id": { "type": "string" },
                        "query": { "type": "string" },
                    },
                    "required": ["project_id", "query"],
                }),
            ),
            descriptor("deploy_edge_function", json!({ "type": "object" })),
            descriptor("broken", json!("not a schema")),
            descriptor("list_projects", json!({ "type": "object" })),
        ]
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    async fn tool_named(server: Arc<FakeServer>, name: &str) -> ProxyTool {
        build_tools(server)
            .await
            .into_iter()
            .find(|t| t.spec().name == name)
            .unwrap_or_else(|| panic!("tool {name} was not built"))
    }

    #[tokio::test]
    async fn build_skips_denied_and_broken_tools() {
        let tools = build_tools(FakeServer::with_tools(supabase_tools())).await;
        let names: Vec<&str> = tools.iter().map(|t| t.spec().name.as_str()).collect();
        assert_eq!(names, ["list_tables", "execute_sql", "list_projects"]);
    }

    #[tokio::test]
    async fn denied_tool_never_appears_across_discoveries() {
        let server = FakeServer::with_tools(supabase_tools());
        for _ in 0..3 {
            let tools = build_tools(server.clone()).await;
            assert!(tools.iter().all(|t| !is_denied(&t.spec().name)));
        }
    }

    #[tokio::test]
    async fn discovery_failure_yields_no_tools() {
        let tools = build_tools(FakeServer::failing_discovery()).await;
        assert!(tools.is_empty());
    }

    #[tokio::test]
    async fn descriptions_are_framed_as_database_tools() {
        let tool = tool_named(FakeServer::with_tools(supabase_tools()), "execute_sql").await;
        assert!(
            tool.spec()
                .description
                .starts_with("Database tool: execute_sql description.")
        );
    }

    #[tokio::test]
    async fn list_tables_exposes_schemas_filter() {
        let tool = tool_named(FakeServer::with_tools(supabase_tools()), "list_tables").await;
        assert_eq!(
            tool.spec().signature(),
            "list_tables(project_id: string, schemas: list<string> = [])"
        );
    }

    #[tokio::test]
    async fn null_list_argument_reaches_server_as_empty_list() {
        let server = FakeServer::with_tools(supabase_tools());
        let tool = tool_named(server.clone(), "list_tables").await;

        tool.invoke(args(json!({ "project_id": "abc", "schemas": null })))
            .await;

        let calls = server.calls();
        assert_eq!(calls.len(), 1);
        let (name, sent) = &calls[0];
        assert_eq!(name, "list_tables");
        assert_eq!(
            sent.as_ref().unwrap(),
            &args(json!({ "project_id": "abc", "schemas": [] }))
        );
    }

    #[tokio::test]
    async fn omitted_optional_list_reaches_server_as_empty_list() {
        let server = FakeServer::with_tools(vec![descriptor(
            "get_logs",
            json!({
                "type": "object",
                "properties": {
                    "services": { "type": ["array", "null"], "items": { "type": "string" } },
                },
            }),
        )]);
        let tool = tool_named(server.clone(), "get_logs").await;

        tool.invoke(Map::new()).await;

        assert_eq!(server.calls()[0].1, Some(args(json!({ "services": [] }))));
    }

    #[tokio::test]
    async fn empty_arguments_are_sent_as_absent() {
        let server = FakeServer::with_tools(supabase_tools());
        let tool = tool_named(server.clone(), "list_projects").await;

        tool.invoke(Map::new()).await;

        assert_eq!(server.calls()[0].1, None);
    }

    #[tokio::test]
    async fn json_text_responses_are_parsed() {
        let server = FakeServer::with_tools(supabase_tools());
        server.respond(Ok(json!({ "content": [{ "type": "text", "text": "{\"a\":1}" }] })));
        let tool = tool_named(server, "list_projects").await;

        assert_eq!(tool.invoke(Map::new()).await, json!({ "a": 1 }));
    }

    #[tokio::test]
    async fn plain_text_responses_are_returned_as_text() {
        let server = FakeServer::with_tools(supabase_tools());
        server.respond(Ok(json!({ "content": [{ "type": "text", "text": "plain" }] })));
        let tool = tool_named(server, "list_projects").await;

        assert_eq!(tool.invoke(Map::new()).await, json!("plain"));
    }

    #[tokio::test]
    async fn unauthorized_failures_are_classifiable() {
        let server = FakeServer::with_tools(supabase_tools());
        server.respond(Err("HTTP 401: invalid access token".into()));
        let tool = tool_named(server, "list_projects").await;

        let result = tool.invoke(Map::new()).await;
        let text = result.as_str().expect("failure should be a string");
        assert_eq!(FailureClass::classify(text), FailureClass::Unauthorized);
        assert!(text.contains("invalid access token"));
    }

    #[tokio::test]
    async fn missing_required_argument_is_reported_not_raised() {
        let server = FakeServer::with_tools(supabase_tools());
        let tool = tool_named(server.clone(), "execute_sql").await;

        let result = tool.invoke(args(json!({ "project_id": "abc" }))).await;

        assert_eq!(
            result,
            json!("Database query failed: missing required argument 'query'")
        );
        assert!(server.calls().is_empty(), "server must not be called");
    }

    #[tokio::test]
    async fn call_surfaces_typed_errors() {
        let server = FakeServer::with_tools(supabase_tools());
        server.respond(Err("boom".into()));
        let tool = tool_named(server, "list_projects").await;

        let err = tool.call(Map::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Tool call failed: boom");
    }
}
