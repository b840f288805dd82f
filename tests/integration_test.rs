//! Integration tests for the compliance gateway
//!
//! Every backend is a local mock server, so no API keys or Azure access are needed.

use async_trait::async_trait;
use compliance_gateway::config::{CompletionConfig, Settings};
use compliance_gateway::core::cloud::CloudGateway;
use compliance_gateway::core::completion::CompletionClient;
use compliance_gateway::core::credentials::{AccessToken, TokenCredential};
use compliance_gateway::core::mcp::MCPServer;
use compliance_gateway::error::ToolOutcome;
use compliance_gateway::{ErrorKind, ToolError, ToolRegistry, ToolRequest};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct StaticCredential;

#[async_trait]
impl TokenCredential for StaticCredential {
    fn name(&self) -> &'static str {
        "StaticCredential"
    }

    async fn get_token(&self, _scope: &str) -> ToolOutcome<AccessToken> {
        Ok(AccessToken {
            token: "integration-token".to_string(),
        })
    }
}

/// Registry whose completion and Azure endpoints all live on `server`.
fn registry_for(server: &MockServer) -> Arc<ToolRegistry> {
    let completion = CompletionClient::new(
        "test-key".to_string(),
        CompletionConfig {
            endpoint: format!("{}/v1/messages", server.uri()),
            model: "test-model".to_string(),
            api_version: "2023-06-01".to_string(),
        },
    );

    let mut cloud = Settings::default().cloud;
    cloud.log_analytics_endpoint = server.uri();
    cloud.management_endpoint = server.uri();
    let gateway = CloudGateway::new(Arc::new(StaticCredential), &server.uri(), &cloud).unwrap();

    Arc::new(ToolRegistry::with_gateways(
        Arc::new(completion),
        Arc::new(gateway),
    ))
}

async fn call(registry: &ToolRegistry, name: &str, arguments: Value) -> ToolOutcome<String> {
    registry.invoke(ToolRequest::new(name, arguments)).await
}

/// Feeds `input` to a server and collects every response line it writes.
async fn run_session(registry: Arc<ToolRegistry>, input: &str) -> Vec<Value> {
    let server = MCPServer::new(registry, Settings::default().server);

    let (client, server_side) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_side);
    let (mut client_read, mut client_write) = tokio::io::split(client);

    client_write.write_all(input.as_bytes()).await.unwrap();
    client_write.shutdown().await.unwrap();

    server.serve(server_read, server_write).await.unwrap();

    let mut output = String::new();
    client_read.read_to_string(&mut output).await.unwrap();
    output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_registry_exposes_five_tools() {
    let mock_server = MockServer::start().await;
    let registry = registry_for(&mock_server);

    assert_eq!(
        registry.tool_names(),
        vec![
            "analyze_compliance",
            "check_storage_encryption",
            "fetch_blob_text",
            "generate_audit_report",
            "query_logs",
        ]
    );
    for metadata in registry.list_tools() {
        assert!(!metadata.description.is_empty());
        assert_eq!(metadata.input_schema()["type"], json!("object"));
    }

    let description = registry.tools_description();
    assert!(description.contains("Tool: query_logs"));
    assert!(description.contains("default \"P1D\""));
}

#[tokio::test]
async fn test_analyze_compliance_end_to_end() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(body_partial_json(json!({"model": "test-model", "temperature": 0.2})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "HIPAA: Non-Compliant"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let registry = registry_for(&mock_server);
    let out = call(
        &registry,
        "analyze_compliance",
        json!({"document_content": "PHI is emailed unencrypted.", "standard": "HIPAA"}),
    )
    .await
    .unwrap();
    assert_eq!(out, "HIPAA: Non-Compliant");

    let requests = mock_server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["messages"][0]["content"].as_str().unwrap();
    assert!(prompt.contains("HIPAA"));
    assert!(prompt.contains("PHI is emailed unencrypted."));
}

#[tokio::test]
async fn test_audit_report_surfaces_upstream_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let registry = registry_for(&mock_server);
    let err = call(
        &registry,
        "generate_audit_report",
        json!({"findings": "No MFA on admin accounts", "scope": "IAM", "timeframe": "Q2 2024"}),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UpstreamError);
    assert!(err.to_string().contains("529"));
}

#[tokio::test]
async fn test_fetch_blob_text_end_to_end() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/policies/2024/access.txt"))
        .and(header("authorization", "Bearer integration-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Access reviews are quarterly."))
        .mount(&mock_server)
        .await;

    let registry = registry_for(&mock_server);
    let out = call(
        &registry,
        "fetch_blob_text",
        json!({"container": "policies", "blob_name": "2024/access.txt"}),
    )
    .await
    .unwrap();
    assert_eq!(out, "Access reviews are quarterly.");

    let missing = call(
        &registry,
        "fetch_blob_text",
        json!({"container": "policies", "blob_name": "gone.txt"}),
    )
    .await
    .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_query_logs_end_to_end() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws-1/query"))
        .and(body_partial_json(json!({"query": "SigninLogs | take 2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tables": [{
                "name": "PrimaryResult",
                "columns": [
                    {"name": "User", "type": "string"},
                    {"name": "Result", "type": "string"}
                ],
                "rows": [["alice", "Success, MFA"], ["bob", null]]
            }]
        })))
        .mount(&mock_server)
        .await;

    let registry = registry_for(&mock_server);
    let csv = call(
        &registry,
        "query_logs",
        json!({"workspace_id": "ws-1", "query": "SigninLogs | take 2", "timespan": "PT1H"}),
    )
    .await
    .unwrap();
    assert_eq!(csv, "User,Result\nalice,Success; MFA\nbob,\n");

    let piped = call(
        &registry,
        "query_logs",
        json!({"workspace_id": "ws-1", "query": "SigninLogs | take 2", "as_csv": false}),
    )
    .await
    .unwrap();
    assert_eq!(piped, "User | Result\nalice | Success, MFA\nbob | \n");
}

#[tokio::test]
async fn test_check_storage_encryption_end_to_end() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(
            "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Storage/storageAccounts/acct1",
        ))
        .and(query_param("api-version", "2023-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "acct1",
            "properties": {"encryption": {"services": {"blob": {"enabled": true}}}}
        })))
        .mount(&mock_server)
        .await;

    let registry = registry_for(&mock_server);
    let out = call(
        &registry,
        "check_storage_encryption",
        json!({"subscription_id": "sub-1", "resource_group": "rg-1", "storage_account_name": "acct1"}),
    )
    .await
    .unwrap();
    assert_eq!(out, "Encryption BLOB: Turned On");
}

#[tokio::test]
async fn test_invoke_rejects_bad_requests_without_network() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let registry = registry_for(&mock_server);

    let unknown = call(&registry, "delete_everything", json!({})).await.unwrap_err();
    assert!(matches!(unknown, ToolError::UnknownTool(_)));
    assert_eq!(unknown.kind(), ErrorKind::InvalidArgument);

    let not_object = call(&registry, "query_logs", json!(["ws", "q"])).await.unwrap_err();
    assert_eq!(not_object.kind(), ErrorKind::InvalidArgument);

    let bad_span = call(
        &registry,
        "query_logs",
        json!({"workspace_id": "ws", "query": "T", "timespan": "yesterday"}),
    )
    .await
    .unwrap_err();
    assert_eq!(bad_span.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_cancellation_aborts_slow_backend() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(30))
                .set_body_json(json!({"content": [{"type": "text", "text": "late"}]})),
        )
        .mount(&mock_server)
        .await;

    let registry = registry_for(&mock_server);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let request = ToolRequest::new("analyze_compliance", json!({"document_content": "doc"}))
        .with_cancellation(cancel);
    let outcome = tokio::time::timeout(Duration::from_secs(5), registry.invoke(request))
        .await
        .expect("cancellation should end the call promptly");

    assert!(matches!(outcome, Err(ToolError::Cancelled)));
}

#[tokio::test]
async fn test_mcp_session_lists_and_calls_tools() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": {"encryption": {"services": {"blob": {"enabled": false}}}}
        })))
        .mount(&mock_server)
        .await;

    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"check_storage_encryption","arguments":{"subscription_id":"s","resource_group":"r","storage_account_name":"a"}}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"fetch_blob_text","arguments":{"container":"c"}}}"#,
        "\n",
    );

    let mut responses = run_session(registry_for(&mock_server), input).await;
    responses.sort_by_key(|response| response["id"].as_i64());
    assert_eq!(responses.len(), 4);

    let tools = responses[1]["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 5);
    let query_logs = tools.iter().find(|t| t["name"] == "query_logs").unwrap();
    assert_eq!(
        query_logs["inputSchema"]["required"],
        json!(["workspace_id", "query"])
    );

    assert_eq!(responses[2]["result"]["isError"], json!(false));
    assert_eq!(
        responses[2]["result"]["content"][0]["text"],
        json!("Encryption BLOB: Turned Off")
    );

    assert_eq!(responses[3]["result"]["isError"], json!(true));
    assert_eq!(
        responses[3]["result"]["_meta"]["errorKind"],
        json!("InvalidArgument")
    );
}

#[tokio::test]
async fn test_mcp_cancelled_call_gets_no_response() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(30))
                .set_body_json(json!({"content": [{"type": "text", "text": "late"}]})),
        )
        .mount(&mock_server)
        .await;

    let input = concat!(
        r#"{"jsonrpc":"2.0","id":"call-1","method":"tools/call","params":{"name":"analyze_compliance","arguments":{"document_content":"doc"}}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":"call-1","reason":"user abort"}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":"ping-1","method":"ping"}"#,
        "\n",
    );

    let responses = tokio::time::timeout(
        Duration::from_secs(5),
        run_session(registry_for(&mock_server), input),
    )
    .await
    .expect("server should not wait on the cancelled call");

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["id"], json!("ping-1"));
    assert_eq!(responses[0]["result"], json!({}));
}

#[tokio::test]
async fn test_mcp_reused_in_flight_id_is_rejected() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(30))
                .set_body_json(json!({"content": [{"type": "text", "text": "late"}]})),
        )
        .mount(&mock_server)
        .await;

    let input = concat!(
        r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"analyze_compliance","arguments":{"document_content":"first"}}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"analyze_compliance","arguments":{"document_content":"second"}}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":7}}"#,
        "\n",
    );

    let responses = tokio::time::timeout(
        Duration::from_secs(5),
        run_session(registry_for(&mock_server), input),
    )
    .await
    .expect("cancellation should still reach the original call");

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["id"], json!(7));
    assert_eq!(responses[0]["error"]["code"], json!(-32600));
}
