//! MCP server over newline-delimited JSON-RPC 2.0
//!
//! One reader loop parses requests, each `tools/call` runs on its own task,
//! and a single writer task owns the output stream so concurrent responses
//! never interleave.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::{ToolError, ToolOutcome};
use crate::tools::registry::ToolRegistry;
use crate::tools::ToolRequest;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i32 = -32700;
const INVALID_REQUEST: i32 = -32600;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;

const OUTBOUND_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
struct MCPRequest {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct MCPResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<MCPError>,
}

#[derive(Debug, Serialize)]
struct MCPError {
    code: i32,
    message: String,
}

impl MCPResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(MCPError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelledParams {
    request_id: Value,
    #[serde(default)]
    reason: Option<String>,
}

type InFlight = Arc<Mutex<HashMap<String, CancellationToken>>>;

pub struct MCPServer {
    registry: Arc<ToolRegistry>,
    info: ServerConfig,
}

impl MCPServer {
    pub fn new(registry: Arc<ToolRegistry>, info: ServerConfig) -> Self {
        Self { registry, info }
    }

    /// Serves until `reader` hits EOF, then waits for in-flight calls to
    /// answer before returning.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, receiver) = channel(OUTBOUND_BUFFER);
        let writer_task = tokio::spawn(write_loop(writer, receiver));

        let in_flight: InFlight = Arc::new(Mutex::new(HashMap::new()));
        let mut calls = JoinSet::new();
        let mut lines = BufReader::new(reader).split(b'\n');

        tracing::info!(
            "MCP server '{}' v{} listening on stdio ({} tools)",
            self.info.name,
            self.info.version,
            self.registry.tool_names().len()
        );

        while let Some(bytes) = lines.next_segment().await? {
            let request = match parse_request(&bytes) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(response) => {
                    send(&outbound, response).await;
                    continue;
                }
            };

            self.dispatch(request, &outbound, &in_flight, &mut calls).await;

            // Reap finished calls so the set does not grow without bound.
            while calls.try_join_next().is_some() {}
        }

        tracing::info!("Input closed, waiting for {} in-flight call(s)", calls.len());
        while calls.join_next().await.is_some() {}

        drop(outbound);
        writer_task.await??;
        tracing::info!("MCP server shutdown complete");
        Ok(())
    }

    async fn dispatch(
        &self,
        request: MCPRequest,
        outbound: &Sender<String>,
        in_flight: &InFlight,
        calls: &mut JoinSet<()>,
    ) {
        let MCPRequest { id, method, params } = request;

        let Some(method) = method else {
            // Responses to requests we never send; only complain about real garbage.
            if id.is_none() {
                send(outbound, MCPResponse::error(Value::Null, INVALID_REQUEST, "missing method"))
                    .await;
            }
            return;
        };

        let Some(id) = id else {
            self.handle_notification(&method, params, in_flight);
            return;
        };

        tracing::debug!("Received request {} ({})", id, method);

        match method.as_str() {
            "initialize" => {
                send(outbound, MCPResponse::result(id, self.initialize_result())).await;
            }
            "ping" => {
                send(outbound, MCPResponse::result(id, json!({}))).await;
            }
            "tools/list" => {
                send(outbound, MCPResponse::result(id, tools_list_result(&self.registry))).await;
            }
            "tools/call" => match serde_json::from_value::<CallToolParams>(params) {
                Ok(call) => self.spawn_call(id, call, outbound, in_flight, calls).await,
                Err(e) => {
                    send(
                        outbound,
                        MCPResponse::error(id, INVALID_PARAMS, format!("invalid tools/call params: {}", e)),
                    )
                    .await;
                }
            },
            other => {
                send(
                    outbound,
                    MCPResponse::error(id, METHOD_NOT_FOUND, format!("method not found: {}", other)),
                )
                .await;
            }
        }
    }

    fn handle_notification(&self, method: &str, params: Value, in_flight: &InFlight) {
        match method {
            "notifications/cancelled" => match serde_json::from_value::<CancelledParams>(params) {
                Ok(cancel) => {
                    let key = cancel.request_id.to_string();
                    let token = in_flight.lock().ok().and_then(|map| map.get(&key).cloned());
                    match token {
                        Some(token) => {
                            tracing::info!(
                                "Cancelling request {} ({})",
                                key,
                                cancel.reason.as_deref().unwrap_or("no reason given")
                            );
                            token.cancel();
                        }
                        None => tracing::debug!("Cancel for unknown or finished request {}", key),
                    }
                }
                Err(e) => tracing::warn!("Ignoring malformed cancellation: {}", e),
            },
            "notifications/initialized" => tracing::debug!("Client initialized"),
            other => tracing::debug!("Ignoring notification {}", other),
        }
    }

    async fn spawn_call(
        &self,
        id: Value,
        call: CallToolParams,
        outbound: &Sender<String>,
        in_flight: &InFlight,
        calls: &mut JoinSet<()>,
    ) {
        let key = id.to_string();
        let cancel = CancellationToken::new();
        let duplicate = match in_flight.lock() {
            Ok(map) if map.contains_key(&key) => true,
            Ok(mut map) => {
                map.insert(key.clone(), cancel.clone());
                false
            }
            Err(_) => false,
        };
        if duplicate {
            tracing::warn!("Rejecting tools/call with in-flight id {}", key);
            send(
                outbound,
                MCPResponse::error(id, INVALID_REQUEST, "request id already in flight"),
            )
            .await;
            return;
        }

        let registry = self.registry.clone();
        let outbound = outbound.clone();
        let in_flight = in_flight.clone();

        calls.spawn(async move {
            tracing::info!("Calling tool '{}' (request {})", call.name, key);
            let request = ToolRequest::new(call.name.clone(), call.arguments).with_cancellation(cancel);
            let outcome = registry.invoke(request).await;

            if let Ok(mut map) = in_flight.lock() {
                map.remove(&key);
            }

            if let Err(ToolError::Cancelled) = outcome {
                // The client abandoned this id; MCP forbids answering it.
                tracing::info!("Tool '{}' cancelled (request {})", call.name, key);
                return;
            }
            if let Err(e) = &outcome {
                tracing::error!("Tool '{}' failed [{}]: {}", call.name, e.kind(), e);
            }

            send(&outbound, MCPResponse::result(id, tool_call_result(outcome))).await;
        });
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": self.info.name,
                "version": self.info.version
            }
        })
    }
}

/// Decodes one input line. Blank lines yield `Ok(None)`; anything that is not
/// a JSON-RPC object yields the error response to send back.
fn parse_request(bytes: &[u8]) -> std::result::Result<Option<MCPRequest>, MCPResponse> {
    let line = std::str::from_utf8(bytes).map_err(|e| {
        tracing::warn!("Discarding non UTF-8 message: {}", e);
        MCPResponse::error(Value::Null, PARSE_ERROR, format!("invalid UTF-8: {}", e))
    })?;
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(line).map_err(|e| {
        tracing::warn!("Discarding unparseable message: {}", e);
        MCPResponse::error(Value::Null, PARSE_ERROR, e.to_string())
    })?;

    if !value.is_object() {
        return Err(MCPResponse::error(Value::Null, INVALID_REQUEST, "request must be a JSON object"));
    }
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map(Some).map_err(|e| {
        tracing::warn!("Discarding malformed request: {}", e);
        MCPResponse::error(id, INVALID_REQUEST, e.to_string())
    })
}

/// `tools/list` result body for every registered tool.
pub fn tools_list_result(registry: &ToolRegistry) -> Value {
    let tools: Vec<Value> = registry
        .list_tools()
        .iter()
        .map(|metadata| {
            json!({
                "name": metadata.name,
                "description": metadata.description,
                "inputSchema": metadata.input_schema()
            })
        })
        .collect();
    json!({ "tools": tools })
}

fn tool_call_result(outcome: ToolOutcome<String>) -> Value {
    match outcome {
        Ok(text) => json!({
            "content": [{ "type": "text", "text": text }],
            "isError": false
        }),
        Err(e) => json!({
            "content": [{ "type": "text", "text": e.to_string() }],
            "isError": true,
            "_meta": { "errorKind": e.kind() }
        }),
    }
}

async fn send(outbound: &Sender<String>, response: MCPResponse) {
    match serde_json::to_string(&response) {
        Ok(line) => {
            if outbound.send(line).await.is_err() {
                tracing::error!("Writer task gone, dropping response {}", response.id);
            }
        }
        Err(e) => tracing::error!("Failed to serialize response: {}", e),
    }
}

async fn write_loop<W>(mut writer: W, mut receiver: Receiver<String>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = receiver.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}
