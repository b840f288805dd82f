use anyhow::{Context, Result};
use clap::Parser;
use compliance_gateway::cli::{Cli, Commands};
use compliance_gateway::core::mcp::{tools_list_result, MCPServer};
use compliance_gateway::{build_registry, utils, Settings, ToolRegistry, ToolRequest};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::new().context("Failed to load configuration")?;

    // stdout carries the MCP protocol; logs must stay on stderr.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let registry = Arc::new(build_registry(&settings)?);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => handle_serve(registry, settings).await,
        Commands::ListTools { json } => handle_list_tools(&registry, json),
        Commands::Call { tool, args } => handle_call(&registry, tool, args).await,
    }
}

async fn handle_serve(registry: Arc<ToolRegistry>, settings: Settings) -> Result<()> {
    let server = MCPServer::new(registry, settings.server);
    server.serve(tokio::io::stdin(), tokio::io::stdout()).await
}

fn handle_list_tools(registry: &ToolRegistry, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&tools_list_result(registry))?);
        return Ok(());
    }

    utils::print_header(&format!("Registered tools ({})", registry.tool_names().len()));
    println!("{}\n", registry.tools_description());
    Ok(())
}

async fn handle_call(registry: &ToolRegistry, tool: String, args: String) -> Result<()> {
    let arguments: Value =
        serde_json::from_str(&args).context("--args must be a JSON object")?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    utils::print_info(&format!("Calling {}...", tool));
    let request = ToolRequest::new(tool, arguments).with_cancellation(cancel);

    match registry.invoke(request).await {
        Ok(text) => {
            println!("{}", text);
            Ok(())
        }
        Err(e) => {
            utils::print_error(&format!("[{}] {}", e.kind(), e));
            Err(anyhow::anyhow!("tool call failed"))
        }
    }
}
