use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "compliance-gateway")]
#[command(author, version, about = "MCP tool server for compliance analysis and Azure inspection", long_about = None)]
pub struct Cli {
    /// Defaults to `serve` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve MCP requests over stdin/stdout
    Serve,

    /// Print every registered tool with its parameters
    ListTools {
        /// Print the `tools/list` JSON instead of a text listing
        #[arg(long)]
        json: bool,
    },

    /// Run a single tool once and print its result
    Call {
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_call() {
        let cli = Cli::try_parse_from([
            "compliance-gateway",
            "call",
            "query_logs",
            "--args",
            r#"{"workspace_id":"ws"}"#,
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Call { tool, args }) => {
                assert_eq!(tool, "query_logs");
                assert!(args.contains("workspace_id"));
            }
            _ => panic!("expected call command"),
        }
    }

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["compliance-gateway"]).unwrap();
        assert!(cli.command.is_none());
    }
}
