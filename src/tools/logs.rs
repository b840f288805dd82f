//! Log Analytics query tool

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

use super::{Tool, ToolMetadata};
use crate::core::cloud::{CloudGateway, LogQuerySpec};
use crate::core::duration::{lookback_interval, parse_iso8601_duration};
use crate::error::ToolOutcome;
use crate::{tool_metadata, validate_optional_bool, validate_optional_string, validate_required_string};

pub const DEFAULT_TIMESPAN: &str = "P1D";

pub struct QueryLogsTool {
    gateway: Arc<CloudGateway>,
}

impl QueryLogsTool {
    pub fn new(gateway: Arc<CloudGateway>) -> Self {
        Self { gateway }
    }

    fn spec_from_args(args: &Value) -> ToolOutcome<LogQuerySpec> {
        let workspace_id = validate_required_string!(args, "workspace_id");
        let query = validate_required_string!(args, "query");
        let timespan = validate_optional_string!(args, "timespan").unwrap_or(DEFAULT_TIMESPAN);
        let as_csv = validate_optional_bool!(args, "as_csv", true);

        Ok(LogQuerySpec {
            workspace_id: workspace_id.to_string(),
            query: query.to_string(),
            timespan: timespan.to_string(),
            as_csv,
        })
    }
}

#[async_trait]
impl Tool for QueryLogsTool {
    fn metadata(&self) -> ToolMetadata {
        tool_metadata! {
            name: "query_logs",
            description: "Run a KQL query against an Azure Log Analytics workspace and return the \
                          first result table as CSV or pipe-delimited text.",
            parameters: [
                {
                    name: "workspace_id",
                    type: "string",
                    description: "Log Analytics workspace ID",
                    required: true
                },
                {
                    name: "query",
                    type: "string",
                    description: "KQL query text",
                    required: true
                },
                {
                    name: "timespan",
                    type: "string",
                    description: "ISO-8601 lookback duration ending now, e.g. PT1H or P7D",
                    required: false,
                    default: DEFAULT_TIMESPAN
                },
                {
                    name: "as_csv",
                    type: "boolean",
                    description: "Comma-separated output (commas in values become semicolons); \
                                  false gives ' | ' separated output",
                    required: false,
                    default: true
                }
            ]
        }
    }

    fn validate(&self, args: &Value) -> ToolOutcome<()> {
        let spec = Self::spec_from_args(args)?;
        let lookback = parse_iso8601_duration(&spec.timespan)?;
        lookback_interval(Utc::now(), lookback)?;
        Ok(())
    }

    async fn execute(&self, args: Value) -> ToolOutcome<String> {
        let spec = Self::spec_from_args(&args)?;

        tracing::info!(
            "Querying workspace {} over {} (csv={})",
            spec.workspace_id,
            spec.timespan,
            spec.as_csv
        );
        self.gateway.query_logs(&spec).await
    }
}
