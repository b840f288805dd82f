use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{join_segments, require_non_empty, CloudGateway, LOG_ANALYTICS_SCOPE};
use crate::core::duration::{lookback_interval, parse_iso8601_duration};
use crate::error::{ToolError, ToolOutcome};

pub const NO_RESULTS: &str = "No results";

#[derive(Debug, Clone)]
pub struct LogQuerySpec {
    pub workspace_id: String,
    pub query: String,
    /// ISO-8601 duration, e.g. `P1D`
    pub timespan: String,
    pub as_csv: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    tables: Vec<QueryTable>,
}

#[derive(Debug, Deserialize)]
struct QueryTable {
    columns: Vec<QueryColumn>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct QueryColumn {
    name: String,
}

/// First table of a query result, every cell already stringified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TabularResult {
    fn from_table(table: QueryTable) -> Self {
        Self {
            columns: table.columns.into_iter().map(|c| c.name).collect(),
            rows: table
                .rows
                .iter()
                .map(|row| row.iter().map(cell_text).collect())
                .collect(),
        }
    }

    /// CSV mode replaces every comma inside a cell with a semicolon; there is
    /// no quoting. Pipe mode writes cells untouched.
    pub fn to_text(&self, as_csv: bool) -> String {
        let separator = if as_csv { "," } else { " | " };
        let mut out = String::new();

        out.push_str(&self.columns.join(separator));
        out.push('\n');

        for row in &self.rows {
            let line = if as_csv {
                row.iter()
                    .map(|cell| cell.replace(',', ";"))
                    .collect::<Vec<_>>()
                    .join(separator)
            } else {
                row.join(separator)
            };
            out.push_str(&line);
            out.push('\n');
        }

        out
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl CloudGateway {
    pub async fn query_logs(&self, spec: &LogQuerySpec) -> ToolOutcome<String> {
        require_non_empty("workspace_id", &spec.workspace_id)?;
        require_non_empty("query", &spec.query)?;
        let lookback = parse_iso8601_duration(&spec.timespan)?;
        let timespan = lookback_interval(Utc::now(), lookback)?;

        let url = join_segments(
            &self.log_analytics_endpoint,
            ["v1", "workspaces", spec.workspace_id.as_str(), "query"],
        );
        tracing::debug!("[CloudGateway] POST {} (timespan={})", url, timespan);

        let request = self.client.post(url).json(&json!({
            "query": spec.query,
            "timespan": timespan,
        }));
        let resource = format!("log analytics workspace '{}'", spec.workspace_id);
        let response = self
            .send_authorized(request, LOG_ANALYTICS_SCOPE, &resource)
            .await?;

        let body = response.text().await?;
        let parsed: QueryResponse = serde_json::from_str(&body).map_err(|e| {
            ToolError::MalformedResponse(format!("unexpected log query payload: {}", e))
        })?;

        match parsed.tables.into_iter().next() {
            None => Ok(NO_RESULTS.to_string()),
            Some(table) => Ok(TabularResult::from_table(table).to_text(spec.as_csv)),
        }
    }
}
