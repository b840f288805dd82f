//! Completion-backed tools: compliance analysis and audit report synthesis

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{Tool, ToolMetadata};
use crate::core::completion::CompletionClient;
use crate::error::{ToolError, ToolOutcome};
use crate::{tool_metadata, validate_optional_string, validate_required_string};

pub const DEFAULT_STANDARDS: &str = "ISO 27001, SOC 2, GDPR";

const ANALYSIS_TEMPERATURE: f32 = 0.2;
const ANALYSIS_MAX_TOKENS: u32 = 2000;
const REPORT_TEMPERATURE: f32 = 0.1;
const REPORT_MAX_TOKENS: u32 = 3000;

/// Builds the audit prompt. A blank `standard` falls back to
/// [`DEFAULT_STANDARDS`]; the document is embedded verbatim.
pub fn compliance_prompt(document_content: &str, standard: Option<&str>) -> String {
    let standards = standard
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_STANDARDS);

    format!(
        "You are an expert compliance auditor. Analyze the following document for \
compliance with these standards: {standards}.

For each standard, provide:
1. Compliance status (Compliant, Partially Compliant, or Non-Compliant)
2. Specific gaps or violations, citing the relevant part of the document
3. Risk level of each gap (High, Medium, or Low)
4. Concrete remediation steps

Document:
{document_content}"
    )
}

/// Builds the report prompt. Findings are interpolated as text, never parsed.
pub fn audit_report_prompt(findings: &str, scope: &str, timeframe: &str) -> String {
    format!(
        "You are a senior IT auditor. Write a formal audit report from the findings below.

Audit scope: {scope}
Audit timeframe: {timeframe}

Findings:
{findings}

Structure the report as: Executive Summary, Scope and Methodology, Detailed Findings \
(with severity for each), Recommendations, and Conclusion."
    )
}

/// Findings may arrive as a string or as structured JSON; the latter is
/// rendered back to text unchanged in meaning.
fn findings_text(args: &Value) -> ToolOutcome<String> {
    match &args["findings"] {
        Value::Null => Err(ToolError::invalid("'findings' parameter is required")),
        Value::String(text) => Ok(text.clone()),
        structured => serde_json::to_string_pretty(structured)
            .map_err(|e| ToolError::invalid(format!("'findings' is not serializable: {}", e))),
    }
}

// ============================================================================
// analyze_compliance
// ============================================================================

pub struct AnalyzeComplianceTool {
    client: Arc<CompletionClient>,
}

impl AnalyzeComplianceTool {
    pub fn new(client: Arc<CompletionClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for AnalyzeComplianceTool {
    fn metadata(&self) -> ToolMetadata {
        tool_metadata! {
            name: "analyze_compliance",
            description: "Analyze a document for compliance with security and privacy standards \
                          and report gaps, risk levels and remediation steps.",
            parameters: [
                {
                    name: "document_content",
                    type: "string",
                    description: "Full text of the document to analyze",
                    required: true
                },
                {
                    name: "standard",
                    type: "string",
                    description: "Comma-separated standards to check against",
                    required: false,
                    default: DEFAULT_STANDARDS
                }
            ]
        }
    }

    fn validate(&self, args: &Value) -> ToolOutcome<()> {
        let document = validate_required_string!(args, "document_content");
        if document.trim().is_empty() {
            return Err(ToolError::invalid("'document_content' cannot be empty"));
        }
        validate_optional_string!(args, "standard");
        Ok(())
    }

    async fn execute(&self, args: Value) -> ToolOutcome<String> {
        self.validate(&args)?;

        let document = validate_required_string!(args, "document_content");
        let standard = validate_optional_string!(args, "standard");

        tracing::info!(
            "Analyzing {} byte document against {}",
            document.len(),
            standard.filter(|s| !s.trim().is_empty()).unwrap_or(DEFAULT_STANDARDS)
        );

        let prompt = compliance_prompt(document, standard);
        self.client
            .complete(&prompt, ANALYSIS_TEMPERATURE, ANALYSIS_MAX_TOKENS)
            .await
    }
}

// ============================================================================
// generate_audit_report
// ============================================================================

pub struct GenerateAuditReportTool {
    client: Arc<CompletionClient>,
}

impl GenerateAuditReportTool {
    pub fn new(client: Arc<CompletionClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GenerateAuditReportTool {
    fn metadata(&self) -> ToolMetadata {
        tool_metadata! {
            name: "generate_audit_report",
            description: "Synthesize a formal audit report from findings, for a given scope and timeframe.",
            parameters: [
                {
                    name: "findings",
                    type: "string",
                    description: "Audit findings as plain text or serialized JSON",
                    required: true
                },
                {
                    name: "scope",
                    type: "string",
                    description: "Systems or processes covered by the audit",
                    required: true
                },
                {
                    name: "timeframe",
                    type: "string",
                    description: "Period the audit covers, e.g. 'Q1 2024'",
                    required: true
                }
            ]
        }
    }

    fn validate(&self, args: &Value) -> ToolOutcome<()> {
        findings_text(args)?;
        validate_required_string!(args, "scope");
        validate_required_string!(args, "timeframe");
        Ok(())
    }

    async fn execute(&self, args: Value) -> ToolOutcome<String> {
        let findings = findings_text(&args)?;
        let scope = validate_required_string!(args, "scope");
        let timeframe = validate_required_string!(args, "timeframe");

        tracing::info!("Generating audit report for '{}' ({})", scope, timeframe);

        let prompt = audit_report_prompt(&findings, scope, timeframe);
        self.client
            .complete(&prompt, REPORT_TEMPERATURE, REPORT_MAX_TOKENS)
            .await
    }
}
