//! Tool error taxonomy
//!
//! Every failure a tool call can produce maps onto one of five kinds that are
//! reported to the invoking client. Bootstrap failures are not tool errors and
//! go through `anyhow` instead.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Coarse error category exposed at the tool-invocation boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    UpstreamError,
    MalformedResponse,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::UpstreamError => "UpstreamError",
            ErrorKind::MalformedResponse => "MalformedResponse",
            ErrorKind::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Credential unavailable: {0}")]
    Credential(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ToolError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ToolError::InvalidArgument(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::InvalidArgument(_) | ToolError::UnknownTool(_) => ErrorKind::InvalidArgument,
            ToolError::NotFound(_) => ErrorKind::NotFound,
            ToolError::Upstream { .. } | ToolError::Transport(_) | ToolError::Credential(_) => {
                ErrorKind::UpstreamError
            }
            ToolError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            ToolError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

pub type ToolOutcome<T> = std::result::Result<T, ToolError>;
