//! Tool Definition Macros
//!
//! Simplifies tool creation by reducing boilerplate

/// Define tool metadata using a declarative syntax
///
/// # Example
/// ```
/// use compliance_gateway::tool_metadata;
///
/// let metadata = tool_metadata! {
///     name: "query_logs",
///     description: "Run a Log Analytics query",
///     parameters: [
///         {
///             name: "query",
///             type: "string",
///             description: "KQL query text",
///             required: true
///         },
///         {
///             name: "timespan",
///             type: "string",
///             description: "ISO-8601 lookback duration",
///             required: false,
///             default: "P1D"
///         }
///     ]
/// };
/// assert_eq!(metadata.parameters.len(), 2);
/// ```
#[macro_export]
macro_rules! tool_metadata {
    (@default) => {
        None
    };
    (@default $default:expr) => {
        Some(serde_json::Value::from($default))
    };
    (
        name: $name:expr,
        description: $description:expr,
        parameters: [
            $(
                {
                    name: $param_name:expr,
                    type: $param_type:expr,
                    description: $param_desc:expr,
                    required: $param_required:expr
                    $(, default: $param_default:expr)?
                }
            ),* $(,)?
        ]
    ) => {
        $crate::tools::ToolMetadata {
            name: $name.to_string(),
            description: $description.to_string(),
            parameters: vec![
                $(
                    $crate::tools::ToolParameter {
                        name: $param_name.to_string(),
                        param_type: $param_type.to_string(),
                        description: $param_desc.to_string(),
                        required: $param_required,
                        default: $crate::tool_metadata!(@default $($param_default)?),
                    }
                ),*
            ],
        }
    };
}

/// Validate required string parameter
#[macro_export]
macro_rules! validate_required_string {
    ($args:expr, $param:expr) => {
        $args[$param].as_str().ok_or_else(|| {
            $crate::error::ToolError::InvalidArgument(format!(
                "'{}' parameter is required and must be a string",
                $param
            ))
        })?
    };
}

/// Validate optional string parameter; `null` counts as absent
#[macro_export]
macro_rules! validate_optional_string {
    ($args:expr, $param:expr) => {
        match &$args[$param] {
            serde_json::Value::Null => None,
            serde_json::Value::String(value) => Some(value.as_str()),
            _ => {
                return Err($crate::error::ToolError::InvalidArgument(format!(
                    "'{}' parameter must be a string",
                    $param
                )))
            }
        }
    };
}

/// Validate optional boolean parameter, falling back to `$default`
#[macro_export]
macro_rules! validate_optional_bool {
    ($args:expr, $param:expr, $default:expr) => {
        match &$args[$param] {
            serde_json::Value::Null => $default,
            serde_json::Value::Bool(value) => *value,
            _ => {
                return Err($crate::error::ToolError::InvalidArgument(format!(
                    "'{}' parameter must be a boolean",
                    $param
                )))
            }
        }
    };
}
