mod settings;

pub use settings::{
    CloudConfig, CompletionConfig, LoggingConfig, ServerConfig, Settings, DEFAULT_MODEL,
};
