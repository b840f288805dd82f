pub mod cloud;
pub mod completion;
pub mod credentials;
pub mod duration;
pub mod mcp;
