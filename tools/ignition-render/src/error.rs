//! Error types for the render tool.

use thiserror::Error;

/// Errors raised while loading the tool's settings
#[derive(Debug, Error)]
pub enum ToolError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
