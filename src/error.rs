//! Error types for the graph attention library

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, GatError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum GatError {
    /// Tensor or graph dimensions do not line up
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    /// Edge refers to a node outside the graph
    #[error("Invalid node {node}: graph has {num_nodes} nodes")]
    InvalidNode { node: usize, num_nodes: usize },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed edge list or dataset text
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Loss requested over an empty node set
    #[error("Node mask is empty: {0}")]
    EmptyMask(&'static str),

    /// Backward called without a cached forward pass
    #[error("No cached forward pass in {0}; call forward_train first")]
    MissingCache(&'static str),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl GatError {
    /// Build a shape mismatch error from any displayable dimensions
    pub fn shape(
        context: &'static str,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        GatError::ShapeMismatch {
            context,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_error_message() {
        let err = GatError::shape("GatLayer::forward", "(4, 8)", "(4, 3)");
        assert_eq!(
            err.to_string(),
            "Shape mismatch in GatLayer::forward: expected (4, 8), got (4, 3)"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: GatError = io.into();
        assert!(matches!(err, GatError::Io(_)));
    }
}
