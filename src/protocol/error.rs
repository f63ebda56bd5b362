//! Protocol error types

/// Errors raised while loading, validating or looking up operation specs.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Failed to load operation spec from {path}: {reason}{}", .hint.as_ref().map(|h| format!("\n Hint: {}", h)).unwrap_or_default())]
    LoadError {
        path: String,
        reason: String,
        hint: Option<String>,
    },

    #[error("Operation spec validation failed: {0}")]
    ValidationError(String),

    #[error("Operation not found: {id}{}", .hint.as_ref().map(|h| format!("\n Hint: {}", h)).unwrap_or_default())]
    NotFound { id: String, hint: Option<String> },

    #[error("YAML syntax error: {0}")]
    YamlError(String),

    #[error("Internal protocol error: {0}")]
    Internal(String),
}

impl ProtocolError {
    /// Attach an actionable hint to the error
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        let hint_val = Some(hint.into());
        match self {
            ProtocolError::LoadError { ref mut hint, .. } => *hint = hint_val,
            ProtocolError::NotFound { ref mut hint, .. } => *hint = hint_val,
            _ => (),
        }
        self
    }
}
