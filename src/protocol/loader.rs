//! Spec tree loader with support for local files (JSON / YAML) and the embedded tree

use crate::protocol::operation::OperationSpec;
use crate::protocol::ProtocolError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Spec tree shipped with the crate.
pub const EMBEDDED_SPEC: &str = include_str!("../../spec/elevenlabs.json");

/// A resource node: its operations plus named child resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecTree {
    #[serde(default)]
    pub operations: Vec<OperationSpec>,
    #[serde(default)]
    pub children: BTreeMap<String, SpecTree>,
}

impl SpecTree {
    /// Total number of operations in this node and below.
    pub fn operation_count(&self) -> usize {
        self.operations.len()
            + self
                .children
                .values()
                .map(SpecTree::operation_count)
                .sum::<usize>()
    }
}

/// Loads spec trees from strings, files or the embedded asset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecLoader;

impl SpecLoader {
    pub fn new() -> Self {
        Self
    }

    /// Parse the tree embedded at build time.
    pub fn embedded(&self) -> Result<SpecTree, ProtocolError> {
        Self::parse_json(EMBEDDED_SPEC).map_err(|e| match e {
            ProtocolError::ValidationError(msg) => {
                ProtocolError::Internal(format!("Embedded spec is invalid: {}", msg))
            }
            other => other,
        })
    }

    pub fn from_json_str(&self, content: &str) -> Result<SpecTree, ProtocolError> {
        Self::parse_json(content)
    }

    pub fn from_yaml_str(&self, content: &str) -> Result<SpecTree, ProtocolError> {
        Self::parse_yaml(content)
    }

    /// Load a tree from disk; `.yaml` / `.yml` files are parsed as YAML, everything else as JSON.
    pub async fn load_from_file(&self, path: impl AsRef<Path>) -> Result<SpecTree, ProtocolError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ProtocolError::LoadError {
                path: path.to_string_lossy().to_string(),
                reason: e.to_string(),
                hint: Some("Check if the file exists and you have read permissions.".to_string()),
            })?;

        // Tolerate a UTF-8 BOM from editors on Windows.
        let bytes = bytes
            .strip_prefix(&[0xEF, 0xBB, 0xBF])
            .map(<[u8]>::to_vec)
            .unwrap_or(bytes);
        let content = String::from_utf8(bytes).map_err(|e| ProtocolError::LoadError {
            path: path.to_string_lossy().to_string(),
            reason: format!("Invalid UTF-8: {}", e),
            hint: None,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        let tree = if is_yaml {
            Self::parse_yaml(&content)?
        } else {
            Self::parse_json(&content)?
        };
        tracing::debug!(
            path = %path.display(),
            operations = tree.operation_count(),
            "loaded spec tree"
        );
        Ok(tree)
    }

    fn parse_json(content: &str) -> Result<SpecTree, ProtocolError> {
        serde_json::from_str::<SpecTree>(content)
            .map_err(|e| ProtocolError::ValidationError(format!("Invalid JSON spec tree: {}", e)))
    }

    /// YAML syntax problems are reported separately from structural mismatches.
    fn parse_yaml(content: &str) -> Result<SpecTree, ProtocolError> {
        serde_yaml::from_str::<SpecTree>(content).map_err(|e| {
            let msg = e.to_string();
            let looks_structural = msg.contains("missing field")
                || msg.contains("unknown field")
                || msg.contains("invalid type")
                || msg.contains("invalid value");

            if looks_structural {
                ProtocolError::ValidationError(format!("Invalid spec tree structure: {}", msg))
            } else {
                ProtocolError::YamlError(msg)
            }
        })
    }
}
