//! Operation registry: the spec tree flattened into dotted identifiers.

use crate::protocol::loader::{SpecLoader, SpecTree};
use crate::protocol::operation::OperationSpec;
use crate::protocol::validator::SpecValidator;
use crate::protocol::ProtocolError;
use once_cell::sync::OnceCell;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

static EMBEDDED: OnceCell<Arc<OperationRegistry>> = OnceCell::new();

/// Read-only map from `resource.sub_resource.operation` to its spec.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Arc<OperationSpec>>,
    resources: BTreeSet<String>,
}

/// Normalize a resource name into an identifier segment.
pub fn resource_key(name: &str) -> String {
    name.replace('-', "_")
}

impl OperationRegistry {
    /// Flatten and validate a spec tree.
    pub fn from_tree(tree: &SpecTree) -> Result<Self, ProtocolError> {
        let mut registry = Self::default();
        let validator = SpecValidator::new();
        registry.insert_node(tree, &mut Vec::new(), &validator)?;
        Ok(registry)
    }

    /// Registry over the embedded spec tree, parsed once per process.
    pub fn embedded() -> Result<Arc<Self>, ProtocolError> {
        EMBEDDED
            .get_or_try_init(|| {
                let tree = SpecLoader::new().embedded()?;
                Self::from_tree(&tree).map(Arc::new)
            })
            .map(Arc::clone)
    }

    fn insert_node(
        &mut self,
        node: &SpecTree,
        path: &mut Vec<String>,
        validator: &SpecValidator,
    ) -> Result<(), ProtocolError> {
        if !path.is_empty() {
            self.resources.insert(path.join("."));
        }

        for op in &node.operations {
            let id = Self::join_id(path, &op.name);
            validator.validate(&id, op)?;
            if self.operations.insert(id.clone(), Arc::new(op.clone())).is_some() {
                return Err(ProtocolError::ValidationError(format!(
                    "duplicate operation id '{}'",
                    id
                )));
            }
        }

        for (name, child) in &node.children {
            path.push(resource_key(name));
            self.insert_node(child, path, validator)?;
            path.pop();
        }
        Ok(())
    }

    fn join_id(path: &[String], name: &str) -> String {
        if path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", path.join("."), name)
        }
    }

    /// Look up an operation by dotted id.
    pub fn get(&self, id: &str) -> Result<Arc<OperationSpec>, ProtocolError> {
        if let Some(spec) = self.operations.get(id) {
            return Ok(spec.clone());
        }
        let err = ProtocolError::NotFound {
            id: id.to_string(),
            hint: None,
        };
        let (parent, _) = id.rsplit_once('.').unwrap_or(("", id));
        if !parent.is_empty() && self.has_resource(parent) {
            let available = self.operations_of(parent).join(", ");
            Err(err.with_hint(format!("'{}' provides: {}", parent, available)))
        } else {
            Err(err.with_hint("Run `elevenlabs-spec list` to see available operations"))
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.operations.contains_key(id)
    }

    pub fn has_resource(&self, path: &str) -> bool {
        self.resources.contains(path)
    }

    /// Operation names directly under a resource, sorted.
    pub fn operations_of(&self, resource: &str) -> Vec<String> {
        let prefix = format!("{}.", resource);
        let mut names: Vec<String> = self
            .operations
            .keys()
            .filter_map(|id| id.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('.'))
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }

    /// All operation ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
