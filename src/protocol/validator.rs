//! Structural validation of operation specs

use crate::protocol::operation::{FileSpec, OperationSpec};
use crate::protocol::ProtocolError;
use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder pattern is valid"));

const METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Placeholder names of a path template, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for cap in PLACEHOLDER.captures_iter(template) {
        let name = cap[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Checks operation specs before they are registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecValidator;

impl SpecValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate one operation. `id` is used in error messages.
    pub fn validate(&self, id: &str, spec: &OperationSpec) -> Result<(), ProtocolError> {
        if spec.name.is_empty() {
            return Err(ProtocolError::ValidationError(format!(
                "{}: operation name is required",
                id
            )));
        }

        let method = spec.request.method.to_ascii_uppercase();
        if !METHODS.contains(&method.as_str()) {
            return Err(ProtocolError::ValidationError(format!(
                "{}: unsupported HTTP method '{}'",
                id, spec.request.method
            ))
            .with_hint(format!("Use one of {}", METHODS.join(", "))));
        }

        let declared = &spec.request.path.params;
        for name in placeholders(&spec.request.path.template) {
            if !declared.contains(&name) {
                return Err(ProtocolError::ValidationError(format!(
                    "{}: placeholder '{{{}}}' in '{}' is not listed in path params",
                    id, name, spec.request.path.template
                )));
            }
        }

        for entry in &spec.request.query {
            if entry.name.is_empty() {
                return Err(ProtocolError::ValidationError(format!(
                    "{}: query entry without a name",
                    id
                )));
            }
        }

        for (kind, body) in [("json", &spec.request.json), ("form", &spec.request.form)] {
            let Some(body) = body else { continue };
            for assignment in &body.assignments {
                if assignment.param.is_empty() {
                    return Err(ProtocolError::ValidationError(format!(
                        "{}: {} assignment without a param",
                        id, kind
                    )));
                }
            }
        }

        for mapping in &spec.request.files {
            if mapping.name.is_empty() {
                return Err(ProtocolError::ValidationError(format!(
                    "{}: file mapping without a field name",
                    id
                )));
            }
            if let Some(value) = &mapping.value {
                Self::validate_file_spec(id, &mapping.name, value)?;
            }
        }

        Ok(())
    }

    fn validate_file_spec(id: &str, field: &str, spec: &FileSpec) -> Result<(), ProtocolError> {
        match spec {
            FileSpec::Param { name } if name.is_empty() => Err(ProtocolError::ValidationError(
                format!("{}: file field '{}' references an unnamed param", id, field),
            )),
            FileSpec::Tuple {
                content: Some(inner),
                ..
            } => Self::validate_file_spec(id, field, inner),
            FileSpec::List { items } => items
                .iter()
                .try_for_each(|item| Self::validate_file_spec(id, field, item)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::operation::{FileMapping, QueryEntry};

    #[test]
    fn placeholders_are_unique_and_ordered() {
        assert_eq!(
            placeholders("v1/{a}/x/{b}/{a}"),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(placeholders("v1/history").is_empty());
    }

    #[test]
    fn accepts_well_formed_spec() {
        let spec = OperationSpec::new("list", "get", "v1/history")
            .with_query(QueryEntry::param("page_size", "page_size"));
        assert!(SpecValidator::new().validate("history.list", &spec).is_ok());
    }

    #[test]
    fn rejects_undeclared_placeholder() {
        let mut spec = OperationSpec::new("get", "GET", "v1/voices/{voice_id}");
        spec.request.path.params.clear();
        let err = SpecValidator::new().validate("voices.get", &spec).unwrap_err();
        assert!(err.to_string().contains("voice_id"));
    }

    #[test]
    fn rejects_bad_method_and_empty_query_entry() {
        let spec = OperationSpec::new("x", "FETCH", "v1/x");
        assert!(SpecValidator::new().validate("x", &spec).is_err());

        let mut spec = OperationSpec::new("x", "GET", "v1/x");
        spec.request.query.push(QueryEntry::param("", "q"));
        assert!(SpecValidator::new().validate("x", &spec).is_err());
    }

    #[test]
    fn rejects_unnamed_file_param() {
        let spec = OperationSpec::new("x", "POST", "v1/x")
            .with_file(FileMapping::new("file", FileSpec::tuple(FileSpec::param(""))));
        assert!(SpecValidator::new().validate("x", &spec).is_err());
    }
}
