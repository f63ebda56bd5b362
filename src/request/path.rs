//! URL path building from a `{name}` template.

use crate::protocol::PathSpec;
use crate::types::{Arguments, ParamValue};
use crate::{Error, ErrorContext, Result};
use serde_json::Value;
use url::form_urlencoded;

/// Substitute every required placeholder with its escaped argument value.
pub fn build_path(spec: &PathSpec, args: &Arguments) -> Result<String> {
    let mut path = spec.template.clone();
    for name in &spec.params {
        let value = args
            .get(name)
            .value()
            .ok_or_else(|| Error::missing_parameter(name.as_str()))?;
        let segment = encode_path_segment(&segment_text(name, value)?);
        path = path.replace(&format!("{{{}}}", name), &segment);
    }
    Ok(path)
}

/// Form-style component escaping: space becomes `+`, reserved characters are percent-encoded.
pub fn encode_path_segment(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn segment_text(name: &str, value: &ParamValue) -> Result<String> {
    match value {
        ParamValue::Json(Value::String(s)) => Ok(s.clone()),
        ParamValue::Json(other) => Ok(other.to_string()),
        other => Err(Error::validation_with_context(
            format!("a {} value cannot be used in a URL path", other.kind()),
            ErrorContext::new()
                .with_field_path(name)
                .with_source("path_builder"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UploadSource;
    use bytes::Bytes;
    use serde_json::json;

    fn spec(template: &str, params: &[&str]) -> PathSpec {
        PathSpec {
            template: template.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn substitutes_and_escapes() {
        let args = Arguments::new().with("voice_id", "a b/c@d");
        let path = build_path(&spec("v1/voices/{voice_id}", &["voice_id"]), &args).unwrap();
        assert_eq!(path, "v1/voices/a+b%2Fc%40d");
    }

    #[test]
    fn replaces_every_occurrence() {
        let args = Arguments::new().with("id", 42);
        let path = build_path(&spec("v1/{id}/x/{id}", &["id"]), &args).unwrap();
        assert_eq!(path, "v1/42/x/42");
    }

    #[test]
    fn missing_or_null_is_missing_parameter() {
        let s = spec("v1/voices/{voice_id}", &["voice_id"]);
        for args in [Arguments::new(), Arguments::new().with("voice_id", json!(null))] {
            match build_path(&s, &args) {
                Err(Error::MissingParameter { name }) => assert_eq!(name, "voice_id"),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn empty_string_is_present() {
        let args = Arguments::new().with("voice_id", "");
        let path = build_path(&spec("v1/voices/{voice_id}", &["voice_id"]), &args).unwrap();
        assert_eq!(path, "v1/voices/");
    }

    #[test]
    fn rejects_uploads() {
        let args = Arguments::new().with("voice_id", UploadSource::from_bytes(Bytes::from_static(b"x")));
        assert!(matches!(
            build_path(&spec("v1/{voice_id}", &["voice_id"]), &args),
            Err(Error::Validation { .. })
        ));
    }
}
