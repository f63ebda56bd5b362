use bytes::Bytes;
use serde_json::Value;

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// The body was non-empty, valid JSON.
    Json(Value),
    /// The body was non-empty but not JSON (audio, plain text, ...).
    Raw(Bytes),
    Empty,
}

impl ResponseBody {
    /// Decode a body best-effort: JSON when it parses, raw bytes otherwise.
    pub fn decode(body: Bytes) -> Self {
        if body.is_empty() {
            return ResponseBody::Empty;
        }
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Raw(body),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            ResponseBody::Raw(b) => Some(b),
            _ => None,
        }
    }

    /// Raw body as UTF-8 text, when it is text.
    pub fn as_text(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseBody::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_json_raw_and_empty() {
        assert_eq!(
            ResponseBody::decode(Bytes::from_static(br#"{"ok":true}"#)),
            ResponseBody::Json(json!({"ok": true}))
        );
        let raw = ResponseBody::decode(Bytes::from_static(b"not json"));
        assert_eq!(raw.as_text(), Some("not json"));
        assert!(ResponseBody::decode(Bytes::new()).is_empty());
    }
}
