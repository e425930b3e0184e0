//! JSON Schema validation for review request documents.
//!
//! Request files (YAML or JSON) are validated against
//! `schema/review_request.schema.json` before they are deserialized, so every
//! structural problem is reported at once instead of one serde error at a time.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded request schema (loaded at compile time).
const REQUEST_SCHEMA_JSON: &str = include_str!("../../schema/review_request.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema loading.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(REQUEST_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        match jsonschema::options().build(&schema_value) {
            Ok(v) => Ok(v),
            Err(e) => Err(format!("Failed to compile schema: {}", e)),
        }
    });

    match result {
        Ok(v) => Ok(v),
        Err(e) => Err(SchemaError::LoadError(e.clone())),
    }
}

/// Validate a request document against the schema.
///
/// Returns every violation, formatted as `"<message> at <instance path>"`.
pub fn validate_request_schema(request_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(request_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_request_passes_schema() {
        let value = serde_json::json!({
            "context": "IoT security paper",
            "sections": {
                "abstract": "A",
                "introduction": "B",
                "conclusion": "C"
            },
            "params": { "max_tokens": 512, "temperature": 0.0 }
        });
        assert!(validate_request_schema(&value).is_ok());
    }

    #[test]
    fn test_text_request_passes_schema() {
        let value = serde_json::json!({ "text": "We have to encrypted data" });
        assert!(validate_request_schema(&value).is_ok());
    }

    #[test]
    fn test_caller_defined_section_names_pass_schema() {
        let value = serde_json::json!({
            "sections": { "Abstract": "A", "Related Work": "B" }
        });
        assert!(validate_request_schema(&value).is_ok());
    }

    #[test]
    fn test_missing_body_fails() {
        let value = serde_json::json!({ "context": "only context" });
        assert!(validate_request_schema(&value).is_err());
    }

    #[test]
    fn test_all_violations_reported() {
        let value = serde_json::json!({
            "sections": { "bad\nname": "A" },
            "params": { "temperature": 3.0 },
            "unexpected": true
        });
        let errors = validate_request_schema(&value).unwrap_err();
        assert!(errors.len() >= 3, "expected several violations, got {:?}", errors);
    }
}
