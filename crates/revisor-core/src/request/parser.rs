//! Review request parsing from YAML/JSON.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_request_schema;

/// Section name used when a single free-form text is reviewed.
pub const SINGLE_TEXT_SECTION: &str = "text";

lazy_static! {
    /// Section names become result keys, so they are kept to simple identifiers.
    static ref SECTION_NAME_PATTERN: Regex = Regex::new(r"^[^\s\p{Cc}][^\p{Cc}]{0,63}$").unwrap();
}

/// Errors that can occur when building or parsing review requests.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Failed to read request file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Request does not match schema: {}", .0.join("; "))]
    SchemaViolations(Vec<String>),

    #[error("Request has no sections to review")]
    NoSections,

    #[error("Section '{0}' is empty")]
    EmptySection(String),

    #[error("Invalid section name '{0:?}': use 1-64 characters with no control characters")]
    InvalidSectionName(String),

    #[error("Invalid generation parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Cohesion requires sections missing from the request: {}", .0.join(", "))]
    MissingSections(Vec<String>),
}

/// Section name to section text. Iterates in lexical order of names.
pub type Sections = BTreeMap<String, String>;

/// Sampling parameters passed through to whichever backend is selected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature (0.0 for deterministic)
    pub temperature: f32,

    /// Nucleus sampling cutoff
    pub top_p: f32,

    /// Frequency penalty
    pub frequency_penalty: f32,

    /// Presence penalty
    pub presence_penalty: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 10_000,
            temperature: 0.5,
            top_p: 0.5,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

impl GenerationParams {
    /// Same parameters with temperature forced to 0.
    pub fn deterministic(&self) -> Self {
        Self {
            temperature: 0.0,
            ..*self
        }
    }

    /// Same parameters with a different temperature.
    pub fn with_temperature(&self, temperature: f32) -> Self {
        Self {
            temperature,
            ..*self
        }
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.max_tokens == 0 {
            return Err(RequestError::InvalidParameter {
                name: "max_tokens",
                reason: "must be greater than 0".to_string(),
            });
        }
        check_range("temperature", self.temperature, 0.0, 1.0)?;
        check_range("top_p", self.top_p, 0.0, 1.0)?;
        check_range("frequency_penalty", self.frequency_penalty, -2.0, 2.0)?;
        check_range("presence_penalty", self.presence_penalty, -2.0, 2.0)?;
        Ok(())
    }
}

fn check_range(name: &'static str, value: f32, min: f32, max: f32) -> Result<(), RequestError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(RequestError::InvalidParameter {
            name,
            reason: format!("{} is outside {}..={}", value, min, max),
        })
    }
}

/// The unit of work handed to a backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRequest {
    /// What the article is about and what it tries to achieve. May be empty.
    pub context: String,

    /// Manuscript sections to review
    pub sections: Sections,

    /// Sampling parameters
    pub params: GenerationParams,
}

/// On-disk shape of a request document.
#[derive(Debug, Deserialize)]
struct RequestDocument {
    #[serde(default)]
    context: String,
    #[serde(default)]
    sections: Option<Sections>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    params: GenerationParams,
}

impl EvaluationRequest {
    /// Create a request from named sections.
    pub fn new<K, V>(context: impl Into<String>, sections: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            context: context.into(),
            sections: sections
                .into_iter()
                .map(|(name, text)| (name.into(), text.into()))
                .collect(),
            params: GenerationParams::default(),
        }
    }

    /// Create a request for a single free-form text.
    ///
    /// The text is stored under [`SINGLE_TEXT_SECTION`].
    pub fn single(context: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(context, [(SINGLE_TEXT_SECTION, text.into())])
    }

    /// Replace the generation parameters.
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Text of a section, if present.
    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections.get(name).map(String::as_str)
    }

    /// Parse a request from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, RequestError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a request from JSON.
    pub fn from_json(json: &str) -> Result<Self, RequestError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a request from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RequestError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a request from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RequestError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    fn from_value(value: serde_json::Value) -> Result<Self, RequestError> {
        validate_request_schema(&value).map_err(RequestError::SchemaViolations)?;

        let document: RequestDocument = serde_json::from_value(value)?;
        let request = match (document.sections, document.text) {
            (Some(sections), None) => Self {
                context: document.context,
                sections,
                params: document.params,
            },
            (None, Some(text)) => Self::single(document.context, text).with_params(document.params),
            _ => {
                return Err(RequestError::SchemaViolations(vec![
                    "exactly one of 'sections' or 'text' is required".to_string(),
                ]))
            }
        };

        request.validate()?;
        Ok(request)
    }

    /// Validate request invariants.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.sections.is_empty() {
            return Err(RequestError::NoSections);
        }

        for (name, text) in &self.sections {
            if !SECTION_NAME_PATTERN.is_match(name) {
                return Err(RequestError::InvalidSectionName(name.clone()));
            }
            if text.trim().is_empty() {
                return Err(RequestError::EmptySection(name.clone()));
            }
        }

        self.params.validate()
    }
}
