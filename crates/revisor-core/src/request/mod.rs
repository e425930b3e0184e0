//! Review request parsing and validation.
//!
//! Requests carry the article context, the sections to review and the
//! sampling parameters. They can be built in code or loaded from YAML/JSON
//! documents validated against JSON Schema.

mod parser;
mod schema;

pub use parser::{EvaluationRequest, GenerationParams, RequestError, Sections, SINGLE_TEXT_SECTION};
pub use schema::validate_request_schema;
