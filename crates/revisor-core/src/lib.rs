//! # revisor-core
//!
//! Review requests, evaluation vocabulary and the configuration guard shared
//! by every revisor backend.
//!
//! This crate performs no network I/O. It answers:
//! - What is being reviewed? ([`EvaluationRequest`])
//! - Which evaluations exist and how are their results shaped?
//!   ([`EvaluationKind`], [`ReviewResponse`])
//! - Is the configuration a backend needs present? ([`ConfigValues`])
//!
//! ## Example
//!
//! ```rust
//! use revisor_core::{EvaluationRequest, GenerationParams};
//!
//! let request = EvaluationRequest::new(
//!     "IoT security paper",
//!     [("abstract", "We have to encrypted data")],
//! )
//! .with_params(GenerationParams::default());
//!
//! assert!(request.validate().is_ok());
//! ```

pub mod config;
pub mod evaluation;
pub mod request;

// Re-export main types at crate root
pub use config::{ConfigValues, ConfigurationError};
pub use evaluation::{
    CohesionSections, EvaluationKind, EvaluationOutcome, EvaluationScope, Evaluations,
    ReviewResponse, COHESION_SECTIONS,
};
pub use request::{
    validate_request_schema, EvaluationRequest, GenerationParams, RequestError, Sections,
    SINGLE_TEXT_SECTION,
};
