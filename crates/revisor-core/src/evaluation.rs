//! Evaluation vocabulary and result types.
//!
//! Every backend declares the same family of evaluations (Theme, Grammar,
//! Cohesion). Results are collected into a [`ReviewResponse`] that serializes
//! as `{"evaluations": {<title>: <outcome>}}`, keeping the backend's
//! declaration order.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::request::{EvaluationRequest, RequestError};

/// Sections the cohesion evaluation reads, in prompt order.
pub const COHESION_SECTIONS: [&str; 3] = ["abstract", "introduction", "conclusion"];

/// The evaluations a backend can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvaluationKind {
    /// Content critique: references, theme violations, missing information
    Theme,
    /// Correctness, clarity, engagement and delivery suggestions
    Grammar,
    /// Consistency between abstract, introduction and conclusion
    Cohesion,
}

/// Whether an evaluation runs once per section or once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationScope {
    PerSection,
    WholeRequest,
}

impl EvaluationKind {
    /// Result key for this evaluation.
    pub fn title(&self) -> &'static str {
        match self {
            EvaluationKind::Theme => "Theme",
            EvaluationKind::Grammar => "Grammar",
            EvaluationKind::Cohesion => "Cohesion",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EvaluationKind::Theme => "Theme suggestions for your text.",
            EvaluationKind::Grammar => "Grammar suggestions for your text.",
            EvaluationKind::Cohesion => "Evaluate the text by cohesion.",
        }
    }

    pub fn scope(&self) -> EvaluationScope {
        match self {
            EvaluationKind::Theme | EvaluationKind::Grammar => EvaluationScope::PerSection,
            EvaluationKind::Cohesion => EvaluationScope::WholeRequest,
        }
    }
}

impl fmt::Display for EvaluationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// The three sections the cohesion check compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohesionSections<'a> {
    pub abstract_text: &'a str,
    pub introduction: &'a str,
    pub conclusion: &'a str,
}

impl<'a> CohesionSections<'a> {
    /// Borrow the cohesion sections from a request.
    ///
    /// Fails with [`RequestError::MissingSections`] listing every absent or
    /// blank section; a missing section is never replaced by empty text.
    pub fn from_request(request: &'a EvaluationRequest) -> Result<Self, RequestError> {
        let missing: Vec<String> = COHESION_SECTIONS
            .iter()
            .filter(|name| {
                request
                    .section(name)
                    .map(|text| text.trim().is_empty())
                    .unwrap_or(true)
            })
            .map(|name| (*name).to_string())
            .collect();

        if !missing.is_empty() {
            return Err(RequestError::MissingSections(missing));
        }

        let section = |name: &str| request.section(name).unwrap_or_default();
        Ok(Self {
            abstract_text: section("abstract"),
            introduction: section("introduction"),
            conclusion: section("conclusion"),
        })
    }
}

/// Outcome of one declared evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EvaluationOutcome {
    /// Produced text per section name
    PerSection(BTreeMap<String, String>),
    /// A single produced text for the whole request
    Whole(String),
    /// Not attempted because the request lacks what it needs
    Skipped { skipped: String },
    /// Failed while failure isolation was enabled
    Failed { error: String },
}

impl EvaluationOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            skipped: reason.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    /// Produced text for one section of a per-section outcome.
    pub fn section(&self, name: &str) -> Option<&str> {
        match self {
            EvaluationOutcome::PerSection(map) => map.get(name).map(String::as_str),
            _ => None,
        }
    }

    /// Produced text of a whole-request outcome.
    pub fn text(&self) -> Option<&str> {
        match self {
            EvaluationOutcome::Whole(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, EvaluationOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, EvaluationOutcome::Failed { .. })
    }
}

/// Outcomes keyed by evaluation title, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluations {
    entries: Vec<(String, EvaluationOutcome)>,
}

impl Evaluations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an outcome. A repeated title replaces the earlier outcome in place.
    pub fn insert(&mut self, title: impl Into<String>, outcome: EvaluationOutcome) {
        let title = title.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == title) {
            Some(entry) => entry.1 = outcome,
            None => self.entries.push((title, outcome)),
        }
    }

    pub fn get(&self, title: &str) -> Option<&EvaluationOutcome> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == title)
            .map(|(_, outcome)| outcome)
    }

    pub fn titles(&self) -> Vec<&str> {
        self.entries.iter().map(|(title, _)| title.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EvaluationOutcome)> {
        self.entries
            .iter()
            .map(|(title, outcome)| (title.as_str(), outcome))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Evaluations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (title, outcome) in &self.entries {
            map.serialize_entry(title, outcome)?;
        }
        map.end()
    }
}

/// Aggregated result of one backend invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReviewResponse {
    pub evaluations: Evaluations,
}

impl ReviewResponse {
    pub fn new(evaluations: Evaluations) -> Self {
        Self { evaluations }
    }

    /// Outcome for an evaluation title.
    pub fn get(&self, title: &str) -> Option<&EvaluationOutcome> {
        self.evaluations.get(title)
    }

    /// Serialize to a `serde_json::Value`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn per_section(pairs: &[(&str, &str)]) -> EvaluationOutcome {
        EvaluationOutcome::PerSection(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_titles_are_stable() {
        assert_eq!(EvaluationKind::Theme.title(), "Theme");
        assert_eq!(EvaluationKind::Grammar.title(), "Grammar");
        assert_eq!(EvaluationKind::Cohesion.title(), "Cohesion");
        assert_eq!(EvaluationKind::Cohesion.scope(), EvaluationScope::WholeRequest);
        assert_eq!(EvaluationKind::Grammar.scope(), EvaluationScope::PerSection);
    }

    #[test]
    fn test_response_serializes_in_declaration_order() {
        let mut evaluations = Evaluations::new();
        evaluations.insert("Theme", per_section(&[("abstract", "theme notes")]));
        evaluations.insert("Grammar", per_section(&[("abstract", "grammar notes")]));
        evaluations.insert("Cohesion", EvaluationOutcome::Whole("consistent".to_string()));

        let json = serde_json::to_string(&ReviewResponse::new(evaluations)).unwrap();
        assert_eq!(
            json,
            r#"{"evaluations":{"Theme":{"abstract":"theme notes"},"Grammar":{"abstract":"grammar notes"},"Cohesion":"consistent"}}"#
        );
    }

    #[test]
    fn test_skipped_and_failed_shapes() {
        let skipped = serde_json::to_value(EvaluationOutcome::skipped("missing conclusion")).unwrap();
        assert_eq!(skipped, serde_json::json!({"skipped": "missing conclusion"}));

        let failed = serde_json::to_value(EvaluationOutcome::failed("boom")).unwrap();
        assert_eq!(failed, serde_json::json!({"error": "boom"}));
    }

    #[test]
    fn test_insert_replaces_existing_title() {
        let mut evaluations = Evaluations::new();
        evaluations.insert("Theme", EvaluationOutcome::Whole("first".to_string()));
        evaluations.insert("Grammar", EvaluationOutcome::Whole("second".to_string()));
        evaluations.insert("Theme", EvaluationOutcome::Whole("third".to_string()));

        assert_eq!(evaluations.titles(), vec!["Theme", "Grammar"]);
        assert_eq!(evaluations.get("Theme").and_then(|o| o.text()), Some("third"));
    }

    #[test]
    fn test_cohesion_sections_present() {
        let request = EvaluationRequest::new(
            "",
            [("abstract", "A"), ("introduction", "B"), ("conclusion", "C")],
        );
        let sections = CohesionSections::from_request(&request).unwrap();
        assert_eq!(sections.abstract_text, "A");
        assert_eq!(sections.introduction, "B");
        assert_eq!(sections.conclusion, "C");
    }

    #[test]
    fn test_cohesion_sections_report_missing() {
        let request = EvaluationRequest::new("", [("abstract", "A"), ("introduction", "B")]);
        match CohesionSections::from_request(&request) {
            Err(RequestError::MissingSections(missing)) => {
                assert_eq!(missing, vec!["conclusion".to_string()]);
            }
            other => panic!("expected MissingSections, got {:?}", other),
        }
    }

    #[test]
    fn test_cohesion_sections_blank_counts_as_missing() {
        let request = EvaluationRequest::new(
            "",
            [("abstract", "A"), ("introduction", " "), ("conclusion", "C")],
        );
        assert!(matches!(
            CohesionSections::from_request(&request),
            Err(RequestError::MissingSections(missing)) if missing == vec!["introduction".to_string()]
        ));
    }

    proptest! {
        /// Serialized key order always follows insertion order, whatever the titles.
        #[test]
        fn proptest_evaluation_order_preserved(titles in prop::collection::btree_set("[A-Z][a-z]{1,8}", 1..6)) {
            let titles: Vec<String> = titles.into_iter().rev().collect();
            let mut evaluations = Evaluations::new();
            for title in &titles {
                evaluations.insert(title.clone(), EvaluationOutcome::Whole(title.to_lowercase()));
            }

            let value = serde_json::to_value(&evaluations).unwrap();
            let object = value.as_object().unwrap();
            prop_assert_eq!(object.len(), titles.len());
            prop_assert_eq!(evaluations.titles(), titles.iter().map(String::as_str).collect::<Vec<_>>());
        }
    }
}
