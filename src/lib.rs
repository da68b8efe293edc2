#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

use serde_json::Value;

mod collections;
mod diff_walker;
mod document;
mod fields;
mod location;
mod model;
mod paths;
mod resolver;
mod result;
mod schema;
mod severity;
mod types;

pub use location::{LocationProvider, SourceMap};
pub use model::Version;
pub use result::DiffResult;
pub use severity::{Resolution, Rule, RuleKey, RuleSet, SeverityPolicy, SeverityRules};
pub use types::*;

/// How a comparison is run.
#[derive(Clone, Copy, Default)]
pub struct DiffOptions<'a> {
    /// Whether changes are classified at all.
    pub mode: Mode,
    /// Overrides of the built-in severities. `None` uses the defaults.
    pub rules: Option<&'a SeverityRules>,
    /// Positions in the text of the old document.
    pub source_locations: Option<&'a dyn LocationProvider>,
    /// Positions in the text of the new document.
    pub target_locations: Option<&'a dyn LocationProvider>,
}

impl<'a> DiffOptions<'a> {
    /// Classifying mode with the built-in severities and no locations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the [`Mode`].
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Apply severity rules on top of the built-in severities.
    pub fn rules(mut self, rules: &'a SeverityRules) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Look up the location of removed and modified elements with `provider`.
    pub fn source_locations(mut self, provider: &'a dyn LocationProvider) -> Self {
        self.source_locations = Some(provider);
        self
    }

    /// Look up the location of added elements with `provider`.
    pub fn target_locations(mut self, provider: &'a dyn LocationProvider) -> Self {
        self.target_locations = Some(provider);
        self
    }
}

/// Take two OpenAPI (or Swagger) documents, and compare them.
///
/// `lhs` (left-hand side) is the old document, `rhs` (right-hand side) is the new document.
/// Changes are classified with the built-in severities.
pub fn diff(lhs: Value, rhs: Value) -> Result<DiffResult, Error> {
    diff_with(&lhs, &rhs, &DiffOptions::new())
}

/// Like [`diff`], with control over classification and source locations.
pub fn diff_with(lhs: &Value, rhs: &Value, options: &DiffOptions<'_>) -> Result<DiffResult, Error> {
    document::compare(lhs, rhs, options)
}
