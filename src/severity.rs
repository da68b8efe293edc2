use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Category, ChangeKind, Error, Mode, Severity};

/// Override for the severity of one kind of change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    /// Severity to use instead of the built-in default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Drop matching changes from the result altogether.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignore: bool,
}

impl Rule {
    /// A rule replacing the default severity.
    pub fn severity(severity: Severity) -> Self {
        Self {
            severity: Some(severity),
            ignore: false,
        }
    }

    /// A rule suppressing matching changes.
    pub fn ignore() -> Self {
        Self {
            severity: None,
            ignore: true,
        }
    }
}

/// The rules for one [`Category`].
///
/// Keys are either a change kind (`"removed"`), matching every change of that kind, or a change
/// kind and a sub-type separated by a dot (`"removed.required"`), matching only changes with
/// that sub-type. Sub-types are mostly the keyword that changed, e.g. `"maxLength"`, `"format"`
/// or `"operationId"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RuleSet(BTreeMap<String, Rule>);

impl RuleSet {
    fn get(&self, kind: ChangeKind, sub_type: &str) -> Option<&Rule> {
        if !sub_type.is_empty() {
            if let Some(rule) = self.0.get(&format!("{kind}.{sub_type}")) {
                return Some(rule);
            }
        }
        self.0.get(kind.as_str())
    }

    fn insert(&mut self, kind: ChangeKind, sub_type: &str, rule: Rule) {
        let key = if sub_type.is_empty() {
            kind.as_str().to_owned()
        } else {
            format!("{kind}.{sub_type}")
        };
        self.0.insert(key, rule);
    }

    fn validate(&self) -> Result<(), Error> {
        for key in self.0.keys() {
            let kind = key.split_once('.').map_or(key.as_str(), |(kind, sub)| {
                if sub.is_empty() {
                    ""
                } else {
                    kind
                }
            });
            if !ChangeKind::ALL.iter().any(|k| k.as_str() == kind) {
                return Err(Error::InvalidRuleKey(key.clone()));
            }
        }
        Ok(())
    }

    /// Number of rules in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no rules.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Caller-supplied overrides of the built-in severities, one [`RuleSet`] per [`Category`].
///
/// The built-in defaults are the empty configuration. The `strict` and `lenient` presets are
/// plain data over the same mechanism, so a rules file can be layered on top of any of them with
/// [`SeverityRules::merge`].
///
/// ```
/// use openapi_diff::{Category, ChangeKind, Rule, Severity, SeverityRules};
///
/// let mut rules = SeverityRules::default();
/// rules.set(Category::Schema, ChangeKind::Modified, "format", Rule::severity(Severity::Info));
/// assert_eq!(
///     rules.lookup(Category::Schema, ChangeKind::Modified, "format"),
///     Some(&Rule::severity(Severity::Info))
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SeverityRules {
    /// Rules for whole paths.
    pub endpoint: RuleSet,
    /// Rules for operations.
    pub operation: RuleSet,
    /// Rules for parameters.
    pub parameter: RuleSet,
    /// Rules for request bodies.
    pub request_body: RuleSet,
    /// Rules for responses.
    pub response: RuleSet,
    /// Rules for schemas.
    pub schema: RuleSet,
    /// Rules for security schemes and requirements.
    pub security: RuleSet,
    /// Rules for servers.
    pub server: RuleSet,
    /// Rules for document metadata.
    pub info: RuleSet,
    /// Rules for vendor extensions.
    pub extension: RuleSet,
}

impl SeverityRules {
    /// The names accepted by [`SeverityRules::preset`].
    pub const PRESETS: [&'static str; 3] = ["default", "strict", "lenient"];

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::default()),
            "strict" => Some(Self::strict()),
            "lenient" => Some(Self::lenient()),
            _ => None,
        }
    }

    /// Elevates changes that default to `warning` to `error`.
    pub fn strict() -> Self {
        use Category::*;
        use ChangeKind::*;

        let error = || Rule::severity(Severity::Error);
        let mut rules = Self::default();
        rules
            .set(Server, Removed, "", error())
            .set(Server, Modified, "host", error())
            .set(Server, Modified, "basePath", error())
            .set(Server, Modified, "default", error())
            .set(Schema, Modified, "type", error())
            .set(Schema, Modified, "format", error())
            .set(Schema, Modified, "discriminator", error())
            .set(Schema, Added, "anyOf", error())
            .set(Schema, Removed, "anyOf", error())
            .set(Schema, Added, "oneOf", error())
            .set(Schema, Removed, "oneOf", error())
            .set(Response, Added, "error", error())
            .set(Parameter, Removed, "", error())
            // Keeps removal of a required parameter above the category-wide rule.
            .set(Parameter, Removed, "required", Rule::severity(Severity::Critical))
            .set(RequestBody, Removed, "", error());
        rules
    }

    /// Demotes changes that only break clients relying on the exact previous constraints from
    /// `error` to `warning`.
    pub fn lenient() -> Self {
        use Category::*;
        use ChangeKind::*;

        let warning = || Rule::severity(Severity::Warning);
        let mut rules = Self::default();
        rules
            .set(Schema, Removed, "enum", warning())
            .set(Schema, Added, "required", warning())
            .set(Schema, Modified, "pattern", warning())
            .set(Schema, Added, "pattern", warning())
            .set(Response, Removed, "success", warning())
            .set(Security, Removed, "", warning());
        for bound in [
            "multipleOf",
            "maximum",
            "minimum",
            "maxLength",
            "minLength",
            "maxItems",
            "minItems",
            "maxProperties",
            "minProperties",
        ] {
            rules
                .set(Schema, Added, bound, warning())
                .set(Schema, Modified, bound, warning());
        }
        rules
    }

    /// Add or replace the rule for `(category, kind, sub_type)`. An empty `sub_type` matches
    /// every change of `kind` in `category` that has no more specific rule.
    pub fn set(
        &mut self,
        category: Category,
        kind: ChangeKind,
        sub_type: &str,
        rule: Rule,
    ) -> &mut Self {
        self.rule_set_mut(category).insert(kind, sub_type, rule);
        self
    }

    /// Find the rule for a change: an exact `(category, kind, sub_type)` rule wins over a
    /// `(category, kind)` rule.
    pub fn lookup(&self, category: Category, kind: ChangeKind, sub_type: &str) -> Option<&Rule> {
        self.rule_set(category).get(kind, sub_type)
    }

    /// Overlay `other` on top of `self`; rules of `other` replace rules with the same key.
    pub fn merge(&mut self, other: &SeverityRules) -> &mut Self {
        for (mine, theirs) in self.rule_sets_mut().into_iter().zip(other.rule_sets()) {
            mine.0
                .extend(theirs.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        self
    }

    /// Check that every key names a change kind.
    pub fn validate(&self) -> Result<(), Error> {
        self.rule_sets().into_iter().try_for_each(RuleSet::validate)
    }

    fn rule_set(&self, category: Category) -> &RuleSet {
        match category {
            Category::Endpoint => &self.endpoint,
            Category::Operation => &self.operation,
            Category::Parameter => &self.parameter,
            Category::RequestBody => &self.request_body,
            Category::Response => &self.response,
            Category::Schema => &self.schema,
            Category::Security => &self.security,
            Category::Server => &self.server,
            Category::Info => &self.info,
            Category::Extension => &self.extension,
        }
    }

    fn rule_set_mut(&mut self, category: Category) -> &mut RuleSet {
        match category {
            Category::Endpoint => &mut self.endpoint,
            Category::Operation => &mut self.operation,
            Category::Parameter => &mut self.parameter,
            Category::RequestBody => &mut self.request_body,
            Category::Response => &mut self.response,
            Category::Schema => &mut self.schema,
            Category::Security => &mut self.security,
            Category::Server => &mut self.server,
            Category::Info => &mut self.info,
            Category::Extension => &mut self.extension,
        }
    }

    fn rule_sets(&self) -> [&RuleSet; 10] {
        [
            &self.endpoint,
            &self.operation,
            &self.parameter,
            &self.request_body,
            &self.response,
            &self.schema,
            &self.security,
            &self.server,
            &self.info,
            &self.extension,
        ]
    }

    fn rule_sets_mut(&mut self) -> [&mut RuleSet; 10] {
        [
            &mut self.endpoint,
            &mut self.operation,
            &mut self.parameter,
            &mut self.request_body,
            &mut self.response,
            &mut self.schema,
            &mut self.security,
            &mut self.server,
            &mut self.info,
            &mut self.extension,
        ]
    }
}

/// Identifies the rule a change is looked up under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleKey<'a> {
    /// The category of the change.
    pub category: Category,
    /// The kind of the change.
    pub kind: ChangeKind,
    /// Finer-grained qualifier, `""` if there is none.
    pub sub_type: &'a str,
}

/// Outcome of [`SeverityPolicy::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// The severity to attach, `None` in [`Mode::Plain`].
    pub severity: Option<Severity>,
    /// Whether the change is to be dropped.
    pub ignore: bool,
}

/// Decides the severity of every change of one comparison run.
#[derive(Debug, Clone, Copy)]
pub struct SeverityPolicy<'a> {
    mode: Mode,
    rules: Option<&'a SeverityRules>,
}

impl<'a> SeverityPolicy<'a> {
    /// A policy for `mode`, optionally overriding defaults with `rules`.
    pub fn new(mode: Mode, rules: Option<&'a SeverityRules>) -> Self {
        Self { mode, rules }
    }

    /// The comparison mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Resolve the severity of a change whose built-in severity is `default`.
    pub fn resolve(&self, default: Severity, key: RuleKey<'_>) -> Resolution {
        if self.mode == Mode::Plain {
            return Resolution {
                severity: None,
                ignore: false,
            };
        }
        match self
            .rules
            .and_then(|rules| rules.lookup(key.category, key.kind, key.sub_type))
        {
            Some(rule) => Resolution {
                severity: Some(rule.severity.unwrap_or(default)),
                ignore: rule.ignore,
            },
            None => Resolution {
                severity: Some(default),
                ignore: false,
            },
        }
    }

    /// Like [`SeverityPolicy::resolve`], with the default picked by the direction of the change.
    pub fn resolve_conditional(
        &self,
        condition: bool,
        if_true: Severity,
        if_false: Severity,
        key: RuleKey<'_>,
    ) -> Resolution {
        self.resolve(if condition { if_true } else { if_false }, key)
    }
}
