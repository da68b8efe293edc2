use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::location::LocationProvider;
use crate::severity::{RuleKey, SeverityPolicy};
use crate::{Category, Change, ChangeKind, DiffOptions, Mode, Severity};

/// Everything found by one comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffResult {
    changes: Vec<Change>,
    breaking: usize,
    warnings: usize,
    infos: usize,
}

impl DiffResult {
    /// All changes, in the order they were found.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Take the changes out of the result.
    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }

    /// Number of `error` and `critical` changes.
    pub fn breaking_count(&self) -> usize {
        self.breaking
    }

    /// Number of `warning` changes.
    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    /// Number of `info` changes.
    pub fn info_count(&self) -> usize {
        self.infos
    }

    /// Whether any change is breaking. Always `false` in [`Mode::Plain`].
    pub fn has_breaking(&self) -> bool {
        self.breaking > 0
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether the documents are equivalent.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// One line per change, see [`Change`]'s `Display` implementation.
    pub fn render(&self) -> String {
        self.changes
            .iter()
            .map(|change| format!("{change}\n"))
            .collect()
    }

    /// A one-line summary of the counts.
    pub fn summary(&self) -> String {
        format!(
            "{} changes: {} breaking, {} warnings, {} info",
            self.changes.len(),
            self.breaking,
            self.warnings,
            self.infos
        )
    }

    fn push(&mut self, change: Change) {
        match change.severity {
            Some(Severity::Critical | Severity::Error) => self.breaking += 1,
            Some(Severity::Warning) => self.warnings += 1,
            Some(Severity::Info) => self.infos += 1,
            None => (),
        }
        self.changes.push(change);
    }
}

#[derive(Debug, Clone, Copy)]
enum DefaultSeverity {
    Fixed(Severity),
    Conditional {
        condition: bool,
        if_true: Severity,
        if_false: Severity,
    },
}

/// A change that has not been classified yet.
#[derive(Debug, Clone)]
pub(crate) struct Draft<'s> {
    path: String,
    kind: ChangeKind,
    category: Category,
    sub_type: &'s str,
    severity: DefaultSeverity,
    old_value: Option<Value>,
    new_value: Option<Value>,
    message: String,
}

impl<'s> Draft<'s> {
    pub fn new(kind: ChangeKind, category: Category, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            category,
            sub_type: "",
            severity: DefaultSeverity::Fixed(Severity::Info),
            old_value: None,
            new_value: None,
            message: String::new(),
        }
    }

    pub fn added(category: Category, path: impl Into<String>) -> Self {
        Self::new(ChangeKind::Added, category, path)
    }

    pub fn removed(category: Category, path: impl Into<String>) -> Self {
        Self::new(ChangeKind::Removed, category, path)
    }

    pub fn modified(category: Category, path: impl Into<String>) -> Self {
        Self::new(ChangeKind::Modified, category, path)
    }

    pub fn sub_type(mut self, sub_type: &'s str) -> Self {
        self.sub_type = sub_type;
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = DefaultSeverity::Fixed(severity);
        self
    }

    /// The default severity depends on the direction of the change.
    pub fn severity_if(mut self, condition: bool, if_true: Severity, if_false: Severity) -> Self {
        self.severity = DefaultSeverity::Conditional {
            condition,
            if_true,
            if_false,
        };
        self
    }

    pub fn old_value(mut self, value: impl Into<Option<Value>>) -> Self {
        self.old_value = value.into();
        self
    }

    pub fn new_value(mut self, value: impl Into<Option<Value>>) -> Self {
        self.new_value = value.into();
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Classifies drafts and accumulates them into a [`DiffResult`].
pub(crate) struct Recorder<'a> {
    policy: SeverityPolicy<'a>,
    source_locations: Option<&'a dyn LocationProvider>,
    target_locations: Option<&'a dyn LocationProvider>,
    result: DiffResult,
}

impl<'a> Recorder<'a> {
    pub fn new(options: &DiffOptions<'a>) -> Self {
        Self {
            policy: SeverityPolicy::new(options.mode, options.rules),
            source_locations: options.source_locations,
            target_locations: options.target_locations,
            result: DiffResult::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.policy.mode()
    }

    pub fn record(&mut self, draft: Draft<'_>) {
        let key = RuleKey {
            category: draft.category,
            kind: draft.kind,
            sub_type: draft.sub_type,
        };
        let resolution = match draft.severity {
            DefaultSeverity::Fixed(severity) => self.policy.resolve(severity, key),
            DefaultSeverity::Conditional {
                condition,
                if_true,
                if_false,
            } => self
                .policy
                .resolve_conditional(condition, if_true, if_false, key),
        };
        if resolution.ignore {
            trace!(path = %draft.path, ?key, "change ignored by rule");
            return;
        }

        // Additions only exist in the target document, everything else is found in the source.
        let locations = match draft.kind {
            ChangeKind::Added => self.target_locations,
            ChangeKind::Removed | ChangeKind::Modified => self.source_locations,
        };
        let location = locations.and_then(|provider| provider.locate(&draft.path));

        self.result.push(Change {
            path: draft.path,
            kind: draft.kind,
            category: draft.category,
            severity: resolution.severity,
            old_value: draft.old_value,
            new_value: draft.new_value,
            message: draft.message,
            location,
        });
    }

    pub fn finish(self) -> DiffResult {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Location, Rule, SeverityRules, SourceMap};

    fn removed_param() -> Draft<'static> {
        Draft::removed(Category::Parameter, "/paths/~1pets/get/parameters/query/id")
            .sub_type("required")
            .severity(Severity::Critical)
            .message("required query parameter 'id' removed")
    }

    #[test]
    fn counts() {
        let options = DiffOptions::new();
        let mut recorder = Recorder::new(&options);
        recorder.record(removed_param());
        recorder.record(Draft::added(Category::Info, "/info/contact"));
        recorder.record(
            Draft::modified(Category::Server, "/host").severity(Severity::Warning),
        );
        let result = recorder.finish();

        assert_eq!(result.len(), 3);
        assert_eq!(result.breaking_count(), 1);
        assert_eq!(result.warning_count(), 1);
        assert_eq!(result.info_count(), 1);
        assert!(result.has_breaking());
        assert_eq!(result.summary(), "3 changes: 1 breaking, 1 warnings, 1 info");
    }

    #[test]
    fn ignored_changes_are_not_counted() {
        let mut rules = SeverityRules::default();
        rules.set(Category::Parameter, ChangeKind::Removed, "", Rule::ignore());
        let options = DiffOptions::new().rules(&rules);
        let mut recorder = Recorder::new(&options);
        recorder.record(removed_param());
        let result = recorder.finish();

        assert!(result.is_empty());
        assert!(!result.has_breaking());
    }

    #[test]
    fn plain_mode() {
        let options = DiffOptions::new().mode(Mode::Plain);
        let mut recorder = Recorder::new(&options);
        recorder.record(removed_param());
        let result = recorder.finish();

        assert_eq!(result.changes()[0].severity, None);
        assert!(!result.has_breaking());
        assert_eq!(
            result.render(),
            "- /paths/~1pets/get/parameters/query/id (removed parameter): \
             required query parameter 'id' removed\n"
        );
    }

    #[test]
    fn conditional_severity() {
        let options = DiffOptions::new();
        let mut recorder = Recorder::new(&options);
        recorder.record(
            Draft::modified(Category::Schema, "/nullable").severity_if(
                false,
                Severity::Info,
                Severity::Error,
            ),
        );
        assert_eq!(recorder.finish().changes()[0].severity, Some(Severity::Error));
    }

    #[test]
    fn locations_by_side() {
        let mut source = SourceMap::new(Some("old.yaml".to_owned()));
        source.insert("/a", 1, 1);
        let mut target = SourceMap::new(Some("new.yaml".to_owned()));
        target.insert("/a", 2, 3);
        let options = DiffOptions::new()
            .source_locations(&source)
            .target_locations(&target);

        let mut recorder = Recorder::new(&options);
        recorder.record(Draft::added(Category::Info, "/a"));
        recorder.record(Draft::removed(Category::Info, "/a"));
        recorder.record(Draft::modified(Category::Info, "/a"));
        recorder.record(Draft::modified(Category::Info, "/b"));
        let result = recorder.finish();

        let files: Vec<_> = result
            .changes()
            .iter()
            .map(|c| c.location.as_ref().and_then(|l| l.file.as_deref()))
            .collect();
        assert_eq!(
            files,
            [Some("new.yaml"), Some("old.yaml"), Some("old.yaml"), None]
        );
        assert_eq!(
            result.changes()[0].location,
            Some(Location {
                line: 2,
                column: 3,
                file: Some("new.yaml".to_owned())
            })
        );
    }
}
