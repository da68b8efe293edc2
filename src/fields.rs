//! Comparators for a single keyword. Each emits at most one change.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Number, Value};

use crate::collections::diff_keyed;
use crate::location::child_path;
use crate::result::{Draft, Recorder};
use crate::{Category, Mode, Severity};

/// A keyword of the object at `parent`. The keyword name doubles as the rule sub-type.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Field<'p> {
    pub parent: &'p str,
    pub name: &'static str,
    pub category: Category,
}

impl<'p> Field<'p> {
    pub fn new(parent: &'p str, category: Category, name: &'static str) -> Self {
        Self {
            parent,
            name,
            category,
        }
    }

    pub fn path(&self) -> String {
        child_path(self.parent, self.name)
    }

    fn added(&self) -> Draft<'static> {
        Draft::added(self.category, self.path()).sub_type(self.name)
    }

    fn removed(&self) -> Draft<'static> {
        Draft::removed(self.category, self.path()).sub_type(self.name)
    }

    fn modified(&self) -> Draft<'static> {
        Draft::modified(self.category, self.path()).sub_type(self.name)
    }
}

impl Recorder<'_> {
    /// Compare a free-text or identifier keyword.
    ///
    /// When classifying, an empty string is the same as an absent keyword. Plain mode reports
    /// every textual difference.
    pub fn text(
        &mut self,
        field: Field<'_>,
        lhs: Option<&str>,
        rhs: Option<&str>,
        severity: Severity,
    ) {
        let (lhs, rhs) = match self.mode() {
            Mode::Classifying => (
                lhs.filter(|s| !s.is_empty()),
                rhs.filter(|s| !s.is_empty()),
            ),
            Mode::Plain => (lhs, rhs),
        };
        // Long prose is not repeated in messages.
        let verbatim = !matches!(field.name, "description" | "summary" | "title");
        let name = field.name;

        let draft = match (lhs, rhs) {
            (None, Some(r)) => field.added().message(if verbatim {
                format!("{name} '{r}' added")
            } else {
                format!("{name} added")
            }),
            (Some(l), None) => field.removed().message(if verbatim {
                format!("{name} '{l}' removed")
            } else {
                format!("{name} removed")
            }),
            (Some(l), Some(r)) if l != r => field.modified().message(if verbatim {
                format!("{name} changed from '{l}' to '{r}'")
            } else {
                format!("{name} changed")
            }),
            _ => return,
        };
        self.record(
            draft
                .severity(severity)
                .old_value(lhs.map(Value::from))
                .new_value(rhs.map(Value::from)),
        );
    }

    /// Compare a boolean keyword. `on` is the severity of `false -> true`, `off` the one of
    /// `true -> false`.
    pub fn flag(&mut self, field: Field<'_>, lhs: bool, rhs: bool, on: Severity, off: Severity) {
        if lhs == rhs {
            return;
        }
        self.record(
            field
                .modified()
                .severity_if(rhs, on, off)
                .old_value(Value::Bool(lhs))
                .new_value(Value::Bool(rhs))
                .message(format!("{} changed from {lhs} to {rhs}", field.name)),
        );
    }

    /// Compare a maximum-type bound: adding or lowering it is an error, removing or raising it
    /// a warning.
    pub fn upper_bound(&mut self, field: Field<'_>, lhs: Option<&Number>, rhs: Option<&Number>) {
        self.bound(field, lhs, rhs, true);
    }

    /// Compare a minimum-type bound: adding or raising it is an error, removing or lowering it
    /// a warning.
    pub fn lower_bound(&mut self, field: Field<'_>, lhs: Option<&Number>, rhs: Option<&Number>) {
        self.bound(field, lhs, rhs, false);
    }

    fn bound(&mut self, field: Field<'_>, lhs: Option<&Number>, rhs: Option<&Number>, upper: bool) {
        let name = field.name;
        let draft = match (lhs, rhs) {
            (None, Some(r)) => field
                .added()
                .severity(Severity::Error)
                .message(format!("{name} of {r} added")),
            (Some(l), None) => field
                .removed()
                .severity(Severity::Warning)
                .message(format!("{name} of {l} removed")),
            (Some(l), Some(r)) => {
                let (lf, rf) = (as_f64(l), as_f64(r));
                if lf == rf {
                    return;
                }
                let tightened = if upper { rf < lf } else { rf > lf };
                let verb = if rf < lf { "lowered" } else { "raised" };
                field
                    .modified()
                    .severity_if(tightened, Severity::Error, Severity::Warning)
                    .message(format!("{name} {verb} from {l} to {r}"))
            }
            (None, None) => return,
        };
        self.record(
            draft
                .old_value(lhs.cloned().map(Value::Number))
                .new_value(rhs.cloned().map(Value::Number)),
        );
    }

    /// Compare an arbitrary value by deep equality.
    pub fn value(
        &mut self,
        field: Field<'_>,
        lhs: Option<&Value>,
        rhs: Option<&Value>,
        severity: Severity,
    ) {
        let name = field.name;
        let draft = match (lhs, rhs) {
            (None, Some(_)) => field.added().message(format!("{name} added")),
            (Some(_), None) => field.removed().message(format!("{name} removed")),
            (Some(l), Some(r)) if l != r => field.modified().message(format!("{name} changed")),
            _ => return,
        };
        self.record(
            draft
                .severity(severity)
                .old_value(lhs.cloned())
                .new_value(rhs.cloned()),
        );
    }

    /// Compare a set of strings, one change per element. `noun` names an element in messages.
    pub fn string_set(
        &mut self,
        field: Field<'_>,
        lhs: &BTreeSet<String>,
        rhs: &BTreeSet<String>,
        removed: Severity,
        added: Severity,
        noun: &str,
    ) {
        for gone in lhs.difference(rhs) {
            self.record(
                field
                    .removed()
                    .severity(removed)
                    .old_value(Value::from(gone.as_str()))
                    .message(format!("{noun} '{gone}' removed")),
            );
        }
        for new in rhs.difference(lhs) {
            self.record(
                field
                    .added()
                    .severity(added)
                    .new_value(Value::from(new.as_str()))
                    .message(format!("{noun} '{new}' added")),
            );
        }
    }

    /// Compare the `x-` extensions of the object at `parent`. Keys without the prefix are
    /// ignored.
    pub fn extensions(
        &mut self,
        parent: &str,
        lhs: &BTreeMap<String, Value>,
        rhs: &BTreeMap<String, Value>,
    ) {
        let diff = diff_keyed(lhs, rhs);
        let is_extension = |key: &&String| key.starts_with("x-");

        for (key, old) in diff.removed.into_iter().filter(|(k, _)| is_extension(k)) {
            self.record(
                Draft::removed(Category::Extension, child_path(parent, key))
                    .sub_type(key)
                    .old_value(old.clone())
                    .message(format!("extension '{key}' removed")),
            );
        }
        for (key, new) in diff.added.into_iter().filter(|(k, _)| is_extension(k)) {
            self.record(
                Draft::added(Category::Extension, child_path(parent, key))
                    .sub_type(key)
                    .new_value(new.clone())
                    .message(format!("extension '{key}' added")),
            );
        }
        for (key, old, new) in diff.common {
            if old == new || !is_extension(&key) {
                continue;
            }
            self.record(
                Draft::modified(Category::Extension, child_path(parent, key))
                    .sub_type(key)
                    .old_value(old.clone())
                    .new_value(new.clone())
                    .message(format!("extension '{key}' changed")),
            );
        }
    }
}

pub(crate) fn as_f64(n: &Number) -> f64 {
    n.as_f64().unwrap_or(f64::NAN)
}

/// Render a value for a message. Strings are quoted the way every message quotes names.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChangeKind, DiffOptions};
    use serde_json::json;

    fn num(v: Value) -> Number {
        match v {
            Value::Number(n) => n,
            _ => unreachable!(),
        }
    }

    fn run(mode: Mode, f: impl FnOnce(&mut Recorder<'_>)) -> Vec<crate::Change> {
        let options = DiffOptions::new().mode(mode);
        let mut recorder = Recorder::new(&options);
        f(&mut recorder);
        recorder.finish().into_changes()
    }

    #[test]
    fn bounds_tightening_and_relaxing() {
        let field = Field::new("/s", Category::Schema, "maximum");
        let (five, ten) = (num(json!(5)), num(json!(10)));
        let changes = run(Mode::Classifying, |r| {
            r.upper_bound(field, Some(&ten), Some(&five));
            r.upper_bound(field, Some(&five), Some(&ten));
            r.upper_bound(field, None, Some(&five));
            r.upper_bound(field, Some(&five), None);
            r.upper_bound(field, Some(&five), Some(&num(json!(5.0))));
        });
        let severities: Vec<_> = changes.iter().map(|c| c.severity.unwrap()).collect();
        assert_eq!(
            severities,
            [Severity::Error, Severity::Warning, Severity::Error, Severity::Warning]
        );
        assert_eq!(changes[0].message, "maximum lowered from 10 to 5");
        assert_eq!(changes[0].path, "/s/maximum");
        assert_eq!(changes[2].kind, ChangeKind::Added);

        let field = Field::new("/s", Category::Schema, "minLength");
        let changes = run(Mode::Classifying, |r| {
            r.lower_bound(field, Some(&five), Some(&ten));
            r.lower_bound(field, Some(&ten), Some(&five));
        });
        assert_eq!(changes[0].severity, Some(Severity::Error));
        assert_eq!(changes[0].message, "minLength raised from 5 to 10");
        assert_eq!(changes[1].severity, Some(Severity::Warning));
    }

    #[test]
    fn empty_text_depends_on_mode() {
        let field = Field::new("/info", Category::Info, "description");
        let compare = |r: &mut Recorder<'_>| r.text(field, None, Some(""), Severity::Info);
        assert!(run(Mode::Classifying, compare).is_empty());

        let changes = run(Mode::Plain, compare);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].message, "description added");
        assert_eq!(changes[0].severity, None);
    }

    #[test]
    fn flags() {
        let field = Field::new("/s", Category::Schema, "nullable");
        let changes = run(Mode::Classifying, |r| {
            r.flag(field, true, false, Severity::Info, Severity::Error);
            r.flag(field, false, true, Severity::Info, Severity::Error);
            r.flag(field, true, true, Severity::Info, Severity::Error);
        });
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].severity, Some(Severity::Error));
        assert_eq!(changes[0].message, "nullable changed from true to false");
        assert_eq!(changes[1].severity, Some(Severity::Info));
    }

    #[test]
    fn string_sets() {
        let field = Field::new("/paths/~1pets/get", Category::Operation, "tags");
        let lhs: BTreeSet<String> = ["a".to_owned(), "b".to_owned()].into();
        let rhs: BTreeSet<String> = ["b".to_owned(), "c".to_owned()].into();
        let changes = run(Mode::Classifying, |r| {
            r.string_set(field, &lhs, &rhs, Severity::Info, Severity::Info, "tag")
        });
        let messages: Vec<_> = changes.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, ["tag 'a' removed", "tag 'c' added"]);
    }

    #[test]
    fn extensions_only() {
        let lhs: BTreeMap<String, Value> = [
            ("x-a".to_owned(), json!(1)),
            ("x-b".to_owned(), json!(true)),
            ("other".to_owned(), json!(1)),
        ]
        .into();
        let rhs: BTreeMap<String, Value> = [
            ("x-a".to_owned(), json!(2)),
            ("x-c".to_owned(), json!("new")),
            ("other".to_owned(), json!(2)),
        ]
        .into();
        let changes = run(Mode::Classifying, |r| r.extensions("/info", &lhs, &rhs));
        let summary: Vec<_> = changes
            .iter()
            .map(|c| (c.path.as_str(), c.kind, c.category))
            .collect();
        assert_eq!(
            summary,
            [
                ("/info/x-b", ChangeKind::Removed, Category::Extension),
                ("/info/x-c", ChangeKind::Added, Category::Extension),
                ("/info/x-a", ChangeKind::Modified, Category::Extension),
            ]
        );
        assert!(changes.iter().all(|c| c.severity == Some(Severity::Info)));
    }

    #[test]
    fn values_in_messages() {
        assert_eq!(display_value(&json!("a")), "'a'");
        assert_eq!(display_value(&json!(3)), "3");
        assert_eq!(display_value(&json!(null)), "null");
    }
}
