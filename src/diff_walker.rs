use std::collections::BTreeMap;

use serde_json::{Number, Value};
use tracing::trace;

use crate::collections::diff_keyed;
use crate::fields::{as_f64, display_value, Field};
use crate::location::child_path;
use crate::result::{Draft, Recorder};
use crate::schema::{SchemaArena, SchemaId, SchemaNode, SubSchema, TypeSet};
use crate::{Category, Severity};

const SCHEMA: Category = Category::Schema;

/// Walks two schema graphs in parallel and records how they differ.
pub(crate) struct DiffWalker<'w, 'a> {
    recorder: &'w mut Recorder<'a>,
    lhs: &'w SchemaArena,
    rhs: &'w SchemaArena,
    /// Pairs currently being compared, with the path they were entered at.
    visited: BTreeMap<(SchemaId, SchemaId), String>,
}

impl<'w, 'a> DiffWalker<'w, 'a> {
    pub fn new(recorder: &'w mut Recorder<'a>, lhs: &'w SchemaArena, rhs: &'w SchemaArena) -> Self {
        Self {
            recorder,
            lhs,
            rhs,
            visited: BTreeMap::new(),
        }
    }

    pub fn diff(&mut self, json_path: &str, lhs: Option<SchemaId>, rhs: Option<SchemaId>) {
        match (lhs, rhs) {
            (None, None) => (),
            (None, Some(_)) => self.recorder.record(
                Draft::added(SCHEMA, json_path)
                    .severity(Severity::Info)
                    .message("schema added"),
            ),
            (Some(_), None) => self.recorder.record(
                Draft::removed(SCHEMA, json_path)
                    .severity(Severity::Error)
                    .message("schema removed"),
            ),
            (Some(l), Some(r)) => {
                if let Some(origin) = self.visited.get(&(l, r)) {
                    trace!(json_path, %origin, "schema pair already being compared");
                    return;
                }
                self.visited.insert((l, r), json_path.to_owned());
                self.do_diff(json_path, l, r);
                self.visited.remove(&(l, r));
            }
        }
    }

    fn do_diff(&mut self, json_path: &str, l: SchemaId, r: SchemaId) {
        let (lhs_arena, rhs_arena) = (self.lhs, self.rhs);
        let (lhs, rhs) = (lhs_arena.get(l), rhs_arena.get(r));

        if self.diff_opaque(json_path, lhs, rhs) {
            return;
        }

        let field = |name| Field::new(json_path, SCHEMA, name);

        self.recorder
            .text(field("title"), lhs.title.as_deref(), rhs.title.as_deref(), Severity::Info);
        self.recorder.text(
            field("description"),
            lhs.description.as_deref(),
            rhs.description.as_deref(),
            Severity::Info,
        );
        self.diff_instance_types(json_path, &lhs.ty, &rhs.ty);
        self.recorder.text(
            field("format"),
            lhs.format.as_deref(),
            rhs.format.as_deref(),
            Severity::Warning,
        );

        if self.well_formed(json_path, "multipleOf", lhs, rhs) {
            self.diff_multiple_of(json_path, lhs.multiple_of.as_ref(), rhs.multiple_of.as_ref());
        }
        if self.well_formed(json_path, "maximum", lhs, rhs) {
            self.recorder
                .upper_bound(field("maximum"), lhs.maximum.as_ref(), rhs.maximum.as_ref());
        }
        if self.well_formed(json_path, "minimum", lhs, rhs) {
            self.recorder
                .lower_bound(field("minimum"), lhs.minimum.as_ref(), rhs.minimum.as_ref());
        }
        self.diff_exclusive(
            field("exclusiveMaximum"),
            true,
            lhs.exclusive_maximum.as_ref(),
            rhs.exclusive_maximum.as_ref(),
        );
        self.diff_exclusive(
            field("exclusiveMinimum"),
            false,
            lhs.exclusive_minimum.as_ref(),
            rhs.exclusive_minimum.as_ref(),
        );

        if self.well_formed(json_path, "maxLength", lhs, rhs) {
            self.recorder
                .upper_bound(field("maxLength"), lhs.max_length.as_ref(), rhs.max_length.as_ref());
        }
        if self.well_formed(json_path, "minLength", lhs, rhs) {
            self.recorder.lower_bound(
                field("minLength"),
                positive(&lhs.min_length),
                positive(&rhs.min_length),
            );
        }
        self.diff_pattern(json_path, lhs.pattern.as_deref(), rhs.pattern.as_deref());

        if self.well_formed(json_path, "maxItems", lhs, rhs) {
            self.recorder
                .upper_bound(field("maxItems"), lhs.max_items.as_ref(), rhs.max_items.as_ref());
        }
        if self.well_formed(json_path, "minItems", lhs, rhs) {
            self.recorder.lower_bound(
                field("minItems"),
                positive(&lhs.min_items),
                positive(&rhs.min_items),
            );
        }
        self.recorder.flag(
            field("uniqueItems"),
            lhs.unique_items.unwrap_or(false),
            rhs.unique_items.unwrap_or(false),
            Severity::Error,
            Severity::Warning,
        );

        if self.well_formed(json_path, "maxProperties", lhs, rhs) {
            self.recorder.upper_bound(
                field("maxProperties"),
                lhs.max_properties.as_ref(),
                rhs.max_properties.as_ref(),
            );
        }
        if self.well_formed(json_path, "minProperties", lhs, rhs) {
            self.recorder.lower_bound(
                field("minProperties"),
                positive(&lhs.min_properties),
                positive(&rhs.min_properties),
            );
        }
        self.diff_required(json_path, lhs, rhs);

        self.recorder.flag(
            field("nullable"),
            lhs.nullable.unwrap_or(false),
            rhs.nullable.unwrap_or(false),
            Severity::Info,
            Severity::Error,
        );
        self.recorder.flag(
            field("readOnly"),
            lhs.read_only.unwrap_or(false),
            rhs.read_only.unwrap_or(false),
            Severity::Info,
            Severity::Info,
        );
        self.recorder.flag(
            field("writeOnly"),
            lhs.write_only.unwrap_or(false),
            rhs.write_only.unwrap_or(false),
            Severity::Info,
            Severity::Info,
        );
        self.recorder.flag(
            field("deprecated"),
            lhs.deprecated.unwrap_or(false),
            rhs.deprecated.unwrap_or(false),
            Severity::Warning,
            Severity::Info,
        );

        if self.well_formed(json_path, "enum", lhs, rhs) {
            self.diff_enum(json_path, lhs.enum_values.as_deref(), rhs.enum_values.as_deref());
        }
        self.diff_const(json_path, lhs.const_value.as_ref(), rhs.const_value.as_ref());
        self.recorder.value(
            field("default"),
            lhs.default.as_ref(),
            rhs.default.as_ref(),
            Severity::Info,
        );
        self.recorder.value(
            field("discriminator"),
            lhs.discriminator.as_ref(),
            rhs.discriminator.as_ref(),
            Severity::Warning,
        );

        self.diff_properties(json_path, lhs, rhs);
        self.diff_schema_map(
            json_path,
            "patternProperties",
            &lhs.pattern_properties,
            &rhs.pattern_properties,
            Severity::Warning,
            Severity::Info,
        );
        self.diff_sub_schema(json_path, "items", &lhs.items, &rhs.items);
        self.diff_sub_schema(
            json_path,
            "additionalProperties",
            &lhs.additional_properties,
            &rhs.additional_properties,
        );
        self.diff_sub_schema(
            json_path,
            "unevaluatedProperties",
            &lhs.unevaluated_properties,
            &rhs.unevaluated_properties,
        );
        self.diff_sub_schema(
            json_path,
            "unevaluatedItems",
            &lhs.unevaluated_items,
            &rhs.unevaluated_items,
        );

        self.diff_composition(
            json_path,
            "allOf",
            &lhs.all_of,
            &rhs.all_of,
            Severity::Error,
            Severity::Info,
        );
        self.diff_composition(
            json_path,
            "anyOf",
            &lhs.any_of,
            &rhs.any_of,
            Severity::Warning,
            Severity::Warning,
        );
        self.diff_composition(
            json_path,
            "oneOf",
            &lhs.one_of,
            &rhs.one_of,
            Severity::Warning,
            Severity::Warning,
        );
        self.diff_keyword(json_path, "not", lhs.not, rhs.not);
        self.diff_keyword(json_path, "if", lhs.if_schema, rhs.if_schema);
        self.diff_keyword(json_path, "then", lhs.then_schema, rhs.then_schema);
        self.diff_keyword(json_path, "else", lhs.else_schema, rhs.else_schema);

        self.recorder.text(
            field("contentEncoding"),
            lhs.content_encoding.as_deref(),
            rhs.content_encoding.as_deref(),
            Severity::Warning,
        );
        self.recorder.text(
            field("contentMediaType"),
            lhs.content_media_type.as_deref(),
            rhs.content_media_type.as_deref(),
            Severity::Warning,
        );
        self.diff_keyword(json_path, "contentSchema", lhs.content_schema, rhs.content_schema);
        self.diff_composition(
            json_path,
            "prefixItems",
            &lhs.prefix_items,
            &rhs.prefix_items,
            Severity::Warning,
            Severity::Warning,
        );
        self.diff_keyword(json_path, "contains", lhs.contains, rhs.contains);
        self.diff_keyword(json_path, "propertyNames", lhs.property_names, rhs.property_names);
        self.diff_schema_map(
            json_path,
            "dependentSchemas",
            &lhs.dependent_schemas,
            &rhs.dependent_schemas,
            Severity::Info,
            Severity::Warning,
        );

        self.recorder
            .extensions(json_path, &lhs.extensions, &rhs.extensions);
    }

    /// Handles schemas whose content cannot be compared: unresolvable references and values
    /// that are not schemas. Returns whether the pair was handled.
    fn diff_opaque(&mut self, json_path: &str, lhs: &SchemaNode, rhs: &SchemaNode) -> bool {
        if lhs.unrecognized.is_some() || rhs.unrecognized.is_some() {
            if lhs.unrecognized != rhs.unrecognized {
                self.recorder.record(
                    Draft::modified(SCHEMA, json_path)
                        .sub_type("schema")
                        .severity(Severity::Warning)
                        .old_value(lhs.unrecognized.clone())
                        .new_value(rhs.unrecognized.clone())
                        .message("schema is neither an object nor a boolean"),
                );
            }
            return true;
        }

        if lhs.reference.is_some() || rhs.reference.is_some() {
            if lhs.reference != rhs.reference {
                let describe = |r: &Option<String>| {
                    r.as_deref()
                        .map_or_else(|| "a resolved schema".to_owned(), |r| format!("'{r}'"))
                };
                self.recorder.record(
                    Draft::modified(SCHEMA, child_path(json_path, "$ref"))
                        .sub_type("$ref")
                        .severity(Severity::Warning)
                        .old_value(lhs.reference.clone().map(Value::from))
                        .new_value(rhs.reference.clone().map(Value::from))
                        .message(format!(
                            "unresolvable reference changed from {} to {}",
                            describe(&lhs.reference),
                            describe(&rhs.reference)
                        )),
                );
            }
            return true;
        }

        false
    }

    /// Whether `keyword` has the right shape on both sides. When it does not, one warning is
    /// recorded if the two values differ, and the keyword is not compared any further.
    fn well_formed(
        &mut self,
        json_path: &str,
        keyword: &'static str,
        lhs: &SchemaNode,
        rhs: &SchemaNode,
    ) -> bool {
        let (l, r) = (lhs.ill_shaped.get(keyword), rhs.ill_shaped.get(keyword));
        if l.is_none() && r.is_none() {
            return true;
        }
        let raw = |node: &SchemaNode, odd: Option<&Value>| {
            odd.cloned().or_else(|| match keyword {
                "enum" => node.enum_values.clone().map(Value::Array),
                _ => numeric_keyword(node, keyword).cloned().map(Value::Number),
            })
        };
        let (old, new) = (raw(lhs, l), raw(rhs, r));
        if old != new {
            self.recorder.record(
                Draft::modified(SCHEMA, child_path(json_path, keyword))
                    .sub_type("malformed")
                    .severity(Severity::Warning)
                    .old_value(old)
                    .new_value(new)
                    .message(format!("{keyword} has a value of the wrong shape")),
            );
        }
        false
    }

    fn diff_instance_types(&mut self, json_path: &str, lhs: &TypeSet, rhs: &TypeSet) {
        if lhs == rhs {
            return;
        }
        let path = child_path(json_path, "type");
        let draft = match (lhs, rhs) {
            (TypeSet::Absent, _) => Draft::added(SCHEMA, path),
            (_, TypeSet::Absent) => Draft::removed(SCHEMA, path),
            _ => Draft::modified(SCHEMA, path),
        };
        let draft = match (lhs.accepted(), rhs.accepted()) {
            (Some(old), Some(new)) => {
                draft.severity_if(old.is_subset(&new), Severity::Warning, Severity::Error)
            }
            // Not a valid type on at least one side, nothing sensible to say about direction.
            _ => draft.severity(Severity::Warning),
        };
        self.recorder.record(
            draft
                .sub_type("type")
                .old_value(lhs.to_value())
                .new_value(rhs.to_value())
                .message(format!(
                    "type changed from {} to {}",
                    lhs.describe(),
                    rhs.describe()
                )),
        );
    }

    fn diff_multiple_of(&mut self, json_path: &str, lhs: Option<&Number>, rhs: Option<&Number>) {
        let path = child_path(json_path, "multipleOf");
        let draft = match (lhs, rhs) {
            (None, None) => return,
            (None, Some(r)) => Draft::added(SCHEMA, path)
                .severity(Severity::Error)
                .message(format!("multipleOf of {r} added")),
            (Some(l), None) => Draft::removed(SCHEMA, path)
                .severity(Severity::Warning)
                .message(format!("multipleOf of {l} removed")),
            (Some(l), Some(r)) => {
                let (lf, rf) = (as_f64(l), as_f64(r));
                if lf == rf {
                    return;
                }
                // Every multiple of the old value is still valid when the new one divides it.
                let ratio = lf / rf;
                let relaxed = rf != 0.0 && (ratio - ratio.round()).abs() < 1e-9;
                Draft::modified(SCHEMA, path)
                    .severity_if(relaxed, Severity::Warning, Severity::Error)
                    .message(format!("multipleOf changed from {l} to {r}"))
            }
        };
        self.recorder.record(
            draft
                .sub_type("multipleOf")
                .old_value(lhs.cloned().map(Value::Number))
                .new_value(rhs.cloned().map(Value::Number)),
        );
    }

    /// `exclusiveMaximum`/`exclusiveMinimum` are booleans in OpenAPI 3.0 and Swagger 2.0, and
    /// bounds of their own in OpenAPI 3.1.
    fn diff_exclusive(
        &mut self,
        field: Field<'_>,
        upper: bool,
        lhs: Option<&Value>,
        rhs: Option<&Value>,
    ) {
        let as_number = |v: Option<&Value>| match v {
            Some(Value::Number(n)) => Some(n.clone()),
            _ => None,
        };
        match (lhs, rhs) {
            (None, None) => (),
            (l, r)
                if l.map_or(true, Value::is_number) && r.map_or(true, Value::is_number) =>
            {
                let (l, r) = (as_number(l), as_number(r));
                if upper {
                    self.recorder.upper_bound(field, l.as_ref(), r.as_ref());
                } else {
                    self.recorder.lower_bound(field, l.as_ref(), r.as_ref());
                }
            }
            (l, r)
                if l.map_or(true, Value::is_boolean) && r.map_or(true, Value::is_boolean) =>
            {
                self.recorder.flag(
                    field,
                    l.and_then(Value::as_bool).unwrap_or(false),
                    r.and_then(Value::as_bool).unwrap_or(false),
                    Severity::Error,
                    Severity::Warning,
                );
            }
            (l, r) => self.recorder.value(field, l, r, Severity::Warning),
        }
    }

    fn diff_pattern(&mut self, json_path: &str, lhs: Option<&str>, rhs: Option<&str>) {
        let path = child_path(json_path, "pattern");
        let draft = match (lhs, rhs) {
            (None, Some(r)) => Draft::added(SCHEMA, path)
                .severity(Severity::Error)
                .message(format!("pattern '{r}' added")),
            (Some(l), None) => Draft::removed(SCHEMA, path)
                .severity(Severity::Warning)
                .message(format!("pattern '{l}' removed")),
            // Whether one pattern accepts a superset of the other is not decidable here.
            (Some(l), Some(r)) if l != r => Draft::modified(SCHEMA, path)
                .severity(Severity::Error)
                .message(format!("pattern changed from '{l}' to '{r}'")),
            _ => return,
        };
        self.recorder.record(
            draft
                .sub_type("pattern")
                .old_value(lhs.map(Value::from))
                .new_value(rhs.map(Value::from)),
        );
    }

    fn diff_required(&mut self, json_path: &str, lhs: &SchemaNode, rhs: &SchemaNode) {
        let path = child_path(json_path, "required");

        for removed in lhs.required.difference(&rhs.required) {
            self.recorder.record(
                Draft::removed(SCHEMA, path.clone())
                    .sub_type("required")
                    .severity(Severity::Info)
                    .old_value(Value::from(removed.as_str()))
                    .message(format!("property '{removed}' is no longer required")),
            );
        }

        for added in rhs.required.difference(&lhs.required) {
            self.recorder.record(
                Draft::added(SCHEMA, path.clone())
                    .sub_type("required")
                    .severity(Severity::Error)
                    .new_value(Value::from(added.as_str()))
                    .message(format!("property '{added}' is now required")),
            );
        }
    }

    fn diff_enum(&mut self, json_path: &str, lhs: Option<&[Value]>, rhs: Option<&[Value]>) {
        let path = child_path(json_path, "enum");
        match (lhs, rhs) {
            (None, None) => (),
            (None, Some(values)) => self.recorder.record(
                Draft::added(SCHEMA, path)
                    .sub_type("enum")
                    .severity(Severity::Error)
                    .new_value(Value::from(values.to_vec()))
                    .message("enum constraint added"),
            ),
            (Some(values), None) => self.recorder.record(
                Draft::removed(SCHEMA, path)
                    .sub_type("enum")
                    .severity(Severity::Info)
                    .old_value(Value::from(values.to_vec()))
                    .message("enum constraint removed"),
            ),
            (Some(lhs), Some(rhs)) => {
                let (lhs, rhs) = (distinct(lhs), distinct(rhs));
                for removed in lhs.iter().copied().filter(|v| !rhs.contains(v)) {
                    self.recorder.record(
                        Draft::removed(SCHEMA, path.clone())
                            .sub_type("enum")
                            .severity(Severity::Error)
                            .old_value(removed.clone())
                            .message(format!("enum value {} removed", display_value(removed))),
                    );
                }
                for added in rhs.iter().copied().filter(|v| !lhs.contains(v)) {
                    self.recorder.record(
                        Draft::added(SCHEMA, path.clone())
                            .sub_type("enum")
                            .severity(Severity::Info)
                            .new_value(added.clone())
                            .message(format!("enum value {} added", display_value(added))),
                    );
                }
            }
        }
    }

    fn diff_const(&mut self, json_path: &str, lhs: Option<&Value>, rhs: Option<&Value>) {
        let path = child_path(json_path, "const");
        let draft = match (lhs, rhs) {
            (None, Some(r)) => Draft::added(SCHEMA, path)
                .severity(Severity::Error)
                .message(format!("const {} added", display_value(r))),
            (Some(l), None) => Draft::removed(SCHEMA, path)
                .severity(Severity::Info)
                .message(format!("const {} removed", display_value(l))),
            (Some(l), Some(r)) if l != r => Draft::modified(SCHEMA, path)
                .severity(Severity::Error)
                .message(format!(
                    "const changed from {} to {}",
                    display_value(l),
                    display_value(r)
                )),
            _ => return,
        };
        self.recorder.record(
            draft
                .sub_type("const")
                .old_value(lhs.cloned())
                .new_value(rhs.cloned()),
        );
    }

    fn diff_properties(&mut self, json_path: &str, lhs: &SchemaNode, rhs: &SchemaNode) {
        let path = child_path(json_path, "properties");
        let diff = diff_keyed(&lhs.properties, &rhs.properties);

        for (name, _) in diff.removed {
            let required = lhs.required.contains(name);
            self.recorder.record(
                Draft::removed(SCHEMA, child_path(&path, name))
                    .sub_type("property")
                    .severity_if(required, Severity::Error, Severity::Warning)
                    .message(if required {
                        format!("required property '{name}' removed")
                    } else {
                        format!("property '{name}' removed")
                    }),
            );
        }

        for (name, _) in diff.added {
            let required = rhs.required.contains(name);
            self.recorder.record(
                Draft::added(SCHEMA, child_path(&path, name))
                    .sub_type("property")
                    .severity_if(required, Severity::Warning, Severity::Info)
                    .message(if required {
                        format!("required property '{name}' added")
                    } else {
                        format!("property '{name}' added")
                    }),
            );
        }

        for (name, l, r) in diff.common {
            self.diff(&child_path(&path, name), Some(*l), Some(*r));
        }
    }

    /// Compare a map of named subschemas such as `patternProperties`.
    fn diff_schema_map(
        &mut self,
        json_path: &str,
        keyword: &'static str,
        lhs: &BTreeMap<String, SchemaId>,
        rhs: &BTreeMap<String, SchemaId>,
        removed: Severity,
        added: Severity,
    ) {
        let path = child_path(json_path, keyword);
        let diff = diff_keyed(lhs, rhs);

        for (key, _) in diff.removed {
            self.recorder.record(
                Draft::removed(SCHEMA, child_path(&path, key))
                    .sub_type(keyword)
                    .severity(removed)
                    .message(format!("{keyword} entry '{key}' removed")),
            );
        }
        for (key, _) in diff.added {
            self.recorder.record(
                Draft::added(SCHEMA, child_path(&path, key))
                    .sub_type(keyword)
                    .severity(added)
                    .message(format!("{keyword} entry '{key}' added")),
            );
        }
        for (key, l, r) in diff.common {
            self.diff(&child_path(&path, key), Some(*l), Some(*r));
        }
    }

    /// Compare a keyword that may be absent, a schema or a boolean.
    ///
    /// Going from "anything" (absent or `true`) to a schema to `false` tightens what is accepted.
    /// Tightening to `false` is an error, to a schema a warning. Relaxing is informational for
    /// object keywords, but a warning for array keywords.
    fn diff_sub_schema(
        &mut self,
        json_path: &str,
        keyword: &'static str,
        lhs: &SubSchema,
        rhs: &SubSchema,
    ) {
        let path = child_path(json_path, keyword);
        let draft = match (lhs, rhs) {
            (SubSchema::Absent, SubSchema::Absent) => return,
            (SubSchema::Schema(l), SubSchema::Schema(r)) => {
                self.diff(&path, Some(*l), Some(*r));
                return;
            }
            (SubSchema::Bool(l), SubSchema::Bool(r)) if l == r => return,
            (SubSchema::Unrecognized(l), SubSchema::Unrecognized(r)) if l == r => return,
            (SubSchema::Unrecognized(_), _) | (_, SubSchema::Unrecognized(_)) => {
                sub_schema_draft(&path, lhs, rhs)
                    .severity(Severity::Warning)
                    .message(format!("{keyword} has an unsupported shape"))
            }
            _ => {
                let (before, after) = (restrictiveness(lhs), restrictiveness(rhs));
                let array_keyword = matches!(keyword, "items" | "unevaluatedItems");
                let severity = if after > before {
                    if after == FORBIDDEN {
                        Severity::Error
                    } else {
                        Severity::Warning
                    }
                } else if after < before && array_keyword {
                    Severity::Warning
                } else {
                    Severity::Info
                };
                sub_schema_draft(&path, lhs, rhs)
                    .severity(severity)
                    .message(format!(
                        "{keyword} changed from {} to {}",
                        describe_sub_schema(lhs),
                        describe_sub_schema(rhs)
                    ))
            }
        };
        self.recorder.record(
            draft
                .sub_type(keyword)
                .old_value(sub_schema_value(lhs))
                .new_value(sub_schema_value(rhs)),
        );
    }

    /// Compare a list of subschemas position by position.
    fn diff_composition(
        &mut self,
        json_path: &str,
        keyword: &'static str,
        lhs: &[SchemaId],
        rhs: &[SchemaId],
        added: Severity,
        removed: Severity,
    ) {
        let path = child_path(json_path, keyword);

        for (i, (l, r)) in lhs.iter().zip(rhs).enumerate() {
            self.diff(&child_path(&path, &i.to_string()), Some(*l), Some(*r));
        }
        for i in rhs.len()..lhs.len() {
            self.recorder.record(
                Draft::removed(SCHEMA, child_path(&path, &i.to_string()))
                    .sub_type(keyword)
                    .severity(removed)
                    .message(format!("{keyword} member {i} removed")),
            );
        }
        for i in lhs.len()..rhs.len() {
            self.recorder.record(
                Draft::added(SCHEMA, child_path(&path, &i.to_string()))
                    .sub_type(keyword)
                    .severity(added)
                    .message(format!("{keyword} member {i} added")),
            );
        }
    }

    /// Compare a keyword holding a single optional subschema.
    fn diff_keyword(
        &mut self,
        json_path: &str,
        keyword: &'static str,
        lhs: Option<SchemaId>,
        rhs: Option<SchemaId>,
    ) {
        let path = child_path(json_path, keyword);
        match (lhs, rhs) {
            (None, None) => (),
            (None, Some(_)) => self.recorder.record(
                Draft::added(SCHEMA, path)
                    .sub_type(keyword)
                    .severity(Severity::Info)
                    .message(format!("{keyword} added")),
            ),
            (Some(_), None) => self.recorder.record(
                Draft::removed(SCHEMA, path)
                    .sub_type(keyword)
                    .severity(Severity::Error)
                    .message(format!("{keyword} removed")),
            ),
            (l, r) => self.diff(&path, l, r),
        }
    }
}

const FORBIDDEN: u8 = 2;

fn restrictiveness(sub: &SubSchema) -> u8 {
    match sub {
        SubSchema::Absent | SubSchema::Bool(true) => 0,
        SubSchema::Schema(_) | SubSchema::Unrecognized(_) => 1,
        SubSchema::Bool(false) => FORBIDDEN,
    }
}

fn sub_schema_draft(path: &str, lhs: &SubSchema, rhs: &SubSchema) -> Draft<'static> {
    match (lhs, rhs) {
        (SubSchema::Absent, _) => Draft::added(SCHEMA, path),
        (_, SubSchema::Absent) => Draft::removed(SCHEMA, path),
        _ => Draft::modified(SCHEMA, path),
    }
}

fn sub_schema_value(sub: &SubSchema) -> Option<Value> {
    match sub {
        SubSchema::Bool(b) => Some(Value::Bool(*b)),
        SubSchema::Unrecognized(value) => Some(value.clone()),
        SubSchema::Absent | SubSchema::Schema(_) => None,
    }
}

fn describe_sub_schema(sub: &SubSchema) -> String {
    match sub {
        SubSchema::Absent => "absent".to_owned(),
        SubSchema::Bool(b) => b.to_string(),
        SubSchema::Schema(_) => "a schema".to_owned(),
        SubSchema::Unrecognized(value) => value.to_string(),
    }
}

fn numeric_keyword<'n>(node: &'n SchemaNode, keyword: &str) -> Option<&'n Number> {
    match keyword {
        "multipleOf" => node.multiple_of.as_ref(),
        "maximum" => node.maximum.as_ref(),
        "minimum" => node.minimum.as_ref(),
        "maxLength" => node.max_length.as_ref(),
        "minLength" => node.min_length.as_ref(),
        "maxItems" => node.max_items.as_ref(),
        "minItems" => node.min_items.as_ref(),
        "maxProperties" => node.max_properties.as_ref(),
        "minProperties" => node.min_properties.as_ref(),
        _ => None,
    }
}

/// Enum values in order of first appearance.
fn distinct(values: &[Value]) -> Vec<&Value> {
    let mut seen: Vec<&Value> = Vec::with_capacity(values.len());
    for value in values {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

/// A zero lower bound on a count is the same as no bound.
fn positive(n: &Option<Number>) -> Option<&Number> {
    n.as_ref().filter(|n| as_f64(n) > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Resolver;
    use crate::{Change, ChangeKind, DiffOptions, Mode};
    use serde_json::json;

    fn diff_schemas(mode: Mode, lhs: Value, rhs: Value) -> Vec<Change> {
        let root = |schema: Value| json!({ "components": { "schemas": { "S": schema } } });
        let (lhs_root, rhs_root) = (root(lhs), root(rhs));
        let mut lhs_arena = SchemaArena::new(Resolver::for_document(&lhs_root));
        let mut rhs_arena = SchemaArena::new(Resolver::for_document(&rhs_root));
        let l = lhs_arena.lower_pointer(&lhs_root, "/components/schemas/S");
        let r = rhs_arena.lower_pointer(&rhs_root, "/components/schemas/S");

        let options = DiffOptions::new().mode(mode);
        let mut recorder = Recorder::new(&options);
        DiffWalker::new(&mut recorder, &lhs_arena, &rhs_arena).diff("", Some(l), Some(r));
        recorder.finish().into_changes()
    }

    fn classify(lhs: Value, rhs: Value) -> Vec<(String, ChangeKind, Severity)> {
        diff_schemas(Mode::Classifying, lhs, rhs)
            .into_iter()
            .map(|c| (c.path, c.kind, c.severity.unwrap()))
            .collect()
    }

    fn one(path: &str, kind: ChangeKind, severity: Severity) -> Vec<(String, ChangeKind, Severity)> {
        vec![(path.to_owned(), kind, severity)]
    }

    #[test]
    fn recursive_schema_against_itself() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "children": {
                    "type": "array",
                    "items": { "$ref": "#/components/schemas/S" }
                }
            }
        });
        assert!(classify(schema.clone(), schema).is_empty());
    }

    #[test]
    fn recursive_schema_with_change() {
        let lhs = json!({
            "properties": {
                "next": { "$ref": "#/components/schemas/S" },
                "value": { "type": "integer", "maximum": 10 }
            }
        });
        let rhs = json!({
            "properties": {
                "next": { "$ref": "#/components/schemas/S" },
                "value": { "type": "integer", "maximum": 5 }
            }
        });
        assert_eq!(
            classify(lhs, rhs),
            one("/properties/value/maximum", ChangeKind::Modified, Severity::Error)
        );
    }

    #[test]
    fn mutual_recursion_terminates() {
        let lhs_root = json!({
            "definitions": {
                "A": { "properties": { "b": { "$ref": "#/definitions/B" } } },
                "B": { "properties": { "a": { "$ref": "#/definitions/A" }, "n": { "type": "string" } } }
            }
        });
        let rhs_root = json!({
            "definitions": {
                "A": { "properties": { "b": { "$ref": "#/definitions/B" } } },
                "B": { "properties": { "a": { "$ref": "#/definitions/A" }, "n": { "type": "integer" } } }
            }
        });
        let mut lhs_arena = SchemaArena::new(Resolver::for_document(&lhs_root));
        let mut rhs_arena = SchemaArena::new(Resolver::for_document(&rhs_root));
        let l = lhs_arena.lower_pointer(&lhs_root, "/definitions/A");
        let r = rhs_arena.lower_pointer(&rhs_root, "/definitions/A");

        let options = DiffOptions::new();
        let mut recorder = Recorder::new(&options);
        DiffWalker::new(&mut recorder, &lhs_arena, &rhs_arena).diff("", Some(l), Some(r));
        let changes = recorder.finish().into_changes();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "/properties/b/properties/n/type");
        assert_eq!(changes[0].severity, Some(Severity::Error));
    }

    #[test]
    fn bounds_symmetry() {
        for (max, min) in [
            ("maximum", "minimum"),
            ("maxLength", "minLength"),
            ("maxItems", "minItems"),
            ("maxProperties", "minProperties"),
        ] {
            let path = |k: &str| format!("/{k}");
            assert_eq!(
                classify(json!({ max: 10 }), json!({ max: 5 })),
                one(&path(max), ChangeKind::Modified, Severity::Error)
            );
            assert_eq!(
                classify(json!({ max: 5 }), json!({ max: 10 })),
                one(&path(max), ChangeKind::Modified, Severity::Warning)
            );
            assert_eq!(
                classify(json!({ min: 1 }), json!({ min: 2 })),
                one(&path(min), ChangeKind::Modified, Severity::Error)
            );
            assert_eq!(
                classify(json!({ min: 2 }), json!({ min: 1 })),
                one(&path(min), ChangeKind::Modified, Severity::Warning)
            );

            let plain = diff_schemas(Mode::Plain, json!({ max: 10 }), json!({ max: 5 }));
            assert_eq!(plain.len(), 1);
            assert_eq!(plain[0].severity, None);
        }
    }

    #[test]
    fn zero_minimum_count_is_no_bound() {
        assert!(classify(json!({ "minLength": 0 }), json!({})).is_empty());
        assert_eq!(
            classify(json!({ "minItems": 0 }), json!({ "minItems": 1 })),
            one("/minItems", ChangeKind::Added, Severity::Error)
        );
    }

    #[test]
    fn pattern_and_multiple_of() {
        assert_eq!(
            classify(json!({}), json!({ "pattern": "^a" })),
            one("/pattern", ChangeKind::Added, Severity::Error)
        );
        assert_eq!(
            classify(json!({ "pattern": "^a" }), json!({})),
            one("/pattern", ChangeKind::Removed, Severity::Warning)
        );
        assert_eq!(
            classify(json!({ "multipleOf": 4 }), json!({ "multipleOf": 2 })),
            one("/multipleOf", ChangeKind::Modified, Severity::Warning)
        );
        assert_eq!(
            classify(json!({ "multipleOf": 2 }), json!({ "multipleOf": 3 })),
            one("/multipleOf", ChangeKind::Modified, Severity::Error)
        );
    }

    #[test]
    fn decimal_multiple_of() {
        // 0.3 / 0.1 is not exactly 3 in floating point.
        assert_eq!(
            classify(json!({ "multipleOf": 0.3 }), json!({ "multipleOf": 0.1 })),
            one("/multipleOf", ChangeKind::Modified, Severity::Warning)
        );
        assert_eq!(
            classify(json!({ "multipleOf": 0.1 }), json!({ "multipleOf": 0.3 })),
            one("/multipleOf", ChangeKind::Modified, Severity::Error)
        );
        assert_eq!(
            classify(json!({ "multipleOf": 0.5 }), json!({ "multipleOf": 0.25 })),
            one("/multipleOf", ChangeKind::Modified, Severity::Warning)
        );
    }

    #[test]
    fn ill_shaped_keywords() {
        assert_eq!(
            classify(json!({ "maximum": 10 }), json!({ "maximum": "10" })),
            one("/maximum", ChangeKind::Modified, Severity::Warning)
        );
        assert_eq!(
            classify(json!({ "enum": "red" }), json!({ "enum": ["red"] })),
            one("/enum", ChangeKind::Modified, Severity::Warning)
        );
        assert!(classify(json!({ "minLength": "x" }), json!({ "minLength": "x" })).is_empty());

        let changes = diff_schemas(Mode::Classifying, json!({ "maxItems": "5" }), json!({}));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old_value, Some(json!("5")));
        assert_eq!(changes[0].new_value, None);
        assert_eq!(changes[0].message, "maxItems has a value of the wrong shape");
    }

    #[test]
    fn exclusive_bounds() {
        assert_eq!(
            classify(json!({ "exclusiveMaximum": false }), json!({ "exclusiveMaximum": true })),
            one("/exclusiveMaximum", ChangeKind::Modified, Severity::Error)
        );
        assert_eq!(
            classify(json!({ "exclusiveMinimum": 1 }), json!({ "exclusiveMinimum": 0 })),
            one("/exclusiveMinimum", ChangeKind::Modified, Severity::Warning)
        );
        assert_eq!(
            classify(json!({ "exclusiveMaximum": true }), json!({ "exclusiveMaximum": 5 })),
            one("/exclusiveMaximum", ChangeKind::Modified, Severity::Warning)
        );
    }

    #[test]
    fn types() {
        assert_eq!(
            classify(json!({ "type": "integer" }), json!({ "type": "number" })),
            one("/type", ChangeKind::Modified, Severity::Warning)
        );
        assert_eq!(
            classify(json!({ "type": "number" }), json!({ "type": "integer" })),
            one("/type", ChangeKind::Modified, Severity::Error)
        );
        assert_eq!(
            classify(json!({ "type": "string" }), json!({ "type": ["string", "null"] })),
            one("/type", ChangeKind::Modified, Severity::Warning)
        );
        assert_eq!(
            classify(json!({ "type": "string" }), json!({})),
            one("/type", ChangeKind::Removed, Severity::Warning)
        );
        assert_eq!(
            classify(json!({}), json!({ "type": "string" })),
            one("/type", ChangeKind::Added, Severity::Error)
        );
        assert_eq!(
            classify(json!({ "type": "string" }), json!({ "type": "text" })),
            one("/type", ChangeKind::Modified, Severity::Warning)
        );
    }

    #[test]
    fn format_and_flags() {
        assert_eq!(
            classify(json!({ "format": "int32" }), json!({ "format": "int64" })),
            one("/format", ChangeKind::Modified, Severity::Warning)
        );
        assert_eq!(
            classify(json!({ "nullable": true }), json!({ "nullable": false })),
            one("/nullable", ChangeKind::Modified, Severity::Error)
        );
        assert_eq!(
            classify(json!({}), json!({ "nullable": true })),
            one("/nullable", ChangeKind::Modified, Severity::Info)
        );
        assert_eq!(
            classify(json!({}), json!({ "deprecated": true })),
            one("/deprecated", ChangeKind::Modified, Severity::Warning)
        );
        assert_eq!(
            classify(json!({ "readOnly": true }), json!({})),
            one("/readOnly", ChangeKind::Modified, Severity::Info)
        );
    }

    #[test]
    fn enum_values() {
        let changes = diff_schemas(
            Mode::Classifying,
            json!({ "enum": ["active", "inactive", "pending"] }),
            json!({ "enum": ["active", "inactive", "archived"] }),
        );
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].kind, ChangeKind::Removed);
        assert_eq!(changes[0].severity, Some(Severity::Error));
        assert_eq!(changes[0].old_value, Some(json!("pending")));
        assert_eq!(changes[0].message, "enum value 'pending' removed");
        assert_eq!(changes[1].kind, ChangeKind::Added);
        assert_eq!(changes[1].severity, Some(Severity::Info));

        // A value listed twice is still one value.
        let changes = diff_schemas(
            Mode::Classifying,
            json!({ "enum": ["a", "b", "b"] }),
            json!({ "enum": ["a"] }),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old_value, Some(json!("b")));
    }

    #[test]
    fn required_and_properties() {
        let lhs = json!({
            "required": ["id"],
            "properties": { "id": {}, "name": {}, "old": {} }
        });
        let rhs = json!({
            "required": ["id", "name", "email"],
            "properties": { "id": {}, "name": {}, "email": {} }
        });
        assert_eq!(
            classify(lhs, rhs),
            vec![
                ("/required".to_owned(), ChangeKind::Added, Severity::Error),
                ("/required".to_owned(), ChangeKind::Added, Severity::Error),
                ("/properties/old".to_owned(), ChangeKind::Removed, Severity::Warning),
                ("/properties/email".to_owned(), ChangeKind::Added, Severity::Warning),
            ]
        );

        assert_eq!(
            classify(
                json!({ "required": ["id"], "properties": { "id": {} } }),
                json!({ "properties": {} })
            ),
            vec![
                ("/required".to_owned(), ChangeKind::Removed, Severity::Info),
                ("/properties/id".to_owned(), ChangeKind::Removed, Severity::Error),
            ]
        );
    }

    #[test]
    fn additional_properties() {
        assert_eq!(
            classify(
                json!({ "additionalProperties": true }),
                json!({ "additionalProperties": false })
            ),
            one("/additionalProperties", ChangeKind::Modified, Severity::Error)
        );
        assert_eq!(
            classify(
                json!({ "additionalProperties": false }),
                json!({ "additionalProperties": true })
            ),
            one("/additionalProperties", ChangeKind::Modified, Severity::Info)
        );
        assert_eq!(
            classify(json!({}), json!({ "additionalProperties": { "type": "string" } })),
            one("/additionalProperties", ChangeKind::Added, Severity::Warning)
        );
        assert_eq!(
            classify(json!({ "additionalProperties": false }), json!({})),
            one("/additionalProperties", ChangeKind::Removed, Severity::Info)
        );
        assert_eq!(
            classify(
                json!({ "additionalProperties": { "type": "string" } }),
                json!({ "additionalProperties": { "type": "integer" } })
            ),
            one("/additionalProperties/type", ChangeKind::Modified, Severity::Error)
        );
    }

    #[test]
    fn items_tri_state() {
        assert_eq!(
            classify(json!({ "items": true }), json!({ "items": false })),
            one("/items", ChangeKind::Modified, Severity::Error)
        );
        assert_eq!(
            classify(json!({ "items": false }), json!({ "items": true })),
            one("/items", ChangeKind::Modified, Severity::Warning)
        );
        assert_eq!(
            classify(json!({ "items": [{}] }), json!({ "items": [{}] })),
            vec![]
        );
        assert_eq!(
            classify(json!({ "items": {} }), json!({ "items": [{}] })),
            one("/items", ChangeKind::Modified, Severity::Warning)
        );
        assert_eq!(
            classify(
                json!({ "unevaluatedProperties": true }),
                json!({ "unevaluatedProperties": false })
            ),
            one("/unevaluatedProperties", ChangeKind::Modified, Severity::Error)
        );
    }

    #[test]
    fn composition() {
        assert_eq!(
            classify(
                json!({ "allOf": [{ "type": "object" }] }),
                json!({ "allOf": [{ "type": "object" }, { "required": ["a"] }] })
            ),
            one("/allOf/1", ChangeKind::Added, Severity::Error)
        );
        assert_eq!(
            classify(
                json!({ "allOf": [{}, {}] }),
                json!({ "allOf": [{}] })
            ),
            one("/allOf/1", ChangeKind::Removed, Severity::Info)
        );
        assert_eq!(
            classify(
                json!({ "oneOf": [{ "type": "string" }] }),
                json!({ "oneOf": [{ "type": "string" }, { "type": "integer" }] })
            ),
            one("/oneOf/1", ChangeKind::Added, Severity::Warning)
        );
        assert_eq!(
            classify(
                json!({ "anyOf": [{ "type": "string" }, { "type": "integer" }] }),
                json!({ "anyOf": [{ "type": "string" }] })
            ),
            one("/anyOf/1", ChangeKind::Removed, Severity::Warning)
        );
        assert_eq!(
            classify(
                json!({ "anyOf": [{ "maxLength": 3 }] }),
                json!({ "anyOf": [{ "maxLength": 2 }] })
            ),
            one("/anyOf/0/maxLength", ChangeKind::Modified, Severity::Error)
        );
    }

    #[test]
    fn conditional_and_newer_keywords() {
        assert_eq!(
            classify(
                json!({ "if": { "required": ["a"] }, "then": { "required": ["b"] } }),
                json!({ "if": { "required": ["a"] } })
            ),
            one("/then", ChangeKind::Removed, Severity::Error)
        );
        assert_eq!(
            classify(json!({}), json!({ "not": { "type": "null" } })),
            one("/not", ChangeKind::Added, Severity::Info)
        );
        assert_eq!(
            classify(
                json!({ "prefixItems": [{ "type": "string" }] }),
                json!({ "prefixItems": [{ "type": "integer" }] })
            ),
            one("/prefixItems/0/type", ChangeKind::Modified, Severity::Error)
        );
        assert_eq!(
            classify(
                json!({ "contains": { "minimum": 1 } }),
                json!({ "contains": { "minimum": 2 } })
            ),
            one("/contains/minimum", ChangeKind::Modified, Severity::Error)
        );
        assert_eq!(
            classify(
                json!({ "propertyNames": { "maxLength": 5 } }),
                json!({ "propertyNames": { "maxLength": 8 } })
            ),
            one("/propertyNames/maxLength", ChangeKind::Modified, Severity::Warning)
        );
        assert_eq!(
            classify(
                json!({ "dependentSchemas": { "a": {} } }),
                json!({ "dependentSchemas": { "a": {}, "b": {} } })
            ),
            one("/dependentSchemas/b", ChangeKind::Added, Severity::Warning)
        );
        assert_eq!(
            classify(
                json!({ "contentMediaType": "application/json" }),
                json!({ "contentMediaType": "application/xml" })
            ),
            one("/contentMediaType", ChangeKind::Modified, Severity::Warning)
        );
        assert_eq!(
            classify(
                json!({ "contentSchema": { "type": "object" } }),
                json!({ "contentSchema": { "type": "array" } })
            ),
            one("/contentSchema/type", ChangeKind::Modified, Severity::Error)
        );
    }

    #[test]
    fn extensions_and_opaque_schemas() {
        let changes = diff_schemas(
            Mode::Classifying,
            json!({ "x-order": 1 }),
            json!({ "x-order": 2 }),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].category, Category::Extension);
        assert_eq!(changes[0].severity, Some(Severity::Info));

        assert_eq!(
            classify(
                json!({ "properties": { "a": { "$ref": "a.yaml" } } }),
                json!({ "properties": { "a": { "$ref": "b.yaml" } } })
            ),
            one("/properties/a/$ref", ChangeKind::Modified, Severity::Warning)
        );
        assert_eq!(
            classify(
                json!({ "properties": { "a": 1 } }),
                json!({ "properties": { "a": 1 } })
            ),
            vec![]
        );
        assert_eq!(
            classify(
                json!({ "properties": { "a": 1 } }),
                json!({ "properties": { "a": {} } })
            ),
            one("/properties/a", ChangeKind::Modified, Severity::Warning)
        );
    }

    #[test]
    fn one_sided_subtree() {
        let lhs_root = json!({});
        let lhs_arena = SchemaArena::new(Resolver::for_document(&lhs_root));
        let mut rhs_arena = SchemaArena::new(Resolver::for_document(&lhs_root));
        let r = rhs_arena.lower(&lhs_root, &json!({ "type": "string" }));

        let options = DiffOptions::new();
        let mut recorder = Recorder::new(&options);
        let mut walker = DiffWalker::new(&mut recorder, &lhs_arena, &rhs_arena);
        walker.diff("/schema", None, Some(r));
        walker.diff("/schema", None, None);
        let changes = recorder.finish().into_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Added);
        assert_eq!(changes[0].severity, Some(Severity::Info));
    }
}
