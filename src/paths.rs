//! Paths, operations and everything hanging off an operation.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::collections::{diff_keyed, index_by};
use crate::document::{to_set, DocumentWalker};
use crate::fields::Field;
use crate::location::child_path;
use crate::model::{Header, MediaType, Operation, Parameter, PathItem, RequestBody, Response};
use crate::result::Draft;
use crate::{Category, Severity};

/// How much of a path item is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    /// Everything.
    Full,
    /// What Swagger 2.0 and OpenAPI 3.x share: methods, operation scalars and response codes.
    Common,
}

type ParameterKey = (String, String);

impl DocumentWalker<'_, '_> {
    pub fn diff_paths(
        &mut self,
        base: &str,
        noun: &str,
        lhs: &BTreeMap<String, Value>,
        rhs: &BTreeMap<String, Value>,
        scope: Scope,
    ) {
        let diff = diff_keyed(lhs, rhs);
        let is_path = |name: &&String| !name.starts_with("x-");

        for (name, _) in diff.removed.into_iter().filter(|(n, _)| is_path(n)) {
            self.recorder.record(
                Draft::removed(Category::Endpoint, child_path(base, name))
                    .severity(Severity::Critical)
                    .message(format!("{noun} '{name}' removed")),
            );
        }
        for (name, _) in diff.added.into_iter().filter(|(n, _)| is_path(n)) {
            self.recorder.record(
                Draft::added(Category::Endpoint, child_path(base, name))
                    .message(format!("{noun} '{name}' added")),
            );
        }
        for (name, l, r) in diff.common.into_iter().filter(|(n, _, _)| is_path(n)) {
            let path = child_path(base, name);
            // Path items may be references, e.g. to `#/components/pathItems`.
            if let Some((l, r)) =
                self.interpret_pair::<PathItem>(&path, Category::Endpoint, l, r)
            {
                self.diff_path_item(&path, &l, &r, scope);
            }
        }
        self.recorder.extensions(base, lhs, rhs);
    }

    fn diff_path_item(&mut self, path: &str, lhs: &PathItem, rhs: &PathItem, scope: Scope) {
        if scope == Scope::Full {
            let field = |name| Field::new(path, Category::Endpoint, name);
            self.recorder.text(
                field("summary"),
                lhs.summary.as_deref(),
                rhs.summary.as_deref(),
                Severity::Info,
            );
            self.recorder.text(
                field("description"),
                lhs.description.as_deref(),
                rhs.description.as_deref(),
                Severity::Info,
            );
            self.diff_servers(&child_path(path, "servers"), &lhs.servers, &rhs.servers);
        }

        for ((method, l), (_, r)) in lhs.operations().into_iter().zip(rhs.operations()) {
            let op_path = child_path(path, method);
            match (l, r) {
                (None, None) => (),
                (Some(_), None) => self.recorder.record(
                    Draft::removed(Category::Operation, op_path)
                        .severity(Severity::Critical)
                        .message(format!("{} operation removed", method.to_uppercase())),
                ),
                (None, Some(_)) => self.recorder.record(
                    Draft::added(Category::Operation, op_path)
                        .message(format!("{} operation added", method.to_uppercase())),
                ),
                (Some(l), Some(r)) => {
                    if let Some((l, r)) =
                        self.interpret_pair::<Operation>(&op_path, Category::Operation, l, r)
                    {
                        self.diff_operation(&op_path, (lhs, &l), (rhs, &r), scope);
                    }
                }
            }
        }

        if scope == Scope::Full {
            self.recorder.extensions(path, &lhs.extensions, &rhs.extensions);
        }
    }

    fn diff_operation(
        &mut self,
        path: &str,
        (lhs_item, lhs): (&PathItem, &Operation),
        (rhs_item, rhs): (&PathItem, &Operation),
        scope: Scope,
    ) {
        let field = |name| Field::new(path, Category::Operation, name);
        self.recorder.text(
            field("operationId"),
            lhs.operation_id.as_deref(),
            rhs.operation_id.as_deref(),
            Severity::Info,
        );
        self.recorder.text(
            field("summary"),
            lhs.summary.as_deref(),
            rhs.summary.as_deref(),
            Severity::Info,
        );
        self.recorder.text(
            field("description"),
            lhs.description.as_deref(),
            rhs.description.as_deref(),
            Severity::Info,
        );
        self.recorder.string_set(
            field("tags"),
            &to_set(&lhs.tags),
            &to_set(&rhs.tags),
            Severity::Info,
            Severity::Info,
            "tag",
        );
        self.recorder.flag(
            field("deprecated"),
            lhs.deprecated,
            rhs.deprecated,
            Severity::Warning,
            Severity::Info,
        );

        let responses = child_path(path, "responses");
        if scope == Scope::Common {
            self.diff_response_codes(&responses, &lhs.responses, &rhs.responses);
            return;
        }

        self.diff_parameters(
            &child_path(path, "parameters"),
            (lhs_item.parameters.as_slice(), lhs.parameters.as_slice()),
            (rhs_item.parameters.as_slice(), rhs.parameters.as_slice()),
        );
        self.diff_request_body(
            &child_path(path, "requestBody"),
            lhs.request_body.as_ref(),
            rhs.request_body.as_ref(),
        );
        self.diff_responses(&responses, &lhs.responses, &rhs.responses);

        // Inherited values are compared once, at the document level.
        if lhs.security.is_some() || rhs.security.is_some() {
            let l = effective(&lhs.security, &self.lhs.security);
            let r = effective(&rhs.security, &self.rhs.security);
            self.diff_security_requirements(&child_path(path, "security"), &l, &r);
        }
        self.diff_servers(&child_path(path, "servers"), &lhs.servers, &rhs.servers);
        if lhs.consumes.is_some()
            || rhs.consumes.is_some()
            || lhs.produces.is_some()
            || rhs.produces.is_some()
        {
            let inherited = |own: &Option<Vec<String>>, doc: &[String]| {
                own.clone().unwrap_or_else(|| doc.to_vec())
            };
            let (lhs_consumes, rhs_consumes) = (
                inherited(&lhs.consumes, self.lhs.consumes.as_slice()),
                inherited(&rhs.consumes, self.rhs.consumes.as_slice()),
            );
            let (lhs_produces, rhs_produces) = (
                inherited(&lhs.produces, self.lhs.produces.as_slice()),
                inherited(&rhs.produces, self.rhs.produces.as_slice()),
            );
            self.diff_media_types(path, &lhs_consumes, &rhs_consumes, &lhs_produces, &rhs_produces);
        }

        self.recorder.extensions(path, &lhs.extensions, &rhs.extensions);
    }

    /// Path-level and operation-level parameters are merged, keyed by location and name, with
    /// the operation's taking precedence.
    fn diff_parameters(
        &mut self,
        base: &str,
        lhs: (&[Value], &[Value]),
        rhs: (&[Value], &[Value]),
    ) {
        let (lhs_params, lhs_malformed) =
            self.lhs.interpret_all::<Parameter>(lhs.0.iter().chain(lhs.1));
        let (rhs_params, rhs_malformed) =
            self.rhs.interpret_all::<Parameter>(rhs.0.iter().chain(rhs.1));
        self.report_malformed(base, Category::Parameter, &lhs_malformed, &rhs_malformed);

        let key = |param: &Parameter| (param.location.clone(), param.name.clone());
        let (lhs_params, rhs_params) = (index_by(lhs_params, key), index_by(rhs_params, key));

        let diff = diff_keyed(&lhs_params, &rhs_params);
        let param_path =
            |(location, name): &ParameterKey| child_path(&child_path(base, location), name);

        for (key, param) in diff.removed {
            let (location, name) = key;
            let required = param.required;
            self.recorder.record(
                Draft::removed(Category::Parameter, param_path(key))
                    .sub_type(if required { "required" } else { "" })
                    .severity_if(required, Severity::Critical, Severity::Warning)
                    .message(if required {
                        format!("required {location} parameter '{name}' removed")
                    } else {
                        format!("{location} parameter '{name}' removed")
                    }),
            );
        }
        for (key, param) in diff.added {
            let (location, name) = key;
            let required = param.required;
            self.recorder.record(
                Draft::added(Category::Parameter, param_path(key))
                    .sub_type(if required { "required" } else { "" })
                    .severity_if(required, Severity::Error, Severity::Info)
                    .message(if required {
                        format!("required {location} parameter '{name}' added")
                    } else {
                        format!("{location} parameter '{name}' added")
                    }),
            );
        }
        for (key, l, r) in diff.common {
            self.diff_parameter(&param_path(key), l, r);
        }
    }

    fn diff_parameter(&mut self, path: &str, lhs: &Parameter, rhs: &Parameter) {
        let field = |name| Field::new(path, Category::Parameter, name);
        self.recorder.text(
            field("description"),
            lhs.description.as_deref(),
            rhs.description.as_deref(),
            Severity::Info,
        );
        self.recorder.flag(
            field("required"),
            lhs.required,
            rhs.required,
            Severity::Error,
            Severity::Info,
        );
        self.recorder.flag(
            field("deprecated"),
            lhs.deprecated,
            rhs.deprecated,
            Severity::Warning,
            Severity::Info,
        );
        self.recorder.flag(
            field("allowEmptyValue"),
            lhs.allow_empty_value,
            rhs.allow_empty_value,
            Severity::Info,
            Severity::Warning,
        );
        self.recorder.text(
            field("style"),
            lhs.style.as_deref(),
            rhs.style.as_deref(),
            Severity::Warning,
        );
        self.recorder.value(
            field("explode"),
            lhs.explode.map(Value::Bool).as_ref(),
            rhs.explode.map(Value::Bool).as_ref(),
            Severity::Warning,
        );
        self.recorder.text(
            field("collectionFormat"),
            lhs.rest.get("collectionFormat").and_then(Value::as_str),
            rhs.rest.get("collectionFormat").and_then(Value::as_str),
            Severity::Warning,
        );

        // Swagger 2.0 non-body parameters carry their schema keywords inline.
        let schema_path = if lhs.schema.is_some() || rhs.schema.is_some() {
            child_path(path, "schema")
        } else {
            path.to_owned()
        };
        self.diff_schema(
            &schema_path,
            lhs.effective_schema().as_ref(),
            rhs.effective_schema().as_ref(),
        );
        self.diff_content(
            &child_path(path, "content"),
            Category::Parameter,
            &lhs.content,
            &rhs.content,
        );
        self.recorder.extensions(path, &lhs.rest, &rhs.rest);
    }

    fn diff_request_body(&mut self, path: &str, lhs: Option<&Value>, rhs: Option<&Value>) {
        match (lhs, rhs) {
            (None, None) => (),
            (None, Some(raw)) => {
                let body: RequestBody = self.rhs.interpret(raw).unwrap_or_default();
                self.recorder.record(
                    Draft::added(Category::RequestBody, path)
                        .sub_type(if body.required { "required" } else { "" })
                        .severity_if(body.required, Severity::Error, Severity::Info)
                        .message(if body.required {
                            "required request body added"
                        } else {
                            "request body added"
                        }),
                );
            }
            (Some(_), None) => self.recorder.record(
                Draft::removed(Category::RequestBody, path)
                    .severity(Severity::Warning)
                    .message("request body removed"),
            ),
            (Some(l), Some(r)) => {
                let Some((l, r)) =
                    self.interpret_pair::<RequestBody>(path, Category::RequestBody, l, r)
                else {
                    return;
                };
                let field = |name| Field::new(path, Category::RequestBody, name);
                self.recorder.text(
                    field("description"),
                    l.description.as_deref(),
                    r.description.as_deref(),
                    Severity::Info,
                );
                self.recorder.flag(
                    field("required"),
                    l.required,
                    r.required,
                    Severity::Error,
                    Severity::Info,
                );
                self.diff_content(
                    &child_path(path, "content"),
                    Category::RequestBody,
                    &l.content,
                    &r.content,
                );
                self.recorder.extensions(path, &l.extensions, &r.extensions);
            }
        }
    }

    /// Media types are keyed by name. A media type that disappears can no longer be sent or
    /// received.
    fn diff_content(
        &mut self,
        base: &str,
        category: Category,
        lhs: &BTreeMap<String, MediaType>,
        rhs: &BTreeMap<String, MediaType>,
    ) {
        let diff = diff_keyed(lhs, rhs);

        for (media_type, _) in diff.removed {
            self.recorder.record(
                Draft::removed(category, child_path(base, media_type))
                    .sub_type("mediaType")
                    .severity(Severity::Error)
                    .message(format!("media type '{media_type}' removed")),
            );
        }
        for (media_type, _) in diff.added {
            self.recorder.record(
                Draft::added(category, child_path(base, media_type))
                    .sub_type("mediaType")
                    .message(format!("media type '{media_type}' added")),
            );
        }
        for (media_type, l, r) in diff.common {
            let path = child_path(base, media_type);
            self.diff_schema(
                &child_path(&path, "schema"),
                l.schema.as_ref(),
                r.schema.as_ref(),
            );
            self.recorder.extensions(&path, &l.extensions, &r.extensions);
        }
    }

    /// Which status codes appeared or disappeared. Keys starting with `x-` are extensions.
    fn diff_response_codes(
        &mut self,
        base: &str,
        lhs: &BTreeMap<String, Value>,
        rhs: &BTreeMap<String, Value>,
    ) {
        let diff = diff_keyed(lhs, rhs);

        for (code, _) in diff.removed.into_iter().filter(|(c, _)| !c.starts_with("x-")) {
            let success = code.starts_with('2');
            self.recorder.record(
                Draft::removed(Category::Response, child_path(base, code))
                    .sub_type(if success { "success" } else { "" })
                    .severity_if(success, Severity::Error, Severity::Info)
                    .message(format!("response '{code}' removed")),
            );
        }
        for (code, _) in diff.added.into_iter().filter(|(c, _)| !c.starts_with("x-")) {
            let error = code.starts_with('4') || code.starts_with('5');
            self.recorder.record(
                Draft::added(Category::Response, child_path(base, code))
                    .sub_type(if error { "error" } else { "" })
                    .severity_if(error, Severity::Warning, Severity::Info)
                    .message(format!("response '{code}' added")),
            );
        }
    }

    fn diff_responses(
        &mut self,
        base: &str,
        lhs: &BTreeMap<String, Value>,
        rhs: &BTreeMap<String, Value>,
    ) {
        self.diff_response_codes(base, lhs, rhs);

        for (code, l, r) in diff_keyed(lhs, rhs).common {
            if code.starts_with("x-") {
                continue;
            }
            let path = child_path(base, code);
            if let Some((l, r)) = self.interpret_pair::<Response>(&path, Category::Response, l, r) {
                self.diff_response(&path, &l, &r);
            }
        }
        self.recorder.extensions(base, lhs, rhs);
    }

    fn diff_response(&mut self, path: &str, lhs: &Response, rhs: &Response) {
        self.recorder.text(
            Field::new(path, Category::Response, "description"),
            lhs.description.as_deref(),
            rhs.description.as_deref(),
            Severity::Info,
        );

        let headers = child_path(path, "headers");
        let diff = diff_keyed(&lhs.headers, &rhs.headers);
        for (name, _) in diff.removed {
            self.recorder.record(
                Draft::removed(Category::Response, child_path(&headers, name))
                    .sub_type("header")
                    .severity(Severity::Warning)
                    .message(format!("header '{name}' removed")),
            );
        }
        for (name, _) in diff.added {
            self.recorder.record(
                Draft::added(Category::Response, child_path(&headers, name))
                    .sub_type("header")
                    .message(format!("header '{name}' added")),
            );
        }
        for (name, l, r) in diff.common {
            let header_path = child_path(&headers, name);
            if let Some((l, r)) =
                self.interpret_pair::<Header>(&header_path, Category::Response, l, r)
            {
                self.diff_header(&header_path, &l, &r);
            }
        }

        self.diff_content(
            &child_path(path, "content"),
            Category::Response,
            &lhs.content,
            &rhs.content,
        );
        if lhs.schema.is_some() || rhs.schema.is_some() {
            self.diff_schema(
                &child_path(path, "schema"),
                lhs.schema.as_ref(),
                rhs.schema.as_ref(),
            );
        }
        self.recorder.extensions(path, &lhs.extensions, &rhs.extensions);
    }

    fn diff_header(&mut self, path: &str, lhs: &Header, rhs: &Header) {
        let field = |name| Field::new(path, Category::Response, name);
        self.recorder.text(
            field("description"),
            lhs.description.as_deref(),
            rhs.description.as_deref(),
            Severity::Info,
        );
        self.recorder.flag(
            field("required"),
            lhs.required,
            rhs.required,
            Severity::Error,
            Severity::Info,
        );
        self.recorder.flag(
            field("deprecated"),
            lhs.deprecated,
            rhs.deprecated,
            Severity::Warning,
            Severity::Info,
        );
        let schema_path = if lhs.schema.is_some() || rhs.schema.is_some() {
            child_path(path, "schema")
        } else {
            path.to_owned()
        };
        self.diff_schema(
            &schema_path,
            lhs.effective_schema().as_ref(),
            rhs.effective_schema().as_ref(),
        );
        self.recorder.extensions(path, &lhs.rest, &rhs.rest);
    }
}

fn effective<T: Clone + Default>(own: &Option<T>, inherited: &Option<T>) -> T {
    own.as_ref()
        .or(inherited.as_ref())
        .cloned()
        .unwrap_or_default()
}
