//! Compares whole documents: version dispatch and the document-level sections.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::collections::{diff_keyed, index_by};
use crate::diff_walker::DiffWalker;
use crate::fields::Field;
use crate::location::child_path;
use crate::model::{
    Components, Extensions, Info, SecurityRequirement, SecurityScheme, Server, Version,
};
use crate::paths::Scope;
use crate::resolver::Resolver;
use crate::result::{Draft, Recorder};
use crate::schema::{SchemaArena, SchemaId};
use crate::{Category, DiffOptions, DiffResult, Error, Severity, Side};

/// One side of the comparison.
pub(crate) struct Document<'d> {
    pub root: &'d Value,
    pub version: Version,
    pub arena: SchemaArena,
    /// Document-level defaults that operations inherit.
    pub security: Option<Vec<SecurityRequirement>>,
    pub consumes: Vec<String>,
    pub produces: Vec<String>,
}

impl<'d> Document<'d> {
    fn new(root: &'d Value, version: Version) -> Self {
        Self {
            root,
            version,
            arena: SchemaArena::new(Resolver::for_document(root)),
            security: None,
            consumes: Vec::new(),
            produces: Vec::new(),
        }
    }

    /// Resolve `raw` if it is a reference object, then deserialize it.
    pub fn interpret<T: DeserializeOwned>(&self, raw: &Value) -> Result<T, String> {
        let value = self
            .arena
            .resolver()
            .follow(self.root, raw)
            .ok_or_else(|| {
                let reference = raw.get("$ref").and_then(Value::as_str).unwrap_or_default();
                format!("unresolvable reference '{reference}'")
            })?;
        Deserialize::deserialize(value).map_err(|e: serde_json::Error| e.to_string())
    }

    /// Interpret every element of a list, setting aside the ones that cannot be.
    pub fn interpret_all<'v, T: DeserializeOwned>(
        &self,
        raw: impl IntoIterator<Item = &'v Value>,
    ) -> (Vec<T>, Vec<Malformed<'v>>) {
        let mut parsed = Vec::new();
        let mut malformed = Vec::new();
        for value in raw {
            match self.interpret::<T>(value) {
                Ok(item) => parsed.push(item),
                Err(reason) => malformed.push((value, reason)),
            }
        }
        (parsed, malformed)
    }

    pub fn lower(&mut self, schema: &Value) -> SchemaId {
        self.arena.lower(self.root, schema)
    }
}

/// An element that could not be interpreted, and why.
pub(crate) type Malformed<'v> = (&'v Value, String);

pub(crate) struct DocumentWalker<'d, 'a> {
    pub recorder: Recorder<'a>,
    pub lhs: Document<'d>,
    pub rhs: Document<'d>,
}

fn detect(document: &Value, side: Side) -> Result<Version, Error> {
    if !document.is_object() {
        return Err(Error::NotAnObject(side));
    }
    Version::detect(document).ok_or(Error::UnknownVersion(side))
}

pub(crate) fn compare(
    lhs: &Value,
    rhs: &Value,
    options: &DiffOptions<'_>,
) -> Result<DiffResult, Error> {
    let lhs_version = detect(lhs, Side::Source)?;
    let rhs_version = detect(rhs, Side::Target)?;
    debug!(source = %lhs_version, target = %rhs_version, "comparing documents");

    let mut walker = DocumentWalker {
        recorder: Recorder::new(options),
        lhs: Document::new(lhs, lhs_version),
        rhs: Document::new(rhs, rhs_version),
    };

    if lhs_version.major() != rhs_version.major() {
        walker.cross_version();
    } else if lhs_version == Version::Swagger2 {
        walker.swagger();
    } else {
        walker.openapi();
    }

    Ok(walker.recorder.finish())
}

impl DocumentWalker<'_, '_> {
    fn openapi(&mut self) {
        let (lhs_security, rhs_security) = self.inherited_security();

        self.version_text("openapi");
        self.diff_info();
        let (lhs_servers, rhs_servers) = self.section::<Vec<Value>>("servers", Category::Server);
        self.diff_servers("/servers", &lhs_servers, &rhs_servers);
        let (lhs_paths, rhs_paths) = self.section("paths", Category::Endpoint);
        self.diff_paths("/paths", "path", &lhs_paths, &rhs_paths, Scope::Full);
        let (lhs_hooks, rhs_hooks) = self.section("webhooks", Category::Endpoint);
        self.diff_paths("/webhooks", "webhook", &lhs_hooks, &rhs_hooks, Scope::Full);

        let (lhs_components, rhs_components) =
            self.section::<Components>("components", Category::Schema);
        self.diff_named_schemas(
            "/components/schemas",
            &lhs_components.schemas,
            &rhs_components.schemas,
        );
        self.diff_security_schemes(
            "/components/securitySchemes",
            &lhs_components.security_schemes,
            &rhs_components.security_schemes,
        );
        self.diff_security_requirements("/security", &lhs_security, &rhs_security);
        self.recorder.extensions(
            "/components",
            &lhs_components.extensions,
            &rhs_components.extensions,
        );
        self.root_extensions();
    }

    fn swagger(&mut self) {
        let (lhs_security, rhs_security) = self.inherited_security();
        let (lhs_consumes, rhs_consumes) = self.section::<Vec<String>>("consumes", Category::RequestBody);
        let (lhs_produces, rhs_produces) = self.section::<Vec<String>>("produces", Category::Response);
        self.lhs.consumes = lhs_consumes.clone();
        self.rhs.consumes = rhs_consumes.clone();
        self.lhs.produces = lhs_produces.clone();
        self.rhs.produces = rhs_produces.clone();

        self.version_text("swagger");
        self.diff_info();
        let (lhs_host, rhs_host) = self.section::<Option<String>>("host", Category::Server);
        self.server_text(
            Field::new("", Category::Server, "host"),
            lhs_host.as_deref(),
            rhs_host.as_deref(),
        );
        let (lhs_base, rhs_base) = self.section::<Option<String>>("basePath", Category::Server);
        self.server_text(
            Field::new("", Category::Server, "basePath"),
            lhs_base.as_deref(),
            rhs_base.as_deref(),
        );
        let (lhs_schemes, rhs_schemes) = self.section::<Vec<String>>("schemes", Category::Server);
        self.recorder.string_set(
            Field::new("", Category::Server, "schemes"),
            &to_set(&lhs_schemes),
            &to_set(&rhs_schemes),
            Severity::Warning,
            Severity::Info,
            "scheme",
        );
        self.diff_media_types("", &lhs_consumes, &rhs_consumes, &lhs_produces, &rhs_produces);
        let (lhs_paths, rhs_paths) = self.section("paths", Category::Endpoint);
        self.diff_paths("/paths", "path", &lhs_paths, &rhs_paths, Scope::Full);
        let (lhs_definitions, rhs_definitions) = self.section("definitions", Category::Schema);
        self.diff_named_schemas("/definitions", &lhs_definitions, &rhs_definitions);
        let (lhs_auth, rhs_auth) = self.section("securityDefinitions", Category::Security);
        self.diff_security_schemes("/securityDefinitions", &lhs_auth, &rhs_auth);
        self.diff_security_requirements("/security", &lhs_security, &rhs_security);
        self.root_extensions();
    }

    /// Documents of different major versions only share `info` and the outline of `paths`.
    fn cross_version(&mut self) {
        let (from, to) = (self.lhs.version, self.rhs.version);
        self.recorder.record(
            Draft::modified(Category::Info, "")
                .sub_type("version")
                .severity(Severity::Warning)
                .old_value(Value::from(from.to_string()))
                .new_value(Value::from(to.to_string()))
                .message(format!(
                    "document version changed from {from} to {to}, only info and paths compared"
                )),
        );
        self.diff_info();
        let (lhs_paths, rhs_paths) = self.section("paths", Category::Endpoint);
        self.diff_paths("/paths", "path", &lhs_paths, &rhs_paths, Scope::Common);
    }

    /// Interpret a top-level member of both documents, a missing one being empty. When either
    /// side cannot be interpreted, a warning is recorded and both sides are treated as empty.
    fn section<T: DeserializeOwned + Default>(
        &mut self,
        key: &str,
        category: Category,
    ) -> (T, T) {
        let (lhs_root, rhs_root) = (self.lhs.root, self.rhs.root);
        let (lhs, rhs) = (lhs_root.get(key), rhs_root.get(key));
        let read = |raw: Option<&Value>| match raw {
            None | Some(Value::Null) => Ok(T::default()),
            Some(raw) => {
                Deserialize::deserialize(raw).map_err(|e: serde_json::Error| e.to_string())
            }
        };
        match (read(lhs), read(rhs)) {
            (Ok(l), Ok(r)) => (l, r),
            (Err(reason), _) | (_, Err(reason)) => {
                self.malformed(&child_path("", key), category, lhs, rhs, reason);
                Default::default()
            }
        }
    }

    /// The document-level security requirements, which operations inherit.
    fn inherited_security(&mut self) -> (Vec<SecurityRequirement>, Vec<SecurityRequirement>) {
        let (lhs, rhs) =
            self.section::<Option<Vec<SecurityRequirement>>>("security", Category::Security);
        self.lhs.security = lhs.clone();
        self.rhs.security = rhs.clone();
        (lhs.unwrap_or_default(), rhs.unwrap_or_default())
    }

    fn version_text(&mut self, key: &'static str) {
        let (lhs, rhs) = (self.lhs.root, self.rhs.root);
        self.recorder.text(
            Field::new("", Category::Info, key),
            lhs.get(key).and_then(Value::as_str),
            rhs.get(key).and_then(Value::as_str),
            Severity::Info,
        );
    }

    fn root_extensions(&mut self) {
        let extensions = |root: &Value| -> Extensions {
            root.as_object()
                .into_iter()
                .flatten()
                .filter(|(key, _)| key.starts_with("x-"))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        };
        let (lhs, rhs) = (extensions(self.lhs.root), extensions(self.rhs.root));
        self.recorder.extensions("", &lhs, &rhs);
    }

    fn diff_info(&mut self) {
        let (lhs, rhs) = self.section::<Info>("info", Category::Info);
        let field = |name| Field::new("/info", Category::Info, name);
        self.recorder.text(
            field("title"),
            lhs.title.as_deref(),
            rhs.title.as_deref(),
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
        self.recorder.text(
            field("termsOfService"),
            lhs.terms_of_service.as_deref(),
            rhs.terms_of_service.as_deref(),
            Severity::Info,
        );
        self.recorder.text(
            field("version"),
            lhs.version.as_deref(),
            rhs.version.as_deref(),
            Severity::Info,
        );
        self.recorder.value(
            field("contact"),
            lhs.contact.as_ref(),
            rhs.contact.as_ref(),
            Severity::Info,
        );
        self.recorder.value(
            field("license"),
            lhs.license.as_ref(),
            rhs.license.as_ref(),
            Severity::Info,
        );
        self.recorder
            .extensions("/info", &lhs.extensions, &rhs.extensions);
    }

    /// Swagger 2.0 `host` and `basePath`: changing or removing them moves the API.
    fn server_text(&mut self, field: Field<'_>, lhs: Option<&str>, rhs: Option<&str>) {
        let severity = if lhs.map_or(true, str::is_empty) {
            Severity::Info
        } else {
            Severity::Warning
        };
        self.recorder.text(field, lhs, rhs, severity);
    }

    /// Swagger 2.0 `consumes` and `produces` of the document or of an operation.
    pub fn diff_media_types(
        &mut self,
        parent: &str,
        lhs_consumes: &[String],
        rhs_consumes: &[String],
        lhs_produces: &[String],
        rhs_produces: &[String],
    ) {
        self.recorder.string_set(
            Field::new(parent, Category::RequestBody, "consumes"),
            &to_set(lhs_consumes),
            &to_set(rhs_consumes),
            Severity::Warning,
            Severity::Info,
            "media type",
        );
        self.recorder.string_set(
            Field::new(parent, Category::Response, "produces"),
            &to_set(lhs_produces),
            &to_set(rhs_produces),
            Severity::Warning,
            Severity::Info,
            "media type",
        );
    }

    /// Servers are keyed by URL.
    pub fn diff_servers(&mut self, base: &str, lhs: &[Value], rhs: &[Value]) {
        let (lhs, lhs_malformed) = self.lhs.interpret_all::<Server>(lhs);
        let (rhs, rhs_malformed) = self.rhs.interpret_all::<Server>(rhs);
        self.report_malformed(base, Category::Server, &lhs_malformed, &rhs_malformed);

        let lhs = index_by(lhs, |server| server.url.clone());
        let rhs = index_by(rhs, |server| server.url.clone());
        let diff = diff_keyed(&lhs, &rhs);

        for (url, _) in diff.removed {
            self.recorder.record(
                Draft::removed(Category::Server, child_path(base, url))
                    .severity(Severity::Warning)
                    .old_value(Value::from(url.as_str()))
                    .message(format!("server '{url}' removed")),
            );
        }
        for (url, _) in diff.added {
            self.recorder.record(
                Draft::added(Category::Server, child_path(base, url))
                    .new_value(Value::from(url.as_str()))
                    .message(format!("server '{url}' added")),
            );
        }
        for (url, l, r) in diff.common {
            let path = child_path(base, url);
            self.recorder.text(
                Field::new(&path, Category::Server, "description"),
                l.description.as_deref(),
                r.description.as_deref(),
                Severity::Info,
            );
            self.diff_server_variables(&child_path(&path, "variables"), l, r);
            self.recorder.extensions(&path, &l.extensions, &r.extensions);
        }
    }

    fn diff_server_variables(&mut self, base: &str, lhs: &Server, rhs: &Server) {
        let diff = diff_keyed(&lhs.variables, &rhs.variables);

        for (name, _) in diff.removed {
            self.recorder.record(
                Draft::removed(Category::Server, child_path(base, name))
                    .sub_type("variable")
                    .severity(Severity::Warning)
                    .message(format!("server variable '{name}' removed")),
            );
        }
        for (name, _) in diff.added {
            self.recorder.record(
                Draft::added(Category::Server, child_path(base, name))
                    .sub_type("variable")
                    .message(format!("server variable '{name}' added")),
            );
        }
        for (name, l, r) in diff.common {
            let path = child_path(base, name);
            let field = |name| Field::new(&path, Category::Server, name);
            self.recorder.text(
                field("default"),
                l.default.as_deref(),
                r.default.as_deref(),
                Severity::Warning,
            );
            self.recorder.string_set(
                field("enum"),
                &to_set(&l.enum_values),
                &to_set(&r.enum_values),
                Severity::Warning,
                Severity::Info,
                "value",
            );
            self.recorder.text(
                field("description"),
                l.description.as_deref(),
                r.description.as_deref(),
                Severity::Info,
            );
        }
    }

    /// `components/schemas` or `definitions`. Shared schemas are lowered once per side, so
    /// every `$ref` to them ends up at the same node.
    fn diff_named_schemas(
        &mut self,
        base: &str,
        lhs: &BTreeMap<String, Value>,
        rhs: &BTreeMap<String, Value>,
    ) {
        let diff = diff_keyed(lhs, rhs);

        for (name, _) in diff.removed {
            self.recorder.record(
                Draft::removed(Category::Schema, child_path(base, name))
                    .severity(Severity::Error)
                    .message(format!("schema '{name}' removed")),
            );
        }
        for (name, _) in diff.added {
            self.recorder.record(
                Draft::added(Category::Schema, child_path(base, name))
                    .message(format!("schema '{name}' added")),
            );
        }
        for (name, _, _) in diff.common {
            let path = child_path(base, name);
            let l = self.lhs.arena.lower_pointer(self.lhs.root, &path);
            let r = self.rhs.arena.lower_pointer(self.rhs.root, &path);
            self.walk_schemas(&path, Some(l), Some(r));
        }
    }

    /// Compare two raw schemas, either of which may be missing.
    pub fn diff_schema(&mut self, path: &str, lhs: Option<&Value>, rhs: Option<&Value>) {
        let l = lhs.map(|schema| self.lhs.lower(schema));
        let r = rhs.map(|schema| self.rhs.lower(schema));
        self.walk_schemas(path, l, r);
    }

    fn walk_schemas(&mut self, path: &str, lhs: Option<SchemaId>, rhs: Option<SchemaId>) {
        DiffWalker::new(&mut self.recorder, &self.lhs.arena, &self.rhs.arena).diff(path, lhs, rhs);
    }

    fn diff_security_schemes(
        &mut self,
        base: &str,
        lhs: &BTreeMap<String, Value>,
        rhs: &BTreeMap<String, Value>,
    ) {
        let diff = diff_keyed(lhs, rhs);

        for (name, _) in diff.removed {
            self.recorder.record(
                Draft::removed(Category::Security, child_path(base, name))
                    .severity(Severity::Error)
                    .message(format!("security scheme '{name}' removed")),
            );
        }
        for (name, _) in diff.added {
            self.recorder.record(
                Draft::added(Category::Security, child_path(base, name))
                    .message(format!("security scheme '{name}' added")),
            );
        }
        for (name, l, r) in diff.common {
            let path = child_path(base, name);
            if let Some((l, r)) = self.interpret_pair::<SecurityScheme>(&path, Category::Security, l, r)
            {
                self.diff_security_scheme(&path, &l, &r);
            }
        }
    }

    fn diff_security_scheme(&mut self, path: &str, lhs: &SecurityScheme, rhs: &SecurityScheme) {
        let field = |name| Field::new(path, Category::Security, name);
        self.recorder.text(
            field("type"),
            lhs.scheme_type.as_deref(),
            rhs.scheme_type.as_deref(),
            Severity::Error,
        );
        self.recorder.text(
            field("description"),
            lhs.description.as_deref(),
            rhs.description.as_deref(),
            Severity::Info,
        );
        for (name, l, r) in [
            ("name", &lhs.name, &rhs.name),
            ("in", &lhs.location, &rhs.location),
            ("scheme", &lhs.scheme, &rhs.scheme),
            ("bearerFormat", &lhs.bearer_format, &rhs.bearer_format),
            ("openIdConnectUrl", &lhs.open_id_connect_url, &rhs.open_id_connect_url),
            ("flow", &lhs.flow, &rhs.flow),
            ("authorizationUrl", &lhs.authorization_url, &rhs.authorization_url),
            ("tokenUrl", &lhs.token_url, &rhs.token_url),
        ] {
            self.recorder
                .text(field(name), l.as_deref(), r.as_deref(), Severity::Warning);
        }

        let flows = child_path(path, "flows");
        let diff = diff_keyed(&lhs.flows, &rhs.flows);
        for (flow, _) in diff.removed {
            self.recorder.record(
                Draft::removed(Category::Security, child_path(&flows, flow))
                    .sub_type("flow")
                    .severity(Severity::Warning)
                    .message(format!("OAuth flow '{flow}' removed")),
            );
        }
        for (flow, _) in diff.added {
            self.recorder.record(
                Draft::added(Category::Security, child_path(&flows, flow))
                    .sub_type("flow")
                    .message(format!("OAuth flow '{flow}' added")),
            );
        }
        for (flow, l, r) in diff.common {
            let path = child_path(&flows, flow);
            let field = |name| Field::new(&path, Category::Security, name);
            for (name, l, r) in [
                ("authorizationUrl", &l.authorization_url, &r.authorization_url),
                ("tokenUrl", &l.token_url, &r.token_url),
                ("refreshUrl", &l.refresh_url, &r.refresh_url),
            ] {
                self.recorder
                    .text(field(name), l.as_deref(), r.as_deref(), Severity::Warning);
            }
        }

        self.recorder.string_set(
            field("scopes"),
            &lhs.all_scopes(),
            &rhs.all_scopes(),
            Severity::Warning,
            Severity::Info,
            "scope",
        );
        self.recorder.extensions(path, &lhs.extensions, &rhs.extensions);
    }

    /// A list of requirements is satisfied by any one of them, so each requirement is keyed by
    /// the schemes it combines.
    pub fn diff_security_requirements(
        &mut self,
        base: &str,
        lhs: &[SecurityRequirement],
        rhs: &[SecurityRequirement],
    ) {
        let lhs_keyed = index_by(lhs, |req| requirement_key(req));
        let rhs_keyed = index_by(rhs, |req| requirement_key(req));
        let diff = diff_keyed(&lhs_keyed, &rhs_keyed);
        let describe = |key: &str| {
            if key.is_empty() {
                "anonymous access".to_owned()
            } else {
                format!("security requirement '{key}'")
            }
        };

        for (key, _) in diff.removed {
            self.recorder.record(
                Draft::removed(Category::Security, child_path(base, key))
                    .sub_type("requirement")
                    .severity(Severity::Error)
                    .message(format!("{} removed", describe(key))),
            );
        }
        for (key, _) in diff.added {
            // Any requirement is a new obligation when none was needed before.
            self.recorder.record(
                Draft::added(Category::Security, child_path(base, key))
                    .sub_type("requirement")
                    .severity_if(lhs.is_empty(), Severity::Error, Severity::Info)
                    .message(format!("{} added", describe(key))),
            );
        }
        for (key, l, r) in diff.common {
            let path = child_path(base, key);
            for (scheme, l_scopes) in l.iter() {
                let r_scopes = r.get(scheme).map(Vec::as_slice).unwrap_or_default();
                let (l_scopes, r_scopes) = (to_set(l_scopes), to_set(r_scopes));
                let scheme_path = child_path(&path, scheme);

                for scope in l_scopes.difference(&r_scopes) {
                    self.recorder.record(
                        Draft::removed(Category::Security, scheme_path.clone())
                            .sub_type("scope")
                            .old_value(Value::from(scope.as_str()))
                            .message(format!("scope '{scope}' no longer required for '{scheme}'")),
                    );
                }
                for scope in r_scopes.difference(&l_scopes) {
                    self.recorder.record(
                        Draft::added(Category::Security, scheme_path.clone())
                            .sub_type("scope")
                            .severity(Severity::Error)
                            .new_value(Value::from(scope.as_str()))
                            .message(format!("scope '{scope}' now required for '{scheme}'")),
                    );
                }
            }
        }
    }

    /// Interpret both sides of an element that may be a reference. When either cannot be
    /// interpreted, a warning is recorded unless both sides are the same, and `None` returned.
    pub fn interpret_pair<T: DeserializeOwned>(
        &mut self,
        path: &str,
        category: Category,
        lhs: &Value,
        rhs: &Value,
    ) -> Option<(T, T)> {
        match (self.lhs.interpret::<T>(lhs), self.rhs.interpret::<T>(rhs)) {
            (Ok(l), Ok(r)) => Some((l, r)),
            (Err(reason), _) | (_, Err(reason)) => {
                self.malformed(path, category, Some(lhs), Some(rhs), reason);
                None
            }
        }
    }

    fn malformed(
        &mut self,
        path: &str,
        category: Category,
        lhs: Option<&Value>,
        rhs: Option<&Value>,
        reason: String,
    ) {
        if lhs != rhs {
            self.recorder.record(
                Draft::modified(category, path)
                    .sub_type("malformed")
                    .severity(Severity::Warning)
                    .old_value(lhs.cloned())
                    .new_value(rhs.cloned())
                    .message(format!("could not be interpreted: {reason}")),
            );
        }
    }

    /// Report elements of a list that could not be interpreted, leaving out the ones that are
    /// identical on both sides.
    pub fn report_malformed(
        &mut self,
        path: &str,
        category: Category,
        lhs: &[Malformed<'_>],
        rhs: &[Malformed<'_>],
    ) {
        for (value, reason) in lhs {
            if !rhs.iter().any(|(other, _)| other == value) {
                self.recorder.record(
                    Draft::modified(category, path)
                        .sub_type("malformed")
                        .severity(Severity::Warning)
                        .old_value((*value).clone())
                        .message(format!("could not be interpreted: {reason}")),
                );
            }
        }
        for (value, reason) in rhs {
            if !lhs.iter().any(|(other, _)| other == value) {
                self.recorder.record(
                    Draft::modified(category, path)
                        .sub_type("malformed")
                        .severity(Severity::Warning)
                        .new_value((*value).clone())
                        .message(format!("could not be interpreted: {reason}")),
                );
            }
        }
    }
}

fn requirement_key(requirement: &SecurityRequirement) -> String {
    requirement
        .keys()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" + ")
}

pub(crate) fn to_set(items: &[String]) -> BTreeSet<String> {
    items.iter().cloned().collect()
}
