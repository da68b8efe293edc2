use std::fmt;

use schemars::schema::InstanceType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// An "atomic" change made to the API description, going from LHS to RHS.
///
/// Records are immutable once created and are emitted in traversal order. Keyed collections are
/// walked in lexicographic key order, so the output is stable across runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    /// JSON pointer of the change. `""` for the document root, `"/paths/~1pets/get"` for the
    /// `get` operation of `/pets`.
    pub path: String,
    /// Whether something was added, removed or modified.
    pub kind: ChangeKind,
    /// The area of the document the change belongs to.
    pub category: Category,
    /// The resolved severity. Always `None` when comparing in [`Mode::Plain`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// The value on the LHS, if there is a meaningful one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    /// The value on the RHS, if there is a meaningful one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    /// Human readable description of the change.
    pub message: String,
    /// Where the change is located in the source text, if a [`crate::LocationProvider`] knows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Change {
    /// Whether the change has been classified as breaking (`error` or `critical`).
    pub fn is_breaking(&self) -> bool {
        self.severity.map_or(false, Severity::is_breaking)
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.symbol())?;
        if let Some(severity) = self.severity {
            write!(f, " [{severity}]")?;
        }
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(
            f,
            " {path} ({} {}): {}",
            self.kind, self.category, self.message
        )
    }
}

/// The kind of change.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Present on the RHS only.
    Added,
    /// Present on the LHS only.
    Removed,
    /// Present on both sides with a different value.
    Modified,
}

impl ChangeKind {
    /// All kinds, in declaration order.
    pub const ALL: [ChangeKind; 3] = [Self::Added, Self::Removed, Self::Modified];

    /// The name used in rendered output and in severity rule keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
        }
    }

    /// The one-character marker used by [`Change`]'s `Display` implementation.
    pub fn symbol(self) -> char {
        match self {
            Self::Added => '+',
            Self::Removed => '-',
            Self::Modified => '~',
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The area of an API description a change belongs to.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    /// A path (endpoint) as a whole.
    Endpoint,
    /// An operation, i.e. one HTTP method of a path.
    Operation,
    /// An operation or path parameter.
    Parameter,
    /// A request body.
    RequestBody,
    /// A response or response header.
    Response,
    /// A schema or one of its keywords.
    Schema,
    /// Security schemes and requirements.
    Security,
    /// Servers, host, base path and schemes.
    Server,
    /// Document metadata.
    Info,
    /// Vendor extensions (`x-*`).
    Extension,
}

impl Category {
    /// The name used in rendered output; matches the field names of [`crate::SeverityRules`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Endpoint => "endpoint",
            Self::Operation => "operation",
            Self::Parameter => "parameter",
            Self::RequestBody => "requestBody",
            Self::Response => "response",
            Self::Schema => "schema",
            Self::Security => "security",
            Self::Server => "server",
            Self::Info => "info",
            Self::Extension => "extension",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much a change matters to existing clients, in increasing order.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational, never breaks a client.
    Info,
    /// Might break some clients, depending on how they use the API.
    Warning,
    /// Expected to break existing clients.
    Error,
    /// Always breaks any client using the affected part of the API.
    Critical,
}

impl Severity {
    /// `error` and `critical` changes are breaking.
    pub fn is_breaking(self) -> bool {
        self >= Self::Error
    }

    /// The name used in rendered output and configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether severities are computed at all.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum Mode {
    /// Report differences only. No severity is attached and severity rules are not consulted.
    Plain,
    /// Attach a severity to every change and apply severity rules.
    #[default]
    Classifying,
}

/// A position in the source text of one of the documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub column: usize,
    /// The file the position refers to, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// One of the two documents being compared.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Side {
    /// The old document (LHS).
    Source,
    /// The new document (RHS).
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::Target => "target",
        })
    }
}

/// The errors that can happen in this crate.
///
/// Differences between the documents are never errors. Only input that cannot be compared at
/// all ends up here.
#[derive(Error, Debug)]
pub enum Error {
    /// The document is not a JSON object.
    #[error("{0} document is not an object")]
    NotAnObject(Side),
    /// The document has neither a `swagger: "2.0"` nor an `openapi: "3.x"` field.
    #[error("{0} document declares no supported OpenAPI or Swagger version")]
    UnknownVersion(Side),
    /// A severity rule key is not of the form `<kind>` or `<kind>.<subType>`.
    #[error("invalid severity rule key {0:?}, expected <added|removed|modified>[.<subType>]")]
    InvalidRuleKey(String),
}

/// All primitive types defined in JSON schema.
#[derive(Serialize, Clone, Copy, Ord, Eq, PartialEq, PartialOrd, Debug)]
#[allow(missing_docs)]
pub enum JsonSchemaType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "object")]
    Object,
    #[serde(rename = "array")]
    Array,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "null")]
    Null,
}

impl JsonSchemaType {
    /// Every type, used when a schema does not restrict its type at all.
    pub const ALL: [JsonSchemaType; 7] = [
        Self::String,
        Self::Number,
        Self::Integer,
        Self::Object,
        Self::Array,
        Self::Boolean,
        Self::Null,
    ];

    /// The keyword value as it appears in a schema.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Object => "object",
            Self::Array => "array",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }
}

impl fmt::Display for JsonSchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<JsonSchemaType> for InstanceType {
    fn from(t: JsonSchemaType) -> Self {
        match t {
            JsonSchemaType::String => InstanceType::String,
            JsonSchemaType::Number => InstanceType::Number,
            JsonSchemaType::Integer => InstanceType::Integer,
            JsonSchemaType::Object => InstanceType::Object,
            JsonSchemaType::Array => InstanceType::Array,
            JsonSchemaType::Boolean => InstanceType::Boolean,
            JsonSchemaType::Null => InstanceType::Null,
        }
    }
}

impl From<InstanceType> for JsonSchemaType {
    fn from(t: InstanceType) -> Self {
        match t {
            InstanceType::String => JsonSchemaType::String,
            InstanceType::Number => JsonSchemaType::Number,
            InstanceType::Integer => JsonSchemaType::Integer,
            InstanceType::Object => JsonSchemaType::Object,
            InstanceType::Array => JsonSchemaType::Array,
            InstanceType::Boolean => JsonSchemaType::Boolean,
            InstanceType::Null => JsonSchemaType::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_and_without_severity() {
        let mut change = Change {
            path: "/paths/~1pets/get".to_owned(),
            kind: ChangeKind::Removed,
            category: Category::Operation,
            severity: Some(Severity::Critical),
            old_value: None,
            new_value: None,
            message: "GET operation removed".to_owned(),
            location: None,
        };
        assert_eq!(
            change.to_string(),
            "- [critical] /paths/~1pets/get (removed operation): GET operation removed"
        );

        change.severity = None;
        assert_eq!(
            change.to_string(),
            "- /paths/~1pets/get (removed operation): GET operation removed"
        );
    }

    #[test]
    fn severity_order() {
        assert!(Severity::Critical > Severity::Error);
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        assert!(Severity::Error.is_breaking());
        assert!(!Severity::Warning.is_breaking());
    }

    #[test]
    fn instance_type_round_trip() {
        for ty in JsonSchemaType::ALL {
            assert_eq!(JsonSchemaType::from(InstanceType::from(ty)), ty);
        }
    }
}
