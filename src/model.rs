//! Typed view of Swagger 2.0 and OpenAPI 3.x documents.
//!
//! Only the structure needed for comparison is modeled. Schemas, anything that may be a `$ref`,
//! and the elements of lists and maps stay raw JSON. They are interpreted one at a time while
//! comparing, so that one ill-typed element does not spoil its siblings.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Deserialize;
use serde_json::Value;

/// The declared version of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// `swagger: "2.0"`
    Swagger2,
    /// `openapi: "3.0.x"`
    OpenApi30,
    /// `openapi: "3.1.x"`
    OpenApi31,
}

impl Version {
    /// Look at the version field of a document.
    pub fn detect(document: &Value) -> Option<Self> {
        if let Some(swagger) = document.get("swagger").and_then(Value::as_str) {
            return swagger.starts_with("2.").then_some(Self::Swagger2);
        }
        let openapi = document.get("openapi").and_then(Value::as_str)?;
        if openapi.starts_with("3.0") {
            Some(Self::OpenApi30)
        } else if openapi.starts_with("3.") {
            Some(Self::OpenApi31)
        } else {
            None
        }
    }

    /// The major version number.
    pub fn major(self) -> u8 {
        match self {
            Self::Swagger2 => 2,
            Self::OpenApi30 | Self::OpenApi31 => 3,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Swagger2 => "Swagger 2.0",
            Self::OpenApi30 => "OpenAPI 3.0",
            Self::OpenApi31 => "OpenAPI 3.1",
        })
    }
}

pub type Extensions = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Components {
    pub schemas: BTreeMap<String, Value>,
    pub security_schemes: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Info {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub terms_of_service: Option<String>,
    pub version: Option<String>,
    pub contact: Option<Value>,
    pub license: Option<Value>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Server {
    pub url: String,
    pub description: Option<String>,
    pub variables: BTreeMap<String, ServerVariable>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerVariable {
    #[serde(rename = "enum")]
    pub enum_values: Vec<String>,
    pub default: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PathItem {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub get: Option<Value>,
    pub put: Option<Value>,
    pub post: Option<Value>,
    pub delete: Option<Value>,
    pub options: Option<Value>,
    pub head: Option<Value>,
    pub patch: Option<Value>,
    pub trace: Option<Value>,
    pub servers: Vec<Value>,
    pub parameters: Vec<Value>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

impl PathItem {
    /// The eight method slots, in a fixed order.
    pub fn operations(&self) -> [(&'static str, Option<&Value>); 8] {
        [
            ("get", self.get.as_ref()),
            ("put", self.put.as_ref()),
            ("post", self.post.as_ref()),
            ("delete", self.delete.as_ref()),
            ("options", self.options.as_ref()),
            ("head", self.head.as_ref()),
            ("patch", self.patch.as_ref()),
            ("trace", self.trace.as_ref()),
        ]
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Operation {
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub operation_id: Option<String>,
    pub parameters: Vec<Value>,
    pub request_body: Option<Value>,
    pub responses: BTreeMap<String, Value>,
    pub deprecated: bool,
    pub security: Option<Vec<SecurityRequirement>>,
    pub servers: Vec<Value>,
    pub consumes: Option<Vec<String>>,
    pub produces: Option<Vec<String>>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

/// Keywords a Swagger 2.0 non-body parameter or header shares with schemas.
const INLINE_SCHEMA_KEYWORDS: [&str; 16] = [
    "type",
    "format",
    "items",
    "default",
    "maximum",
    "exclusiveMaximum",
    "minimum",
    "exclusiveMinimum",
    "maxLength",
    "minLength",
    "pattern",
    "maxItems",
    "minItems",
    "uniqueItems",
    "enum",
    "multipleOf",
];

/// Collect the inline schema keywords of a Swagger 2.0 parameter or header.
fn inline_schema(rest: &Extensions) -> Option<Value> {
    let schema: serde_json::Map<String, Value> = rest
        .iter()
        .filter(|(key, _)| INLINE_SCHEMA_KEYWORDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    (!schema.is_empty()).then_some(Value::Object(schema))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    pub description: Option<String>,
    pub required: bool,
    pub deprecated: bool,
    pub allow_empty_value: bool,
    pub style: Option<String>,
    pub explode: Option<bool>,
    pub schema: Option<Value>,
    pub content: BTreeMap<String, MediaType>,
    /// Everything else: vendor extensions, and the inline schema of Swagger 2.0 parameters.
    #[serde(flatten)]
    pub rest: Extensions,
}

impl Parameter {
    /// The schema of the parameter, from `schema` or from Swagger 2.0 inline keywords.
    pub fn effective_schema(&self) -> Option<Value> {
        self.schema.clone().or_else(|| inline_schema(&self.rest))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestBody {
    pub description: Option<String>,
    pub content: BTreeMap<String, MediaType>,
    pub required: bool,
    #[serde(flatten)]
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MediaType {
    pub schema: Option<Value>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Response {
    pub description: Option<String>,
    pub headers: BTreeMap<String, Value>,
    pub content: BTreeMap<String, MediaType>,
    /// Swagger 2.0 only.
    pub schema: Option<Value>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Header {
    pub description: Option<String>,
    pub required: bool,
    pub deprecated: bool,
    pub schema: Option<Value>,
    #[serde(flatten)]
    pub rest: Extensions,
}

impl Header {
    pub fn effective_schema(&self) -> Option<Value> {
        self.schema.clone().or_else(|| inline_schema(&self.rest))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub scheme_type: Option<String>,
    pub description: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "in")]
    pub location: Option<String>,
    pub scheme: Option<String>,
    pub bearer_format: Option<String>,
    pub open_id_connect_url: Option<String>,
    pub flows: BTreeMap<String, OAuthFlow>,
    /// Swagger 2.0 flows are inlined into the scheme.
    pub flow: Option<String>,
    pub authorization_url: Option<String>,
    pub token_url: Option<String>,
    pub scopes: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

impl SecurityScheme {
    /// Every scope, keyed by `<flow>:<scope>` for OpenAPI 3.x flows and by the bare scope name
    /// for Swagger 2.0.
    pub fn all_scopes(&self) -> BTreeSet<String> {
        self.scopes
            .keys()
            .cloned()
            .chain(self.flows.iter().flat_map(|(flow, f)| {
                f.scopes.keys().map(move |scope| format!("{flow}:{scope}"))
            }))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OAuthFlow {
    pub authorization_url: Option<String>,
    pub token_url: Option<String>,
    pub refresh_url: Option<String>,
    pub scopes: BTreeMap<String, String>,
}

/// Scheme name to required scopes. A list of requirements is satisfied by any one of them.
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;
