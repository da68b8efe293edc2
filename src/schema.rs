use std::collections::{BTreeMap, BTreeSet};

use schemars::schema::{InstanceType, SingleOrVec};
use serde_json::{Map, Number, Value};

use crate::resolver::Resolver;
use crate::JsonSchemaType;

/// Index of a [`SchemaNode`] in a [`SchemaArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaId(usize);

/// The `type` keyword.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum TypeSet {
    /// No `type`, any instance type is allowed.
    #[default]
    Absent,
    /// A single type, including one-element lists.
    Single(JsonSchemaType),
    /// A list of types (OpenAPI 3.1).
    Multiple(BTreeSet<JsonSchemaType>),
    /// Something that is not a valid `type`.
    Unrecognized(Value),
}

impl TypeSet {
    fn from_value(value: Option<&Value>) -> Self {
        let Some(value) = value else {
            return Self::Absent;
        };
        match serde_json::from_value::<SingleOrVec<InstanceType>>(value.clone()) {
            Ok(SingleOrVec::Single(ty)) => Self::Single((*ty).into()),
            Ok(SingleOrVec::Vec(tys)) => {
                let set: BTreeSet<JsonSchemaType> = tys.into_iter().map(Into::into).collect();
                let mut iter = set.iter().copied();
                match (iter.next(), iter.next()) {
                    (None, _) => Self::Unrecognized(value.clone()),
                    (Some(ty), None) => Self::Single(ty),
                    _ => Self::Multiple(set),
                }
            }
            Err(_) => Self::Unrecognized(value.clone()),
        }
    }

    /// All types accepted. `number` accepts integers as well; an absent `type` accepts anything.
    ///
    /// `None` for [`TypeSet::Unrecognized`].
    pub fn accepted(&self) -> Option<BTreeSet<JsonSchemaType>> {
        let explode = |ty: JsonSchemaType| match ty {
            JsonSchemaType::Number => vec![JsonSchemaType::Integer, JsonSchemaType::Number],
            ty => vec![ty],
        };
        match self {
            Self::Absent => Some(JsonSchemaType::ALL.into_iter().collect()),
            Self::Single(ty) => Some(explode(*ty).into_iter().collect()),
            Self::Multiple(tys) => Some(tys.iter().copied().flat_map(explode).collect()),
            Self::Unrecognized(_) => None,
        }
    }

    /// The keyword value as it appears in a document.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Self::Absent => None,
            Self::Single(ty) => Some(Value::from(ty.as_str())),
            Self::Multiple(tys) => Some(tys.iter().map(|ty| ty.as_str()).collect()),
            Self::Unrecognized(value) => Some(value.clone()),
        }
    }

    /// Short rendering for messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Absent => "any".to_owned(),
            Self::Single(ty) => ty.to_string(),
            Self::Multiple(tys) => tys
                .iter()
                .map(|ty| ty.as_str())
                .collect::<Vec<_>>()
                .join("|"),
            Self::Unrecognized(value) => value.to_string(),
        }
    }
}

/// Keywords that are absent, a nested schema, or a boolean: `items`, `additionalProperties`,
/// `unevaluatedProperties` and `unevaluatedItems`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SubSchema {
    /// The keyword is not present.
    #[default]
    Absent,
    /// A nested schema.
    Schema(SchemaId),
    /// `true` (anything) or `false` (nothing).
    Bool(bool),
    /// Any other shape, e.g. a tuple-form `items` array.
    Unrecognized(Value),
}

/// A lowered schema. Nested schemas are referenced by [`SchemaId`], which is what allows
/// recursive schemas to be represented without recursion in the data structure itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaNode {
    pub title: Option<String>,
    pub description: Option<String>,
    pub ty: TypeSet,
    pub format: Option<String>,

    pub multiple_of: Option<Number>,
    pub maximum: Option<Number>,
    pub minimum: Option<Number>,
    pub exclusive_maximum: Option<Value>,
    pub exclusive_minimum: Option<Value>,

    pub max_length: Option<Number>,
    pub min_length: Option<Number>,
    pub pattern: Option<String>,

    pub max_items: Option<Number>,
    pub min_items: Option<Number>,
    pub unique_items: Option<bool>,

    pub max_properties: Option<Number>,
    pub min_properties: Option<Number>,
    pub required: BTreeSet<String>,

    pub nullable: Option<bool>,
    pub read_only: Option<bool>,
    pub write_only: Option<bool>,
    pub deprecated: Option<bool>,

    pub enum_values: Option<Vec<Value>>,
    pub const_value: Option<Value>,
    pub default: Option<Value>,
    pub discriminator: Option<Value>,

    pub properties: BTreeMap<String, SchemaId>,
    pub pattern_properties: BTreeMap<String, SchemaId>,
    pub items: SubSchema,
    pub additional_properties: SubSchema,
    pub unevaluated_properties: SubSchema,
    pub unevaluated_items: SubSchema,

    pub all_of: Vec<SchemaId>,
    pub any_of: Vec<SchemaId>,
    pub one_of: Vec<SchemaId>,
    pub not: Option<SchemaId>,
    pub if_schema: Option<SchemaId>,
    pub then_schema: Option<SchemaId>,
    pub else_schema: Option<SchemaId>,

    pub content_encoding: Option<String>,
    pub content_media_type: Option<String>,
    pub content_schema: Option<SchemaId>,
    pub prefix_items: Vec<SchemaId>,
    pub contains: Option<SchemaId>,
    pub property_names: Option<SchemaId>,
    pub dependent_schemas: BTreeMap<String, SchemaId>,

    pub extensions: BTreeMap<String, Value>,

    /// Set when the node stands for a `$ref` that could not be resolved.
    pub reference: Option<String>,
    /// Set when the schema is neither an object nor a boolean.
    pub unrecognized: Option<Value>,
    /// Keywords whose value has the wrong shape, e.g. a string `maximum` or an object `enum`.
    /// They are left out of the typed fields above.
    pub ill_shaped: BTreeMap<&'static str, Value>,
}

/// Keywords that must be numbers.
const NUMERIC_KEYWORDS: [&str; 9] = [
    "multipleOf",
    "maximum",
    "minimum",
    "maxLength",
    "minLength",
    "maxItems",
    "minItems",
    "maxProperties",
    "minProperties",
];

/// All schemas of one document, lowered lazily as the comparison reaches them.
pub struct SchemaArena {
    nodes: Vec<SchemaNode>,
    /// Canonical pointer of every resolved `$ref` target that has been lowered already.
    refs: BTreeMap<String, SchemaId>,
    resolver: Resolver,
}

impl SchemaArena {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            nodes: Vec::new(),
            refs: BTreeMap::new(),
            resolver,
        }
    }

    pub fn get(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Lower the named schema at `pointer`, e.g. `/components/schemas/Pet`, sharing its node
    /// with every `$ref` to it.
    pub fn lower_pointer(&mut self, root: &Value, pointer: &str) -> SchemaId {
        self.lower_ref(root, &format!("#{pointer}"))
    }

    /// Lower `schema`, which lives somewhere in `root`.
    pub fn lower(&mut self, root: &Value, schema: &Value) -> SchemaId {
        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            return self.lower_ref(root, reference);
        }
        let id = self.reserve();
        self.nodes[id.0] = self.build(root, schema);
        id
    }

    fn lower_ref(&mut self, root: &Value, reference: &str) -> SchemaId {
        let Some((pointer, target)) = self.resolver.resolve(root, reference) else {
            let id = self.reserve();
            self.nodes[id.0].reference = Some(reference.to_owned());
            return id;
        };
        if let Some(&id) = self.refs.get(&pointer) {
            return id;
        }
        // Registered before lowering the target, so that references back to it close the cycle.
        let id = self.reserve();
        self.refs.insert(pointer, id);
        self.nodes[id.0] = self.build(root, target);
        id
    }

    fn reserve(&mut self) -> SchemaId {
        self.nodes.push(SchemaNode::default());
        SchemaId(self.nodes.len() - 1)
    }

    fn build(&mut self, root: &Value, schema: &Value) -> SchemaNode {
        let obj = match schema {
            Value::Object(obj) => obj,
            Value::Bool(true) => return SchemaNode::default(),
            Value::Bool(false) => {
                let anything = self.reserve();
                return SchemaNode {
                    not: Some(anything),
                    ..Default::default()
                };
            }
            other => {
                return SchemaNode {
                    unrecognized: Some(other.clone()),
                    ..Default::default()
                }
            }
        };

        let mut node = SchemaNode {
            title: string(obj, "title"),
            description: string(obj, "description"),
            ty: TypeSet::from_value(obj.get("type")),
            format: string(obj, "format"),
            multiple_of: number(obj, "multipleOf"),
            maximum: number(obj, "maximum"),
            minimum: number(obj, "minimum"),
            exclusive_maximum: obj.get("exclusiveMaximum").cloned(),
            exclusive_minimum: obj.get("exclusiveMinimum").cloned(),
            max_length: number(obj, "maxLength"),
            min_length: number(obj, "minLength"),
            pattern: string(obj, "pattern"),
            max_items: number(obj, "maxItems"),
            min_items: number(obj, "minItems"),
            unique_items: boolean(obj, "uniqueItems"),
            max_properties: number(obj, "maxProperties"),
            min_properties: number(obj, "minProperties"),
            required: obj
                .get("required")
                .and_then(Value::as_array)
                .map(|req| {
                    req.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default(),
            nullable: boolean(obj, "nullable"),
            read_only: boolean(obj, "readOnly"),
            write_only: boolean(obj, "writeOnly"),
            deprecated: boolean(obj, "deprecated"),
            enum_values: obj.get("enum").and_then(Value::as_array).cloned(),
            const_value: obj.get("const").cloned(),
            default: obj.get("default").cloned(),
            discriminator: obj.get("discriminator").cloned(),
            content_encoding: string(obj, "contentEncoding"),
            content_media_type: string(obj, "contentMediaType"),
            extensions: obj
                .iter()
                .filter(|(key, _)| key.starts_with("x-"))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            ..Default::default()
        };

        for keyword in NUMERIC_KEYWORDS {
            if let Some(value) = obj.get(keyword).filter(|v| !v.is_number()) {
                node.ill_shaped.insert(keyword, value.clone());
            }
        }
        if let Some(value) = obj.get("enum").filter(|v| !v.is_array()) {
            node.ill_shaped.insert("enum", value.clone());
        }

        node.properties = self.lower_map(root, obj.get("properties"));
        node.pattern_properties = self.lower_map(root, obj.get("patternProperties"));
        node.dependent_schemas = self.lower_map(root, obj.get("dependentSchemas"));

        node.items = self.lower_sub(root, obj.get("items"));
        node.additional_properties = self.lower_sub(root, obj.get("additionalProperties"));
        node.unevaluated_properties = self.lower_sub(root, obj.get("unevaluatedProperties"));
        node.unevaluated_items = self.lower_sub(root, obj.get("unevaluatedItems"));

        node.all_of = self.lower_list(root, obj.get("allOf"));
        node.any_of = self.lower_list(root, obj.get("anyOf"));
        node.one_of = self.lower_list(root, obj.get("oneOf"));
        node.prefix_items = self.lower_list(root, obj.get("prefixItems"));

        node.not = self.lower_opt(root, obj.get("not"));
        node.if_schema = self.lower_opt(root, obj.get("if"));
        node.then_schema = self.lower_opt(root, obj.get("then"));
        node.else_schema = self.lower_opt(root, obj.get("else"));
        node.content_schema = self.lower_opt(root, obj.get("contentSchema"));
        node.contains = self.lower_opt(root, obj.get("contains"));
        node.property_names = self.lower_opt(root, obj.get("propertyNames"));

        node
    }

    fn lower_opt(&mut self, root: &Value, value: Option<&Value>) -> Option<SchemaId> {
        value.map(|value| self.lower(root, value))
    }

    fn lower_list(&mut self, root: &Value, value: Option<&Value>) -> Vec<SchemaId> {
        match value {
            Some(Value::Array(schemas)) => schemas.iter().map(|s| self.lower(root, s)).collect(),
            _ => Vec::new(),
        }
    }

    fn lower_map(&mut self, root: &Value, value: Option<&Value>) -> BTreeMap<String, SchemaId> {
        match value {
            Some(Value::Object(schemas)) => schemas
                .iter()
                .map(|(name, s)| (name.clone(), self.lower(root, s)))
                .collect(),
            _ => BTreeMap::new(),
        }
    }

    fn lower_sub(&mut self, root: &Value, value: Option<&Value>) -> SubSchema {
        match value {
            None => SubSchema::Absent,
            Some(Value::Bool(b)) => SubSchema::Bool(*b),
            Some(value @ Value::Object(_)) => SubSchema::Schema(self.lower(root, value)),
            Some(other) => SubSchema::Unrecognized(other.clone()),
        }
    }
}

fn string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn number(obj: &Map<String, Value>, key: &str) -> Option<Number> {
    match obj.get(key) {
        Some(Value::Number(n)) => Some(n.clone()),
        _ => None,
    }
}

fn boolean(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    obj.get(key).and_then(Value::as_bool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn arena(root: &Value) -> SchemaArena {
        SchemaArena::new(Resolver::for_document(root))
    }

    #[test]
    fn self_reference_closes_cycle() {
        let root = json!({
            "components": {
                "schemas": {
                    "Node": {
                        "type": "object",
                        "properties": {
                            "next": { "$ref": "#/components/schemas/Node" }
                        }
                    }
                }
            }
        });
        let mut arena = arena(&root);
        let id = arena.lower_pointer(&root, "/components/schemas/Node");
        assert_eq!(arena.get(id).properties["next"], id);
        assert_eq!(arena.len(), 1);

        // Lowering it again through a reference reuses the node.
        let again = arena.lower(&root, &json!({ "$ref": "#/components/schemas/Node" }));
        assert_eq!(again, id);
    }

    #[test]
    fn mutual_reference() {
        let root = json!({
            "definitions": {
                "A": { "properties": { "b": { "$ref": "#/definitions/B" } } },
                "B": { "properties": { "a": { "$ref": "#/definitions/A" } } }
            }
        });
        let mut arena = arena(&root);
        let a = arena.lower_pointer(&root, "/definitions/A");
        let b = arena.get(a).properties["b"];
        assert_eq!(arena.get(b).properties["a"], a);
    }

    #[test]
    fn inline_schemas_are_distinct() {
        let root = json!({});
        let mut arena = arena(&root);
        let schema = json!({ "type": "string" });
        assert_ne!(arena.lower(&root, &schema), arena.lower(&root, &schema));
    }

    #[test]
    fn boolean_schemas() {
        let root = json!({});
        let mut arena = arena(&root);
        let t = arena.lower(&root, &json!(true));
        assert_eq!(arena.get(t), &SchemaNode::default());

        let f = arena.lower(&root, &json!(false));
        let not = arena.get(f).not.unwrap();
        assert_eq!(arena.get(not), &SchemaNode::default());
    }

    #[test]
    fn types() {
        assert_eq!(TypeSet::from_value(None), TypeSet::Absent);
        assert_eq!(
            TypeSet::from_value(Some(&json!("integer"))),
            TypeSet::Single(JsonSchemaType::Integer)
        );
        assert_eq!(
            TypeSet::from_value(Some(&json!(["string"]))),
            TypeSet::Single(JsonSchemaType::String)
        );
        assert_eq!(
            TypeSet::from_value(Some(&json!(["string", "null"]))),
            TypeSet::Multiple([JsonSchemaType::String, JsonSchemaType::Null].into())
        );
        assert_eq!(
            TypeSet::from_value(Some(&json!("file"))),
            TypeSet::Unrecognized(json!("file"))
        );

        let number = TypeSet::Single(JsonSchemaType::Number).accepted().unwrap();
        assert!(number.contains(&JsonSchemaType::Integer));
        assert_eq!(TypeSet::Absent.accepted().unwrap().len(), 7);
        assert!(TypeSet::Unrecognized(json!(1)).accepted().is_none());
    }

    #[test]
    fn tri_state_keywords() {
        let root = json!({});
        let mut arena = arena(&root);
        let id = arena.lower(
            &root,
            &json!({
                "items": [{ "type": "string" }],
                "additionalProperties": false,
                "unevaluatedProperties": { "type": "string" },
                "unevaluatedItems": "nope"
            }),
        );
        let node = arena.get(id).clone();
        assert_eq!(node.items, SubSchema::Unrecognized(json!([{ "type": "string" }])));
        assert_eq!(node.additional_properties, SubSchema::Bool(false));
        assert!(matches!(node.unevaluated_properties, SubSchema::Schema(_)));
        assert_eq!(node.unevaluated_items, SubSchema::Unrecognized(json!("nope")));
    }

    #[test]
    fn ill_shaped_keywords() {
        let root = json!({});
        let mut arena = arena(&root);
        let id = arena.lower(
            &root,
            &json!({ "maximum": "10", "minimum": 1, "enum": "red" }),
        );
        let node = arena.get(id);
        assert_eq!(node.maximum, None);
        assert_eq!(node.minimum, Some(Number::from(1u64)));
        assert_eq!(node.enum_values, None);
        assert_eq!(
            node.ill_shaped.keys().copied().collect::<Vec<_>>(),
            ["enum", "maximum"]
        );
    }

    #[test]
    fn unresolvable_reference() {
        let root = json!({});
        let mut arena = arena(&root);
        let id = arena.lower(&root, &json!({ "$ref": "other.yaml#/Pet" }));
        assert_eq!(arena.get(id).reference.as_deref(), Some("other.yaml#/Pet"));
    }
}
