use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::debug;

use crate::location::escape_token;

/// How many `$ref` hops are followed before a reference is considered unresolvable.
const MAX_REF_HOPS: usize = 32;

/// Places where named schemas live, across Swagger 2.0, OpenAPI 3.x and plain JSON schema.
const SCHEMA_CONTAINERS: [&str; 3] = ["/definitions", "/$defs", "/components/schemas"];

pub struct Resolver {
    /// Maps every known spelling of a reference to a JSON pointer into the document.
    ref_lookup: BTreeMap<String, String>,
}

impl Resolver {
    pub fn for_document(root: &Value) -> Self {
        let mut ref_lookup = BTreeMap::new();
        let root_id = root.get_schema_id();

        for container in SCHEMA_CONTAINERS {
            let Some(Value::Object(schemas)) = root.pointer(container) else {
                continue;
            };

            for (key, schema) in schemas {
                let pointer = format!("{container}/{}", escape_token(key));

                if let Some(id) = schema.get_schema_id() {
                    ref_lookup.insert(id.to_owned(), pointer.clone());
                }

                if let Some(root_id) = root_id {
                    ref_lookup.insert(format!("{root_id}#{pointer}"), pointer.clone());
                }

                ref_lookup.insert(format!("#{pointer}"), pointer);
            }
        }

        Self { ref_lookup }
    }

    /// Resolves a reference, following chains of references.
    ///
    /// Returns the JSON pointer of the final target, which is what identifies it, along with the
    /// target itself. `root` must be the same document that was used to construct the resolver.
    /// This is not checked.
    pub fn resolve<'a>(&self, root: &'a Value, reference: &str) -> Option<(String, &'a Value)> {
        let mut seen = BTreeSet::new();
        let mut reference = reference.to_owned();

        for _ in 0..MAX_REF_HOPS {
            let pointer = self.pointer_for(&reference)?;
            if !seen.insert(pointer.clone()) {
                debug!(%reference, "reference loops back onto itself");
                return None;
            }
            let target = root.pointer(&pointer)?;
            match target.get("$ref").and_then(Value::as_str) {
                Some(next) => reference = next.to_owned(),
                None => return Some((pointer, target)),
            }
        }

        debug!(%reference, "reference chain too long");
        None
    }

    /// Resolves `value` if it is a reference object, and passes it through otherwise.
    pub fn follow<'a>(&self, root: &'a Value, value: &'a Value) -> Option<&'a Value> {
        match value.get("$ref").and_then(Value::as_str) {
            Some(reference) => {
                let resolved = self.resolve(root, reference).map(|(_, target)| target);
                if resolved.is_none() {
                    debug!(%reference, "unresolvable reference");
                }
                resolved
            }
            None => Some(value),
        }
    }

    fn pointer_for(&self, reference: &str) -> Option<String> {
        if let Some(pointer) = self.ref_lookup.get(reference) {
            return Some(pointer.clone());
        }
        reference.strip_prefix('#').map(str::to_owned)
    }
}

trait MayHaveSchemaId {
    fn get_schema_id(&self) -> Option<&str>;
}

impl MayHaveSchemaId for Value {
    fn get_schema_id(&self) -> Option<&str> {
        self.get("$id").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn swagger_definitions() {
        let root = json!({
            "definitions": {
                "A": {}
            }
        });
        let resolver = Resolver::for_document(&root);

        let resolved = resolver.resolve(&root, "#/definitions/A");
        assert_eq!(resolved, Some(("/definitions/A".to_owned(), &json!({}))));

        let resolved = resolver.resolve(&root, "#/definitions/not-there");
        assert!(resolved.is_none());
    }

    #[test]
    fn root_has_id() {
        let root = json!({
            "$id": "urn:uuid:e773a2e8-d746-4dc6-9480-0bba5ff33504",
            "components": {
                "schemas": {
                    "A": {}
                }
            }
        });
        let resolver = Resolver::for_document(&root);

        let resolved = resolver.resolve(&root, "#/components/schemas/A");
        assert!(resolved.is_some());
        let resolved = resolver.resolve(
            &root,
            "urn:uuid:e773a2e8-d746-4dc6-9480-0bba5ff33504#/components/schemas/A",
        );
        assert!(resolved.is_some());
    }

    #[test]
    fn definition_has_id() {
        let root = json!({
            "$defs": {
                "A": {
                    "$id": "some-id"
                }
            }
        });
        let resolver = Resolver::for_document(&root);

        let resolved = resolver.resolve(&root, "some-id");
        assert!(resolved.is_some());
        assert_eq!(resolved, resolver.resolve(&root, "#/$defs/A"));
    }

    #[test]
    fn generic_pointers_and_chains() {
        let root = json!({
            "components": {
                "parameters": {
                    "Limit": { "$ref": "#/components/parameters/PageSize" },
                    "PageSize": { "name": "limit", "in": "query" }
                }
            }
        });
        let resolver = Resolver::for_document(&root);

        let (pointer, target) = resolver
            .resolve(&root, "#/components/parameters/Limit")
            .unwrap();
        assert_eq!(pointer, "/components/parameters/PageSize");
        assert_eq!(target["name"], "limit");

        let value = json!({ "$ref": "#/components/parameters/Limit" });
        assert_eq!(resolver.follow(&root, &value), Some(target));
        let inline = json!({ "name": "offset" });
        assert_eq!(resolver.follow(&root, &inline), Some(&inline));
    }

    #[test]
    fn reference_loops() {
        let root = json!({
            "definitions": {
                "A": { "$ref": "#/definitions/B" },
                "B": { "$ref": "#/definitions/A" }
            }
        });
        let resolver = Resolver::for_document(&root);
        assert!(resolver.resolve(&root, "#/definitions/A").is_none());
        assert!(resolver.resolve(&root, "https://example.com/remote.json").is_none());
    }

    #[test]
    fn escaped_names() {
        let root = json!({
            "components": {
                "schemas": {
                    "a/b": { "type": "string" }
                }
            }
        });
        let resolver = Resolver::for_document(&root);
        let (pointer, _) = resolver.resolve(&root, "#/components/schemas/a~1b").unwrap();
        assert_eq!(pointer, "/components/schemas/a~1b");
    }
}
