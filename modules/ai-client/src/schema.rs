use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Agent outputs are shallow (a verdict, a suggestion list, a proposal);
/// anything deeper than this is a cyclic reference, not a real shape.
const MAX_SCHEMA_DEPTH: usize = 16;

/// Trait for types usable as a declared structured-output shape.
///
/// Automatically implemented for any type that implements
/// `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Generate the JSON schema the engine is asked to conform to.
    ///
    /// Engines are strict about three things:
    /// 1. `additionalProperties: false` on all object schemas
    /// 2. ALL properties listed in `required`, even nullable ones
    /// 3. Fully inlined schemas (no `$ref` references)
    fn engine_schema() -> Value {
        let root = serde_json::to_value(schema_for!(Self)).unwrap_or_default();
        let definitions = root.get("definitions").cloned().unwrap_or(Value::Null);

        let mut schema = root;
        if let Value::Object(map) = &mut schema {
            map.remove("definitions");
            map.remove("$schema");
            map.remove("title");
        }
        normalize(&mut schema, &definitions, 0);
        schema
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

/// One pass over the schema tree: inline references, collapse the
/// single-element `allOf` wrappers schemars emits around referenced types,
/// and tighten every object (`additionalProperties: false`, every property
/// required).
fn normalize(value: &mut Value, definitions: &Value, depth: usize) {
    if depth > MAX_SCHEMA_DEPTH {
        return;
    }
    match value {
        Value::Object(map) => {
            let inlined = map
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|path| path.strip_prefix("#/definitions/"))
                .and_then(|name| definitions.get(name))
                .cloned();
            if let Some(mut definition) = inlined {
                normalize(&mut definition, definitions, depth + 1);
                *value = definition;
                return;
            }

            let unwrapped = match map.get_mut("allOf") {
                Some(Value::Array(inner)) if inner.len() == 1 => Some(inner.remove(0)),
                _ => None,
            };
            if let Some(mut only) = unwrapped {
                normalize(&mut only, definitions, depth + 1);
                *value = only;
                return;
            }

            if map.get("type").and_then(Value::as_str) == Some("object") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
                if let Some(Value::Object(properties)) = map.get("properties") {
                    let required = properties.keys().cloned().map(Value::String).collect();
                    map.insert("required".to_string(), Value::Array(required));
                }
            }

            for child in map.values_mut() {
                normalize(child, definitions, depth + 1);
            }
        }
        Value::Array(items) => {
            for item in items {
                normalize(item, definitions, depth + 1);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct Suggestion {
        name: String,
        rank: u32,
    }

    #[derive(Deserialize, JsonSchema)]
    struct Suggestions {
        no_fit: bool,
        candidates: Vec<Suggestion>,
    }

    #[test]
    fn schema_is_object_without_metadata_keys() {
        let schema = Suggestions::engine_schema();
        let schema_obj = schema.as_object().unwrap();
        assert!(!schema_obj.contains_key("definitions"));
        assert!(!schema_obj.contains_key("$schema"));
        assert!(!schema_obj.contains_key("title"));
    }

    #[test]
    fn objects_forbid_extra_properties() {
        let schema = Suggestions::engine_schema();
        assert_eq!(
            schema.get("additionalProperties"),
            Some(&Value::Bool(false))
        );
        // The nested item schema is tightened too.
        let item = &schema["properties"]["candidates"]["items"];
        assert_eq!(item.get("additionalProperties"), Some(&Value::Bool(false)));
    }

    #[test]
    fn all_properties_required_even_nullable() {
        #[derive(Deserialize, JsonSchema)]
        struct Proposal {
            name: String,
            description: Option<String>,
        }

        let schema = Proposal::engine_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(required.contains(&"name"));
        assert!(required.contains(&"description"));
    }

    #[test]
    fn nested_refs_are_inlined() {
        let schema = Suggestions::engine_schema();
        let rendered = serde_json::to_string(&schema).unwrap();
        assert!(!rendered.contains("$ref"));
        assert!(!rendered.contains("allOf"));

        let item = &schema["properties"]["candidates"]["items"];
        assert_eq!(item.get("type"), Some(&Value::String("object".into())));
    }

    #[test]
    fn string_enums_pass_through() {
        #[derive(Deserialize, JsonSchema)]
        #[serde(rename_all = "lowercase")]
        #[allow(dead_code)]
        enum Pick {
            First,
            Second,
        }

        #[derive(Deserialize, JsonSchema)]
        struct Choice {
            choice: Pick,
        }

        let rendered = serde_json::to_string(&Choice::engine_schema()).unwrap();
        assert!(rendered.contains("first"));
        assert!(rendered.contains("second"));
        assert!(!rendered.contains("$ref"));
    }
}
