//! The JSON Schema surface of ports.
//!
//! Every port carries a schema derived mechanically from its configuration
//! type, plus the UI vocabulary the platform's editor understands
//! (`title`, `description`, `propertyOrder`, `configurable`, `readonly`,
//! `colSpan`, `tab`, `enumTitles`, `format`). Derivation is `schemars`;
//! the helpers in this module cover everything derivation cannot do
//! statically: injecting enums computed from settings, adding and renaming
//! `$defs` entries, annotating where a definition lives in the document,
//! and collecting the configurable paths edge composition substitutes into.
//!
//! Two kinds of dynamic behavior are supported:
//! - a type overrides its own derived schema by implementing
//!   [`schemars::JsonSchema`] by hand;
//! - the owning component post-processes the derived document inside
//!   `ports()` before handing it to the host.

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Derive the JSON Schema document for a configuration type.
pub fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Bool(true))
}

/// Derive the schema document and the default-valued instance for a
/// shape-carrying configuration value.
pub fn config_of<T: JsonSchema + Serialize>(value: &T) -> (Value, Value) {
    let default_value = serde_json::to_value(value).unwrap_or(Value::Null);
    (schema_of::<T>(), default_value)
}

/// Normalise a component/type pair into a stable schema identifier.
///
/// The component part is lowercased and capitalized; the type part keeps
/// its case; separators are stripped. `schema_name("router", "in_message")`
/// is `"Routerinmessage"`, `schema_name("mixer", "contextA")` is
/// `"MixercontextA"`.
pub fn schema_name(component: &str, type_name: &str) -> String {
    let compact = |s: &str, lower: bool| -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| if lower { c.to_ascii_lowercase() } else { c })
            .collect()
    };

    let mut name = compact(component, true);
    if let Some(first) = name.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    name.push_str(&compact(type_name, false));
    name
}

/// Set a single attribute at a JSON-pointer location inside the schema.
///
/// The pointer addresses the schema document itself, e.g.
/// `/properties/conditions/items/properties/route`.
pub fn set_attr(schema: &mut Value, pointer: &str, key: &str, value: Value) {
    if let Some(target) = schema.pointer_mut(pointer) {
        if let Some(obj) = target.as_object_mut() {
            obj.insert(key.to_string(), value);
        }
    }
}

/// Replace the enum (and default) of the string schema at `pointer`.
///
/// Used by components whose field options depend on current settings, such
/// as a route selector offering exactly the configured routes.
pub fn set_enum(schema: &mut Value, pointer: &str, options: &[String], default: Option<&str>) {
    let default = default.or_else(|| options.first().map(String::as_str));
    if let Some(target) = schema.pointer_mut(pointer) {
        if let Some(obj) = target.as_object_mut() {
            obj.insert("enum".to_string(), json!(options));
            if let Some(default) = default {
                obj.insert("default".to_string(), json!(default));
            }
        }
    }
}

/// Insert (or replace) a `$defs` entry.
pub fn add_definition(schema: &mut Value, name: &str, definition: Value) {
    let Some(root) = schema.as_object_mut() else {
        return;
    };
    root.entry("$defs")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(defs) = root.get_mut("$defs").and_then(Value::as_object_mut) {
        defs.insert(name.to_string(), definition);
    }
}

/// A local reference to a `$defs` entry.
pub fn definition_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/$defs/{}", name) })
}

/// Rename a `$defs` entry and rewrite every reference to it.
///
/// Two components share a definition by name when composing a graph, so
/// renames must keep the document self-consistent.
pub fn rename_definition(schema: &mut Value, from: &str, to: &str) {
    let moved = schema
        .get_mut("$defs")
        .and_then(Value::as_object_mut)
        .and_then(|defs| defs.remove(from));

    if let Some(definition) = moved {
        add_definition(schema, to, definition);
        let old_ref = format!("#/$defs/{}", from);
        let new_ref = format!("#/$defs/{}", to);
        rewrite_refs(schema, &old_ref, &new_ref);
    }
}

fn rewrite_refs(value: &mut Value, from: &str, to: &str) {
    match value {
        Value::Object(obj) => {
            if let Some(Value::String(r)) = obj.get_mut("$ref") {
                if r == from {
                    *r = to.to_string();
                }
            }
            for (_, v) in obj.iter_mut() {
                rewrite_refs(v, from, to);
            }
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                rewrite_refs(v, from, to);
            }
        }
        _ => {}
    }
}

/// Annotate where a definition logically lives in the composed document
/// (a `$.something` path).
pub fn set_definition_path(schema: &mut Value, name: &str, path: &str) {
    let pointer = format!("/$defs/{}", name);
    set_attr(schema, &pointer, "path", json!(path));
}

/// Collect the `$.x.y` paths of every field marked `configurable: true`.
///
/// Edge composition uses these to substitute upstream payload types into
/// downstream configurable fields. Local `$defs` references are followed;
/// cycles are cut.
pub fn configurable_paths(schema: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    let mut visited = Vec::new();
    collect_configurable(schema, schema, "$", &mut paths, &mut visited);
    paths
}

fn collect_configurable<'a>(
    root: &'a Value,
    node: &'a Value,
    path: &str,
    paths: &mut Vec<String>,
    visited: &mut Vec<&'a str>,
) {
    let node = match node.get("$ref").and_then(Value::as_str) {
        Some(reference) => {
            let Some(name) = reference.strip_prefix("#/$defs/") else {
                return;
            };
            if visited.contains(&name) {
                return;
            }
            visited.push(name);
            match root.pointer(&format!("/$defs/{}", name)) {
                Some(resolved) => resolved,
                None => return,
            }
        }
        None => node,
    };

    let Some(properties) = node.get("properties").and_then(Value::as_object) else {
        return;
    };
    for (field, prop) in properties {
        let field_path = format!("{}.{}", path, field);
        if prop.get("configurable") == Some(&Value::Bool(true)) {
            paths.push(field_path.clone());
        }
        collect_configurable(root, prop, &field_path, paths, visited);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
    #[serde(rename_all = "camelCase")]
    struct ProbeMessage {
        #[schemars(title = "Context", extend("configurable" = true, "propertyOrder" = 1))]
        context: Value,
        #[schemars(title = "Route", extend("propertyOrder" = 2))]
        route: String,
    }

    #[test]
    fn derives_properties_and_hints() {
        let schema = schema_of::<ProbeMessage>();
        let route = &schema["properties"]["route"];
        assert_eq!(route["title"], "Route");
        assert_eq!(route["propertyOrder"], 2);
        assert_eq!(
            schema["properties"]["context"]["configurable"],
            Value::Bool(true)
        );
    }

    #[test]
    fn schema_name_is_stable_and_compact() {
        assert_eq!(schema_name("router", "inmessage"), "Routerinmessage");
        assert_eq!(schema_name("Router", "in_message"), "Routerinmessage");
        assert_eq!(schema_name("mixer", "contextA"), "MixercontextA");
        assert_eq!(schema_name("http_server", "request"), "Httpserverrequest");
    }

    #[test]
    fn enum_injection() {
        let mut schema = schema_of::<ProbeMessage>();
        let routes = vec!["A".to_string(), "B".to_string()];
        set_enum(&mut schema, "/properties/route", &routes, None);

        let route = &schema["properties"]["route"];
        assert_eq!(route["enum"], json!(["A", "B"]));
        assert_eq!(route["default"], "A");
    }

    #[test]
    fn definition_lifecycle() {
        let mut schema = json!({
            "$ref": "#/$defs/Probeinput",
            "$defs": {
                "Probeinput": { "type": "object" }
            }
        });

        add_definition(&mut schema, "Probecontext", json!({ "type": "string" }));
        rename_definition(&mut schema, "Probeinput", "ProbeinputA");
        set_definition_path(&mut schema, "Probecontext", "$.context");

        assert_eq!(schema["$ref"], "#/$defs/ProbeinputA");
        assert!(schema["$defs"]["ProbeinputA"].is_object());
        assert!(schema["$defs"].get("Probeinput").is_none());
        assert_eq!(schema["$defs"]["Probecontext"]["path"], "$.context");
    }

    #[test]
    fn configurable_paths_follow_refs() {
        let schema = json!({
            "$ref": "#/$defs/Root",
            "$defs": {
                "Root": {
                    "type": "object",
                    "properties": {
                        "context": { "configurable": true },
                        "request": {
                            "type": "object",
                            "properties": {
                                "body": { "configurable": true }
                            }
                        }
                    }
                }
            }
        });

        let paths = configurable_paths(&schema);
        assert!(paths.contains(&"$.context".to_string()));
        assert!(paths.contains(&"$.request.body".to_string()));
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn configurable_paths_on_derived_type() {
        let schema = schema_of::<ProbeMessage>();
        assert_eq!(configurable_paths(&schema), vec!["$.context".to_string()]);
    }
}
