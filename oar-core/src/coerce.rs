//! String-to-typed coercion guided by JSON Schema.
//!
//! Path parameters, query strings, headers, cookies and urlencoded forms all
//! arrive as strings. Before they are handed to a [`Schema`](crate::Schema),
//! each string is converted to the JSON type its property declares, so that
//! `?page=2` deserializes into a `u32` and `?active=true` into a `bool`.

use serde_json::{Map, Number, Value};

/// Coerce `value` against `schema`, which is also used as the root for
/// resolving local `#/$defs/...` references.
pub fn coerce(value: Value, schema: &Value) -> Value {
    coerce_at(value, schema, schema)
}

fn coerce_at(value: Value, schema: &Value, root: &Value) -> Value {
    let schema = resolve(schema, root);
    match value {
        Value::Object(map) => coerce_object(map, schema, root),
        Value::String(s) => coerce_string(s, schema, root),
        Value::Array(items) => {
            let types = types_of(schema, root);
            if types.contains(&"array") {
                let item_schema = items_schema(schema, root);
                Value::Array(
                    items
                        .into_iter()
                        .map(|v| match item_schema {
                            Some(s) => coerce_at(v, s, root),
                            None => v,
                        })
                        .collect(),
                )
            } else {
                Value::Array(items)
            }
        }
        other => other,
    }
}

fn coerce_object(map: Map<String, Value>, schema: &Value, root: &Value) -> Value {
    let properties = find_keyword(schema, root, "properties").and_then(Value::as_object);
    let additional = find_keyword(schema, root, "additionalProperties").filter(|v| v.is_object());

    let coerced = map
        .into_iter()
        .map(|(key, v)| {
            let sub = properties.and_then(|p| p.get(&key)).or(additional);
            match sub {
                Some(sub) => {
                    let v = coerce_at(v, sub, root);
                    (key, v)
                }
                None => (key, v),
            }
        })
        .collect();
    Value::Object(coerced)
}

fn coerce_string(s: String, schema: &Value, root: &Value) -> Value {
    let types = types_of(schema, root);
    if types.is_empty() || types.contains(&"string") {
        return Value::String(s);
    }

    for ty in &types {
        match *ty {
            "integer" => {
                if let Ok(n) = s.parse::<i64>() {
                    return Value::Number(n.into());
                }
                if let Ok(n) = s.parse::<u64>() {
                    return Value::Number(n.into());
                }
            }
            "number" => {
                if let Some(n) = s.parse::<f64>().ok().and_then(Number::from_f64) {
                    return Value::Number(n);
                }
            }
            "boolean" => match s.as_str() {
                "true" => return Value::Bool(true),
                "false" => return Value::Bool(false),
                _ => {}
            },
            "null" => {
                if s.is_empty() || s == "null" {
                    return Value::Null;
                }
            }
            "array" => {
                let item = match items_schema(schema, root) {
                    Some(item_schema) => coerce_at(Value::String(s), item_schema, root),
                    None => Value::String(s),
                };
                return Value::Array(vec![item]);
            }
            _ => {}
        }
    }

    Value::String(s)
}

/// Follow a local `$ref` (`#/$defs/X` or `#/definitions/X`).
fn resolve<'a>(schema: &'a Value, root: &'a Value) -> &'a Value {
    let mut current = schema;
    // Bounded to guard against reference cycles.
    for _ in 0..16 {
        let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
            break;
        };
        let Some(pointer) = reference.strip_prefix('#') else {
            break;
        };
        match root.pointer(pointer) {
            Some(target) => current = target,
            None => break,
        }
    }
    current
}

/// Collect the primitive types a schema accepts, looking through
/// `anyOf`/`oneOf`/`allOf` branches and `enum`/`const` values.
fn types_of<'a>(schema: &'a Value, root: &'a Value) -> Vec<&'a str> {
    let schema = resolve(schema, root);
    let mut out = Vec::new();

    match schema.get("type") {
        Some(Value::String(t)) => out.push(t.as_str()),
        Some(Value::Array(ts)) => out.extend(ts.iter().filter_map(Value::as_str)),
        _ => {}
    }

    for keyword in ["anyOf", "oneOf", "allOf"] {
        if let Some(Value::Array(branches)) = schema.get(keyword) {
            for branch in branches {
                out.extend(types_of(branch, root));
            }
        }
    }

    let literals = schema
        .get("enum")
        .and_then(Value::as_array)
        .map(|v| v.iter().collect::<Vec<_>>())
        .or_else(|| schema.get("const").map(|c| vec![c]));
    if let Some(literals) = literals {
        for literal in literals {
            out.push(match literal {
                Value::String(_) => "string",
                Value::Number(n) if n.is_f64() => "number",
                Value::Number(_) => "integer",
                Value::Bool(_) => "boolean",
                Value::Null => "null",
                Value::Array(_) => "array",
                Value::Object(_) => "object",
            });
        }
    }

    out.dedup();
    out
}

fn items_schema<'a>(schema: &'a Value, root: &'a Value) -> Option<&'a Value> {
    find_keyword(schema, root, "items").filter(|v| v.is_object())
}

/// Find a keyword on the schema itself or on one of its composition branches.
fn find_keyword<'a>(schema: &'a Value, root: &'a Value, keyword: &str) -> Option<&'a Value> {
    let schema = resolve(schema, root);
    if let Some(v) = schema.get(keyword) {
        return Some(v);
    }
    ["anyOf", "oneOf", "allOf"]
        .iter()
        .filter_map(|k| schema.get(*k).and_then(Value::as_array))
        .flatten()
        .find_map(|branch| find_keyword(branch, root, keyword))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integers_and_booleans() {
        let schema = json!({
            "type": "object",
            "properties": {
                "page": { "type": "integer" },
                "active": { "type": "boolean" },
                "name": { "type": "string" }
            }
        });
        let out = coerce(json!({ "page": "3", "active": "true", "name": "42" }), &schema);
        assert_eq!(out, json!({ "page": 3, "active": true, "name": "42" }));
    }

    #[test]
    fn nullable_and_refs() {
        let schema = json!({
            "type": "object",
            "properties": {
                "limit": { "type": ["integer", "null"] },
                "ratio": { "anyOf": [{ "$ref": "#/$defs/Ratio" }, { "type": "null" }] }
            },
            "$defs": { "Ratio": { "type": "number" } }
        });
        let out = coerce(json!({ "limit": "", "ratio": "0.5" }), &schema);
        assert_eq!(out, json!({ "limit": null, "ratio": 0.5 }));
    }

    #[test]
    fn single_value_becomes_array() {
        let schema = json!({
            "type": "object",
            "properties": { "ids": { "type": "array", "items": { "type": "integer" } } }
        });
        assert_eq!(coerce(json!({ "ids": "7" }), &schema), json!({ "ids": [7] }));
        assert_eq!(
            coerce(json!({ "ids": ["1", "2"] }), &schema),
            json!({ "ids": [1, 2] })
        );
    }

    #[test]
    fn unparseable_values_stay_strings() {
        let schema = json!({ "type": "object", "properties": { "id": { "type": "integer" } } });
        assert_eq!(coerce(json!({ "id": "abc" }), &schema), json!({ "id": "abc" }));
    }

    #[test]
    fn string_enums_untouched() {
        let schema = json!({
            "type": "object",
            "properties": { "theme": { "$ref": "#/$defs/Theme" } },
            "$defs": { "Theme": { "type": "string", "enum": ["light", "dark"] } }
        });
        assert_eq!(coerce(json!({ "theme": "dark" }), &schema), json!({ "theme": "dark" }));
    }
}
