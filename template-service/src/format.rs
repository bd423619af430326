use std::collections::HashMap;

use serde_json::Value;

use crate::error::TemplateError;

/// Replaces `{name}` placeholders with stringified variable values; `{{` and
/// `}}` escape to literal `{`/`}`. No recursive expansion — a replacement
/// value containing `{other}` is left as-is.
pub fn format_template(
    template_format: &str,
    input_variables: &HashMap<String, String>,
    variables: &HashMap<String, Value>,
) -> Result<String, TemplateError> {
    for key in input_variables.keys() {
        if !variables.contains_key(key) {
            return Err(TemplateError::MissingVariable(key.clone()));
        }
    }

    let mut out = String::with_capacity(template_format.len());
    let mut chars = template_format.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    name.push(inner);
                }
                if !closed {
                    return Err(TemplateError::InvalidVariable {
                        name,
                        reason: "unterminated placeholder".to_string(),
                    });
                }
                let value = variables.get(&name).ok_or_else(|| TemplateError::MissingVariable(name.clone()))?;
                out.push_str(&value_to_string(value));
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Minimal structural check against `validation_schema`: when present, only
/// an object with a `properties` map of `{name: {"type": ...}}` is honoured,
/// matching the subset of JSON Schema the templates in this core actually
/// use rather than pulling in a full schema validator.
pub fn validate_against_schema(
    schema: Option<&Value>,
    variables: &HashMap<String, Value>,
) -> Result<(), TemplateError> {
    let Some(schema) = schema else { return Ok(()) };
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (name, spec) in properties {
        let Some(expected_type) = spec.get("type").and_then(Value::as_str) else {
            continue;
        };
        if let Some(value) = variables.get(name) {
            if !matches_json_type(value, expected_type) {
                return Err(TemplateError::InvalidVariable {
                    name: name.clone(),
                    reason: format!("expected type '{expected_type}'"),
                });
            }
        }
    }
    Ok(())
}

fn matches_json_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_simple_placeholder() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), Value::String("world".to_string()));
        let input_vars = HashMap::from([("name".to_string(), "desc".to_string())]);
        let result = format_template("hello {name}!", &input_vars, &vars).unwrap();
        assert_eq!(result, "hello world!");
    }

    #[test]
    fn escapes_double_braces_to_literal() {
        let vars = HashMap::new();
        let result = format_template("literal {{not a var}}", &HashMap::new(), &vars).unwrap();
        assert_eq!(result, "literal {not a var}");
    }

    #[test]
    fn missing_required_variable_errors() {
        let input_vars = HashMap::from([("name".to_string(), "desc".to_string())]);
        let err = format_template("{name}", &input_vars, &HashMap::new()).unwrap_err();
        assert!(matches!(err, TemplateError::MissingVariable(_)));
    }

    #[test]
    fn does_not_recursively_expand_replacement_values() {
        let mut vars = HashMap::new();
        vars.insert("a".to_string(), Value::String("{b}".to_string()));
        vars.insert("b".to_string(), Value::String("leak".to_string()));
        let result = format_template("{a}", &HashMap::new(), &vars).unwrap();
        assert_eq!(result, "{b}");
    }

    #[test]
    fn schema_rejects_wrong_type() {
        let schema = serde_json::json!({"properties": {"count": {"type": "integer"}}});
        let mut vars = HashMap::new();
        vars.insert("count".to_string(), Value::String("not a number".to_string()));
        let err = validate_against_schema(Some(&schema), &vars).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidVariable { .. }));
    }
}
