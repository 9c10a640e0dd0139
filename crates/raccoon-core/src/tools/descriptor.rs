//! Parsed form of a [`ToolDescriptor`](crate::ai::types::ToolDescriptor)'s
//! `input_schema`, reduced to just what the registry needs to validate
//! arguments: declared property types and required keys.

use std::collections::HashMap;

use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct ToolSchema {
    /// property name -> declared JSON-Schema `type` keyword.
    pub properties: HashMap<String, String>,
    pub required: Vec<String>,
}

impl ToolSchema {
    /// Parse a JSON-Schema fragment of the shape
    /// `{"properties": {"name": {"type": "string"}}, "required": ["name"]}`.
    /// Malformed or absent sections are treated as empty, not an error —
    /// a tool with a degenerate schema simply validates nothing.
    pub fn from_json_schema(schema: &Value) -> Self {
        let properties = schema
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|obj| {
                obj.iter()
                    .filter_map(|(name, prop)| {
                        prop.get("type")
                            .and_then(|t| t.as_str())
                            .map(|t| (name.clone(), t.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let required = schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            properties,
            required,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_properties_and_required() {
        let schema = json!({
            "type": "object",
            "properties": {
                "q": {"type": "string"},
                "limit": {"type": "integer"}
            },
            "required": ["q"]
        });
        let parsed = ToolSchema::from_json_schema(&schema);
        assert_eq!(parsed.properties.get("q"), Some(&"string".to_string()));
        assert_eq!(parsed.required, vec!["q".to_string()]);
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let parsed = ToolSchema::from_json_schema(&json!({}));
        assert!(parsed.properties.is_empty());
        assert!(parsed.required.is_empty());
    }
}
