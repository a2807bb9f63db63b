//! Shared types for discovered and static tools.
//!
//! Tool descriptors, parameter schemas, and the uniform tool-call error
//! every handler returns.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

// ─── Parameter Schema ────────────────────────────────────────────────────────

/// One named parameter of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterField {
    pub name: String,
    /// Type name as the target process reports it (e.g. `"String"`, `"int"`).
    #[serde(rename = "type")]
    pub type_name: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterField {
    /// A field with no description.
    pub fn new(name: &str, type_name: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            required,
            description: None,
        }
    }
}

/// Ordered parameter list for a tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSchema {
    fields: Vec<ParameterField>,
}

impl ParameterSchema {
    /// Build a schema from fields.
    pub fn new(fields: Vec<ParameterField>) -> Self {
        Self { fields }
    }

    /// All fields, in declaration order.
    pub fn fields(&self) -> &[ParameterField] {
        &self.fields
    }

    /// Names of required fields.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
    }

    /// Whether the tool takes no parameters.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Required fields absent from `params`.
    ///
    /// Presence only: types and nested shapes are left to the target.
    pub fn missing_required(&self, params: &Value) -> Vec<&str> {
        let obj = params.as_object();
        self.required_fields()
            .filter(|name| !obj.is_some_and(|o| o.contains_key(*name)))
            .collect()
    }

    /// Decode whichever schema shape the target sent.
    ///
    /// Accepts a JSON-Schema object, an array of field objects, or a map of
    /// field name → field object (or bare type string). `null` is empty.
    pub fn from_wire(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Array(items) => items
                .iter()
                .map(|item| field_from_object(None, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::new),
            Value::Object(obj) if obj.contains_key("properties") => from_json_schema(obj),
            Value::Object(obj) if obj.get("type").and_then(Value::as_str) == Some("object") => {
                Ok(Self::default())
            }
            Value::Object(obj) => obj
                .iter()
                .map(|(name, field)| match field {
                    Value::String(type_name) => Ok(ParameterField::new(name, type_name, false)),
                    other => field_from_object(Some(name), other),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::new),
            other => Err(format!("unsupported parameter schema: {other}")),
        }
    }

    /// Encode as a JSON-Schema object for tool listings.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut prop = Map::new();
            if let Some(json_type) = json_schema_type(&field.type_name) {
                prop.insert("type".into(), Value::String(json_type.into()));
            }
            if let Some(description) = &field.description {
                prop.insert("description".into(), Value::String(description.clone()));
            }
            properties.insert(field.name.clone(), Value::Object(prop));
        }

        let required: Vec<&str> = self.required_fields().collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Decode a single field object (array or map form).
fn field_from_object(name: Option<&str>, value: &Value) -> Result<ParameterField, String> {
    let obj = value
        .as_object()
        .ok_or_else(|| format!("parameter entry is not an object: {value}"))?;

    let name = match name {
        Some(n) => n.to_string(),
        None => obj
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or("parameter entry is missing a name")?
            .to_string(),
    };

    let type_name = ["type", "typeName", "parameterType"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
        .unwrap_or("any")
        .to_string();

    let required = match (obj.get("required"), obj.get("optional").or(obj.get("isOptional"))) {
        (Some(Value::Bool(required)), _) => *required,
        (_, Some(Value::Bool(optional))) => !optional,
        _ => false,
    };

    let description = obj
        .get("description")
        .and_then(Value::as_str)
        .map(String::from);

    Ok(ParameterField {
        name,
        type_name,
        required,
        description,
    })
}

/// Decode `{"type":"object","properties":{..},"required":[..]}`.
fn from_json_schema(obj: &Map<String, Value>) -> Result<ParameterSchema, String> {
    let properties = obj
        .get("properties")
        .and_then(Value::as_object)
        .ok_or("schema 'properties' is not an object")?;

    let required: Vec<&str> = obj
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let fields = properties
        .iter()
        .map(|(name, prop)| {
            let type_name = match prop.get("type") {
                Some(Value::String(t)) => t.clone(),
                Some(Value::Array(ts)) => ts
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join("|"),
                _ => "any".to_string(),
            };
            ParameterField {
                name: name.clone(),
                type_name,
                required: required.contains(&name.as_str()),
                description: prop
                    .get("description")
                    .and_then(Value::as_str)
                    .map(String::from),
            }
        })
        .collect();

    Ok(ParameterSchema::new(fields))
}

/// Map a reported type name onto a JSON-Schema primitive.
fn json_schema_type(type_name: &str) -> Option<&'static str> {
    let lower = type_name.trim().to_ascii_lowercase();
    if lower.ends_with("[]") || lower.starts_with("list") || lower == "array" {
        return Some("array");
    }
    match lower.as_str() {
        "string" | "str" | "char" | "guid" | "datetime" => Some("string"),
        "int" | "int16" | "int32" | "int64" | "uint" | "uint32" | "uint64" | "long" | "short"
        | "byte" | "integer" => Some("integer"),
        "float" | "double" | "single" | "decimal" | "number" => Some("number"),
        "bool" | "boolean" => Some("boolean"),
        "object" | "dictionary" | "map" => Some("object"),
        _ => None,
    }
}

// ─── Tool Descriptor ─────────────────────────────────────────────────────────

/// Everything known about a tool before it is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub category: String,
    pub source_module: String,
    pub parameter_schema: ParameterSchema,
}

impl ToolDescriptor {
    /// A descriptor with empty category, module, and schema.
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            category: String::new(),
            source_module: String::new(),
            parameter_schema: ParameterSchema::default(),
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn with_source_module(mut self, module: &str) -> Self {
        self.source_module = module.to_string();
        self
    }

    pub fn with_schema(mut self, schema: ParameterSchema) -> Self {
        self.parameter_schema = schema;
        self
    }
}

// ─── Tool Call Errors ────────────────────────────────────────────────────────

/// Stable error codes carried by tool-call error results.
pub mod error_codes {
    /// The named tool is not registered.
    pub const UNKNOWN_TOOL: i64 = -32601;
    /// Parameters are not an object or lack a required field.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal bridge failure.
    pub const INTERNAL_ERROR: i64 = -32603;
    /// The target process is not running or not listening.
    pub const TARGET_UNAVAILABLE: i64 = -32010;
    /// The target did not reply before the deadline.
    pub const TARGET_TIMEOUT: i64 = -32011;
    /// The channel closed mid-exchange.
    pub const TARGET_DISCONNECTED: i64 = -32012;
    /// The target's reply was malformed.
    pub const TARGET_PROTOCOL: i64 = -32013;
}

/// A failed tool call, as seen by the front-end.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("[{code}] {message}")]
pub struct ToolCallError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolCallError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::new(error_codes::UNKNOWN_TOOL, format!("unknown tool: '{name}'"))
    }

    pub fn invalid_params(tool: &str, reason: impl std::fmt::Display) -> Self {
        Self::new(
            error_codes::INVALID_PARAMS,
            format!("invalid arguments for '{tool}': {reason}"),
        )
    }
}

/// Result of invoking any registered tool.
pub type ToolOutcome = Result<Value, ToolCallError>;

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_from_json_schema() {
        let schema = ParameterSchema::from_wire(&json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Control path"},
                "index": {"type": ["integer", "null"]}
            },
            "required": ["path"]
        }))
        .unwrap();

        assert_eq!(schema.fields().len(), 2);
        let path = schema.fields().iter().find(|f| f.name == "path").unwrap();
        assert!(path.required);
        assert_eq!(path.description.as_deref(), Some("Control path"));
        let index = schema.fields().iter().find(|f| f.name == "index").unwrap();
        assert!(!index.required);
        assert_eq!(index.type_name, "integer|null");
    }

    #[test]
    fn test_schema_from_field_array() {
        let schema = ParameterSchema::from_wire(&json!([
            {"name": "windowTitle", "type": "String", "required": true},
            {"name": "timeoutMs", "typeName": "Int32", "optional": true}
        ]))
        .unwrap();

        let required: Vec<&str> = schema.required_fields().collect();
        assert_eq!(required, vec!["windowTitle"]);
        assert_eq!(schema.fields()[1].type_name, "Int32");
    }

    #[test]
    fn test_schema_from_name_map() {
        let schema = ParameterSchema::from_wire(&json!({
            "text": {"type": "string", "required": true},
            "delay": "int"
        }))
        .unwrap();
        assert_eq!(schema.fields().len(), 2);
        assert_eq!(schema.required_fields().collect::<Vec<_>>(), vec!["text"]);
    }

    #[test]
    fn test_schema_null_is_empty() {
        assert!(ParameterSchema::from_wire(&Value::Null).unwrap().is_empty());
        assert!(ParameterSchema::from_wire(&json!({"type": "object"}))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_schema_rejects_unnamed_field() {
        assert!(ParameterSchema::from_wire(&json!([{"type": "string"}])).is_err());
        assert!(ParameterSchema::from_wire(&json!("string")).is_err());
    }

    #[test]
    fn test_missing_required() {
        let schema = ParameterSchema::new(vec![
            ParameterField::new("a", "string", true),
            ParameterField::new("b", "string", true),
            ParameterField::new("c", "string", false),
        ]);
        assert_eq!(schema.missing_required(&json!({"a": 1})), vec!["b"]);
        assert!(schema.missing_required(&json!({"a": 1, "b": null})).is_empty());
        assert_eq!(schema.missing_required(&Value::Null), vec!["a", "b"]);
    }

    #[test]
    fn test_to_json_schema_translates_types() {
        let schema = ParameterSchema::new(vec![
            ParameterField::new("title", "String", true),
            ParameterField::new("count", "Int32", false),
            ParameterField::new("ids", "String[]", false),
            ParameterField::new("opaque", "IntPtr", false),
        ]);
        let out = schema.to_json_schema();
        assert_eq!(out["type"], "object");
        assert_eq!(out["properties"]["title"]["type"], "string");
        assert_eq!(out["properties"]["count"]["type"], "integer");
        assert_eq!(out["properties"]["ids"]["type"], "array");
        assert!(out["properties"]["opaque"].get("type").is_none());
        assert_eq!(out["required"], json!(["title"]));
    }

    #[test]
    fn test_tool_call_error_display() {
        let err = ToolCallError::unknown_tool("ghost");
        assert_eq!(err.code, error_codes::UNKNOWN_TOOL);
        assert!(err.to_string().contains("ghost"));
    }
}
