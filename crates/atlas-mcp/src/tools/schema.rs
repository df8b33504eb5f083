//! Input schema builder for tool definitions.

use serde::Serialize;
use serde_json::{json, Map, Value};

/// Property value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Boolean,
    Array,
}

/// One schema property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    #[serde(rename = "type")]
    kind: PropertyType,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    enum_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    items: Option<Box<Property>>,
}

impl Property {
    fn new(kind: PropertyType, description: &str) -> Self {
        Self {
            kind,
            description: description.to_string(),
            default: None,
            enum_values: Vec::new(),
            items: None,
        }
    }

    pub fn string(description: &str) -> Self {
        Self::new(PropertyType::String, description)
    }

    pub fn integer(description: &str) -> Self {
        Self::new(PropertyType::Integer, description)
    }

    pub fn boolean(description: &str) -> Self {
        Self::new(PropertyType::Boolean, description)
    }

    /// Array of strings.
    pub fn strings(description: &str) -> Self {
        Self {
            items: Some(Box::new(Self::new(PropertyType::String, ""))),
            ..Self::new(PropertyType::Array, description)
        }
    }

    /// String restricted to `values`.
    pub fn one_of(description: &str, values: &[&str]) -> Self {
        Self {
            enum_values: values.iter().map(|v| v.to_string()).collect(),
            ..Self::new(PropertyType::String, description)
        }
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn kind(&self) -> PropertyType {
        self.kind
    }
}

/// Object-typed input schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    properties: Vec<(String, Property)>,
    required: Vec<String>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property the caller must supply.
    pub fn required(mut self, name: &str, property: Property) -> Self {
        self.required.push(name.to_string());
        self.optional(name, property)
    }

    /// Add a property the caller may omit.
    pub fn optional(mut self, name: &str, property: Property) -> Self {
        self.properties.retain(|(existing, _)| existing != name);
        self.properties.push((name.to_string(), property));
        self
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, p)| p)
    }

    pub fn required_names(&self) -> &[String] {
        &self.required
    }

    /// JSON Schema document advertised in `tools/list`.
    pub fn to_json(&self) -> Value {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, prop)| (name.clone(), serde_json::to_value(prop).unwrap_or(Value::Null)))
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }
}
