//! Tool schema - the registered, prompt-renderable definition

use serde::{Deserialize, Serialize};

/// The static definition of a tool: a unique name, a description for
/// prompt construction, and a JSON-Schema-shaped parameter object
/// (typed properties plus a `required` list).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSchema {
    /// Property names flagged as required by the schema.
    pub fn required(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(|v| v.as_array())
            .map(|list| list.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }

    /// `(name, type, description)` for every declared property.
    pub fn properties(&self) -> Vec<(&str, &str, &str)> {
        self.parameters
            .get("properties")
            .and_then(|v| v.as_object())
            .map(|props| {
                props
                    .iter()
                    .map(|(name, spec)| {
                        let type_name = spec.get("type").and_then(|t| t.as_str()).unwrap_or("any");
                        let description = spec
                            .get("description")
                            .and_then(|d| d.as_str())
                            .unwrap_or("");
                        (name.as_str(), type_name, description)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
