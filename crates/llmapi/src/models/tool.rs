use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// A tool the model may call during generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The name of the tool, echoed back in `tool_use` blocks
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// Encoded JSON schema for the tool input, passed to the backend byte for byte
    pub input_schema: Box<RawValue>,
}

impl ToolDefinition {
    /// Create a new tool definition from an already-encoded schema
    pub fn new<N, D>(name: N, description: D, input_schema: Box<RawValue>) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        ToolDefinition {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

impl PartialEq for ToolDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.input_schema.get() == other.input_schema.get()
    }
}
