//! Tag schema document: the recognized os/executor/architecture values.
//!
//! The document is operator-supplied JSON, validated against a bundled JSON
//! Schema before parsing. Lookups never drop an unrecognized marker; callers
//! namespace it via [`TagSchema::custom_tag`] so it stays distinguishable and
//! round-trippable.

use jsonschema::Draft;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigError;

const V1_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/tag_schema/v1.schema.json"
));

/// Bundled schema document used when the operator supplies none.
pub const DEFAULT_DOCUMENT: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/tag_schema/default.json"
));

#[derive(Debug, Clone, Deserialize)]
struct EnumValues {
    #[serde(rename = "enum")]
    values: Vec<String>,
}

impl EnumValues {
    fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|candidate| candidate == value)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Categories {
    os: EnumValues,
    executor: EnumValues,
    architecture: EnumValues,
}

/// Recognized tag values plus the namespace prefix for everything else.
#[derive(Debug, Clone, Deserialize)]
pub struct TagSchema {
    properties: Categories,
    #[serde(rename = "custom-name")]
    custom_name: String,
}

impl TagSchema {
    /// Parse a schema document, validating it against the bundled JSON
    /// Schema (Draft 2020-12) first.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let document: Value = serde_json::from_str(raw)
            .map_err(|err| ConfigError::InvalidSchema(err.to_string()))?;
        validate_document(&document)?;
        serde_json::from_value(document).map_err(|err| ConfigError::InvalidSchema(err.to_string()))
    }

    /// The bundled default document.
    pub fn bundled_default() -> Self {
        Self::from_json(DEFAULT_DOCUMENT).expect("bundled tag schema document should be valid")
    }

    pub fn is_os(&self, value: &str) -> bool {
        self.properties.os.contains(value)
    }

    pub fn is_executor(&self, value: &str) -> bool {
        self.properties.executor.contains(value)
    }

    pub fn is_architecture(&self, value: &str) -> bool {
        self.properties.architecture.contains(value)
    }

    /// Namespace an unrecognized marker under the schema's custom prefix.
    pub fn custom_tag(&self, marker: &str) -> String {
        format!("{}_{}", self.custom_name, marker)
    }
}

/// Validate a schema document against the bundled JSON Schema.
fn validate_document(document: &Value) -> Result<(), ConfigError> {
    let schema: Value = serde_json::from_str(V1_SCHEMA)
        .expect("bundled tag schema json schema should be valid json");
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|err| ConfigError::InvalidSchema(err.to_string()))?;
    let messages: Vec<String> = compiled
        .iter_errors(document)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(ConfigError::InvalidSchema(messages.join("; ")));
    }
    Ok(())
}
