//! Settings and custom data types shared by analysis engines

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Severity configured for a lint rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LintLevel {
    Ignore,
    Warning,
    Error,
}

/// Per-language settings section (`css`, `scss`, `less`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageSettings {
    #[serde(default = "default_validate")]
    pub validate: bool,
    /// Lint rule name -> level, in the order the client sent them
    #[serde(default)]
    pub lint: IndexMap<String, LintLevel>,
}

fn default_validate() -> bool {
    true
}

impl Default for LanguageSettings {
    fn default() -> Self {
        Self {
            validate: true,
            lint: IndexMap::new(),
        }
    }
}

impl LanguageSettings {
    /// Reads a settings section sent by the client. Malformed sections are
    /// logged and treated as absent.
    pub fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        serde_json::from_value(value.clone())
            .inspect_err(|e| warn!("Ignoring malformed settings {}: {}", value, e))
            .ok()
    }

    pub fn lint_level(&self, rule: &str, default: LintLevel) -> LintLevel {
        self.lint.get(rule).copied().unwrap_or(default)
    }
}

/// Description of a custom data entry, either plain text or markup
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DataDescription {
    Text(String),
    Markup { kind: String, value: String },
}

impl DataDescription {
    pub fn as_str(&self) -> &str {
        match self {
            DataDescription::Text(text) => text,
            DataDescription::Markup { value, .. } => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataEntry {
    pub name: String,
    #[serde(default)]
    pub description: Option<DataDescription>,
}

/// Contents of one custom data file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomData {
    #[serde(default)]
    pub properties: Vec<DataEntry>,
    #[serde(default)]
    pub at_directives: Vec<DataEntry>,
    #[serde(default)]
    pub pseudo_classes: Vec<DataEntry>,
    #[serde(default)]
    pub pseudo_elements: Vec<DataEntry>,
}

impl CustomData {
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
            && self.at_directives.is_empty()
            && self.pseudo_classes.is_empty()
            && self.pseudo_elements.is_empty()
    }
}
