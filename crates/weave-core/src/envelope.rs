//! Terminal output of every workflow pattern.
//!
//! A [`ResultEnvelope`] carries a primary output plus ordered metadata and can
//! be rendered for humans or as machine-readable JSON. Metadata is an ordered
//! pair list, never a map: rendering preserves insertion order exactly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a workflow's final envelope should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// The canonical terminal output structure of a workflow run.
#[derive(Debug, Clone)]
pub struct ResultEnvelope {
    pub title: String,
    pub primary_output: String,
    pub metadata: Vec<(String, String)>,
    pub verbose_details: Option<String>,
}

impl ResultEnvelope {
    pub fn new(title: impl Into<String>, primary_output: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            primary_output: primary_output.into(),
            metadata: Vec::new(),
            verbose_details: None,
        }
    }

    /// Appends one metadata pair, keeping insertion order.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn with_verbose_details(mut self, details: impl Into<String>) -> Self {
        self.verbose_details = Some(details.into());
        self
    }

    /// Renders the envelope. In machine mode the output is always valid JSON
    /// regardless of what the metadata values contain; when verbose is off the
    /// verbose details are dropped entirely, never emitted empty.
    pub fn render(&self, format: OutputFormat, verbose: bool) -> String {
        match format {
            OutputFormat::Text => self.render_human(verbose),
            OutputFormat::Json => self.render_machine(verbose),
        }
    }

    fn render_human(&self, verbose: bool) -> String {
        let mut out = format!("=== {} ===\n", self.title);
        for (key, value) in &self.metadata {
            out.push_str(&format!("{}: {}\n", title_case(key), value));
        }
        out.push('\n');
        out.push_str(&self.primary_output);

        if verbose {
            if let Some(details) = &self.verbose_details {
                out.push_str("\n\nAdditional Details:\n");
                out.push_str(details);
            }
        }

        out
    }

    fn render_machine(&self, verbose: bool) -> String {
        let mut metadata = serde_json::Map::new();
        for (key, value) in &self.metadata {
            metadata.insert(key.clone(), Value::String(value.clone()));
        }
        if verbose {
            if let Some(details) = &self.verbose_details {
                metadata.insert("verbose_details".to_string(), Value::String(details.clone()));
            }
        }

        let mut root = serde_json::Map::new();
        root.insert("result_type".to_string(), Value::String(self.title.clone()));
        root.insert("output".to_string(), Value::String(self.primary_output.clone()));
        if !metadata.is_empty() {
            root.insert("metadata".to_string(), Value::Object(metadata));
        }

        Value::Object(root).to_string()
    }
}

/// Converts a snake_case metadata key to Title Case for display.
fn title_case(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
