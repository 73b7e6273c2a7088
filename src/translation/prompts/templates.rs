/*!
 * Prompt templates for record translation.
 *
 * The payload is sent as `{"records": [...]}` and the model is asked to
 * answer with the same shape, which also suits services that only emit
 * JSON objects.
 */

use serde_json::{Map, Value, json};

use crate::app_config::GlossaryEntry;
use crate::language_utils::display_name;
use crate::providers::ChatPrompt;
use crate::records::Record;

/// System prompt template for record translation.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// The default system prompt for tabular records.
    pub const TABLE_TRANSLATOR: &'static str = r#"You are a professional translator for structured data. Translate every string value in the records you receive into {target_language}{source_clause}.

## Rules
- Return ONLY a JSON object of the form {"records": [...]} with exactly as many records as the input, in the same order
- Every record must keep exactly the same keys as its input record; translate values, never keys
- Preserve numbers, units, codes, URLs and identifiers exactly
- Tokens shaped like __FMT_0__, __ID_0__ or __LIT_0__ are placeholders: copy them verbatim, do not translate, reorder within words, or remove them
- Leave embedded literal terms (product names, abbreviations, technical terms in Latin script) untouched
- If a value is already in {target_language}, return it unchanged
- Do not add commentary, notes or code fences"#;

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Create the default table translator template.
    pub fn table_translator() -> Self {
        Self::new(Self::TABLE_TRANSLATOR)
    }

    /// Render the template with the given variables.
    pub fn render(&self, source_language: Option<&str>, target_language: &str) -> String {
        let source_clause = source_language
            .map(|code| format!(" from {}", display_name(code)))
            .unwrap_or_default();
        self.template
            .replace("{target_language}", &display_name(target_language))
            .replace("{source_clause}", &source_clause)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::table_translator()
    }
}

/// Builder for translation prompts.
#[derive(Debug, Clone, Default)]
pub struct TranslationPromptBuilder {
    template: PromptTemplate,
    source_language: Option<String>,
    glossary: Vec<GlossaryEntry>,
}

impl TranslationPromptBuilder {
    /// Create a new prompt builder with the default template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the source language in the instructions.
    pub fn with_source_language(mut self, source_language: impl Into<String>) -> Self {
        self.source_language = Some(source_language.into());
        self
    }

    /// Add required term renderings.
    pub fn with_glossary(mut self, glossary: Vec<GlossaryEntry>) -> Self {
        self.glossary = glossary;
        self
    }

    /// Replace the system template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// JSON payload for a batch of records
    pub fn payload(records: &[Record]) -> String {
        let rows: Vec<Value> = records
            .iter()
            .map(|record| {
                let mut map = Map::new();
                for (key, value) in record.fields() {
                    map.insert(key.clone(), value.to_json());
                }
                Value::Object(map)
            })
            .collect();
        json!({ "records": rows }).to_string()
    }

    fn glossary_section(&self) -> Option<String> {
        if self.glossary.is_empty() {
            return None;
        }
        let lines: Vec<String> = self
            .glossary
            .iter()
            .map(|entry| format!("- \"{}\" must be rendered as \"{}\"", entry.from, entry.to))
            .collect();
        Some(format!("## Glossary\n{}", lines.join("\n")))
    }

    /// Render the prompt for a batch.
    pub fn build(&self, records: &[Record], target_language: &str) -> ChatPrompt {
        let mut system = self
            .template
            .render(self.source_language.as_deref(), target_language);
        if let Some(glossary) = self.glossary_section() {
            system.push_str("\n\n");
            system.push_str(&glossary);
        }

        let payload = Self::payload(records);
        let user = format!(
            "Translate the following {} record(s) into {}.\n\n{}",
            records.len(),
            display_name(target_language),
            payload
        );

        ChatPrompt {
            system,
            user,
            payload,
        }
    }
}
