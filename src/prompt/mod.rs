//! Deterministic prompt assembly.
//!
//! A [`PromptTemplate`] describes the task; [`PromptBuilder`] renders it
//! together with retrieved content into the single string sent to the model.
//! Templates are read from a TOML file of named tables.

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::{RagError, Result};

const SECTION_SEPARATOR: &str = "\n\n";
const FINAL_INSTRUCTION: &str = "Now perform the task as instructed above.";
/// Strategy name meaning "no reasoning strategy"
const NO_STRATEGY: &str = "None";

/// Template used when no templates file exists
const DEFAULT_TEMPLATES: &str = r#"[rag_wiki_assistant_prompt]
goal = "Answer the user's question about machine learning using only the retrieved wiki passages."
role = "a helpful assistant that explains machine learning concepts clearly and accurately"
instruction = """
Read the relevant documents and the user's question in the content below.
Answer the question using only information from the documents.
If the documents do not contain the answer, say that you cannot answer from the available articles.
"""
output_constraints = [
    "Do not invent facts that are not supported by the documents.",
    "Keep the answer under 200 words.",
    "Politely decline questions unrelated to the documents.",
]
style_or_tone = [
    "Clear and concise.",
    "Friendly and professional.",
]
output_format = [
    "Start with a direct answer in one or two sentences.",
    "Follow with supporting details as bullet points when useful.",
]
reasoning_strategy = "CoT"
"#;

/// A prompt value given either as one string or as a list of bullet items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptField {
    Text(String),
    List(Vec<String>),
}

impl PromptField {
    fn is_empty(&self) -> bool {
        match self {
            PromptField::Text(text) => text.is_empty(),
            PromptField::List(items) => items.is_empty(),
        }
    }

    /// Lists render one `- item` per line; text renders verbatim
    fn render(&self) -> String {
        match self {
            PromptField::Text(text) => text.clone(),
            PromptField::List(items) => items
                .iter()
                .map(|item| format!("- {}", item))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<&str> for PromptField {
    #[inline]
    fn from(text: &str) -> Self {
        PromptField::Text(text.to_string())
    }
}

impl From<Vec<&str>> for PromptField {
    #[inline]
    fn from(items: Vec<&str>) -> Self {
        PromptField::List(items.into_iter().map(str::to_string).collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplate {
    pub goal: Option<String>,
    pub role: Option<String>,
    /// Required; building fails without it
    pub instruction: Option<String>,
    pub output_constraints: Option<PromptField>,
    pub style_or_tone: Option<PromptField>,
    pub output_format: Option<PromptField>,
    pub meta_instruction_for_debugging: Option<String>,
    /// Name of an entry in the reasoning strategy table
    pub reasoning_strategy: Option<String>,
}

impl PromptTemplate {
    #[inline]
    pub fn with_instruction(instruction: impl Into<String>) -> Self {
        Self {
            instruction: Some(instruction.into()),
            ..Self::default()
        }
    }
}

/// What fills the content slot of a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptContent<'a> {
    /// Material for the model to process, fenced by content markers
    Block(&'a str),
    /// A plain note rendered without markers
    Notice(&'a str),
}

/// Renders templates, resolving reasoning strategies by name
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    strategies: BTreeMap<String, String>,
}

impl PromptBuilder {
    #[inline]
    pub fn new(strategies: BTreeMap<String, String>) -> Self {
        Self { strategies }
    }

    /// Build a prompt around `context`; an empty context adds no content section
    #[inline]
    pub fn build(&self, template: &PromptTemplate, context: &str) -> Result<String> {
        self.build_with(template, PromptContent::Block(context))
    }

    #[inline]
    pub fn build_with(&self, template: &PromptTemplate, content: PromptContent<'_>) -> Result<String> {
        let mut sections: Vec<String> = Vec::new();

        if let Some(goal) = non_blank(template.goal.as_deref()) {
            sections.push(format!("Goal:\n{}", goal));
        }

        if let Some(role) = non_blank(template.role.as_deref()) {
            sections.push(format!("You are {}.", role));
        }

        let instruction = non_blank(template.instruction.as_deref()).ok_or_else(|| {
            RagError::Config("Missing required prompt field: 'instruction'".to_string())
        })?;
        sections.push(format!("Instruction:\n{}", instruction));

        let listed = [
            ("Output constraints:", &template.output_constraints),
            ("Style and tone guidelines:", &template.style_or_tone),
            ("Response format:", &template.output_format),
        ];
        for (lead_in, field) in listed {
            if let Some(field) = field.as_ref().filter(|field| !field.is_empty()) {
                sections.push(format!("{}\n{}", lead_in, field.render()));
            }
        }

        if let Some(meta) = non_blank(template.meta_instruction_for_debugging.as_deref()) {
            sections.push(format!("Debug instructions:\n{}", meta));
        }

        match content {
            PromptContent::Block(text) => {
                if let Some(text) = non_blank(Some(text)) {
                    sections.push(format!(
                        "Content to process:\n<<<BEGIN CONTENT>>>\n```\n{}\n```\n<<<END CONTENT>>>",
                        text
                    ));
                }
            }
            PromptContent::Notice(text) => {
                if let Some(text) = non_blank(Some(text)) {
                    sections.push(text.to_string());
                }
            }
        }

        if let Some(strategy) = self.resolve_strategy(template.reasoning_strategy.as_deref()) {
            sections.push(strategy.to_string());
        }

        sections.push(FINAL_INSTRUCTION.to_string());

        let prompt = sections.join(SECTION_SEPARATOR);
        debug!(
            "Built prompt with {} sections ({} chars)",
            sections.len(),
            prompt.chars().count()
        );
        Ok(prompt)
    }

    fn resolve_strategy(&self, name: Option<&str>) -> Option<&str> {
        let name = name.map(str::trim).filter(|name| !name.is_empty() && *name != NO_STRATEGY)?;

        match self.strategies.get(name) {
            Some(text) => non_blank(Some(text)),
            None => {
                warn!("Unknown reasoning strategy '{}', leaving it out", name);
                None
            }
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Named prompt templates loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptLibrary {
    templates: BTreeMap<String, PromptTemplate>,
}

impl PromptLibrary {
    #[inline]
    pub fn from_toml(content: &str) -> Result<Self> {
        let templates: BTreeMap<String, PromptTemplate> = toml::from_str(content)
            .map_err(|e| RagError::Config(format!("Invalid prompt templates: {}", e)))?;
        Ok(Self { templates })
    }

    /// Load a templates file; a missing file is a not-found error
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(RagError::NotFound(format!(
                "Prompt templates file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)?;
        let library = Self::from_toml(&content)?;
        debug!(
            "Loaded {} prompt templates from {}",
            library.templates.len(),
            path.display()
        );
        Ok(library)
    }

    /// Load a templates file, falling back to the built-in templates when it is absent
    #[inline]
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(
                "No prompt templates at {}, using built-in templates",
                path.display()
            );
            Ok(Self::builtin())
        }
    }

    #[inline]
    pub fn builtin() -> Self {
        // The embedded document is covered by tests
        Self::from_toml(DEFAULT_TEMPLATES).unwrap_or_default()
    }

    #[inline]
    pub fn get(&self, name: &str) -> Result<&PromptTemplate> {
        self.templates
            .get(name)
            .ok_or_else(|| RagError::NotFound(format!("Prompt template '{}' not found", name)))
    }

    #[inline]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// TOML text of the built-in templates, for seeding a templates file
    #[inline]
    pub fn builtin_toml() -> &'static str {
        DEFAULT_TEMPLATES
    }
}
