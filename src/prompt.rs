//! Prompt assembly for the chat pipeline.
//!
//! A [`PromptTemplate`] is the full prompt text with three slots:
//! `{context}`, `{history}`, and `{question}`. The built-in template tells
//! the model to answer from the retrieved context, admit when the context
//! does not contain the answer, cite its sources, and handle greetings
//! without consulting the context. Operators can swap in their own template
//! via `chat.prompt_path`; a template missing a slot is rejected at load
//! time rather than producing silently broken prompts.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::models::{Message, ScoredChunk};

const DEFAULT_TEMPLATE: &str = "\
You are an assistant for question-answering tasks. Use the retrieved context \
below to answer the question. If the context does not contain the answer, say \
that you don't know. Cite the source passages you drew on. Greetings and other \
small talk need no context; answer those directly. Keep the answer concise and \
stick to the question, the sources, and, when relevant, the chat history.

Context:
{context}

Chat history:
{history}

Question: {question}

Answer:";

const SLOTS: [&str; 3] = ["{context}", "{history}", "{question}"];

/// A prompt template with `{context}`, `{history}`, and `{question}` slots.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Build a template from custom text, verifying all three slots exist.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for slot in SLOTS {
            if !template.contains(slot) {
                bail!("prompt template is missing the {} slot", slot);
            }
        }
        Ok(Self { template })
    }

    /// Load a template from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt template: {}", path.display()))?;
        Self::new(text)
    }

    /// Render the prompt with the three slot values.
    pub fn render(&self, context: &str, history: &str, question: &str) -> String {
        self.template
            .replace("{context}", context)
            .replace("{history}", history)
            .replace("{question}", question)
    }
}

/// Join retrieved chunk texts in retrieval order, one blank line between
/// them.
pub fn format_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render a transcript for the history slot: one `role: content` line per
/// message, oldest first. An empty transcript renders as an empty slot.
pub fn format_history(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.tag(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentChunk;

    fn scored(text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: DocumentChunk {
                id: "id".to_string(),
                text: text.to_string(),
                source: "doc.pdf".to_string(),
                page: 1,
            },
            score: 0.9,
        }
    }

    #[test]
    fn test_render_fills_all_slots() {
        let template = PromptTemplate::default();
        let prompt = template.render("Invoices are due in 30 days.", "human: hi\nai: hello", "when are invoices due?");
        assert!(prompt.contains("Context:\nInvoices are due in 30 days."));
        assert!(prompt.contains("human: hi\nai: hello"));
        assert!(prompt.contains("Question: when are invoices due?"));
        assert!(!prompt.contains("{context}"));
        assert!(!prompt.contains("{history}"));
        assert!(!prompt.contains("{question}"));
    }

    #[test]
    fn test_custom_template_must_have_all_slots() {
        let err = PromptTemplate::new("Q: {question}").unwrap_err();
        assert!(err.to_string().contains("{context}"));

        assert!(PromptTemplate::new("{context} {history} {question}").is_ok());
    }

    #[test]
    fn test_format_context_preserves_order_with_blank_lines() {
        let chunks = vec![scored("first"), scored("second"), scored("third")];
        assert_eq!(format_context(&chunks), "first\n\nsecond\n\nthird");
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn test_format_history_tags_roles() {
        let messages = vec![Message::human("hi"), Message::ai("hello")];
        assert_eq!(format_history(&messages), "human: hi\nai: hello");
        assert_eq!(format_history(&[]), "");
    }
}
