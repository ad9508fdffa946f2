//! The question-answering pipeline and the application composition root.
//!
//! [`assemble`] builds every long-lived component from configuration, once,
//! at startup. Construction is where providers read their credentials and
//! fail; after [`assemble`] returns, no code path constructs clients or
//! touches the environment.
//!
//! [`ChatPipeline::query`] runs the fixed sequence for one question: lock
//! the session, snapshot its transcript, retrieve, compose context, render
//! the prompt, generate, and only then append the exchange. The session
//! lock is held across the whole tail, so two questions on the same session
//! serialize and the second one sees the first answer in its history. A
//! failure at any step leaves the transcript exactly as it was.

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::generate::{create_generator, Generator};
use crate::history::HistoryStore;
use crate::index::{create_index, VectorIndex};
use crate::models::{Message, ScoredChunk};
use crate::prompt::{self, PromptTemplate};
use crate::retrieve::{Retriever, SearchOptions};

/// Everything the CLI and the server need, wired together.
pub struct AppComponents {
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
    pub generator: Arc<dyn Generator>,
    pub history: Arc<HistoryStore>,
    pub pipeline: Arc<ChatPipeline>,
}

/// Build the full chat stack from configuration.
///
/// Fails when a provider is misconfigured or its API token is missing from
/// the environment, or when a custom prompt template cannot be loaded.
pub fn assemble(config: &Config) -> Result<AppComponents> {
    let embedder = create_embedder(&config.embedding)?;
    let index = create_index(&config.index)?;
    let generator = create_generator(&config.generation)?;
    let history = Arc::new(HistoryStore::new(config.chat.max_sessions));

    let prompt = match &config.chat.prompt_path {
        Some(path) => PromptTemplate::from_file(path)?,
        None => PromptTemplate::default(),
    };

    let retriever = Arc::new(Retriever::new(
        embedder.clone(),
        index.clone(),
        SearchOptions::from_config(&config.chat),
    )?);

    let pipeline = Arc::new(ChatPipeline::new(
        retriever,
        generator.clone(),
        history.clone(),
        prompt,
    ));

    Ok(AppComponents {
        embedder,
        index,
        generator,
        history,
        pipeline,
    })
}

/// The answer to one question, with the chunks that grounded it.
#[derive(Debug, Clone)]
pub struct QueryOutput {
    pub answer: String,
    pub sources: Vec<ScoredChunk>,
}

/// Runs retrieval-augmented question answering over per-session history.
pub struct ChatPipeline {
    retriever: Arc<Retriever>,
    generator: Arc<dyn Generator>,
    history: Arc<HistoryStore>,
    prompt: PromptTemplate,
}

impl ChatPipeline {
    pub fn new(
        retriever: Arc<Retriever>,
        generator: Arc<dyn Generator>,
        history: Arc<HistoryStore>,
        prompt: PromptTemplate,
    ) -> Self {
        Self {
            retriever,
            generator,
            history,
            prompt,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Answer one question within a session.
    ///
    /// `source` restricts retrieval to chunks from one document for this
    /// call. On success the session transcript gains exactly two messages,
    /// the question and the answer, in that order. On any failure the
    /// transcript is unchanged.
    pub async fn query(
        &self,
        session: &str,
        question: &str,
        source: Option<&str>,
    ) -> Result<QueryOutput> {
        if session.trim().is_empty() {
            bail!("session token must not be empty");
        }
        if question.trim().is_empty() {
            bail!("question must not be empty");
        }

        let handle = self.history.session(session);
        let mut transcript = handle.lock().await;

        let history_text = prompt::format_history(&transcript);
        let sources = self.retriever.retrieve(question, source).await?;
        let context = prompt::format_context(&sources);
        let rendered = self.prompt.render(&context, &history_text, question);

        tracing::debug!(
            session,
            chunks = sources.len(),
            prompt_chars = rendered.len(),
            "generating answer"
        );
        let answer = self.generator.generate(&rendered).await?;

        transcript.push(Message::human(question));
        transcript.push(Message::ai(answer.clone()));

        Ok(QueryOutput { answer, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;
    use crate::models::{DocumentChunk, IndexEntry, Role};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model_name(&self) -> &str {
            "fixed"
        }
        fn dims(&self) -> Option<usize> {
            Some(2)
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    /// Generator that records every prompt and either answers or fails.
    struct ScriptedGenerator {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    impl ScriptedGenerator {
        fn answering() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        fn model_name(&self) -> &str {
            "scripted"
        }
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                bail!("upstream exploded");
            }
            Ok(format!("answer #{}", self.prompts.lock().unwrap().len()))
        }
    }

    async fn pipeline_with(generator: Arc<ScriptedGenerator>) -> ChatPipeline {
        let index = Arc::new(MemoryIndex::new());
        index
            .insert(vec![IndexEntry {
                chunk: DocumentChunk {
                    id: "c1".to_string(),
                    text: "The warranty lasts two years.".to_string(),
                    source: "manual.pdf".to_string(),
                    page: 3,
                },
                vector: vec![1.0, 0.0],
                ingested_at: "2024-01-01T00:00:00Z".to_string(),
            }])
            .await
            .unwrap();

        let retriever = Arc::new(
            Retriever::new(
                Arc::new(FixedEmbedder),
                index,
                SearchOptions {
                    search_type: "similarity".to_string(),
                    k: 4,
                    source: None,
                },
            )
            .unwrap(),
        );

        ChatPipeline::new(
            retriever,
            generator,
            Arc::new(HistoryStore::new(8)),
            PromptTemplate::default(),
        )
    }

    #[tokio::test]
    async fn test_query_appends_question_then_answer() {
        let generator = Arc::new(ScriptedGenerator::answering());
        let pipeline = pipeline_with(generator).await;

        let output = pipeline.query("s1", "How long is the warranty?", None).await.unwrap();
        assert_eq!(output.answer, "answer #1");
        assert_eq!(output.sources.len(), 1);

        let transcript = pipeline.history().history("s1").await;
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, Role::Human);
        assert_eq!(transcript[0].content, "How long is the warranty?");
        assert_eq!(transcript[1].role, Role::Ai);
        assert_eq!(transcript[1].content, "answer #1");
    }

    #[tokio::test]
    async fn test_failed_generation_leaves_history_untouched() {
        let generator = Arc::new(ScriptedGenerator::failing());
        let pipeline = pipeline_with(generator).await;

        let err = pipeline.query("s1", "Anything?", None).await.unwrap_err();
        assert!(err.to_string().contains("upstream exploded"));
        assert!(pipeline.history().history("s1").await.is_empty());
    }

    #[tokio::test]
    async fn test_prompt_carries_context_and_prior_turns() {
        let generator = Arc::new(ScriptedGenerator::answering());
        let pipeline = pipeline_with(generator.clone()).await;

        pipeline.query("s1", "First question", None).await.unwrap();
        pipeline.query("s1", "Second question", None).await.unwrap();

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("The warranty lasts two years."));
        assert!(prompts[0].contains("Question: First question"));
        assert!(prompts[1].contains("human: First question"));
        assert!(prompts[1].contains("ai: answer #1"));
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_history() {
        let generator = Arc::new(ScriptedGenerator::answering());
        let pipeline = pipeline_with(generator.clone()).await;

        pipeline.query("alpha", "Question in alpha", None).await.unwrap();
        pipeline.query("beta", "Question in beta", None).await.unwrap();

        let prompts = generator.prompts.lock().unwrap();
        assert!(!prompts[1].contains("Question in alpha"));
        assert_eq!(pipeline.history().history("alpha").await.len(), 2);
        assert_eq!(pipeline.history().history("beta").await.len(), 2);
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> Option<usize> {
            None
        }
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            bail!("embedding service down")
        }
    }

    #[tokio::test]
    async fn test_failed_retrieval_skips_generation() {
        let generator = Arc::new(ScriptedGenerator::answering());
        let retriever = Arc::new(
            Retriever::new(
                Arc::new(FailingEmbedder),
                Arc::new(MemoryIndex::new()),
                SearchOptions {
                    search_type: "similarity".to_string(),
                    k: 4,
                    source: None,
                },
            )
            .unwrap(),
        );
        let pipeline = ChatPipeline::new(
            retriever,
            generator.clone(),
            Arc::new(HistoryStore::new(8)),
            PromptTemplate::default(),
        );

        let err = pipeline.query("s1", "Anything?", None).await.unwrap_err();
        assert!(err.to_string().contains("embedding service down"));
        assert!(generator.prompts.lock().unwrap().is_empty());
        assert!(pipeline.history().history("s1").await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_queries_on_one_session_serialize() {
        let generator = Arc::new(ScriptedGenerator::answering());
        let pipeline = pipeline_with(generator).await;

        let (first, second) = tokio::join!(
            pipeline.query("s1", "Question one", None),
            pipeline.query("s1", "Question two", None),
        );
        first.unwrap();
        second.unwrap();

        // The session lock keeps each question/answer pair adjacent.
        let transcript = pipeline.history().history("s1").await;
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[0].role, Role::Human);
        assert_eq!(transcript[1].role, Role::Ai);
        assert_eq!(transcript[2].role, Role::Human);
        assert_eq!(transcript[3].role, Role::Ai);
    }

    #[tokio::test]
    async fn test_source_filter_reaches_the_index() {
        let generator = Arc::new(ScriptedGenerator::answering());
        let pipeline = pipeline_with(generator).await;

        let output = pipeline
            .query("s1", "Warranty?", Some("other.pdf"))
            .await
            .unwrap();
        assert!(output.sources.is_empty());
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let generator = Arc::new(ScriptedGenerator::answering());
        let pipeline = pipeline_with(generator).await;

        let err = pipeline.query("s1", "   ", None).await.unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }
}
