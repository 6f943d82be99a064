// Response service
// Ties retrieval, prompt assembly and the completion model together for one question


use tracing::{debug, info};

use crate::Result;
use crate::database::Collection;
use crate::embeddings::Embedder;
use crate::llm::CompletionModel;
use crate::prompt::{PromptBuilder, PromptContent, PromptTemplate};
use crate::retrieval::{RetrievalResult, Retriever};

pub const NO_DOCUMENTS_NOTICE: &str = "No relevant documents were found for this question.";

/// Everything produced while answering one question
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerContext {
    pub answer: String,
    pub prompt: String,
    pub retrieval: RetrievalResult,
}

pub struct ResponseService<'a> {
    retriever: Retriever<'a>,
    builder: &'a PromptBuilder,
    model: &'a dyn CompletionModel,
}

impl<'a> ResponseService<'a> {
    #[inline]
    pub fn new(
        collection: &'a Collection,
        embedder: &'a dyn Embedder,
        builder: &'a PromptBuilder,
        model: &'a dyn CompletionModel,
    ) -> Self {
        Self {
            retriever: Retriever::new(collection, embedder),
            builder,
            model,
        }
    }

    /// Answer `query` and return the model's text unchanged
    #[inline]
    pub async fn answer(
        &self,
        template: &PromptTemplate,
        query: &str,
        n_results: usize,
        threshold: f32,
    ) -> Result<String> {
        let context = self
            .answer_with_context(template, query, n_results, threshold)
            .await?;
        Ok(context.answer)
    }

    #[inline]
    pub async fn answer_with_context(
        &self,
        template: &PromptTemplate,
        query: &str,
        n_results: usize,
        threshold: f32,
    ) -> Result<AnswerContext> {
        let retrieval = self.retriever.retrieve(query, n_results, threshold).await?;
        let prompt = self.build_prompt(template, query, &retrieval)?;

        debug!(
            "Sending prompt with {} retrieved passages to the model",
            retrieval.len()
        );
        let answer = self.model.complete(&prompt)?;
        info!("Answered question using {} passages", retrieval.len());

        Ok(AnswerContext {
            answer,
            prompt,
            retrieval,
        })
    }

    /// Render the prompt for `query` from an existing retrieval result
    #[inline]
    pub fn build_prompt(
        &self,
        template: &PromptTemplate,
        query: &str,
        retrieval: &RetrievalResult,
    ) -> Result<String> {
        if retrieval.is_empty() {
            let notice = format!("{}\n\n{}", NO_DOCUMENTS_NOTICE, question_section(query));
            return self.builder.build_with(template, PromptContent::Notice(&notice));
        }

        let documents = retrieval.texts().collect::<Vec<_>>().join("\n\n");
        let block = format!(
            "Relevant documents:\n\n{}\n\n{}",
            documents,
            question_section(query)
        );
        self.builder.build_with(template, PromptContent::Block(&block))
    }
}

fn question_section(query: &str) -> String {
    format!("User's question:\n\n{}", query)
}
