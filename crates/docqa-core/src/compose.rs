//! Answer composer collaborator.
//!
//! A [`Composer`] turns the retrieved context into fluent prose, usually by
//! calling a language model. It is optional and allowed to fail: the
//! selector falls back to the best raw passage whenever composition errors,
//! times out, or produces nothing.

use async_trait::async_trait;

use crate::error::Result;

/// Reply the model is asked to give when the context lacks the answer.
pub const NOT_IN_CONTEXT_REPLY: &str = "I cannot find the answer in the documents.";

#[async_trait]
pub trait Composer: Send + Sync {
    /// Short identifier used in logs (e.g. `"ollama:llama3"`).
    fn name(&self) -> &str;

    /// Compose an answer to `query` from `context`.
    async fn compose(&self, query: &str, context: &str) -> Result<String>;
}

/// Join candidate passages into the context block handed to a composer.
pub fn join_context<'a>(passages: impl IntoIterator<Item = &'a str>) -> String {
    passages.into_iter().collect::<Vec<_>>().join("\n\n")
}

/// Build the grounded prompt sent to a text-generation model.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You are a helpful assistant. Answer the question based ONLY on the following context.\n\
         If the answer is not in the context, say \"{}\"\n\n\
         Context:\n{}\n\n\
         Question: {}\n\
         Answer:",
        NOT_IN_CONTEXT_REPLY, context, query
    )
}
