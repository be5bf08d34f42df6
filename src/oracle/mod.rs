//! Oracle Client Adapter - boundary to the external classification service
//!
//! The oracle is untrusted and non-deterministic. It receives the batch of
//! unseen normalized keys plus, for category resolution, the target
//! vocabulary, and answers with whatever object it likes. Validating that
//! answer is the orchestrator's job.

pub mod prompt;
pub mod response;

pub use response::{decode_answer, OracleAnswer};

use crate::error::Result;
use crate::llm::LlmClient;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::info;

/// One batched resolution request.
#[derive(Debug, Clone, Copy)]
pub struct OracleRequest<'a> {
    pub keys: &'a BTreeSet<String>,
    /// Present for vocabulary-constrained domains (category), absent for
    /// free-form ones (manufacturer).
    pub vocabulary: Option<&'a [String]>,
}

#[async_trait]
pub trait Oracle: Send + Sync {
    async fn resolve(&self, request: OracleRequest<'_>) -> Result<OracleAnswer>;
}

/// Oracle backed by a chat-completion LLM.
pub struct LlmOracle {
    client: LlmClient,
    retry: RetryPolicy,
}

impl LlmOracle {
    pub fn new(client: LlmClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub fn build_prompt(request: &OracleRequest<'_>) -> String {
        match request.vocabulary {
            Some(vocabulary) => prompt::category_prompt(request.keys, vocabulary),
            None => prompt::manufacturer_prompt(request.keys),
        }
    }
}

#[async_trait]
impl Oracle for LlmOracle {
    async fn resolve(&self, request: OracleRequest<'_>) -> Result<OracleAnswer> {
        let prompt = Self::build_prompt(&request);
        info!(
            "🤖 Asking {} to resolve {} unseen keys",
            self.client.model(),
            request.keys.len()
        );

        let client = &self.client;
        let prompt = prompt.as_str();
        let text = self.retry.run(move || client.call_llm(prompt)).await?;

        decode_answer(&text)
    }
}
