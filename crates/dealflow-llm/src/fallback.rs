//! Fallback - ordered multi-provider execution
//!
//! Given a caller-supplied priority list of providers, tries each in order
//! until one succeeds. Exactly one provider serves a successful call; no
//! partial results are merged across providers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::chat::{ChatRequest, ChatResponse};
use crate::error::{Error, Result};
use crate::provider::ModelProvider;

/// Outcome of one provider attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    /// The provider produced a response
    Succeeded,
    /// The provider failed with the given error message
    Failed(String),
}

/// Diagnostic record of one provider attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAttempt {
    /// Provider name
    pub provider: String,
    /// What happened
    pub outcome: AttemptOutcome,
}

impl ProviderAttempt {
    /// Whether this attempt succeeded
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Succeeded
    }
}

/// Executes a unit of work against an ordered provider list
pub struct FallbackExecutor {
    providers: Vec<Arc<dyn ModelProvider>>,
}

impl FallbackExecutor {
    /// Create an executor over a priority-ordered provider list
    ///
    /// Fails with `NotConfigured` when the list is empty — a runtime with no
    /// providers is a configuration error, caught before any step runs.
    pub fn new(providers: Vec<Arc<dyn ModelProvider>>) -> Result<Self> {
        if providers.is_empty() {
            return Err(Error::NotConfigured("empty provider list".to_string()));
        }
        Ok(Self { providers })
    }

    /// Try each provider in order until one succeeds.
    ///
    /// Each provider is invoked at most once. Returns the winning response
    /// together with the per-attempt diagnostic trail; when every provider
    /// fails, returns `AllProvidersFailed` preserving the last error message.
    pub async fn execute(
        &self,
        request: &ChatRequest,
    ) -> Result<(ChatResponse, Vec<ProviderAttempt>)> {
        let mut attempts = Vec::with_capacity(self.providers.len());
        let mut last_error: Option<Error> = None;

        for provider in &self.providers {
            let mut request = request.clone();
            if request.model.is_empty() {
                request.model = provider.default_model().to_string();
            }

            debug!(provider = %provider.name(), model = %request.model, "Invoking provider");
            match provider.chat(request).await {
                Ok(response) => {
                    attempts.push(ProviderAttempt {
                        provider: provider.name().to_string(),
                        outcome: AttemptOutcome::Succeeded,
                    });
                    return Ok((response, attempts));
                }
                Err(e) => {
                    warn!(provider = %provider.name(), error = %e, "Provider failed, trying next");
                    attempts.push(ProviderAttempt {
                        provider: provider.name().to_string(),
                        outcome: AttemptOutcome::Failed(e.to_string()),
                    });
                    last_error = Some(e);
                }
            }
        }

        let last = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no providers attempted".to_string());
        Err(Error::AllProvidersFailed {
            attempts: attempts.len(),
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;

    fn text_response(text: &str) -> ChatResponse {
        ChatResponse {
            content: Some(text.to_string()),
            tool_calls: vec![],
            finish_reason: Some("stop".to_string()),
            model: "mock-model".to_string(),
        }
    }

    #[test]
    fn empty_provider_list_is_a_configuration_error() {
        let result = FallbackExecutor::new(vec![]);
        assert!(matches!(result, Err(Error::NotConfigured(_))));
    }

    #[tokio::test]
    async fn first_success_wins_and_is_recorded() {
        let a = Arc::new(MockProvider::named("a"));
        a.push_response(text_response("from a"));
        let b = Arc::new(MockProvider::named("b"));
        b.push_response(text_response("from b"));

        let executor = FallbackExecutor::new(vec![a, b.clone()]).unwrap();
        let (response, attempts) = executor
            .execute(&ChatRequest::new("mock-model"))
            .await
            .unwrap();

        assert_eq!(response.text(), "from a");
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].succeeded());
        // b was never touched
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn failed_primary_falls_back_to_secondary() {
        let a = Arc::new(MockProvider::named("a"));
        a.push_failure(Error::RateLimit);
        let b = Arc::new(MockProvider::named("b"));
        b.push_response(text_response("from b"));

        let executor = FallbackExecutor::new(vec![a.clone(), b.clone()]).unwrap();
        let (response, attempts) = executor
            .execute(&ChatRequest::new("mock-model"))
            .await
            .unwrap();

        assert_eq!(response.text(), "from b");
        assert_eq!(attempts.len(), 2);
        assert!(!attempts[0].succeeded());
        assert!(attempts[1].succeeded());
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn all_failures_surface_last_error() {
        let a = Arc::new(MockProvider::named("a"));
        a.push_failure(Error::RateLimit);
        let b = Arc::new(MockProvider::named("b"));
        b.push_failure(Error::ServerError("upstream 503".to_string()));

        let executor = FallbackExecutor::new(vec![a.clone(), b.clone()]).unwrap();
        let err = executor
            .execute(&ChatRequest::new("mock-model"))
            .await
            .unwrap_err();

        match err {
            Error::AllProvidersFailed { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(last.contains("upstream 503"));
            }
            other => panic!("expected AllProvidersFailed, got {other}"),
        }
        // each provider invoked exactly once
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }
}
