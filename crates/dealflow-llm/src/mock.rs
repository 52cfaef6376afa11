//! Mock model provider for testing
//!
//! Returns queued responses (or failures) in FIFO order, and counts
//! invocations so tests can assert how often a provider was touched.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::chat::{ChatRequest, ChatResponse};
use crate::error::{Error, Result};
use crate::provider::ModelProvider;

enum Scripted {
    Response(ChatResponse),
    Failure(Error),
}

/// A mock provider that returns scripted responses or default empty ones
pub struct MockProvider {
    name: String,
    queue: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a new mock provider named "mock"
    #[must_use]
    pub fn new() -> Self {
        Self::named("mock")
    }

    /// Create a mock provider with a custom name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Delay every `chat` call, for exercising caller-side timeouts
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = Some(delay);
    }

    /// Queue a response
    pub fn push_response(&self, response: ChatResponse) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Scripted::Response(response));
    }

    /// Queue a failure
    pub fn push_failure(&self, error: Error) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Scripted::Failure(error));
    }

    /// Number of times `chat` was invoked
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request received, if any
    #[must_use]
    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

#[async_trait::async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        let next = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Failure(error)) => Err(error),
            None => Ok(ChatResponse {
                content: Some("mock response".to_string()),
                tool_calls: vec![],
                finish_reason: Some("stop".to_string()),
                model: "mock-model".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queue_drains_in_order_then_defaults() {
        let provider = MockProvider::new();
        provider.push_response(ChatResponse {
            content: Some("first".to_string()),
            tool_calls: vec![],
            finish_reason: Some("stop".to_string()),
            model: "mock-model".to_string(),
        });

        let first = provider.chat(ChatRequest::default()).await.unwrap();
        assert_eq!(first.text(), "first");

        let default = provider.chat(ChatRequest::default()).await.unwrap();
        assert_eq!(default.text(), "mock response");
        assert_eq!(provider.calls(), 2);
    }
}
