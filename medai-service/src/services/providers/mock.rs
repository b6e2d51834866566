//! Mock provider for tests and local runs without an API key.

use super::{AiProvider, ChatCompletionRequest, ProviderError};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scriptable in-process provider.
///
/// Chat replies are served from a queue first, then fall back to the default
/// reply. Embeddings are derived from the text so equal inputs map to equal
/// vectors.
pub struct MockProvider {
    default_reply: String,
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    failing_texts: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    chat_calls: AtomicUsize,
    embed_calls: AtomicUsize,
    last_request: Mutex<Option<ChatCompletionRequest>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            default_reply: "Mock response".to_string(),
            replies: Mutex::new(VecDeque::new()),
            failing_texts: Mutex::new(HashSet::new()),
            delay: None,
            chat_calls: AtomicUsize::new(0),
            embed_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_default_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = reply.into();
        self
    }

    /// Delay every call, to exercise timeouts and concurrency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue the outcome of the next chat call.
    pub fn push_reply(&self, reply: Result<String, ProviderError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Make `embed` fail for this exact text.
    pub fn fail_embedding_for(&self, text: impl Into<String>) {
        if let Ok(mut failing) = self.failing_texts.lock() {
            failing.insert(text.into());
        }
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ChatCompletionRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }

    fn lock_err<T>(_: T) -> ProviderError {
        ProviderError::ApiError("mock provider lock poisoned".to_string())
    }
}

/// Deterministic vector for `text`: first slot is the character count, the
/// rest cycle through the byte values.
pub fn mock_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let bytes = text.as_bytes();
    (0..dimensions)
        .map(|i| {
            if i == 0 {
                text.chars().count() as f32
            } else if bytes.is_empty() {
                0.0
            } else {
                bytes[(i - 1) % bytes.len()] as f32 / 255.0
            }
        })
        .collect()
}

#[async_trait]
impl AiProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn chat_complete(&self, request: &ChatCompletionRequest) -> Result<String, ProviderError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().map_err(Self::lock_err)? = Some(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.replies.lock().map_err(Self::lock_err)?.pop_front();
        match queued {
            Some(reply) => reply,
            None => Ok(self.default_reply.clone()),
        }
    }

    async fn embed(
        &self,
        _model: &str,
        text: &str,
        dimensions: usize,
    ) -> Result<Vec<f32>, ProviderError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_texts.lock().map_err(Self::lock_err)?.contains(text) {
            return Err(ProviderError::ApiError(format!(
                "embedding rejected for {} chars",
                text.len()
            )));
        }

        Ok(mock_embedding(text, dimensions))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "mock".to_string(),
            system_instruction: String::new(),
            history: Vec::new(),
            message: "hello".to_string(),
            json_output: false,
        }
    }

    #[tokio::test]
    async fn queued_replies_are_served_in_order() {
        let provider = MockProvider::new().with_default_reply("fallback");
        provider.push_reply(Ok("first".into()));
        provider.push_reply(Err(ProviderError::RateLimited));

        assert_eq!(provider.chat_complete(&request()).await.unwrap(), "first");
        assert_eq!(
            provider.chat_complete(&request()).await,
            Err(ProviderError::RateLimited)
        );
        assert_eq!(provider.chat_complete(&request()).await.unwrap(), "fallback");
        assert_eq!(provider.chat_calls(), 3);
        assert_eq!(provider.last_request().unwrap().message, "hello");
    }

    #[tokio::test]
    async fn embeddings_are_deterministic() {
        let provider = MockProvider::new();
        let a = provider.embed("m", "alpha", 8).await.unwrap();
        let b = provider.embed("m", "alpha", 8).await.unwrap();

        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert_eq!(a[0], 5.0);
    }

    #[tokio::test]
    async fn configured_texts_fail_to_embed() {
        let provider = MockProvider::new();
        provider.fail_embedding_for("bad");

        assert!(provider.embed("m", "bad", 4).await.is_err());
        assert!(provider.embed("m", "good", 4).await.is_ok());
        assert_eq!(provider.embed_calls(), 2);
    }
}
