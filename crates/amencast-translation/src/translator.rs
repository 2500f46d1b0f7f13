//! The translation provider seam and per-stream translation state.

use async_trait::async_trait;
use tracing::{debug, warn};

use amencast_core::StreamId;

use crate::context::RollingContext;
use crate::errors::TranslationError;

/// One translation call.
#[derive(Clone, Copy, Debug)]
pub struct TranslationRequest<'a> {
    /// Source text.
    pub text: &'a str,
    /// Target language code.
    pub target_language: &'a str,
    /// Prior source sentences, oldest first.
    pub context: &'a [String],
}

/// A request/response translation provider.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate one segment.
    ///
    /// `Ok(None)` means the provider answered with nothing usable.
    async fn translate(
        &self,
        request: TranslationRequest<'_>,
    ) -> Result<Option<String>, TranslationError>;
}

/// Per-stream translation state: target language plus rolling context.
#[derive(Clone, Debug)]
pub struct TranslationSession {
    stream_id: StreamId,
    language: String,
    context: RollingContext,
}

impl TranslationSession {
    /// New session with an empty context window.
    pub fn new(stream_id: StreamId, language: impl Into<String>, context_window: usize) -> Self {
        Self {
            stream_id,
            language: language.into(),
            context: RollingContext::new(context_window),
        }
    }

    /// Target language code.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// The rolling context window.
    pub fn context(&self) -> &RollingContext {
        &self.context
    }

    /// Translate `text`, advancing the context only on success.
    ///
    /// Blank input, provider errors and empty answers all yield `None`; a
    /// dropped segment never blocks the stream.
    pub async fn translate(&mut self, translator: &dyn Translator, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let context = self.context.snapshot();
        let request = TranslationRequest {
            text,
            target_language: &self.language,
            context: &context,
        };

        match translator.translate(request).await {
            Ok(Some(translated)) => {
                self.context.push(text);
                debug!(
                    stream_id = %self.stream_id,
                    sentences = self.context.sentence_count(),
                    "segment translated"
                );
                Some(translated)
            }
            Ok(None) => {
                warn!(stream_id = %self.stream_id, "empty translation response, segment dropped");
                None
            }
            Err(e) => {
                warn!(
                    stream_id = %self.stream_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "translation failed, segment dropped"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(String, Vec<String>)>>,
        fail: bool,
    }

    #[async_trait]
    impl Translator for Recording {
        async fn translate(
            &self,
            request: TranslationRequest<'_>,
        ) -> Result<Option<String>, TranslationError> {
            self.calls
                .lock()
                .push((request.text.to_string(), request.context.to_vec()));
            if self.fail {
                return Err(TranslationError::Api {
                    status: 500,
                    message: "boom".into(),
                });
            }
            Ok(Some(format!("[{}] {}", request.target_language, request.text)))
        }
    }

    #[tokio::test]
    async fn first_call_has_empty_context_then_one() {
        let provider = Recording::default();
        let mut session = TranslationSession::new(StreamId::from("s1"), "es", 3);

        let out = session.translate(&provider, "Hello").await;
        assert_eq!(out.as_deref(), Some("[es] Hello"));
        assert_eq!(session.context().snapshot(), vec!["Hello"]);

        let _ = session.translate(&provider, "World").await;
        let calls = provider.calls.lock();
        assert_eq!(calls[0], ("Hello".to_string(), vec![]));
        assert_eq!(calls[1], ("World".to_string(), vec!["Hello".to_string()]));
    }

    #[tokio::test]
    async fn failure_leaves_context_untouched() {
        let provider = Recording {
            fail: true,
            ..Recording::default()
        };
        let mut session = TranslationSession::new(StreamId::from("s1"), "de", 3);
        assert_eq!(session.translate(&provider, "Hello").await, None);
        assert!(session.context().is_empty());
    }

    #[tokio::test]
    async fn blank_text_is_skipped_without_a_call() {
        let provider = Recording::default();
        let mut session = TranslationSession::new(StreamId::from("s1"), "es", 3);
        assert_eq!(session.translate(&provider, "   ").await, None);
        assert!(provider.calls.lock().is_empty());
    }
}
