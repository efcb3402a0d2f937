//! Token counting.
//!
//! Counts are delegated to an injected [`Tokenizer`] when one is available.
//! Without one, or when it fails, the count falls back to the number of
//! whitespace-separated words. The fallback is deterministic, so budget
//! decisions are repeatable; it approximates generation cost and makes no
//! claim of parity with any model's tokenizer.

use std::sync::{Arc, OnceLock};

use ragctx_core::Tokenizer;
use ragctx_core::error::TokenizerError;
use tracing::{debug, info, warn};

type Loader = Box<dyn Fn() -> Result<Arc<dyn Tokenizer>, TokenizerError> + Send + Sync>;

/// A process-wide tokenizer handle with single initialization on first use.
///
/// Construct it once at startup and share it through [`TokenCounter`]
/// clones. Concurrent first use runs the loader exactly once; the others
/// wait for its result. A failed load is remembered and permanently selects
/// the whitespace fallback.
pub struct TokenizerHandle {
    cell: OnceLock<Option<Arc<dyn Tokenizer>>>,
    loader: Option<Loader>,
}

impl TokenizerHandle {
    /// A handle with no tokenizer: every count uses the fallback.
    pub fn none() -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(None);
        Self { cell, loader: None }
    }

    /// A handle around an already constructed tokenizer.
    pub fn ready(tokenizer: Arc<dyn Tokenizer>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Some(tokenizer));
        Self { cell, loader: None }
    }

    /// A handle that runs `loader` on first use.
    pub fn lazy<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Tokenizer>, TokenizerError> + Send + Sync + 'static,
    {
        Self {
            cell: OnceLock::new(),
            loader: Some(Box::new(loader)),
        }
    }

    /// The tokenizer, loading it if this is the first use.
    pub fn get(&self) -> Option<&Arc<dyn Tokenizer>> {
        self.cell
            .get_or_init(|| {
                let load = self.loader.as_ref()?;
                match load() {
                    Ok(tokenizer) => {
                        info!(tokenizer = tokenizer.name(), "Tokenizer loaded");
                        Some(tokenizer)
                    }
                    Err(e) => {
                        warn!(error = %e, "Tokenizer unavailable, counting whitespace words");
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Whether initialization has already happened.
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// The token-cost oracle shared by chunking and budgeting. Cheap to clone.
#[derive(Clone)]
pub struct TokenCounter {
    handle: Arc<TokenizerHandle>,
}

impl TokenCounter {
    /// Share an existing handle.
    pub fn new(handle: Arc<TokenizerHandle>) -> Self {
        Self { handle }
    }

    /// A counter that always uses the whitespace fallback.
    pub fn whitespace() -> Self {
        Self::new(Arc::new(TokenizerHandle::none()))
    }

    /// A counter around an already constructed tokenizer.
    pub fn with_tokenizer(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self::new(Arc::new(TokenizerHandle::ready(tokenizer)))
    }

    /// Count tokens in `text`. Never fails; empty text is 0.
    pub fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        if let Some(tokenizer) = self.handle.get() {
            match tokenizer.encode(text) {
                Ok(ids) => return ids.len(),
                Err(e) => {
                    debug!(tokenizer = tokenizer.name(), error = %e, "Encode failed, using fallback");
                }
            }
        }

        whitespace_count(text)
    }

    /// Name of the active counting method, for logs and reports.
    pub fn method(&self) -> &str {
        match self.handle.get() {
            Some(tokenizer) => tokenizer.name(),
            None => "whitespace",
        }
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::whitespace()
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("initialized", &self.handle.is_initialized())
            .finish()
    }
}

/// The fallback measure: whitespace-separated words.
pub fn whitespace_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::CharTokenizer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Broken;

    impl Tokenizer for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn encode(&self, _text: &str) -> Result<Vec<u32>, TokenizerError> {
            Err(TokenizerError::EncodeFailed("model offline".into()))
        }
    }

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(TokenCounter::whitespace().count_tokens(""), 0);
        assert_eq!(TokenCounter::with_tokenizer(Arc::new(CharTokenizer)).count_tokens(""), 0);
    }

    #[test]
    fn whitespace_fallback_counts_words() {
        let counter = TokenCounter::whitespace();
        assert_eq!(counter.count_tokens("one two  three\nfour\tfive"), 5);
        assert_eq!(counter.count_tokens("   "), 0);
        assert_eq!(counter.method(), "whitespace");
    }

    #[test]
    fn fallback_is_stable() {
        let counter = TokenCounter::whitespace();
        let text = "The same text always measures the same.";
        let first = counter.count_tokens(text);
        for _ in 0..10 {
            assert_eq!(counter.count_tokens(text), first);
        }
    }

    #[test]
    fn injected_tokenizer_is_used() {
        let counter = TokenCounter::with_tokenizer(Arc::new(CharTokenizer));
        assert_eq!(counter.count_tokens("abc de"), 6);
        assert_eq!(counter.method(), "chars");
    }

    #[test]
    fn encode_failure_falls_back() {
        let counter = TokenCounter::with_tokenizer(Arc::new(Broken));
        assert_eq!(counter.count_tokens("three little words"), 3);
    }

    #[test]
    fn failed_load_falls_back_and_is_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let handle = TokenizerHandle::lazy(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            Err(TokenizerError::Unavailable("no tokenizer.json".into()))
        });
        let counter = TokenCounter::new(Arc::new(handle));

        assert_eq!(counter.count_tokens("a b c"), 3);
        assert_eq!(counter.count_tokens("a b"), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lazy_handle_loads_once_under_concurrent_first_use() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let handle = TokenizerHandle::lazy(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Arc::new(CharTokenizer) as Arc<dyn Tokenizer>)
        });
        let counter = TokenCounter::new(Arc::new(handle));
        assert!(!counter.handle.is_initialized());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let counter = counter.clone();
                scope.spawn(move || {
                    assert_eq!(counter.count_tokens("abcd"), 4);
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(counter.handle.is_initialized());
    }
}
