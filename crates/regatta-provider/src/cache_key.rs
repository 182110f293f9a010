//! Structured keys for memoized remote reads.
//!
//! Every cacheable call is keyed by an explicit tuple of discriminators
//! rather than an ad-hoc string join, so `("a", "b/c")` and `("a/b", "c")`
//! can never collide. The project's last-activity timestamp is always one of
//! the discriminators: any upstream change produces a fresh key, which is the
//! whole invalidation strategy. There is no explicit invalidation call.

/// An ordered tuple of cache-key discriminators.
#[derive(Debug, Clone)]
pub struct CacheKey {
    parts: Vec<String>,
}

impl CacheKey {
    /// Starts a key with the root URL and resource kind discriminators.
    pub fn new(root: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            parts: vec![root.into(), kind.into()],
        }
    }

    /// Appends one more discriminator.
    pub fn push(mut self, part: impl Into<String>) -> Self {
        self.parts.push(part.into());
        self
    }

    /// Deterministically encodes the tuple as a JSON array string.
    pub fn encode(&self) -> String {
        serde_json::to_string(&self.parts).expect("unable to encode cache key")
    }
}
