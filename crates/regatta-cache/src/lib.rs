//! Caching layers for the regatta registry gateway.
//!
//! Two caches with very different value types live here:
//!
//! - [`MemoCache`]: an in-process memoization store for parsed remote
//!   responses, with a single whole-store expiry horizon.
//! - [`ArtifactStore`]: a filesystem-backed store for downloaded release
//!   archives, with per-key writer locking and atomic commit.

pub mod artifact;
pub mod error;
pub mod memo;

pub use artifact::{ArtifactStore, ArtifactWriter};
pub use error::{CacheError, Result};
pub use memo::{MemoCache, DEFAULT_TTL};
