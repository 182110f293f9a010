use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors that can occur while operating the artifact store.
#[derive(Error, Diagnostic, Debug)]
pub enum CacheError {
    #[error("Failed to {action} {path:?}: {source}")]
    #[diagnostic(code(regatta_cache::io))]
    Io {
        path: PathBuf,
        action: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(regatta_cache::lock))]
    Lock(#[from] regatta_utils::error::LockError),

    #[error("Artifact name `{0}` sanitizes to an empty key")]
    #[diagnostic(
        code(regatta_cache::empty_key),
        help("Artifact names must contain at least one character besides separators and dots")
    )]
    EmptyKey(String),
}

/// A specialized Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::EmptyKey("../..".to_string());
        assert_eq!(err.to_string(), "Artifact name `../..` sanitizes to an empty key");

        let err = CacheError::Io {
            path: PathBuf::from("/cache/pkg.tgz"),
            action: "create",
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to create \"/cache/pkg.tgz\": disk full"
        );
    }
}
