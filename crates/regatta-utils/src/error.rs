use std::{error::Error, fmt, path::PathBuf};

#[derive(Debug)]
pub enum HashError {
    ReadFailed { source: std::io::Error },
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashError::ReadFailed { source } => {
                write!(f, "Failed to read stream while hashing: {source}")
            }
        }
    }
}

impl Error for HashError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HashError::ReadFailed { source } => Some(source),
        }
    }
}

#[derive(Debug)]
pub enum LockError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    AcquireFailed(String),
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::Io { path, source } => {
                write!(f, "Failed to open lock file `{}`: {source}", path.display())
            }
            LockError::AcquireFailed(msg) => write!(f, "Failed to acquire lock: {msg}"),
        }
    }
}

impl Error for LockError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LockError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type HashResult<T> = std::result::Result<T, HashError>;
pub type LockResult<T> = std::result::Result<T, LockError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_hash_error_display_and_source() {
        let io_error = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        let error = HashError::ReadFailed { source: io_error };
        assert_eq!(
            error.to_string(),
            "Failed to read stream while hashing: short read"
        );
        assert!(error.source().is_some());
    }

    #[test]
    fn test_lock_error_display_and_source() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
        let io_variant = LockError::Io {
            path: PathBuf::from("/locks/pkg.lock"),
            source: io_error,
        };
        assert_eq!(
            io_variant.to_string(),
            "Failed to open lock file `/locks/pkg.lock`: permission denied"
        );
        assert!(io_variant.source().is_some());

        let acquire_variant = LockError::AcquireFailed("busy".to_string());
        assert_eq!(
            acquire_variant.to_string(),
            "Failed to acquire lock: busy"
        );
        assert!(acquire_variant.source().is_none());
    }
}
