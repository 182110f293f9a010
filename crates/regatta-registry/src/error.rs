use std::io;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] regatta_cache::CacheError),

    #[error("Unable to hash artifact `{name}`")]
    #[diagnostic(code(regatta_registry::hash))]
    Hash {
        name: String,
        #[source]
        source: regatta_utils::error::HashError,
    },

    #[error("Download of `{name}` failed")]
    #[diagnostic(
        code(regatta_registry::download),
        help("The partial file is discarded; the download is retried on the next request")
    )]
    Download {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Archive for `{uuid}` at `{reference}` is unavailable")]
    #[diagnostic(code(regatta_registry::archive_unavailable))]
    ArchiveUnavailable { uuid: String, reference: String },

    #[error("Artifact `{name}` is not in the store")]
    #[diagnostic(code(regatta_registry::artifact_missing))]
    ArtifactMissing { name: String },
}

pub type Result<T> = std::result::Result<T, RegistryError>;
