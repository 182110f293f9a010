use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ProviderError {
    #[error(transparent)]
    #[diagnostic(
        code(regatta_provider::network),
        help("Check your network connection and the GitLab base URL")
    )]
    Network(#[from] Box<ureq::Error>),

    #[error("HTTP {status}: {url}")]
    #[diagnostic(code(regatta_provider::http_status))]
    HttpStatus { status: u16, url: String },

    #[error("Invalid response from server")]
    #[diagnostic(code(regatta_provider::invalid_response))]
    InvalidResponse,

    #[error(transparent)]
    #[diagnostic(
        code(regatta_provider::json),
        help("The remote file may be corrupted or in an unexpected format")
    )]
    Json(#[from] serde_json::Error),

    #[error("Manifest at ref `{reference}` is not a JSON object")]
    #[diagnostic(code(regatta_provider::manifest_shape))]
    ManifestShape { reference: String },

    #[error("Repository `{uuid}` has no remote under namespace key `{key}`")]
    #[diagnostic(
        code(regatta_provider::missing_remote),
        help("Each index entry must carry a clone URL under the configured namespace key")
    )]
    MissingRemote { uuid: String, key: String },
}

pub type Result<T> = std::result::Result<T, ProviderError>;

impl From<ureq::Error> for ProviderError {
    fn from(e: ureq::Error) -> Self {
        Self::Network(Box::new(e))
    }
}
