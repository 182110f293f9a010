use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(regatta_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(regatta_config::io))]
    IoError(#[from] std::io::Error),

    #[error("Missing required setting: {0}")]
    #[diagnostic(
        code(regatta_config::missing_setting),
        help("Set it in config.toml or through the matching environment variable")
    )]
    MissingSetting(&'static str),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
