use std::{fs, path::Path, time::Duration};

use regatta_provider::Connection;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ConfigError, Result};

const DEFAULT_ARTIFACT_DIR: &str = "/tmp";
const DEFAULT_UPSTREAM_NPM: &str = "https://registry.npmjs.org";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;

/// Application's configuration.
///
/// Every setting can come from `config.toml` or be overridden by its
/// environment variable; the environment wins.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Base URL of the GitLab host.
    /// Env: GITLAB_URL
    pub gitlab_url: Option<String>,

    /// Project holding the catalog index file, as `group/project` or id.
    /// Env: GITLAB_REPO_NAME
    pub index_project: Option<String>,

    /// Path of the index file inside the index project.
    /// Env: GITLAB_REPO_FILE
    pub index_file: Option<String>,

    /// Key under which index entries store the clone URL for this host.
    /// Env: GITLAB_FILE_NAMESPACE
    pub namespace_key: Option<String>,

    /// Directory for downloaded npm tarballs.
    /// Env: NPM_CACHE_DIR
    /// Default: /tmp
    pub artifact_dir: Option<String>,

    /// Public base URL used in generated download links. When unset, the
    /// transport derives it from the incoming request.
    /// Env: NODE_PUBLIC_HOST
    pub public_host: Option<String>,

    /// Upstream npm registry for names this gateway does not host.
    /// Default: https://registry.npmjs.org
    pub upstream_npm_registry: Option<String>,

    /// Per-request timeout towards GitLab, in seconds.
    /// Default: 30
    pub request_timeout_secs: Option<u64>,

    /// Lifetime of the in-memory memoization store, in seconds.
    /// Default: 86400
    pub cache_ttl_secs: Option<u64>,
}

impl Config {
    /// Loads configuration from a TOML file, then applies environment
    /// overrides. A missing file is not an error; the environment alone can
    /// carry a full configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut config = if path.is_file() {
            let raw = fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            debug!("no config file at {}, using environment", path.display());
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        env_override(&mut self.gitlab_url, "GITLAB_URL");
        env_override(&mut self.index_project, "GITLAB_REPO_NAME");
        env_override(&mut self.index_file, "GITLAB_REPO_FILE");
        env_override(&mut self.namespace_key, "GITLAB_FILE_NAMESPACE");
        env_override(&mut self.artifact_dir, "NPM_CACHE_DIR");
        env_override(&mut self.public_host, "NODE_PUBLIC_HOST");
    }

    pub fn artifact_dir(&self) -> &str {
        self.artifact_dir.as_deref().unwrap_or(DEFAULT_ARTIFACT_DIR)
    }

    pub fn public_host(&self) -> Option<&str> {
        self.public_host.as_deref()
    }

    pub fn upstream_npm_registry(&self) -> &str {
        self.upstream_npm_registry
            .as_deref()
            .unwrap_or(DEFAULT_UPSTREAM_NPM)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS))
    }

    /// Builds the provider connection for one request, carrying the caller's
    /// credential. Fails if any required setting is absent.
    pub fn connection(&self, token: Option<String>) -> Result<Connection> {
        Ok(Connection {
            base_url: self.required(&self.gitlab_url, "gitlab_url")?,
            token,
            index_project: self.required(&self.index_project, "index_project")?,
            index_file: self.required(&self.index_file, "index_file")?,
            namespace_key: self.required(&self.namespace_key, "namespace_key")?,
            timeout: Some(self.request_timeout()),
        })
    }

    fn required(&self, value: &Option<String>, name: &'static str) -> Result<String> {
        value
            .clone()
            .ok_or(ConfigError::MissingSetting(name))
    }
}

fn env_override(field: &mut Option<String>, var: &str) {
    if let Ok(value) = std::env::var(var) {
        if !value.is_empty() {
            *field = Some(value);
        }
    }
}
