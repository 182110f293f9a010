//! Thin GitLab v4 API client.
//!
//! Only the handful of endpoints the catalog needs are wrapped: project
//! lookup, tag and branch listings, raw file reads and repository archives.
//! Responses with non-success statuses surface as
//! [`ProviderError::HttpStatus`] so callers can decide whether a failure
//! degrades a single repository or a single ref.

use std::{io::Read, time::Duration};

use percent_encoding::{percent_encode, NON_ALPHANUMERIC};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use ureq::Agent;

use crate::error::{ProviderError, Result};

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub user_agent: Option<String>,
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            user_agent: Some("regatta".into()),
            timeout: Some(Duration::from_secs(30)),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_agent(&self) -> Agent {
        let mut config = Agent::config_builder()
            .timeout_global(self.timeout)
            .http_status_as_error(false);

        if let Some(user_agent) = &self.user_agent {
            config = config.user_agent(user_agent);
        }

        config.build().into()
    }
}

/// A project as returned by `GET /api/v4/projects/:id`.
///
/// `last_activity_at` doubles as the cache discriminator for everything
/// derived from the project, so it is kept verbatim as a string.
#[derive(Clone, Debug, Deserialize)]
pub struct Project {
    pub id: u64,
    pub path_with_namespace: String,
    #[serde(default)]
    pub last_activity_at: String,
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// A tag or branch. Both GitLab listings share this shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GitRef {
    pub name: String,
    pub commit: Commit,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
}

pub struct GitlabClient {
    agent: Agent,
    base_url: String,
    token: Option<String>,
}

impl GitlabClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            agent: config.build_agent(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves a project by numeric id or URL-encoded full path.
    pub fn project(&self, path_or_id: &str) -> Result<Project> {
        let url = format!(
            "{}/api/v4/projects/{}",
            self.base_url,
            encode_path(path_or_id)
        );
        self.get_json(&url)
    }

    pub fn tags(&self, project_id: u64) -> Result<Vec<GitRef>> {
        let url = format!(
            "{}/api/v4/projects/{}/repository/tags",
            self.base_url, project_id
        );
        self.get_json(&url)
    }

    pub fn branches(&self, project_id: u64) -> Result<Vec<GitRef>> {
        let url = format!(
            "{}/api/v4/projects/{}/repository/branches",
            self.base_url, project_id
        );
        self.get_json(&url)
    }

    /// Reads a repository file at a given ref, raw.
    pub fn file_raw(&self, project_id: u64, file_path: &str, reference: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/api/v4/projects/{}/repository/files/{}/raw?ref={}",
            self.base_url,
            project_id,
            encode_path(file_path),
            encode_path(reference)
        );

        let mut resp = self.get(&url)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let mut bytes = Vec::new();
        resp.body_mut()
            .as_reader()
            .read_to_end(&mut bytes)
            .map_err(|_| ProviderError::InvalidResponse)?;

        Ok(bytes)
    }

    /// Streams a repository archive (`zip` or `tar.gz`) at a given revision.
    pub fn archive(
        &self,
        project_id: u64,
        reference: &str,
        format: &str,
    ) -> Result<Box<dyn Read + Send + 'static>> {
        let url = format!(
            "{}/api/v4/projects/{}/repository/archive.{}?sha={}",
            self.base_url,
            project_id,
            format,
            encode_path(reference)
        );

        let resp = self.get(&url)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        Ok(Box::new(resp.into_body().into_reader()))
    }

    fn get(&self, url: &str) -> Result<ureq::http::Response<ureq::Body>> {
        let mut req = self.agent.get(url);
        if let Some(token) = &self.token {
            req = req.header(TOKEN_HEADER, token);
        }
        Ok(req.call()?)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut resp = self.get(url)?;
        let status = resp.status();

        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        resp.body_mut()
            .read_json()
            .map_err(|_| ProviderError::InvalidResponse)
    }
}

fn encode_path(segment: &str) -> String {
    percent_encode(segment.as_bytes(), NON_ALPHANUMERIC).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_path_escapes_separators() {
        assert_eq!(encode_path("group/project"), "group%2Fproject");
        assert_eq!(encode_path("composer.json"), "composer%2Ejson");
        assert_eq!(encode_path("42"), "42");
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = GitlabClient::new(&ClientConfig::new("https://gitlab.example.com/"));
        assert_eq!(client.base_url(), "https://gitlab.example.com");
    }

    #[test]
    fn test_ref_listing_shape() {
        let refs: Vec<GitRef> = serde_json::from_str(
            r#"[
                {"name": "v1.0.0", "commit": {"id": "839df7b", "title": "release"}},
                {"name": "main", "commit": {"id": "f00ba44"}}
            ]"#,
        )
        .unwrap();

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].name, "v1.0.0");
        assert_eq!(refs[0].commit.id, "839df7b");
    }

    #[test]
    fn test_project_shape_tolerates_missing_fields() {
        let project: Project = serde_json::from_str(
            r#"{"id": 7, "path_with_namespace": "group/lib"}"#,
        )
        .unwrap();

        assert_eq!(project.id, 7);
        assert!(project.last_activity_at.is_empty());
        assert!(project.default_branch.is_none());
    }
}
