//! Catalog orchestration over the GitLab client.
//!
//! The provider reads the index file from a dedicated GitLab project, turns
//! its entries into [`Repo`] values and enriches each one with refs and
//! per-ref manifest metadata. Enrichment fans out across repositories and
//! refs with rayon; a failing repository is dropped from the listing and a
//! failing ref is dropped from the repository, so one broken entry never
//! takes the catalog down.
//!
//! Ref listings and manifests are memoized. The resolved project itself is
//! never cached: its `last_activity_at` timestamp is part of every derived
//! cache key, which is what expires stale entries.

use std::{io::Read, sync::Arc, time::Duration};

use rayon::prelude::*;
use regatta_cache::MemoCache;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    cache_key::CacheKey,
    client::{ClientConfig, GitRef, GitlabClient, Project},
    error::{ProviderError, Result},
    repo::{PackageKind, Repo, RepoEntry},
};

const DEFAULT_INDEX_BRANCH: &str = "master";

/// Streaming archive body handed through to the HTTP layer serving it.
pub type ArchiveReader = Box<dyn Read + Send + 'static>;

/// Where and how to reach the catalog source.
#[derive(Clone, Debug)]
pub struct Connection {
    /// GitLab base URL, e.g. `https://gitlab.example.com`.
    pub base_url: String,
    /// Token relayed to GitLab as `PRIVATE-TOKEN`, if any.
    pub token: Option<String>,
    /// Project holding the index file, as `group/project` or a numeric id.
    pub index_project: String,
    /// Path of the index file inside the index project.
    pub index_file: String,
    /// Key under which index entries store their clone URL for this host.
    pub namespace_key: String,
    /// Global request timeout.
    pub timeout: Option<Duration>,
}

#[derive(Debug)]
enum RefKind {
    Tags,
    Branches,
}

impl RefKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Tags => "tags",
            Self::Branches => "branches",
        }
    }
}

pub struct CatalogProvider {
    client: GitlabClient,
    kind: PackageKind,
    manifest_file: String,
    index_project: String,
    index_file: String,
    namespace_key: String,
    cache: Arc<MemoCache>,
}

impl CatalogProvider {
    pub fn new(
        connection: &Connection,
        kind: PackageKind,
        manifest_file: impl Into<String>,
        cache: Arc<MemoCache>,
    ) -> Self {
        let config = ClientConfig::new(connection.base_url.clone())
            .with_token(connection.token.clone())
            .with_timeout(connection.timeout);

        Self {
            client: GitlabClient::new(&config),
            kind,
            manifest_file: manifest_file.into(),
            index_project: connection.index_project.clone(),
            index_file: connection.index_file.clone(),
            namespace_key: connection.namespace_key.clone(),
            cache,
        }
    }

    /// Lists the catalog, fully enriched.
    ///
    /// Never fails: an unreadable index yields an empty list and a repository
    /// that cannot be enriched is dropped, both with a warning.
    pub fn repo_list(&self) -> Vec<Repo> {
        let repos = match self.index_repos() {
            Ok(repos) => repos,
            Err(err) => {
                warn!("unable to read catalog index: {err}");
                return Vec::new();
            }
        };

        repos
            .into_par_iter()
            .filter_map(|mut repo| match self.fill_refs(&mut repo) {
                Ok(()) => Some(repo),
                Err(err) => {
                    warn!(uuid = repo.uuid(), "dropping repository: {err}");
                    None
                }
            })
            .collect()
    }

    /// Streams the archive for a revision of the repository identified by
    /// `uuid`, or `None` when the uuid is unknown or GitLab refuses.
    pub fn archive(&self, uuid: &str, reference: &str) -> Option<ArchiveReader> {
        let repos = match self.index_repos() {
            Ok(repos) => repos,
            Err(err) => {
                warn!("unable to read catalog index: {err}");
                return None;
            }
        };

        let repo = repos.iter().find(|repo| repo.uuid() == uuid)?;
        let namespace = repo.namespace()?;

        let project = match self.client.project(&namespace) {
            Ok(project) => project,
            Err(err) => {
                warn!(uuid, "unable to resolve project for archive: {err}");
                return None;
            }
        };

        match self
            .client
            .archive(project.id, reference, self.kind.archive_format())
        {
            Ok(reader) => Some(reader),
            Err(err) => {
                warn!(uuid, reference, "unable to fetch archive: {err}");
                None
            }
        }
    }

    /// Reads and parses the index file, keeping only entries that carry a
    /// uuid and are tagged for this provider's ecosystem.
    fn index_repos(&self) -> Result<Vec<Repo>> {
        let project = self.client.project(&self.index_project)?;
        let branch = project
            .default_branch
            .as_deref()
            .unwrap_or(DEFAULT_INDEX_BRANCH);

        let bytes = self.client.file_raw(project.id, &self.index_file, branch)?;
        let entries: Vec<RepoEntry> = serde_json::from_slice(&bytes)?;

        Ok(select_repos(entries, self.kind, &self.namespace_key))
    }

    /// Enriches one repository: resolves its project, loads tags and
    /// branches, and attaches manifest metadata per ref. Refs whose manifest
    /// cannot be fetched or parsed are skipped individually.
    fn fill_refs(&self, repo: &mut Repo) -> Result<()> {
        let namespace = repo.namespace().ok_or_else(|| {
            ProviderError::MissingRemote {
                uuid: repo.uuid().to_string(),
                key: self.namespace_key.clone(),
            }
        })?;

        let project = self.client.project(&namespace)?;

        let (tags, branches) = rayon::join(
            || self.cached_refs(RefKind::Tags, &project),
            || self.cached_refs(RefKind::Branches, &project),
        );
        repo.add_tags(tags?);
        repo.add_branches(branches?);

        let manifests: Vec<(GitRef, Map<String, Value>)> = repo
            .refs()
            .par_iter()
            .filter_map(|reference| match self.cached_manifest(&project, reference) {
                Ok(manifest) => Some((reference.clone(), manifest)),
                Err(err) => {
                    debug!(
                        project = project.path_with_namespace,
                        reference = reference.name,
                        "skipping ref without manifest: {err}"
                    );
                    None
                }
            })
            .collect();

        for (reference, manifest) in manifests {
            repo.set_ref_metadata(&reference, manifest);
        }

        repo.set_project(project);
        Ok(())
    }

    fn cached_refs(&self, kind: RefKind, project: &Project) -> Result<Vec<GitRef>> {
        let key = CacheKey::new(self.client.base_url(), kind.label())
            .push(&project.path_with_namespace)
            .push(&project.last_activity_at)
            .encode();

        if let Some(value) = self.cache.get(&key) {
            return Ok(serde_json::from_value(value)?);
        }

        let refs = match kind {
            RefKind::Tags => self.client.tags(project.id)?,
            RefKind::Branches => self.client.branches(project.id)?,
        };

        self.cache.set(&key, serde_json::to_value(&refs)?);
        Ok(refs)
    }

    fn cached_manifest(&self, project: &Project, reference: &GitRef) -> Result<Map<String, Value>> {
        let key = CacheKey::new(self.client.base_url(), "manifest")
            .push(&project.path_with_namespace)
            .push(&project.last_activity_at)
            .push(&reference.commit.id)
            .push(&self.manifest_file)
            .encode();

        if let Some(value) = self.cache.get(&key) {
            return Ok(serde_json::from_value(value)?);
        }

        let bytes = self
            .client
            .file_raw(project.id, &self.manifest_file, &reference.commit.id)?;
        let parsed: Value = serde_json::from_slice(&bytes)?;

        let manifest = parsed
            .as_object()
            .cloned()
            .ok_or_else(|| {
                ProviderError::ManifestShape {
                    reference: reference.name.clone(),
                }
            })?;

        // only successful fetches are memoized; a transient failure stays
        // retryable within the cache window
        self.cache.set(&key, Value::Object(manifest.clone()));
        Ok(manifest)
    }
}

fn select_repos(entries: Vec<RepoEntry>, kind: PackageKind, namespace_key: &str) -> Vec<Repo> {
    entries
        .into_iter()
        .map(|entry| Repo::new(entry, namespace_key))
        .filter(|repo| repo.has_uuid() && repo.has_tag(kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_repos_filters_untagged_and_uuidless() {
        let entries: Vec<RepoEntry> = serde_json::from_str(
            r#"[
                {"uuid": "a", "tag": ["composer"], "main": "x"},
                {"uuid": "b", "tag": ["npm"], "main": "x"},
                {"uuid": "", "tag": ["composer"], "main": "x"},
                {"tag": ["composer"], "main": "x"},
                {"uuid": "c", "tag": null, "main": "x"},
                {"uuid": "d", "tag": ["composer", "npm"], "main": "x"}
            ]"#,
        )
        .unwrap();

        let composer = select_repos(entries.clone(), PackageKind::Composer, "main");
        let uuids: Vec<_> = composer.iter().map(Repo::uuid).collect();
        assert_eq!(uuids, vec!["a", "d"]);

        let npm = select_repos(entries, PackageKind::Npm, "main");
        let uuids: Vec<_> = npm.iter().map(Repo::uuid).collect();
        assert_eq!(uuids, vec!["b", "d"]);
    }

    #[test]
    fn test_ref_kind_labels() {
        assert_eq!(RefKind::Tags.label(), "tags");
        assert_eq!(RefKind::Branches.label(), "branches");
    }
}
