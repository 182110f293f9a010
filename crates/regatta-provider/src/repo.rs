//! Catalog repository model.
//!
//! A [`Repo`] starts as a bare index entry and is enriched in place with the
//! resolved GitLab project, its refs, and a metadata object per ref built
//! from the ref itself overlaid with the manifest found at that revision.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::client::{GitRef, Project};

/// Display name used when no ref carries a usable manifest name.
pub const UNKNOWN_NAME: &str = "__unknown__";

/// One entry of the catalog index file.
///
/// Unknown keys are kept as the per-namespace clone URL map; the index format
/// mixes well-known fields (`uuid`, `tag`) with arbitrary host keys.
#[derive(Clone, Debug, Deserialize)]
pub struct RepoEntry {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub tag: Option<Vec<String>>,
    #[serde(flatten)]
    pub urls: HashMap<String, Value>,
}

/// Package ecosystems the gateway serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackageKind {
    Composer,
    Npm,
}

impl PackageKind {
    /// Path segment used in download URLs and ecosystem tag matching.
    pub fn segment(&self) -> &'static str {
        match self {
            Self::Composer => "composer",
            Self::Npm => "npm",
        }
    }

    /// Archive extension served for this ecosystem.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Composer => "zip",
            Self::Npm => "tgz",
        }
    }

    /// Archive format requested from GitLab.
    pub fn archive_format(&self) -> &'static str {
        match self {
            Self::Composer => "zip",
            Self::Npm => "tar.gz",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Repo {
    entry: RepoEntry,
    namespace_key: String,
    project: Option<Project>,
    refs: Vec<GitRef>,
    display: HashMap<String, String>,
    metadata: HashMap<String, Map<String, Value>>,
}

impl Repo {
    pub fn new(entry: RepoEntry, namespace_key: impl Into<String>) -> Self {
        Self {
            entry,
            namespace_key: namespace_key.into(),
            project: None,
            refs: Vec::new(),
            display: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn uuid(&self) -> &str {
        &self.entry.uuid
    }

    pub fn has_uuid(&self) -> bool {
        !self.entry.uuid.is_empty()
    }

    /// Whether the index entry is tagged for the given ecosystem.
    pub fn has_tag(&self, kind: PackageKind) -> bool {
        self.entry
            .tag
            .as_ref()
            .is_some_and(|tags| tags.iter().any(|t| t == kind.segment()))
    }

    /// Extracts `group/project` from the clone URL stored under this repo's
    /// namespace key. Handles https URLs, scp-like `git@host:path` addresses
    /// and bare paths alike; a trailing `.git` is stripped in every form.
    pub fn namespace(&self) -> Option<String> {
        let raw = self.entry.urls.get(&self.namespace_key)?.as_str()?;

        let path = match Url::parse(raw) {
            Ok(url) => url.path().to_string(),
            Err(_) => match raw.split_once(':') {
                Some((head, tail)) if head.contains('@') => tail.to_string(),
                _ => raw.to_string(),
            },
        };

        let path = path.trim_start_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);

        if path.is_empty() {
            None
        } else {
            Some(path.to_string())
        }
    }

    pub fn set_project(&mut self, project: Project) {
        self.project = Some(project);
    }

    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    /// Adds tag refs. Refs with `/` in the name never enter the version set.
    pub fn add_tags(&mut self, tags: Vec<GitRef>) {
        self.refs
            .extend(tags.into_iter().filter(|r| Self::is_ref_valid(&r.name)));
    }

    /// Adds branch refs, registering the `dev-` display alias for each.
    pub fn add_branches(&mut self, branches: Vec<GitRef>) {
        for branch in branches {
            if !Self::is_ref_valid(&branch.name) {
                continue;
            }
            self.display
                .insert(branch.name.clone(), format!("dev-{}", branch.name));
            self.refs.push(branch);
        }
    }

    pub fn refs(&self) -> &[GitRef] {
        &self.refs
    }

    fn is_ref_valid(name: &str) -> bool {
        !name.contains('/')
    }

    /// Records the metadata object for a ref: the ref definition overlaid
    /// with the manifest, manifest fields winning on conflict.
    pub fn set_ref_metadata(&mut self, reference: &GitRef, manifest: Map<String, Value>) {
        let mut merged = Map::new();
        merged.insert("name".into(), Value::String(reference.name.clone()));
        merged.insert(
            "commit".into(),
            serde_json::json!({ "id": reference.commit.id }),
        );

        for (key, value) in manifest {
            merged.insert(key, value);
        }

        self.metadata.insert(reference.name.clone(), merged);
    }

    pub fn ref_metadata(&self, name: &str) -> Option<&Map<String, Value>> {
        self.metadata.get(name)
    }

    /// A ref is publishable only when its manifest carried a non-empty name.
    pub fn has_ref_metadata(&self, name: &str) -> bool {
        self.metadata
            .get(name)
            .and_then(|meta| meta.get("name"))
            .and_then(Value::as_str)
            .is_some_and(|n| !n.is_empty())
    }

    /// The name a ref is published under: `dev-<branch>` for branches,
    /// the ref name itself for tags.
    pub fn display_name<'a>(&'a self, reference: &'a str) -> &'a str {
        self.display
            .get(reference)
            .map(String::as_str)
            .unwrap_or(reference)
    }

    /// The package name, taken from the `master` ref's manifest.
    pub fn name(&self) -> &str {
        self.metadata
            .get("master")
            .and_then(|meta| meta.get("name"))
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_NAME)
    }

    /// Gateway-relative download URL for a revision of this repo.
    pub fn download_url(&self, public_host: &str, kind: PackageKind, commit_id: &str) -> String {
        format!(
            "{}/{}/{}/{}.{}",
            public_host.trim_end_matches('/'),
            kind.segment(),
            self.entry.uuid,
            commit_id,
            kind.extension()
        )
    }
}
