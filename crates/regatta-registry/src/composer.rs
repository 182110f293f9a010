//! Composer catalog translator.
//!
//! Produces the `packages.json` document Composer expects and streams
//! release archives straight from the source host. Composer verifies dists
//! against repository metadata itself, so nothing is persisted locally.

use std::sync::Arc;

use regatta_cache::MemoCache;
use regatta_provider::{ArchiveReader, CatalogProvider, Connection, PackageKind, Repo};
use serde_json::{json, Map, Value};

const MANIFEST_FILE: &str = "composer.json";

pub struct ComposerRegistry {
    provider: CatalogProvider,
}

impl ComposerRegistry {
    pub fn new(connection: &Connection, cache: Arc<MemoCache>) -> Self {
        Self {
            provider: CatalogProvider::new(
                connection,
                PackageKind::Composer,
                MANIFEST_FILE,
                cache,
            ),
        }
    }

    /// The full `packages.json` document.
    pub fn catalog(&self, public_host: &str) -> Value {
        json!({ "packages": self.package_list(public_host) })
    }

    /// Maps package name to its version descriptors, one entry per catalog
    /// repository.
    pub fn package_list(&self, public_host: &str) -> Map<String, Value> {
        let mut packages = Map::new();

        for repo in self.provider.repo_list() {
            packages.insert(
                repo.name().to_string(),
                Value::Object(repo_versions(&repo, public_host)),
            );
        }

        packages
    }

    /// Streams a release archive, uncached.
    pub fn package_archive(&self, uuid: &str, reference: &str) -> Option<ArchiveReader> {
        self.provider.archive(uuid, reference)
    }
}

/// Folds one repository's publishable refs into Composer version descriptors,
/// keyed by display name.
fn repo_versions(repo: &Repo, public_host: &str) -> Map<String, Value> {
    let mut versions = Map::new();

    for reference in repo.refs() {
        if !repo.has_ref_metadata(&reference.name) {
            continue;
        }
        let Some(metadata) = repo.ref_metadata(&reference.name) else {
            continue;
        };

        let display = repo.display_name(&reference.name);
        let download_url =
            repo.download_url(public_host, PackageKind::Composer, &reference.commit.id);

        let mut descriptor = Map::new();
        descriptor.insert(
            "name".into(),
            metadata.get("name").cloned().unwrap_or(Value::Null),
        );
        if let Some(kind) = metadata.get("type") {
            descriptor.insert("type".into(), kind.clone());
        }
        descriptor.insert("version".into(), json!(display));

        for field in ["extra", "require", "require-dev", "autoload", "config"] {
            descriptor.insert(
                field.into(),
                metadata.get(field).cloned().unwrap_or_else(|| json!({})),
            );
        }
        descriptor.insert(
            "bin".into(),
            metadata.get("bin").cloned().unwrap_or_else(|| json!([])),
        );
        descriptor.insert(
            "dist".into(),
            json!({ "url": download_url, "type": "zip" }),
        );

        versions.insert(display.to_string(), Value::Object(descriptor));
    }

    versions
}
