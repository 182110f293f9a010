//! npm catalog translator.
//!
//! Synthesizes the package document npm expects for scoped packages hosted
//! in the catalog. Unlike Composer, npm requires a `shasum` integrity value
//! per version, so tarballs are downloaded into the artifact store on demand
//! and hashed from the committed file. Names outside the catalog are the
//! upstream registry's business; [`PackageRequest::resolve`] makes that call.

use std::{fs::File, io, sync::Arc};

use regatta_cache::{ArtifactStore, MemoCache};
use regatta_provider::{ArchiveReader, CatalogProvider, Connection, PackageKind, Repo};
use regatta_utils::hash::sha1_hex;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{RegistryError, Result};

const MANIFEST_FILE: &str = "package.json";

/// Routing decision for an npm metadata request.
///
/// The gateway only ever hosts scoped packages. An unscoped name goes
/// upstream without a catalog lookup; a scoped name is looked up by the part
/// after the scope, and falls back to the same upstream URL on a miss.
#[derive(Debug, PartialEq, Eq)]
pub enum PackageRequest {
    Local { name: String, upstream_url: String },
    Upstream { url: String },
}

impl PackageRequest {
    pub fn resolve(full_name: &str, upstream_host: &str) -> Self {
        let upstream_url = format!("{}/{}", upstream_host.trim_end_matches('/'), full_name);

        if !full_name.contains('@') {
            return Self::Upstream { url: upstream_url };
        }

        let name = full_name
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(full_name);

        Self::Local {
            name: name.to_string(),
            upstream_url,
        }
    }
}

/// Upstream URL for the reserved `/-/` operational paths (search, publish).
/// The gateway is read-only for those, so they always go upstream.
pub fn upstream_operation_url(upstream_host: &str, rest: &str) -> String {
    format!("{}/-/{}", upstream_host.trim_end_matches('/'), rest)
}

pub struct NpmRegistry {
    provider: CatalogProvider,
    store: Arc<ArtifactStore>,
}

impl NpmRegistry {
    pub fn new(
        connection: &Connection,
        cache: Arc<MemoCache>,
        store: Arc<ArtifactStore>,
    ) -> Self {
        Self {
            provider: CatalogProvider::new(connection, PackageKind::Npm, MANIFEST_FILE, cache),
            store,
        }
    }

    /// Builds the package document for `name`, or `None` when no catalog
    /// repository publishes under that name (the caller redirects upstream).
    ///
    /// A version whose tarball cannot be fetched or hashed is dropped from
    /// the document; the remaining versions are unaffected.
    pub fn package_document(&self, public_host: &str, name: &str) -> Option<Value> {
        let repos = self.provider.repo_list();
        let repo = repos.iter().find(|repo| repo.name() == name)?;

        Some(self.format_document(public_host, repo))
    }

    /// Serves a previously downloaded tarball from the artifact store.
    pub fn package_archive(&self, uuid: &str, reference: &str) -> Option<File> {
        self.store.open_read(&artifact_name(uuid, reference))
    }

    fn format_document(&self, public_host: &str, repo: &Repo) -> Value {
        let mut dist_tags = Map::new();
        let mut versions = Map::new();
        let mut description = String::new();

        for reference in repo.refs() {
            if !repo.has_ref_metadata(&reference.name) {
                debug!(reference = reference.name, "skipping ref without metadata");
                continue;
            }
            let Some(metadata) = repo.ref_metadata(&reference.name) else {
                continue;
            };

            let shown = repo.display_name(&reference.name);
            let Some(version) = derive_version(shown) else {
                debug!(shown, "skipping ref with non-semver display name");
                continue;
            };

            let commit_id = reference.commit.id.as_str();
            let file_name = artifact_name(repo.uuid(), commit_id);

            let shasum = match self.cached_shasum(repo.uuid(), commit_id, &file_name) {
                Ok(shasum) => shasum,
                Err(err) => {
                    debug!(file_name, "dropping version: {err}");
                    continue;
                }
            };

            if description.is_empty() {
                if let Some(text) = metadata.get("description").and_then(Value::as_str) {
                    description = text.to_string();
                }
            }

            let tarball = repo.download_url(public_host, PackageKind::Npm, commit_id);
            let mut descriptor = Map::new();
            descriptor.insert(
                "name".into(),
                metadata.get("name").cloned().unwrap_or(Value::Null),
            );
            descriptor.insert("version".into(), json!(version));
            descriptor.insert(
                "main".into(),
                metadata.get("main").cloned().unwrap_or_else(|| json!("")),
            );
            for field in ["scripts", "dependencies", "devDependencies", "bin"] {
                descriptor.insert(
                    field.into(),
                    metadata.get(field).cloned().unwrap_or_else(|| json!({})),
                );
            }
            descriptor.insert(
                "dist".into(),
                json!({ "tarball": tarball, "shasum": shasum }),
            );

            dist_tags.insert(version.clone(), json!(version));
            versions.insert(version, Value::Object(descriptor));
        }

        json!({
            "name": repo.name(),
            "private": true,
            "description": description,
            "license": "UNLICENSED",
            "dist-tags": dist_tags,
            "versions": versions,
        })
    }

    /// Downloads the tarball into the store if absent, then hashes the
    /// committed file. The hash always runs over a fully written artifact.
    fn cached_shasum(&self, uuid: &str, commit_id: &str, file_name: &str) -> Result<String> {
        ensure_cached(&self.store, file_name, || {
            self.provider.archive(uuid, commit_id).ok_or_else(|| {
                RegistryError::ArchiveUnavailable {
                    uuid: uuid.to_string(),
                    reference: commit_id.to_string(),
                }
            })
        })?;

        shasum(&self.store, file_name)
    }
}

pub(crate) fn artifact_name(uuid: &str, reference: &str) -> String {
    format!("{uuid}-{reference}.tgz")
}

/// Populates `name` in the store if absent, single-flight per key.
///
/// The per-key lock serializes concurrent misses: the first caller streams
/// the fetch into a partial file and commits it, late arrivals re-check under
/// the lock and find the committed artifact. A failed stream discards the
/// partial file, leaving the store without the entry.
fn ensure_cached<F>(store: &ArtifactStore, name: &str, fetch: F) -> Result<()>
where
    F: FnOnce() -> Result<ArchiveReader>,
{
    if store.exists(name) {
        return Ok(());
    }

    let _guard = store.lock(name)?;
    if store.exists(name) {
        return Ok(());
    }

    let mut reader = fetch()?;

    let mut writer = store.open_write(name)?;
    io::copy(&mut reader, &mut writer).map_err(|source| {
        RegistryError::Download {
            name: name.to_string(),
            source,
        }
    })?;
    writer.commit()?;

    debug!(name, "artifact cached");
    Ok(())
}

/// SHA-1 of a committed artifact, streamed.
fn shasum(store: &ArtifactStore, name: &str) -> Result<String> {
    let file = store.open_read(name).ok_or_else(|| {
        RegistryError::ArtifactMissing {
            name: name.to_string(),
        }
    })?;

    sha1_hex(file).map_err(|source| {
        RegistryError::Hash {
            name: name.to_string(),
            source,
        }
    })
}

/// Derives the published semantic version from a ref display name.
///
/// A leading `v` is dropped; a branch display name (`dev-<branch>`) becomes
/// `0.0.1-<branch>`. Anything that still fails semver validation yields
/// `None` and the ref is left out of the document.
fn derive_version(display: &str) -> Option<String> {
    let mut version = display.to_string();

    if version.starts_with('v') {
        version.remove(0);
    }
    if let Some(pos) = version.find("dev-") {
        version = format!("0.0.1-{}", &version[pos + 4..]);
    }

    semver::Version::parse(&version).ok()?;
    Some(version)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read, Write};

    use super::*;

    #[test]
    fn test_derive_version() {
        assert_eq!(derive_version("v1.2.3").as_deref(), Some("1.2.3"));
        assert_eq!(derive_version("1.2.3").as_deref(), Some("1.2.3"));
        assert_eq!(derive_version("dev-master").as_deref(), Some("0.0.1-master"));
        assert_eq!(
            derive_version("dev-feature-x").as_deref(),
            Some("0.0.1-feature-x")
        );
        assert_eq!(derive_version("v2.0"), None);
        assert_eq!(derive_version("notaversion"), None);
        assert_eq!(derive_version("dev-"), None);
    }

    #[test]
    fn test_request_resolution() {
        let upstream = "https://registry.npmjs.org";

        assert_eq!(
            PackageRequest::resolve("lodash", upstream),
            PackageRequest::Upstream {
                url: "https://registry.npmjs.org/lodash".to_string()
            }
        );

        assert_eq!(
            PackageRequest::resolve("@acme/widget", upstream),
            PackageRequest::Local {
                name: "widget".to_string(),
                upstream_url: "https://registry.npmjs.org/@acme/widget".to_string()
            }
        );
    }

    #[test]
    fn test_operation_paths_go_upstream() {
        assert_eq!(
            upstream_operation_url("https://registry.npmjs.org/", "v1/search?text=x"),
            "https://registry.npmjs.org/-/v1/search?text=x"
        );
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(artifact_name("u-1", "839df7b"), "u-1-839df7b.tgz");
    }

    #[test]
    fn test_ensure_cached_then_hash_matches_direct_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let payload = b"tarball bytes".to_vec();

        let bytes = payload.clone();
        ensure_cached(&store, "u-1-aaa.tgz", move || {
            Ok(Box::new(Cursor::new(bytes)) as ArchiveReader)
        })
        .unwrap();

        let cached = shasum(&store, "u-1-aaa.tgz").unwrap();
        let direct = sha1_hex(Cursor::new(payload)).unwrap();
        assert_eq!(cached, direct);
    }

    #[test]
    fn test_ensure_cached_skips_fetch_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();

        let mut writer = store.open_write("u-1-bbb.tgz").unwrap();
        writer.write_all(b"already here").unwrap();
        writer.commit().unwrap();

        ensure_cached(&store, "u-1-bbb.tgz", || {
            panic!("fetch must not run for a cached artifact")
        })
        .unwrap();

        let mut contents = String::new();
        store
            .open_read("u-1-bbb.tgz")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "already here");
    }

    #[test]
    fn test_failed_fetch_leaves_store_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();

        let result = ensure_cached(&store, "u-1-ccc.tgz", || {
            Err(RegistryError::ArchiveUnavailable {
                uuid: "u-1".to_string(),
                reference: "ccc".to_string(),
            })
        });
        assert!(matches!(
            result,
            Err(RegistryError::ArchiveUnavailable { .. })
        ));
        assert!(!store.exists("u-1-ccc.tgz"));
        assert!(matches!(
            shasum(&store, "u-1-ccc.tgz"),
            Err(RegistryError::ArtifactMissing { .. })
        ));
    }

    #[test]
    fn test_failed_stream_discards_partial_file() {
        struct BrokenReader;
        impl Read for BrokenReader {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("stream cut"))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();

        let result = ensure_cached(&store, "u-1-ddd.tgz", || {
            Ok(Box::new(BrokenReader) as ArchiveReader)
        });
        assert!(matches!(result, Err(RegistryError::Download { .. })));
        assert!(!store.exists("u-1-ddd.tgz"));
    }
}
