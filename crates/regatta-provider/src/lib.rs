//! GitLab catalog provider for the regatta registry gateway.
//!
//! This crate turns a GitLab host into a package catalog source:
//! an index project holds a JSON file listing repositories, and each listed
//! repository contributes versions derived from its tags, branches and
//! per-revision manifest files.
//!
//! The expensive remote reads (ref listings, manifest files) are memoized in
//! a shared [`regatta_cache::MemoCache`]; project resolution itself is never
//! cached because its activity timestamp is what keys everything else.

pub mod cache_key;
pub mod client;
pub mod error;
pub mod provider;
pub mod repo;

pub use cache_key::CacheKey;
pub use client::{ClientConfig, Commit, GitRef, GitlabClient, Project};
pub use error::{ProviderError, Result};
pub use provider::{ArchiveReader, CatalogProvider, Connection};
pub use repo::{PackageKind, Repo, RepoEntry, UNKNOWN_NAME};
