//! Ecosystem translators for the regatta registry gateway.
//!
//! Two translators sit on top of the catalog provider: Composer gets a
//! `packages.json` catalog with pass-through downloads, npm gets per-package
//! documents backed by a local tarball store so a `shasum` can be published
//! for every version.

pub mod composer;
pub mod error;
pub mod npm;

pub use composer::ComposerRegistry;
pub use error::{RegistryError, Result};
pub use npm::{upstream_operation_url, NpmRegistry, PackageRequest};
