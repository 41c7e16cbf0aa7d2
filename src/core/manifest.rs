//! Product manifest.
//!
//! Describes what a product deployment consists of: per version, an ordered
//! list of services with their resolved versions. Value objects are built once
//! per deployment request and read-only thereafter.

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::local_files::{FileSystem, LocalFs};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVersion {
    #[serde(default)]
    pub version: Option<String>,
    pub services: Vec<Service>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductManifest {
    pub name: String,
    /// Environment a candidate release must already have reached.
    #[serde(default)]
    pub prereq_environment: Option<String>,
    pub versions: Vec<ProductVersion>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub products: Vec<ProductManifest>,
}

/// Where product manifests come from.
pub trait ManifestSource {
    /// The manifest for `product`, narrowed to `version`. `None` when either
    /// the product or the version is absent; an expected outcome, not an
    /// error.
    fn manifest(&self, product: &str, version: Option<&str>) -> Result<Option<ProductManifest>>;
}

/// Manifest source backed by a JSON file (default `manifest.json` in the
/// working directory).
pub struct JsonFileManifestSource<F: FileSystem = LocalFs> {
    fs: F,
    path: PathBuf,
}

impl JsonFileManifestSource<LocalFs> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            fs: LocalFs::new(),
            path,
        }
    }
}

impl<F: FileSystem> JsonFileManifestSource<F> {
    pub fn with_fs(fs: F, path: PathBuf) -> Self {
        Self { fs, path }
    }

    fn load(&self) -> Result<Manifest> {
        if !self.fs.exists(&self.path) {
            return Err(Error::manifest_not_found(self.path.display().to_string()));
        }

        let content = self.fs.read(&self.path)?;
        serde_json::from_str(&content).map_err(|e| Error::manifest_invalid(e.to_string()))
    }
}

impl<F: FileSystem> ManifestSource for JsonFileManifestSource<F> {
    fn manifest(&self, product: &str, version: Option<&str>) -> Result<Option<ProductManifest>> {
        let manifest = self.load()?;

        let Some(product_manifest) = manifest
            .products
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(product))
        else {
            return Ok(None);
        };

        let versions: Vec<ProductVersion> = product_manifest
            .versions
            .into_iter()
            .filter(|v| v.version.as_deref() == version)
            .collect();

        if versions.is_empty() {
            return Ok(None);
        }

        Ok(Some(ProductManifest {
            name: product_manifest.name,
            prereq_environment: product_manifest.prereq_environment,
            versions,
        }))
    }
}
