// src/source/system.rs

//! Package source backed by the package index, git and the local filesystem

use super::build::Builder;
use super::index::IndexClient;
use super::platform::Platform;
use super::{git, local, BuildArtifacts, PackageSource};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::package::{ContentIdentity, Origin, PackageDescriptor, PackageMetadata, PackageSpec};
use crate::state::InstalledRecord;
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

const METADATA_FILE: &str = "metadata.json";

/// Package source used by the command-line tool
///
/// Source checkouts live under `<state_dir>/pkg/<name>`, which is also what
/// dependent builds see through `OPI_DEPENDENCIES`.
#[derive(Debug)]
pub struct SystemSource {
    index: IndexClient,
    builder: Builder,
}

impl SystemSource {
    pub fn new(config: &Config, platform: Platform) -> Result<Self> {
        Ok(Self {
            index: IndexClient::new(&config.index_url)?,
            builder: Builder::new(platform, config.packages_dir()),
        })
    }

    pub fn platform(&self) -> &Platform {
        self.builder.platform()
    }

    /// Validate metadata and turn it into a descriptor
    fn descriptor(
        &self,
        spec: &PackageSpec,
        metadata: PackageMetadata,
        identity: Option<ContentIdentity>,
    ) -> Result<PackageDescriptor> {
        let name = spec.name.as_str();
        metadata.check_compatibility(name, self.platform().toolkit_version())?;
        metadata.build_steps(name)?;

        PackageDescriptor::from_metadata(spec.name.clone(), spec.origin.clone(), metadata, identity)
    }

    async fn describe_index(&self, spec: &PackageSpec) -> Result<PackageDescriptor> {
        let metadata = self.index.metadata(&spec.name).await?;
        let repo = index_repo(spec, &metadata)?;

        let identity = git::remote_head(&repo, None)
            .await
            .map_err(|cause| fetch_failed(spec, cause))?;

        self.descriptor(spec, metadata, identity)
    }

    async fn describe_git(&self, spec: &PackageSpec, url: &str, reference: Option<&str>) -> Result<PackageDescriptor> {
        // Resolution must not move an installed checkout
        let dir = self.builder.source_dir(spec.name.as_str());
        let (identity, content) = git::inspect(&dir, url, reference, METADATA_FILE)
            .await
            .map_err(|cause| fetch_failed(spec, cause))?;

        let metadata = match content {
            Some(content) => PackageMetadata::from_json(&content)?,
            None => PackageMetadata::default(),
        };
        self.descriptor(spec, metadata, Some(identity))
    }

    fn describe_local(&self, spec: &PackageSpec, path: &Path) -> Result<PackageDescriptor> {
        if !path.is_dir() {
            return Err(Error::PackageNotFound {
                name: format!("{} ({} is not a directory)", spec.name, path.display()),
            });
        }

        let metadata = PackageMetadata::from_file(&path.join(METADATA_FILE))?;
        self.descriptor(spec, metadata, None)
    }
}

fn fetch_failed(spec: &PackageSpec, cause: String) -> Error {
    Error::FetchFailed {
        package: spec.name.to_string(),
        cause,
    }
}

fn index_repo(spec: &PackageSpec, metadata: &PackageMetadata) -> Result<String> {
    metadata
        .repo
        .clone()
        .ok_or_else(|| fetch_failed(spec, "index entry has no repository".to_string()))
}

#[async_trait]
impl PackageSource for SystemSource {
    async fn describe(&self, spec: &PackageSpec) -> Result<PackageDescriptor> {
        debug!("Describing {}", spec);
        match &spec.origin {
            Origin::Index => self.describe_index(spec).await,
            Origin::Git { url, reference } => self.describe_git(spec, url.as_str(), reference.as_deref()).await,
            Origin::Local(path) => self.describe_local(spec, path),
        }
    }

    async fn fetch(&self, descriptor: &PackageDescriptor) -> Result<Option<ContentIdentity>> {
        let spec = PackageSpec::new(descriptor.name.clone(), descriptor.origin.clone());
        let dir = self.builder.source_dir(descriptor.name.as_str());

        match &descriptor.origin {
            Origin::Index => {
                info!("Downloading {}", descriptor.name);
                let repo = index_repo(&spec, &descriptor.metadata)?;
                let identity = git::checkout(&dir, &repo, None)
                    .await
                    .map_err(|cause| fetch_failed(&spec, cause))?;
                Ok(Some(identity))
            }
            Origin::Git { url, reference } => {
                info!("Downloading {}", descriptor);
                let identity = git::checkout(&dir, url.as_str(), reference.as_deref())
                    .await
                    .map_err(|cause| fetch_failed(&spec, cause))?;
                Ok(Some(identity))
            }
            Origin::Local(path) => {
                info!("Copying {} from {}", descriptor.name, path.display());
                let (src, dest) = (path.clone(), dir.clone());
                tokio::task::spawn_blocking(move || local::copy_tree(&src, &dest))
                    .await
                    .map_err(|e| fetch_failed(&spec, e.to_string()))?
                    .map_err(|e| fetch_failed(&spec, format!("failed to copy {}: {}", path.display(), e)))?;
                Ok(None)
            }
        }
    }

    async fn build(&self, descriptor: &PackageDescriptor) -> Result<BuildArtifacts> {
        self.builder.build(descriptor).await
    }

    async fn remove_artifacts(&self, record: &InstalledRecord, keep_sources: bool) -> Result<()> {
        self.builder.remove_artifacts(record, keep_sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageName;
    use std::fs;

    fn setup() -> (tempfile::TempDir, SystemSource) {
        let dir = tempfile::tempdir().unwrap();
        let platform = Platform::new(dir.path().join("platform"), 2406);
        let config = Config::new(platform.root().join("foampm"));
        let source = SystemSource::new(&config, platform).unwrap();
        (dir, source)
    }

    fn local_spec(name: &str, path: &Path) -> PackageSpec {
        PackageSpec::new(PackageName::new(name).unwrap(), Origin::Local(path.to_path_buf()))
    }

    #[tokio::test]
    async fn test_describe_local() {
        let (dir, source) = setup();
        let pkg = dir.path().join("demo");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(
            pkg.join(METADATA_FILE),
            r#"{"requires": ["core"], "version": [">=2306"], "build": ["./Allwmake"]}"#,
        )
        .unwrap();

        let descriptor = source.describe(&local_spec("demo", &pkg)).await.unwrap();
        assert_eq!(descriptor.dependencies, vec![PackageName::new("core").unwrap()]);
        assert!(descriptor.identity.is_none());
    }

    #[tokio::test]
    async fn test_describe_local_without_metadata() {
        let (dir, source) = setup();
        let pkg = dir.path().join("plain");
        fs::create_dir_all(&pkg).unwrap();

        let descriptor = source.describe(&local_spec("plain", &pkg)).await.unwrap();
        assert!(descriptor.dependencies.is_empty());
    }

    #[tokio::test]
    async fn test_describe_local_incompatible() {
        let (dir, source) = setup();
        let pkg = dir.path().join("old");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join(METADATA_FILE), r#"{"version": ["<2000"]}"#).unwrap();

        let err = source.describe(&local_spec("old", &pkg)).await.unwrap_err();
        assert!(matches!(err, Error::Incompatible { .. }));
    }

    #[tokio::test]
    async fn test_describe_missing_directory() {
        let (dir, source) = setup();
        let err = source
            .describe(&local_spec("gone", &dir.path().join("gone")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PackageNotFound { .. }));
    }

    #[tokio::test]
    async fn test_fetch_local_copies_sources() {
        let (dir, source) = setup();
        let pkg = dir.path().join("demo");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("Allwmake"), "#!/bin/sh").unwrap();

        let descriptor = source.describe(&local_spec("demo", &pkg)).await.unwrap();
        assert_eq!(source.fetch(&descriptor).await.unwrap(), None);
        assert!(source.builder.source_dir("demo").join("Allwmake").exists());
    }
}
