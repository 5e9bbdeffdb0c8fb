//! Artifact location
//!
//! Decides whether an archive is staged in object storage or referenced from
//! the local build directory.

use std::sync::Arc;

use scf_deploy_sdk::{ArtifactReference, ObjectStorage};

use super::archive::Archive;
use crate::error::{Error, Result};

/// Chooses between a remote bucket reference and a local archive path
#[derive(Clone)]
pub struct ArtifactResolver {
    bucket: Option<String>,
    storage: Option<Arc<dyn ObjectStorage>>,
}

impl ArtifactResolver {
    /// Keep archives local
    pub fn local() -> Self {
        Self {
            bucket: None,
            storage: None,
        }
    }

    /// Upload archives to `bucket`
    pub fn remote(bucket: impl Into<String>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            bucket: Some(bucket.into()),
            storage: Some(storage),
        }
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    pub async fn resolve(&self, archive: &Archive) -> Result<ArtifactReference> {
        let (Some(bucket), Some(storage)) = (self.bucket.as_deref(), self.storage.as_ref()) else {
            return Ok(ArtifactReference::Local {
                path: archive.path.clone(),
            });
        };

        storage
            .upload(bucket, &archive.name, archive.bytes.clone())
            .await
            .map_err(|source| Error::Upload {
                bucket: bucket.to_string(),
                key: archive.name.clone(),
                source,
            })?;

        tracing::info!(
            "Upload function zip file '{}' to COS bucket '{}' success",
            archive.name,
            bucket
        );

        Ok(ArtifactReference::Remote {
            bucket: bucket.to_string(),
            object_key: format!("/{}", archive.name),
        })
    }
}

impl std::fmt::Debug for ArtifactResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactResolver")
            .field("bucket", &self.bucket)
            .finish()
    }
}
