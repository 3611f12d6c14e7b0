//! Test and helper mocks for aqua_core

use std::collections::BTreeMap;
use std::sync::Mutex;

use aqua_config::{ArtifactRef, ReleaseManifest};
use aqua_traits::{CancelToken, ModelRuntime};

use crate::error::LifecycleError;
use crate::lifecycle::UpdateSource;

/// A runtime that returns the same output vector for every call.
pub struct FixedRuntime {
    pub input_width: usize,
    pub output: Vec<f32>,
}

impl ModelRuntime for FixedRuntime {
    fn input_width(&self) -> usize {
        self.input_width
    }
    fn output_width(&self) -> usize {
        self.output.len()
    }
    fn infer(&self, _input: &[f32]) -> Result<Vec<f32>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.output.clone())
    }
}

/// A runtime that always errors; useful for exercising failure mapping.
pub struct FailingRuntime {
    pub input_width: usize,
}

impl ModelRuntime for FailingRuntime {
    fn input_width(&self) -> usize {
        self.input_width
    }
    fn output_width(&self) -> usize {
        2
    }
    fn infer(&self, _input: &[f32]) -> Result<Vec<f32>, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("backend exploded")))
    }
}

/// In-memory update source: one manifest plus named artifact payloads.
/// The artifact table is behind a mutex so tests can corrupt or replace
/// entries between calls.
pub struct MemorySource {
    manifest: Mutex<Option<ReleaseManifest>>,
    artifacts: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemorySource {
    pub fn new(manifest: ReleaseManifest, artifacts: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            manifest: Mutex::new(Some(manifest)),
            artifacts: Mutex::new(artifacts),
        }
    }

    /// A source whose manifest fetch always fails (offline device).
    pub fn offline() -> Self {
        Self {
            manifest: Mutex::new(None),
            artifacts: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn set_artifact(&self, name: &str, bytes: Vec<u8>) {
        if let Ok(mut g) = self.artifacts.lock() {
            g.insert(name.to_string(), bytes);
        }
    }
}

impl UpdateSource for MemorySource {
    fn latest_manifest(&self) -> Result<ReleaseManifest, LifecycleError> {
        self.manifest
            .lock()
            .ok()
            .and_then(|g| g.clone())
            .ok_or_else(|| LifecycleError::CheckFailed("no route to update server".into()))
    }

    fn fetch(
        &self,
        artifact: &ArtifactRef,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, LifecycleError> {
        if cancel.is_cancelled() {
            return Err(LifecycleError::Cancelled);
        }
        self.artifacts
            .lock()
            .ok()
            .and_then(|g| g.get(&artifact.location).cloned())
            .ok_or_else(|| LifecycleError::Download(format!("missing artifact {}", artifact.location)))
    }
}
