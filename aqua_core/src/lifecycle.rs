//! Model/config lifecycle: versioned check → download → validate → swap.
//!
//! The active (model, preprocessing config) pair is held behind a
//! read-mostly guarded reference. Predictions clone one `Arc` snapshot at
//! the start of a request and keep using it even if a swap lands mid-flight;
//! a swap replaces the reference and can never mutate a snapshot already
//! handed out. Lifecycle operations serialize against each other on their
//! own gate, never against predictions.
//!
//! Every failure path — manifest fetch, download, checksum, config
//! validation, model load, width cross-check — leaves the previously active
//! pair untouched. A partially downloaded artifact is never promoted.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use aqua_config::{ArtifactRef, ReleaseManifest, ResolvedConfig};
use aqua_traits::clock::Clock;
use aqua_traits::{CancelToken, ModelRuntime, RuntimeLoader};
use crossbeam_channel as xch;
use sha2::{Digest, Sha256};

use crate::error::LifecycleError;

/// Lowercase hex SHA-256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// The currently in-use (model, preprocessing config) combination.
/// Immutable once constructed; shared with in-flight predictions as an Arc.
pub struct ActivePair {
    pub version: String,
    pub model_sha256: String,
    pub config: ResolvedConfig,
    pub runtime: Box<dyn ModelRuntime>,
}

impl core::fmt::Debug for ActivePair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActivePair")
            .field("version", &self.version)
            .field("model_sha256", &self.model_sha256)
            .field("feature_len", &self.config.feature_len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NoActivePair,
    Active,
    CheckingUpdate,
    Downloading,
    Validating,
    SwappingActive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheck {
    UpToDate,
    CandidateAvailable(String),
    CheckFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied(String),
    Rejected(String),
    Unchanged,
}

/// Network seam. The core only reasons about the returned version string,
/// artifact locations, and checksums; how bytes move is the source's
/// business. Implementations must honor the cancel token promptly.
pub trait UpdateSource: Send + Sync {
    fn latest_manifest(&self) -> Result<ReleaseManifest, LifecycleError>;
    fn fetch(&self, artifact: &ArtifactRef, cancel: &CancelToken)
    -> Result<Vec<u8>, LifecycleError>;
}

/// Reads a release drop (manifest.json plus artifact files) from a local
/// directory. Covers sideloaded updates on disconnected devices and doubles
/// as the test source; an HTTP-backed source plugs in through the same
/// trait.
pub struct FsUpdateSource {
    dir: PathBuf,
    chunk_bytes: usize,
}

impl FsUpdateSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            chunk_bytes: 64 * 1024,
        }
    }

    /// Cancellation is honored between chunks of this size.
    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }
}

impl UpdateSource for FsUpdateSource {
    fn latest_manifest(&self) -> Result<ReleaseManifest, LifecycleError> {
        let path = self.dir.join("manifest.json");
        let text = std::fs::read_to_string(&path)
            .map_err(|e| LifecycleError::CheckFailed(format!("read {}: {e}", path.display())))?;
        aqua_config::load_manifest_json(&text)
            .map_err(|e| LifecycleError::CheckFailed(format!("parse manifest: {e}")))
    }

    fn fetch(
        &self,
        artifact: &ArtifactRef,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, LifecycleError> {
        use std::io::Read;
        let path = self.dir.join(&artifact.location);
        let mut file = std::fs::File::open(&path)
            .map_err(|e| LifecycleError::Download(format!("open {}: {e}", path.display())))?;
        let mut out = Vec::new();
        let mut chunk = vec![0u8; self.chunk_bytes];
        loop {
            if cancel.is_cancelled() {
                return Err(LifecycleError::Cancelled);
            }
            let n = file
                .read(&mut chunk)
                .map_err(|e| LifecycleError::Download(format!("read {}: {e}", path.display())))?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        Ok(out)
    }
}

pub struct ModelLifecycleManager {
    active: RwLock<Option<Arc<ActivePair>>>,
    state: Mutex<LifecycleState>,
    /// Serializes lifecycle operations against each other (not predictions).
    gate: Mutex<()>,
    source: Box<dyn UpdateSource>,
    loader: Box<dyn RuntimeLoader>,
}

impl core::fmt::Debug for ModelLifecycleManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ModelLifecycleManager")
            .field("state", &self.state())
            .field("active_version", &self.active_version())
            .finish()
    }
}

impl ModelLifecycleManager {
    pub fn new(source: Box<dyn UpdateSource>, loader: Box<dyn RuntimeLoader>) -> Self {
        Self {
            active: RwLock::new(None),
            state: Mutex::new(LifecycleState::NoActivePair),
            gate: Mutex::new(()),
            source,
            loader,
        }
    }

    /// Immutable snapshot of the active pair for one prediction. The swap
    /// path never touches a snapshot once it is handed out.
    pub fn snapshot(&self) -> Option<Arc<ActivePair>> {
        self.active
            .read()
            .map(|g| g.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    pub fn active_version(&self) -> Option<String> {
        self.snapshot().map(|p| p.version.clone())
    }

    pub fn state(&self) -> LifecycleState {
        self.state
            .lock()
            .map(|g| *g)
            .unwrap_or_else(|p| *p.into_inner())
    }

    fn set_state(&self, next: LifecycleState) {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        let from = *guard;
        tracing::debug!(?from, to = ?next, "lifecycle state");
        *guard = next;
    }

    /// Return to Active (or NoActivePair when nothing is installed).
    fn settle_state(&self) {
        let settled = if self.snapshot().is_some() {
            LifecycleState::Active
        } else {
            LifecycleState::NoActivePair
        };
        self.set_state(settled);
    }

    /// Load the baked-in pair shipped with the application. Goes through
    /// exactly the same validation as a downloaded pair.
    pub fn bootstrap_default(
        &self,
        version: &str,
        model_bytes: &[u8],
        config_bytes: &[u8],
    ) -> crate::error::Result<()> {
        let _gate = self.gate.lock().unwrap_or_else(|p| p.into_inner());
        self.set_state(LifecycleState::Validating);
        let pair = match self.build_pair(version, model_bytes, config_bytes) {
            Ok(pair) => pair,
            Err(e) => {
                self.settle_state();
                return Err(eyre::Report::new(e));
            }
        };
        self.set_state(LifecycleState::SwappingActive);
        self.swap_in(pair);
        self.settle_state();
        tracing::info!(version, "default pair active");
        Ok(())
    }

    /// Compare the local active version against the remotely reported one.
    /// A fetch failure is reported as such, never as "up to date".
    pub fn check_for_update(&self) -> UpdateCheck {
        let _gate = self.gate.lock().unwrap_or_else(|p| p.into_inner());
        self.set_state(LifecycleState::CheckingUpdate);
        let result = self.source.latest_manifest();
        self.settle_state();
        match result {
            Ok(manifest) => match self.active_version() {
                Some(current) if current == manifest.version => UpdateCheck::UpToDate,
                _ => UpdateCheck::CandidateAvailable(manifest.version),
            },
            Err(e) => {
                tracing::warn!(error = %e, "update check failed");
                UpdateCheck::CheckFailed(e.to_string())
            }
        }
    }

    /// Fetch, validate, and atomically activate the remote pair.
    ///
    /// On any failure the previously active pair remains active and the
    /// outcome carries the reason. Model and config always travel together;
    /// there is no path that activates one without the other.
    pub fn apply_update(&self, cancel: &CancelToken) -> UpdateOutcome {
        let _gate = self.gate.lock().unwrap_or_else(|p| p.into_inner());

        self.set_state(LifecycleState::CheckingUpdate);
        let manifest = match self.source.latest_manifest() {
            Ok(m) => m,
            Err(e) => {
                self.settle_state();
                tracing::warn!(error = %e, "update rejected at manifest fetch");
                return UpdateOutcome::Rejected(e.to_string());
            }
        };
        if self.active_version().as_deref() == Some(manifest.version.as_str()) {
            self.settle_state();
            return UpdateOutcome::Unchanged;
        }

        self.set_state(LifecycleState::Downloading);
        let fetched = self
            .source
            .fetch(&manifest.model, cancel)
            .and_then(|model| {
                self.source
                    .fetch(&manifest.config, cancel)
                    .map(|config| (model, config))
            });
        let (model_bytes, config_bytes) = match fetched {
            Ok(pair) => pair,
            Err(e) => {
                self.settle_state();
                tracing::warn!(error = %e, version = %manifest.version, "update rejected at download");
                return UpdateOutcome::Rejected(e.to_string());
            }
        };

        self.set_state(LifecycleState::Validating);
        let pair = match self.validate_manifest_pair(&manifest, &model_bytes, &config_bytes) {
            Ok(pair) => pair,
            Err(e) => {
                self.settle_state();
                tracing::warn!(error = %e, version = %manifest.version, "update rejected at validation");
                return UpdateOutcome::Rejected(e.to_string());
            }
        };

        self.set_state(LifecycleState::SwappingActive);
        self.swap_in(pair);
        self.settle_state();
        tracing::info!(version = %manifest.version, "update applied");
        UpdateOutcome::Applied(manifest.version)
    }

    fn validate_manifest_pair(
        &self,
        manifest: &ReleaseManifest,
        model_bytes: &[u8],
        config_bytes: &[u8],
    ) -> Result<ActivePair, LifecycleError> {
        if !sha256_hex(model_bytes).eq_ignore_ascii_case(&manifest.model.sha256) {
            return Err(LifecycleError::ChecksumMismatch { artifact: "model" });
        }
        if !manifest.config.sha256.is_empty()
            && !sha256_hex(config_bytes).eq_ignore_ascii_case(&manifest.config.sha256)
        {
            return Err(LifecycleError::ChecksumMismatch { artifact: "config" });
        }
        self.build_pair(&manifest.version, model_bytes, config_bytes)
    }

    /// Structural validation shared by bootstrap and update: the config must
    /// resolve, the model must load, and their declared widths must agree.
    fn build_pair(
        &self,
        version: &str,
        model_bytes: &[u8],
        config_bytes: &[u8],
    ) -> Result<ActivePair, LifecycleError> {
        let text = std::str::from_utf8(config_bytes)
            .map_err(|e| LifecycleError::InvalidConfig(format!("not UTF-8: {e}")))?;
        let raw = aqua_config::load_preprocessing_json(text)
            .map_err(|e| LifecycleError::InvalidConfig(e.to_string()))?;
        let config = raw
            .resolve()
            .map_err(|e| LifecycleError::InvalidConfig(e.to_string()))?;

        let runtime = self
            .loader
            .load(model_bytes)
            .map_err(|e| LifecycleError::BadModel(e.to_string()))?;

        if runtime.input_width() != config.feature_len() {
            return Err(LifecycleError::IncompatiblePair(format!(
                "model input width {} vs config feature count {}",
                runtime.input_width(),
                config.feature_len()
            )));
        }
        if runtime.output_width() != ResolvedConfig::OUTPUT_WIDTH {
            return Err(LifecycleError::IncompatiblePair(format!(
                "model output width {} vs expected {}",
                runtime.output_width(),
                ResolvedConfig::OUTPUT_WIDTH
            )));
        }

        Ok(ActivePair {
            version: version.to_string(),
            model_sha256: sha256_hex(model_bytes),
            config,
            runtime,
        })
    }

    fn swap_in(&self, pair: ActivePair) {
        let mut guard = self
            .active
            .write()
            .unwrap_or_else(|p| p.into_inner());
        *guard = Some(Arc::new(pair));
    }
}

/// Events emitted by the background update worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    Check(UpdateCheck),
    Outcome(UpdateOutcome),
}

/// Background update worker.
///
/// Spawns a thread that periodically checks for updates and applies any
/// candidate it finds, pushing events over a bounded channel. Events are
/// dropped when the consumer lags; `latest_event` reflects the most recent
/// delivery. The thread is shut down and joined when the worker is dropped,
/// and any in-flight download is cancelled first.
pub struct UpdateWorker {
    rx: xch::Receiver<UpdateEvent>,
    shutdown: Arc<AtomicBool>,
    cancel: CancelToken,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl UpdateWorker {
    pub fn spawn<C: Clock + Send + Sync + 'static>(
        manager: Arc<ModelLifecycleManager>,
        period: Duration,
        clock: C,
    ) -> Self {
        let (tx, rx) = xch::bounded(4);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_worker = shutdown.clone();
        let cancel = CancelToken::new();
        let cancel_worker = cancel.clone();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_worker.load(Ordering::Relaxed) {
                    tracing::debug!("update worker received shutdown signal");
                    break;
                }

                let check = manager.check_for_update();
                let candidate = matches!(check, UpdateCheck::CandidateAvailable(_));
                if push_event(&tx, UpdateEvent::Check(check)).is_err() {
                    tracing::debug!("update worker consumer disconnected, exiting thread");
                    break;
                }
                if candidate && !cancel_worker.is_cancelled() {
                    let outcome = manager.apply_update(&cancel_worker);
                    if push_event(&tx, UpdateEvent::Outcome(outcome)).is_err() {
                        tracing::debug!("update worker consumer disconnected, exiting thread");
                        break;
                    }
                }

                // Sleep in slices so shutdown is honored promptly even with
                // long check periods.
                let slice = Duration::from_millis(50);
                let mut slept = Duration::ZERO;
                while slept < period && !shutdown_worker.load(Ordering::Relaxed) {
                    let d = slice.min(period - slept);
                    clock.sleep(d);
                    slept += d;
                }
            }
            tracing::trace!("update worker thread exiting cleanly");
        });

        Self {
            rx,
            shutdown,
            cancel,
            join_handle: Some(join_handle),
        }
    }

    /// Most recent event, draining anything older.
    pub fn latest_event(&self) -> Option<UpdateEvent> {
        self.rx.try_iter().last()
    }

    /// Drain all pending events in delivery order.
    pub fn drain_events(&self) -> Vec<UpdateEvent> {
        self.rx.try_iter().collect()
    }

    /// Cancel the in-flight download (and any future ones: cancellation is
    /// terminal for this worker). The active pair is left untouched.
    pub fn cancel_inflight(&self) {
        self.cancel.cancel();
    }
}

/// Push without blocking; stale events are dropped when the channel is full.
fn push_event(
    tx: &xch::Sender<UpdateEvent>,
    ev: UpdateEvent,
) -> Result<(), xch::TrySendError<UpdateEvent>> {
    match tx.try_send(ev) {
        Ok(()) => Ok(()),
        Err(xch::TrySendError::Full(_)) => Ok(()),
        Err(e @ xch::TrySendError::Disconnected(_)) => Err(e),
    }
}

impl Drop for UpdateWorker {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.cancel.cancel();

        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("update worker thread joined successfully");
                }
                Err(e) => {
                    // Thread panicked; log but don't propagate (we're in Drop)
                    tracing::warn!(?e, "update worker thread panicked during shutdown");
                }
            }
        }
    }
}
