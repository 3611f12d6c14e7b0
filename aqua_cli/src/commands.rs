//! Command implementations: manager assembly, pair persistence, prediction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aqua_config::{ReleaseManifest, Settings, load_manifest_json};
use aqua_core::lifecycle::sha256_hex;
use aqua_core::{
    FsUpdateSource, InferenceEngine, ModelLifecycleManager, Prediction, PredictionService,
    SensorReading, UpdateOutcome,
};
use aqua_traits::CancelToken;
use chrono::{DateTime, NaiveDate, Utc};
use eyre::{Result, WrapErr};

use crate::atomic::write_atomic;

/// File names of the persisted (installed) pair inside the artifacts dir.
const INSTALLED_MARKER: &str = "installed.json";
const INSTALLED_MODEL: &str = "installed_model.bin";
const INSTALLED_CONFIG: &str = "installed_config.json";

fn runtime_loader() -> Box<dyn aqua_traits::RuntimeLoader> {
    #[cfg(feature = "onnx")]
    {
        Box::new(aqua_runtime::tract::TractLoader)
    }
    #[cfg(not(feature = "onnx"))]
    {
        Box::new(aqua_runtime::SimulatedLoader)
    }
}

/// Assemble the lifecycle manager and activate a pair: the persisted
/// installed pair when present and intact, otherwise the baked-in default.
pub fn build_manager(settings: &Settings) -> Result<Arc<ModelLifecycleManager>> {
    let source = FsUpdateSource::new(&settings.update.source_dir)
        .with_chunk_bytes(settings.update.chunk_bytes);
    let mgr = ModelLifecycleManager::new(Box::new(source), runtime_loader());

    match bootstrap_installed(&mgr, settings) {
        Ok(version) => {
            tracing::info!(version = %version, "installed pair active");
        }
        Err(e) => {
            tracing::debug!(error = %e, "no usable installed pair, using baked-in default");
            bootstrap_default(&mgr, settings)?;
        }
    }
    Ok(Arc::new(mgr))
}

fn bootstrap_installed(mgr: &ModelLifecycleManager, settings: &Settings) -> Result<String> {
    let dir = Path::new(&settings.artifacts.dir);
    let text = std::fs::read_to_string(dir.join(INSTALLED_MARKER))
        .wrap_err("read installed marker")?;
    let manifest: ReleaseManifest = load_manifest_json(&text).wrap_err("parse installed marker")?;
    let model = std::fs::read(dir.join(&manifest.model.location)).wrap_err("read installed model")?;
    let config =
        std::fs::read(dir.join(&manifest.config.location)).wrap_err("read installed config")?;
    if !sha256_hex(&model).eq_ignore_ascii_case(&manifest.model.sha256) {
        eyre::bail!("installed model does not match its recorded checksum");
    }
    if !sha256_hex(&config).eq_ignore_ascii_case(&manifest.config.sha256) {
        eyre::bail!("installed config does not match its recorded checksum");
    }
    mgr.bootstrap_default(&manifest.version, &model, &config)?;
    Ok(manifest.version)
}

fn bootstrap_default(mgr: &ModelLifecycleManager, settings: &Settings) -> Result<()> {
    let dir = Path::new(&settings.artifacts.dir);
    let model_path = dir.join(&settings.artifacts.default_model);
    let config_path = dir.join(&settings.artifacts.default_config);
    let model = std::fs::read(&model_path)
        .wrap_err_with(|| format!("read default model {}", model_path.display()))?;
    let config = std::fs::read(&config_path)
        .wrap_err_with(|| format!("read default config {}", config_path.display()))?;
    mgr.bootstrap_default(&settings.artifacts.default_version, &model, &config)?;
    Ok(())
}

/// After a successful apply, copy the activated pair into the artifacts dir
/// so the next process starts on it. Artifact files are written atomically
/// first, the checksummed marker last; bootstrap re-verifies the checksums,
/// so an interrupted persist falls back to the default pair instead of
/// activating a torn one.
pub fn persist_applied(settings: &Settings, version: &str) -> Result<()> {
    let src_dir = Path::new(&settings.update.source_dir);
    let text = std::fs::read_to_string(src_dir.join("manifest.json"))
        .wrap_err("re-read source manifest")?;
    let manifest: ReleaseManifest = load_manifest_json(&text).wrap_err("parse source manifest")?;
    if manifest.version != version {
        eyre::bail!(
            "update source changed while applying (expected {version}, found {})",
            manifest.version
        );
    }
    let model =
        std::fs::read(src_dir.join(&manifest.model.location)).wrap_err("read source model")?;
    let config =
        std::fs::read(src_dir.join(&manifest.config.location)).wrap_err("read source config")?;

    let dir = Path::new(&settings.artifacts.dir);
    std::fs::create_dir_all(dir).wrap_err("create artifacts dir")?;
    write_atomic(&dir.join(INSTALLED_MODEL), &model).wrap_err("persist model")?;
    write_atomic(&dir.join(INSTALLED_CONFIG), &config).wrap_err("persist config")?;
    let marker = serde_json::json!({
        "version": version,
        "model": {"location": INSTALLED_MODEL, "sha256": sha256_hex(&model)},
        "config": {"location": INSTALLED_CONFIG, "sha256": sha256_hex(&config)},
    });
    write_atomic(&dir.join(INSTALLED_MARKER), marker.to_string().as_bytes())
        .wrap_err("persist installed marker")?;
    tracing::info!(version, "pair persisted to artifacts dir");
    Ok(())
}

/// Apply an update with Ctrl-C wired to download cancellation.
pub fn run_apply_update(settings: &Settings) -> Result<UpdateOutcome> {
    let mgr = build_manager(settings)?;
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, cancelling download");
        handler_token.cancel();
    }) {
        tracing::debug!(error = %e, "ctrl-c handler not installed");
    }

    let outcome = mgr.apply_update(&cancel);
    if let UpdateOutcome::Applied(version) = &outcome {
        persist_applied(settings, version)?;
    }
    Ok(outcome)
}

/// Parse a reading document. Sensor fields are optional; anything missing
/// or non-numeric becomes NaN and is recovered by imputation downstream.
/// `recorded_at` is required.
pub fn parse_reading(text: &str, pond_id: &str) -> Result<SensorReading> {
    let doc: serde_json::Value = serde_json::from_str(text).wrap_err("parse reading JSON")?;
    let field = |key: &str| doc.get(key).and_then(serde_json::Value::as_f64).unwrap_or(f64::NAN);
    let recorded_at = doc
        .get("recorded_at")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| eyre::eyre!("reading JSON is missing recorded_at"))?;
    let recorded_at: DateTime<Utc> = DateTime::parse_from_rfc3339(recorded_at)
        .wrap_err("parse recorded_at")?
        .with_timezone(&Utc);
    Ok(SensorReading {
        temperature: field("temperature"),
        ph: field("ph"),
        dissolved_oxygen: field("dissolved_oxygen"),
        ammonia: field("ammonia"),
        nitrate: field("nitrate"),
        turbidity: field("turbidity"),
        recorded_at,
        pond_id: pond_id.to_string(),
        latitude: doc.get("latitude").and_then(serde_json::Value::as_f64),
        longitude: doc.get("longitude").and_then(serde_json::Value::as_f64),
    })
}

pub fn run_predict(
    settings: &Settings,
    reading_path: &Path,
    history_path: Option<&PathBuf>,
    pond_id: &str,
    pond_start: NaiveDate,
) -> Result<Prediction> {
    let mgr = build_manager(settings)?;
    let engine = InferenceEngine::new(settings.inference.latency_budget_ms);
    let service = PredictionService::new(mgr, engine);

    let text = std::fs::read_to_string(reading_path)
        .wrap_err_with(|| format!("read reading {}", reading_path.display()))?;
    let reading = parse_reading(&text, pond_id)?;

    let history: Vec<SensorReading> = match history_path {
        Some(path) => aqua_config::load_history_csv(path)?
            .iter()
            .map(|row| SensorReading::from_history_row(row, pond_id))
            .collect(),
        None => Vec::new(),
    };

    let pond = aqua_core::PondContext {
        pond_id: pond_id.to_string(),
        start_date: pond_start,
    };
    let prediction = service
        .predict(&pond, &reading, &history)
        .map_err(eyre::Report::new)?;
    Ok(prediction)
}

pub fn prediction_json(p: &Prediction) -> String {
    serde_json::json!({
        "weight_g": p.weight_g,
        "length_cm": p.length_cm,
        "harvest_ready_at": p.harvest_ready_at.to_string(),
        "model_version": p.model_version,
        "created_at": p.created_at.to_rfc3339(),
    })
    .to_string()
}
