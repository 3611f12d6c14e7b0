#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Artifact schemas and validation for the pond inference stack.
//!
//! - `Settings` and sub-structs are deserialized from TOML and validated.
//! - `PreprocessingConfig` is the JSON artifact shipped alongside each model
//!   binary; `resolve()` turns it into the strongly-typed `ResolvedConfig`
//!   the pipeline indexes by position, rejecting anything inconsistent
//!   before it can reach scoring code.
//! - `ReleaseManifest` is the version-endpoint payload (version string plus
//!   artifact locations and checksums).
//! - History CSV loader enforces headers so sideloaded sensor logs fail
//!   loudly instead of silently shifting columns.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// History CSV schema.
///
/// Expected headers:
/// recorded_at,temperature,ph,dissolved_oxygen,ammonia,nitrate,turbidity
///
/// Example:
/// recorded_at,temperature,ph,dissolved_oxygen,ammonia,nitrate,turbidity
/// 2026-07-01T06:00:00Z,27.5,7.1,5.8,0.3,18.0,12.0
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct HistoryRow {
    pub recorded_at: DateTime<Utc>,
    pub temperature: f64,
    pub ph: f64,
    pub dissolved_oxygen: f64,
    pub ammonia: f64,
    pub nitrate: f64,
    pub turbidity: f64,
}

pub fn load_history_csv(path: &std::path::Path) -> eyre::Result<Vec<HistoryRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open history CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = [
        "recorded_at",
        "temperature",
        "ph",
        "dissolved_oxygen",
        "ammonia",
        "nitrate",
        "turbidity",
    ];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "history CSV must have headers '{}', got: {}",
            expected.join(","),
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<HistoryRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Device settings (TOML)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ArtifactsCfg {
    /// Directory holding the currently installed pair
    pub dir: String,
    /// Baked-in default model binary, relative to `dir`
    pub default_model: String,
    /// Baked-in default preprocessing config, relative to `dir`
    pub default_config: String,
    /// Version identifier reported for the baked-in pair
    pub default_version: String,
}

impl Default for ArtifactsCfg {
    fn default() -> Self {
        Self {
            dir: "artifacts".into(),
            default_model: "default/model.bin".into(),
            default_config: "default/preprocessing.json".into(),
            default_version: "0.0.0-default".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UpdateCfg {
    /// Directory a release drop (manifest.json + artifacts) is read from
    pub source_dir: String,
    /// Download chunk size in bytes; cancellation is honored between chunks
    pub chunk_bytes: usize,
}

impl Default for UpdateCfg {
    fn default() -> Self {
        Self {
            source_dir: "updates".into(),
            chunk_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InferenceCfg {
    /// Hard latency budget per inference call (ms); exceeding it is an error
    pub latency_budget_ms: u64,
}

impl Default for InferenceCfg {
    fn default() -> Self {
        Self {
            latency_budget_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub artifacts: ArtifactsCfg,
    pub update: UpdateCfg,
    pub inference: InferenceCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Settings, toml::de::Error> {
    toml::from_str::<Settings>(s)
}

impl Settings {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.artifacts.dir.is_empty() {
            eyre::bail!("artifacts.dir must not be empty");
        }
        if self.artifacts.default_model.is_empty() {
            eyre::bail!("artifacts.default_model must not be empty");
        }
        if self.artifacts.default_config.is_empty() {
            eyre::bail!("artifacts.default_config must not be empty");
        }
        if self.artifacts.default_version.is_empty() {
            eyre::bail!("artifacts.default_version must not be empty");
        }
        if self.update.chunk_bytes == 0 {
            eyre::bail!("update.chunk_bytes must be >= 1");
        }
        if self.inference.latency_budget_ms == 0 {
            eyre::bail!("inference.latency_budget_ms must be >= 1");
        }
        if self.inference.latency_budget_ms > 60 * 1000 {
            eyre::bail!("inference.latency_budget_ms is unreasonably large (>60s)");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing config artifact (JSON)
// ---------------------------------------------------------------------------

/// Every feature the on-device engineer can produce. The config's
/// `scaler.feature_names` list selects which of these are fed to the model
/// and in what order; a name outside this set rejects the whole config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureId {
    Temperature,
    Ph,
    DissolvedOxygen,
    Ammonia,
    Nitrate,
    Turbidity,
    DaysInFarm,
    DayOfYear,
    Hour,
    SinHour,
    CosHour,
    SinDay,
    CosDay,
    TempDoInteraction,
    AvgDo7d,
    AvgWqi7d,
}

impl FeatureId {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "temperature" => Self::Temperature,
            "ph" => Self::Ph,
            "dissolved_oxygen" => Self::DissolvedOxygen,
            "ammonia" => Self::Ammonia,
            "nitrate" => Self::Nitrate,
            "turbidity" => Self::Turbidity,
            "days_in_farm" => Self::DaysInFarm,
            "day_of_year" => Self::DayOfYear,
            "hour" => Self::Hour,
            "sin_hour" => Self::SinHour,
            "cos_hour" => Self::CosHour,
            "sin_day" => Self::SinDay,
            "cos_day" => Self::CosDay,
            "temp_do_interaction" => Self::TempDoInteraction,
            "avg_do_7d" => Self::AvgDo7d,
            "avg_wqi_7d" => Self::AvgWqi7d,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Ph => "ph",
            Self::DissolvedOxygen => "dissolved_oxygen",
            Self::Ammonia => "ammonia",
            Self::Nitrate => "nitrate",
            Self::Turbidity => "turbidity",
            Self::DaysInFarm => "days_in_farm",
            Self::DayOfYear => "day_of_year",
            Self::Hour => "hour",
            Self::SinHour => "sin_hour",
            Self::CosHour => "cos_hour",
            Self::SinDay => "sin_day",
            Self::CosDay => "cos_day",
            Self::TempDoInteraction => "temp_do_interaction",
            Self::AvgDo7d => "avg_do_7d",
            Self::AvgWqi7d => "avg_wqi_7d",
        }
    }

    /// Base features come straight off the sensor and are subject to
    /// biological capping; everything else is derived from them.
    pub fn is_base(self) -> bool {
        matches!(
            self,
            Self::Temperature
                | Self::Ph
                | Self::DissolvedOxygen
                | Self::Ammonia
                | Self::Nitrate
                | Self::Turbidity
        )
    }
}

/// The six base sensor features, in canonical order.
pub const BASE_FEATURES: [FeatureId; 6] = [
    FeatureId::Temperature,
    FeatureId::Ph,
    FeatureId::DissolvedOxygen,
    FeatureId::Ammonia,
    FeatureId::Nitrate,
    FeatureId::Turbidity,
];

#[derive(Debug, Deserialize, Clone)]
pub struct ScalerCfg {
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
    /// Authoritative for both feature order and count.
    pub feature_names: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Limit {
    pub min: f64,
    pub max: f64,
}

/// Preprocessing artifact as shipped by the training service, prior to
/// validation. Field names match the backend's JSON output.
#[derive(Debug, Deserialize, Clone)]
pub struct PreprocessingConfig {
    pub scaler: ScalerCfg,
    pub imputation_medians: BTreeMap<String, f64>,
    pub biological_limits: BTreeMap<String, Limit>,
    /// Features clamped to a zero floor after imputation (concentrations,
    /// counts). Absent means no floor is applied anywhere.
    #[serde(default)]
    pub non_negative: Vec<String>,
    pub constants: BTreeMap<String, f64>,
    pub target_columns: Vec<String>,
}

pub fn load_preprocessing_json(s: &str) -> Result<PreprocessingConfig, serde_json::Error> {
    serde_json::from_str::<PreprocessingConfig>(s)
}

/// Per-feature parameters after validation, aligned with the config's
/// feature order.
#[derive(Debug, Clone, Copy)]
pub struct FeatureParams {
    pub id: FeatureId,
    pub center: f64,
    pub scale: f64,
    pub median: f64,
    pub non_negative: bool,
}

/// Biological min/max for the base sensor readings.
#[derive(Debug, Clone, Copy)]
pub struct BioLimits {
    pub temperature: Limit,
    pub ph: Limit,
    pub dissolved_oxygen: Limit,
    pub ammonia: Limit,
    pub nitrate: Limit,
    pub turbidity: Limit,
}

impl BioLimits {
    pub fn for_feature(&self, id: FeatureId) -> Option<Limit> {
        Some(match id {
            FeatureId::Temperature => self.temperature,
            FeatureId::Ph => self.ph,
            FeatureId::DissolvedOxygen => self.dissolved_oxygen,
            FeatureId::Ammonia => self.ammonia,
            FeatureId::Nitrate => self.nitrate,
            FeatureId::Turbidity => self.turbidity,
            _ => return None,
        })
    }
}

/// Named constants the pipeline needs, pulled out of `constants{}`.
#[derive(Debug, Clone, Copy)]
pub struct Constants {
    /// Dissolved-oxygen reference the deviation metric compares against
    pub optimal_do: f64,
    /// Trailing window length (days) for the rolling DO average
    pub rolling_window: usize,
    /// Offset added to elapsed days since pond start
    pub day_zero_offset: i64,
    /// Weight at which a fish is considered harvest-ready (grams)
    pub market_weight_g: f64,
}

/// Validated, fixed-shape form of the preprocessing artifact. Scoring code
/// indexes by position and never re-parses names.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    features: Vec<FeatureParams>,
    pub limits: BioLimits,
    pub constants: Constants,
}

impl ResolvedConfig {
    pub fn feature_len(&self) -> usize {
        self.features.len()
    }

    pub fn features(&self) -> &[FeatureParams] {
        &self.features
    }

    /// Number of model outputs this config describes (weight, length).
    pub const OUTPUT_WIDTH: usize = 2;
}

impl PreprocessingConfig {
    /// Validate and convert into the fixed-shape `ResolvedConfig`.
    ///
    /// Everything that could make scoring ambiguous or unsafe is rejected
    /// here: length mismatches, unknown or duplicate feature names, zero or
    /// non-finite scales, missing medians or limits, and missing required
    /// constants. A config that passes can be scored without further checks.
    pub fn resolve(&self) -> eyre::Result<ResolvedConfig> {
        let names = &self.scaler.feature_names;
        if names.is_empty() {
            eyre::bail!("scaler.feature_names must not be empty");
        }
        if self.scaler.center.len() != names.len() {
            eyre::bail!(
                "scaler.center length {} does not match feature_names length {}",
                self.scaler.center.len(),
                names.len()
            );
        }
        if self.scaler.scale.len() != names.len() {
            eyre::bail!(
                "scaler.scale length {} does not match feature_names length {}",
                self.scaler.scale.len(),
                names.len()
            );
        }

        // Resolve names once; unknown or duplicate names reject the config.
        let mut ids: Vec<FeatureId> = Vec::with_capacity(names.len());
        for name in names {
            let id = FeatureId::from_name(name)
                .ok_or_else(|| eyre::eyre!("unknown feature name: {name}"))?;
            if ids.contains(&id) {
                eyre::bail!("duplicate feature name: {name}");
            }
            ids.push(id);
        }

        let mut non_negative_ids: Vec<FeatureId> = Vec::with_capacity(self.non_negative.len());
        for name in &self.non_negative {
            let id = FeatureId::from_name(name)
                .ok_or_else(|| eyre::eyre!("unknown non_negative feature name: {name}"))?;
            non_negative_ids.push(id);
        }

        let mut features = Vec::with_capacity(names.len());
        for (i, (&id, name)) in ids.iter().zip(names).enumerate() {
            let center = self.scaler.center[i];
            let scale = self.scaler.scale[i];
            if !center.is_finite() {
                eyre::bail!("scaler.center[{i}] ({name}) must be finite");
            }
            if !scale.is_finite() || scale == 0.0 {
                eyre::bail!("scaler.scale[{i}] ({name}) must be finite and nonzero");
            }
            let median = *self
                .imputation_medians
                .get(name.as_str())
                .ok_or_else(|| eyre::eyre!("imputation_medians missing entry for {name}"))?;
            if !median.is_finite() {
                eyre::bail!("imputation_medians[{name}] must be finite");
            }
            features.push(FeatureParams {
                id,
                center,
                scale,
                median,
                non_negative: non_negative_ids.contains(&id),
            });
        }

        let limits = BioLimits {
            temperature: self.limit_for("temperature")?,
            ph: self.limit_for("ph")?,
            dissolved_oxygen: self.limit_for("dissolved_oxygen")?,
            ammonia: self.limit_for("ammonia")?,
            nitrate: self.limit_for("nitrate")?,
            turbidity: self.limit_for("turbidity")?,
        };

        let optimal_do = self.constant("optimal_do")?;
        if !(optimal_do > 0.0) {
            eyre::bail!("constants.optimal_do must be > 0");
        }
        let rolling_window = self.constant("rolling_window")?;
        if !(rolling_window >= 1.0 && rolling_window.fract() == 0.0) {
            eyre::bail!("constants.rolling_window must be a whole number >= 1");
        }
        let day_zero_offset = match self.constants.get("day_zero_offset") {
            Some(v) if v.is_finite() && v.fract() == 0.0 => *v as i64,
            Some(_) => eyre::bail!("constants.day_zero_offset must be a whole number"),
            None => 0,
        };
        let market_weight_g = match self.constants.get("market_weight_g") {
            Some(v) if v.is_finite() && *v > 0.0 => *v,
            Some(_) => eyre::bail!("constants.market_weight_g must be > 0"),
            None => 500.0,
        };

        if self.target_columns != ["fish_weight", "fish_length"] {
            eyre::bail!(
                "target_columns must be [fish_weight, fish_length], got: {}",
                self.target_columns.join(",")
            );
        }

        Ok(ResolvedConfig {
            features,
            limits,
            constants: Constants {
                optimal_do,
                rolling_window: rolling_window as usize,
                day_zero_offset,
                market_weight_g,
            },
        })
    }

    fn limit_for(&self, name: &str) -> eyre::Result<Limit> {
        let lim = self
            .biological_limits
            .get(name)
            .ok_or_else(|| eyre::eyre!("biological_limits missing entry for {name}"))?;
        if !lim.min.is_finite() || !lim.max.is_finite() {
            eyre::bail!("biological_limits[{name}] must be finite");
        }
        if lim.min > lim.max {
            eyre::bail!("biological_limits[{name}] has min > max");
        }
        Ok(*lim)
    }

    fn constant(&self, name: &str) -> eyre::Result<f64> {
        let v = *self
            .constants
            .get(name)
            .ok_or_else(|| eyre::eyre!("constants missing required entry {name}"))?;
        if !v.is_finite() {
            eyre::bail!("constants.{name} must be finite");
        }
        Ok(v)
    }
}

// ---------------------------------------------------------------------------
// Release manifest (version endpoint payload)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ArtifactRef {
    /// Location of the artifact, interpreted by the update source
    /// (a relative file name for directory drops, a URL for remote ones).
    pub location: String,
    /// Lowercase hex SHA-256 of the artifact bytes.
    pub sha256: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReleaseManifest {
    pub version: String,
    pub model: ArtifactRef,
    pub config: ArtifactRef,
    #[serde(default)]
    pub release_notes: Option<String>,
}

pub fn load_manifest_json(s: &str) -> Result<ReleaseManifest, serde_json::Error> {
    serde_json::from_str::<ReleaseManifest>(s)
}
