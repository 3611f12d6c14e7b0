//! Normalization: biological capping, imputation, zero floors, robust
//! scaling.
//!
//! The pipeline caps base readings *before* feature engineering
//! (`cap_reading`), so every derived feature is computed from in-range
//! inputs; `normalize` then runs over the raw vector in fixed order:
//! imputation of non-finite values, zero floor for the configured
//! non-negative subset, then `(value - center) / scale`. Zero scales cannot
//! reach this code: config resolution rejects them.

use aqua_config::{BioLimits, Limit, ResolvedConfig};

use crate::{FeatureVector, SensorReading};

#[inline]
fn cap(v: f64, lim: Limit) -> f64 {
    // NaN propagates through clamp and is left for imputation
    v.clamp(lim.min, lim.max)
}

/// Clamp each base sensor field to its biologically plausible range.
/// Idempotent: capping an already-capped reading changes nothing.
pub fn cap_reading(limits: &BioLimits, r: &SensorReading) -> SensorReading {
    SensorReading {
        temperature: cap(r.temperature, limits.temperature),
        ph: cap(r.ph, limits.ph),
        dissolved_oxygen: cap(r.dissolved_oxygen, limits.dissolved_oxygen),
        ammonia: cap(r.ammonia, limits.ammonia),
        nitrate: cap(r.nitrate, limits.nitrate),
        turbidity: cap(r.turbidity, limits.turbidity),
        recorded_at: r.recorded_at,
        pond_id: r.pond_id.clone(),
        latitude: r.latitude,
        longitude: r.longitude,
    }
}

/// Transform a raw feature vector into the model-ready vector.
///
/// `raw` must be in the config's feature order; `raw_vector` guarantees
/// that by construction.
pub fn normalize(cfg: &ResolvedConfig, raw: &[f64]) -> FeatureVector {
    debug_assert_eq!(raw.len(), cfg.feature_len());
    raw.iter()
        .zip(cfg.features())
        .map(|(&v, p)| {
            let v = if v.is_finite() { v } else { p.median };
            let v = if p.non_negative && v < 0.0 { 0.0 } else { v };
            (v - p.center) / p.scale
        })
        .collect()
}
