#![allow(dead_code)]
//! Shared fixtures for aqua_core integration tests.

use aqua_config::ResolvedConfig;
use aqua_core::{PondContext, SensorReading};
use aqua_runtime::SimulatedRuntime;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

pub const FEATURE_NAMES_14: [&str; 14] = [
    "temperature",
    "ph",
    "dissolved_oxygen",
    "ammonia",
    "nitrate",
    "turbidity",
    "days_in_farm",
    "day_of_year",
    "hour",
    "sin_hour",
    "cos_hour",
    "temp_do_interaction",
    "avg_do_7d",
    "avg_wqi_7d",
];

/// Identity-scaled config over the 14 default features (center 0, scale 1),
/// biological limits matching the backend's accepted sensor ranges.
pub fn sample_config_json() -> String {
    config_json_with(&FEATURE_NAMES_14, &[0.0; 14], &[1.0; 14])
}

pub fn config_json_with(names: &[&str], center: &[f64], scale: &[f64]) -> String {
    let medians: serde_json::Map<String, serde_json::Value> = names
        .iter()
        .map(|n| (n.to_string(), serde_json::json!(0.0)))
        .collect();
    serde_json::json!({
        "scaler": {
            "feature_names": names,
            "center": center,
            "scale": scale,
        },
        "imputation_medians": medians,
        "biological_limits": {
            "temperature": {"min": 0.0, "max": 50.0},
            "ph": {"min": 0.0, "max": 14.0},
            "dissolved_oxygen": {"min": 0.0, "max": 20.0},
            "ammonia": {"min": 0.0, "max": 10.0},
            "nitrate": {"min": 0.0, "max": 100.0},
            "turbidity": {"min": 0.0, "max": 1000.0}
        },
        "non_negative": ["dissolved_oxygen", "ammonia", "nitrate", "turbidity"],
        "constants": {"optimal_do": 6.0, "rolling_window": 7.0},
        "target_columns": ["fish_weight", "fish_length"]
    })
    .to_string()
}

pub fn sample_resolved() -> ResolvedConfig {
    aqua_config::load_preprocessing_json(&sample_config_json())
        .unwrap()
        .resolve()
        .unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// Reference reading: temp 28, pH 7.2, DO 6.0, ammonia 0.4, nitrate 20,
/// turbidity 15, taken 30 days after pond start.
pub fn reference_reading() -> SensorReading {
    SensorReading {
        temperature: 28.0,
        ph: 7.2,
        dissolved_oxygen: 6.0,
        ammonia: 0.4,
        nitrate: 20.0,
        turbidity: 15.0,
        recorded_at: at(2026, 7, 31, 6),
        pond_id: "pond-1".into(),
        latitude: None,
        longitude: None,
    }
}

pub fn pond_started_2026_07_01() -> PondContext {
    PondContext {
        pond_id: "pond-1".into(),
        start_date: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
    }
}

pub fn reading_with_do(do_value: f64, day: u32) -> SensorReading {
    SensorReading {
        dissolved_oxygen: do_value,
        recorded_at: at(2026, 7, day, 6),
        ..reference_reading()
    }
}

/// Simulated model with zero weights: output is always (bias_w, bias_l).
pub fn constant_model_bytes(width: usize, bias_w: f32, bias_l: f32) -> Vec<u8> {
    SimulatedRuntime::encode(width, 2, &vec![0.0; width * 2], &[bias_w, bias_l])
}

pub fn manifest_json(version: &str, model_sha: &str, config_sha: &str) -> String {
    serde_json::json!({
        "version": version,
        "model": {"location": "model.bin", "sha256": model_sha},
        "config": {"location": "preprocessing.json", "sha256": config_sha},
    })
    .to_string()
}
