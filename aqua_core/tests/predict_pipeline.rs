mod common;

use std::sync::Arc;

use aqua_core::error::PredictError;
use aqua_core::mocks::MemorySource;
use aqua_core::{InferenceEngine, ModelLifecycleManager, PredictionService, SensorReading};
use aqua_runtime::SimulatedLoader;
use common::*;
use rstest::rstest;

fn service_with_constant_model(bias_w: f32, bias_l: f32) -> PredictionService {
    let mgr = ModelLifecycleManager::new(Box::new(MemorySource::offline()), Box::new(SimulatedLoader));
    let model = constant_model_bytes(14, bias_w, bias_l);
    mgr.bootstrap_default("1.0.0", &model, sample_config_json().as_bytes())
        .expect("bootstrap");
    PredictionService::new(Arc::new(mgr), InferenceEngine::new(1_000))
}

#[rstest]
fn predict_fails_closed_without_an_active_pair() {
    let mgr = ModelLifecycleManager::new(Box::new(MemorySource::offline()), Box::new(SimulatedLoader));
    let service = PredictionService::new(Arc::new(mgr), InferenceEngine::new(1_000));
    let err = service
        .predict(&pond_started_2026_07_01(), &reference_reading(), &[])
        .unwrap_err();
    assert!(matches!(err, PredictError::NoActivePair));
}

#[rstest]
fn end_to_end_prediction_carries_domain_fields() {
    let service = service_with_constant_model(250.0, 25.0);
    let p = service
        .predict(&pond_started_2026_07_01(), &reference_reading(), &[])
        .expect("predict");

    assert_eq!(p.weight_g, 250.0);
    assert_eq!(p.length_cm, 25.0);
    assert_eq!(p.model_version, "1.0.0");
    // 250 g in 30 days -> 8.33 g/day -> 30 more days to the 500 g default
    assert_eq!(
        p.harvest_ready_at,
        reference_reading().recorded_at.date_naive() + chrono::Duration::days(30)
    );
}

#[rstest]
fn prediction_is_idempotent_bit_for_bit() {
    let service = service_with_constant_model(250.0, 25.0);
    let pond = pond_started_2026_07_01();
    let reading = reference_reading();
    let history = vec![reading_with_do(5.2, 29), reading_with_do(6.9, 30)];

    let a = service.predict(&pond, &reading, &history).expect("predict");
    let b = service.predict(&pond, &reading, &history).expect("predict");
    assert_eq!(a.weight_g.to_bits(), b.weight_g.to_bits());
    assert_eq!(a.length_cm.to_bits(), b.length_cm.to_bits());
    assert_eq!(a.harvest_ready_at, b.harvest_ready_at);
    assert_eq!(a.model_version, b.model_version);
}

#[rstest]
fn history_order_does_not_matter() {
    // The service sorts history before the rolling window is taken.
    let service = service_with_constant_model(250.0, 25.0);
    let pond = pond_started_2026_07_01();
    let reading = reference_reading();
    let fwd = vec![
        reading_with_do(5.0, 28),
        reading_with_do(6.0, 29),
        reading_with_do(7.0, 30),
    ];
    let rev: Vec<SensorReading> = fwd.iter().rev().cloned().collect();

    let a = service.predict(&pond, &reading, &fwd).expect("predict");
    let b = service.predict(&pond, &reading, &rev).expect("predict");
    assert_eq!(a.weight_g.to_bits(), b.weight_g.to_bits());
}

#[rstest]
fn faulty_sensor_values_never_fail_a_prediction() {
    let service = service_with_constant_model(250.0, 25.0);
    let faulty = SensorReading {
        ammonia: -1.0,
        turbidity: f64::NAN,
        temperature: 95.0,
        ..reference_reading()
    };
    // Input errors are recovered by capping and imputation, not surfaced.
    service
        .predict(&pond_started_2026_07_01(), &faulty, &[])
        .expect("faulty reading must still predict");
}
