mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use aqua_config::load_manifest_json;
use aqua_core::lifecycle::sha256_hex;
use aqua_core::mocks::MemorySource;
use aqua_core::{ModelLifecycleManager, UpdateEvent, UpdateOutcome, UpdateWorker};
use aqua_runtime::SimulatedLoader;
use aqua_traits::clock::MonotonicClock;
use common::*;

#[test]
fn worker_applies_candidate_and_joins_on_drop() {
    let model_v2 = constant_model_bytes(14, 200.0, 20.0);
    let config = sample_config_json();
    let manifest = load_manifest_json(&manifest_json(
        "2.0.0",
        &sha256_hex(&model_v2),
        &sha256_hex(config.as_bytes()),
    ))
    .unwrap();
    let source = MemorySource::new(
        manifest,
        BTreeMap::from([
            ("model.bin".to_string(), model_v2.clone()),
            ("preprocessing.json".to_string(), config.clone().into_bytes()),
        ]),
    );

    let mgr = Arc::new(ModelLifecycleManager::new(
        Box::new(source),
        Box::new(SimulatedLoader),
    ));
    let model_v1 = constant_model_bytes(14, 100.0, 10.0);
    mgr.bootstrap_default("1.0.0", &model_v1, config.as_bytes())
        .expect("bootstrap");

    let worker = UpdateWorker::spawn(mgr.clone(), Duration::from_millis(10), MonotonicClock::new());

    // The first cycle should check, find the candidate, and apply it.
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut applied = false;
    while Instant::now() < deadline {
        if worker
            .drain_events()
            .iter()
            .any(|e| matches!(e, UpdateEvent::Outcome(UpdateOutcome::Applied(v)) if v == "2.0.0"))
        {
            applied = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(applied, "worker never applied the candidate");
    assert_eq!(mgr.active_version().as_deref(), Some("2.0.0"));

    // Drop must shut the thread down promptly.
    let start = Instant::now();
    drop(worker);
    assert!(start.elapsed() < Duration::from_secs(2), "drop hung on join");
}
