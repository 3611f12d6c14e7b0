mod common;

use aqua_core::features::{raw_vector, rolling_avg_do};
use aqua_core::SensorReading;
use common::*;
use rstest::rstest;

#[rstest]
fn vector_matches_config_length_and_order() {
    let cfg = sample_resolved();
    let reading = reference_reading();
    let pond = pond_started_2026_07_01();

    let raw = raw_vector(&cfg, &reading, &pond, &[]);
    assert_eq!(raw.len(), cfg.feature_len());

    // Base features land at the positions the config dictates
    assert_eq!(raw[0], 28.0); // temperature
    assert_eq!(raw[1], 7.2); // ph
    assert_eq!(raw[2], 6.0); // dissolved_oxygen
    assert_eq!(raw[3], 0.4); // ammonia
    assert_eq!(raw[6], 30.0); // days_in_farm: Jul 1 -> Jul 31
    assert_eq!(raw[7], 212.0); // day_of_year of 2026-07-31
    assert_eq!(raw[8], 6.0); // hour
    assert_eq!(raw[11], 28.0 * 6.0); // temp_do_interaction
}

#[rstest]
fn no_history_degrades_to_single_point_statistics() {
    // 30-day pond, no prior history: the 1-point rolling average equals
    // the current DO and the deviation is |6.0 - opt| / opt.
    let cfg = sample_resolved();
    let reading = reference_reading();
    let pond = pond_started_2026_07_01();

    let raw = raw_vector(&cfg, &reading, &pond, &[]);
    let avg_do = raw[12];
    let wqi = raw[13];
    assert_eq!(avg_do, 6.0);
    assert_eq!(wqi, (6.0f64 - 6.0).abs() / 6.0);
}

#[rstest]
fn rolling_average_uses_whatever_history_exists() {
    // Three history points plus current, window 7: plain mean of the four.
    let history = vec![
        reading_with_do(5.0, 28),
        reading_with_do(6.0, 29),
        reading_with_do(7.0, 30),
    ];
    let avg = rolling_avg_do(6.0, &history, 7);
    assert!((avg - 6.0).abs() < 1e-12);

    // Window 3 keeps only the two most recent history points plus current.
    let avg = rolling_avg_do(6.0, &history, 3);
    assert!((avg - (6.0 + 7.0 + 6.0) / 3.0).abs() < 1e-12);
}

#[rstest]
fn rolling_average_skips_non_finite_history() {
    let history = vec![reading_with_do(f64::NAN, 29), reading_with_do(4.0, 30)];
    let avg = rolling_avg_do(6.0, &history, 7);
    assert!((avg - 5.0).abs() < 1e-12);
}

#[rstest]
fn cyclic_encodings_are_continuous_at_the_boundary() {
    let cfg = sample_resolved();
    let pond = pond_started_2026_07_01();

    // 23:00 and 00:00 must be close in (sin, cos) space, unlike the linear hour.
    let late = SensorReading {
        recorded_at: at(2026, 7, 31, 23),
        ..reference_reading()
    };
    let midnight = SensorReading {
        recorded_at: at(2026, 7, 31, 0),
        ..reference_reading()
    };
    let raw_late = raw_vector(&cfg, &late, &pond, &[]);
    let raw_mid = raw_vector(&cfg, &midnight, &pond, &[]);
    let d_sin = (raw_late[9] - raw_mid[9]).abs();
    let d_cos = (raw_late[10] - raw_mid[10]).abs();
    assert!(d_sin < 0.3, "sin_hour jumps at midnight: {d_sin}");
    assert!(d_cos < 0.1, "cos_hour jumps at midnight: {d_cos}");
}

#[rstest]
fn day_of_year_and_day_pair_when_configured() {
    // A config that selects the sine/cosine day encodings.
    let names = ["day_of_year", "sin_day", "cos_day"];
    let json = config_json_with(&names, &[0.0; 3], &[1.0; 3]);
    let cfg = aqua_config::load_preprocessing_json(&json)
        .unwrap()
        .resolve()
        .unwrap();
    let raw = raw_vector(
        &cfg,
        &reference_reading(),
        &pond_started_2026_07_01(),
        &[],
    );
    assert_eq!(raw.len(), 3);
    assert_eq!(raw[0], 212.0);
    let angle = std::f64::consts::TAU * 212.0 / 366.0;
    assert!((raw[1] - angle.sin()).abs() < 1e-12);
    assert!((raw[2] - angle.cos()).abs() < 1e-12);
}
