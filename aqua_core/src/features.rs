//! Feature engineering: one reading plus recent history → raw feature
//! vector in the order the active config dictates.
//!
//! The producible feature set is closed (`aqua_config::FeatureId`); a config
//! naming anything outside it was already rejected at load time, so this
//! module never has to guess a default. Inputs are expected to be
//! biologically capped already (`normalize::cap_reading`), so derived
//! features only ever see in-range base values.

use std::f64::consts::TAU;

use aqua_config::{FeatureId, ResolvedConfig};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc};

use crate::util::mean_finite;
use crate::{FeatureVector, PondContext, SensorReading};

/// Whole days elapsed from pond start (midnight UTC) to the reading,
/// truncated like the training pipeline's timestamp difference, plus the
/// configured day-zero offset. Never negative.
pub fn days_in_farm(start_date: NaiveDate, recorded_at: DateTime<Utc>, day_zero_offset: i64) -> f64 {
    let start = start_date.and_time(NaiveTime::MIN);
    let days = (recorded_at.naive_utc() - start).num_days();
    (days + day_zero_offset).max(0) as f64
}

/// Trailing rolling average of dissolved oxygen: the most recent
/// `window - 1` history points plus the current reading, minimum one point.
/// Non-finite samples are skipped; if nothing finite remains the current
/// value passes through (imputation handles it downstream).
pub fn rolling_avg_do(current_do: f64, history: &[SensorReading], window: usize) -> f64 {
    let take = window.saturating_sub(1).min(history.len());
    let tail = &history[history.len() - take..];
    let values = tail
        .iter()
        .map(|r| r.dissolved_oxygen)
        .chain(std::iter::once(current_do));
    mean_finite(values).unwrap_or(current_do)
}

/// Produce the raw feature vector for `reading`, honoring the config's
/// feature order. `history` must be sorted chronologically.
pub fn raw_vector(
    cfg: &ResolvedConfig,
    reading: &SensorReading,
    pond: &PondContext,
    history: &[SensorReading],
) -> FeatureVector {
    let consts = cfg.constants;
    let days = days_in_farm(pond.start_date, reading.recorded_at, consts.day_zero_offset);
    let day_of_year = f64::from(reading.recorded_at.ordinal());
    let hour = f64::from(reading.recorded_at.hour());
    let avg_do = rolling_avg_do(
        reading.dissolved_oxygen,
        history,
        consts.rolling_window,
    );
    // Relative (unitless) deviation of the rolling DO average from optimum
    let avg_wqi = (avg_do - consts.optimal_do).abs() / consts.optimal_do;

    cfg.features()
        .iter()
        .map(|p| match p.id {
            FeatureId::Temperature => reading.temperature,
            FeatureId::Ph => reading.ph,
            FeatureId::DissolvedOxygen => reading.dissolved_oxygen,
            FeatureId::Ammonia => reading.ammonia,
            FeatureId::Nitrate => reading.nitrate,
            FeatureId::Turbidity => reading.turbidity,
            FeatureId::DaysInFarm => days,
            FeatureId::DayOfYear => day_of_year,
            FeatureId::Hour => hour,
            FeatureId::SinHour => (TAU * hour / 24.0).sin(),
            FeatureId::CosHour => (TAU * hour / 24.0).cos(),
            FeatureId::SinDay => (TAU * day_of_year / 366.0).sin(),
            FeatureId::CosDay => (TAU * day_of_year / 366.0).cos(),
            FeatureId::TempDoInteraction => reading.temperature * reading.dissolved_oxygen,
            FeatureId::AvgDo7d => avg_do,
            FeatureId::AvgWqi7d => avg_wqi,
        })
        .collect()
}

#[cfg(test)]
mod days_tests {
    use super::days_in_farm;
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn truncates_partial_days() {
        let start = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        // 30 days and 6 hours later still counts as 30 days
        let at = Utc.with_ymd_and_hms(2026, 7, 31, 6, 0, 0).unwrap();
        assert_eq!(days_in_farm(start, at, 0), 30.0);
    }

    #[test]
    fn clamps_future_start_to_zero() {
        let start = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap();
        assert_eq!(days_in_farm(start, at, 0), 0.0);
    }

    #[test]
    fn applies_day_zero_offset() {
        let start = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 7, 11, 0, 0, 0).unwrap();
        assert_eq!(days_in_farm(start, at, 1), 11.0);
    }
}
