//! Human-readable error descriptions and structured JSON error formatting.

/// Map an eyre::Report to a human-readable explanation with likely causes
/// and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use aqua_core::error::{InferenceError, PredictError};

    // Typed matches first
    if let Some(pe) = err.downcast_ref::<PredictError>() {
        return match pe {
            PredictError::NoActivePair => {
                "What happened: No model/config pair is active.\nLikely causes: Missing default artifacts, or the installed pair failed validation.\nHow to fix: Check artifacts.dir in the settings TOML and run `aqua self-check`.".to_string()
            }
            PredictError::Inference(ie) => humanize_inference(ie),
        };
    }
    if let Some(ie) = err.downcast_ref::<InferenceError>() {
        return humanize_inference(ie);
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("history csv must have headers") {
        return "Invalid headers in history CSV. Expected 'recorded_at,temperature,ph,dissolved_oxygen,ammonia,nitrate,turbidity'.".to_string();
    }
    if lower.contains("read default model") || lower.contains("read default config") {
        return "What happened: Default artifacts could not be read.\nLikely causes: artifacts.dir points somewhere else, or the files were never shipped.\nHow to fix: Fix [artifacts] in the settings TOML.".to_string();
    }
    if lower.contains("scaler.") || lower.contains("feature name") {
        return format!(
            "What happened: The preprocessing config is inconsistent ({msg}).\nLikely causes: Hand-edited artifact or a bad training export.\nHow to fix: Restore a known-good pair or re-download the release."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn humanize_inference(ie: &aqua_core::error::InferenceError) -> String {
    use aqua_core::error::InferenceError::*;
    match ie {
        NoModel => "What happened: No model is loaded.\nHow to fix: Run `aqua self-check` to verify artifacts.".to_string(),
        WidthMismatch { got, expected } => format!(
            "What happened: The feature vector has {got} values but the model expects {expected}.\nLikely causes: A model and config from different releases.\nHow to fix: Re-apply a complete release (`aqua apply-update`)."
        ),
        OutputWidth { got, expected } => format!(
            "What happened: The model returned {got} outputs, expected {expected}.\nLikely causes: Incompatible model artifact.\nHow to fix: Re-apply a complete release."
        ),
        NonFinite => "What happened: The model produced NaN/Inf.\nLikely causes: Corrupt weights or pathological inputs.\nHow to fix: Re-download the model; check sensor calibration.".to_string(),
        LatencyExceeded { budget_ms } => format!(
            "What happened: Inference exceeded the {budget_ms} ms budget.\nHow to fix: Raise inference.latency_budget_ms or use a smaller model."
        ),
        CorruptModel(msg) => format!(
            "What happened: The model artifact is corrupt ({msg}).\nHow to fix: Re-download the release."
        ),
        Runtime(msg) => format!(
            "What happened: The model backend failed ({msg}).\nHow to fix: Re-run with --log-level=debug for details."
        ),
    }
}

/// Stable exit codes: prediction failures return 3, everything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<aqua_core::error::PredictError>().is_some() {
        return 3;
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use aqua_core::error::PredictError;
    use serde_json::json;

    let reason = match err.downcast_ref::<PredictError>() {
        Some(PredictError::NoActivePair) => "NoActivePair",
        Some(PredictError::Inference(_)) => "Inference",
        None => "Error",
    };
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}
