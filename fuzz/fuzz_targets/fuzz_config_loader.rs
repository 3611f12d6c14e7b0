#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // We fuzz JSON parsing of PreprocessingConfig and ensure it never panics
    // and rejects invalids gracefully. Accept both parse errors and
    // resolution errors, but do not allow panics.
    let parsed = aqua_config::load_preprocessing_json(data);
    match parsed {
        Ok(cfg) => {
            // Ensure resolve() does not panic
            let _ = cfg.resolve();
        }
        Err(_e) => {
            // parse error is acceptable
        }
    }
});
