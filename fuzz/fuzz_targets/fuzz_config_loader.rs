#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Config parsing and validation must reject garbage without panicking,
    // including duration strings with odd units or huge numbers.
    if let Ok(cfg) = impulse_config::load_toml(data) {
        let _ = cfg.validate();
        let _ = cfg.warnings();
        let _ = cfg.summary();
    }
    if data.len() < 64 {
        let _ = impulse_config::parse_duration_ms(data);
    }
});
