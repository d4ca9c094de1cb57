#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Fuzz TOML parsing of Config: invalid input must be rejected
    // gracefully, never by panicking.
    match toml::from_str::<desk_config::Config>(data) {
        Ok(cfg) => {
            // validate() must not panic either
            let _ = cfg.validate();
        }
        Err(_e) => {
            // parse error is acceptable
        }
    }
});
