#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(file) = toml::from_str::<fjgate_types::ConfigFile>(s)
    {
        // Merging must reject bad values with an error, never a panic.
        let _ = fjgate_config::resolve(fjgate_config::Overrides::default(), &file);
    }
});
