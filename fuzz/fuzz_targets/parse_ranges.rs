#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(classes) = fjgate_config::parse_ranges(s)
    {
        for class in classes {
            assert!(class.start() < class.end());
        }
    }
});
