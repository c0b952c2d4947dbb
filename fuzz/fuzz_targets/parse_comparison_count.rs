#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let stdout = String::from_utf8_lossy(data);
    let count = fjgate_domain::parse_comparison_count(&stdout);
    if count.is_some() {
        assert!(stdout.contains(fjgate_types::COMPARISONS_LINE_PREFIX));
    }
    let _ = fjgate_domain::classify(0, false, &stdout, false);
    if let fjgate_types::OutcomeKind::Success { comparisons } =
        fjgate_domain::classify(0, false, &stdout, true)
    {
        assert_eq!(count, Some(comparisons));
    }
});
