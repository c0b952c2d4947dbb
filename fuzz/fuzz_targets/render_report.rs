#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(report) = serde_json::from_slice::<fjgate_types::RunReport>(data) {
        let _ = fjgate_app::render::render_markdown(&report);
        let palette = fjgate_app::render::Palette::plain();
        for class in &report.classes {
            let _ = fjgate_app::render::render_class_result(class, &palette);
        }
        if let Some(fatal) = &report.fatal {
            let _ = fjgate_app::render::render_fatal(fatal);
        }
    }
});
