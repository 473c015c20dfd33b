#![no_main]

use ab_verdict::config::ExperimentConfig;
use ab_verdict::experiment::ExperimentalPipeline;
use ab_verdict::scores::ExperimentInput;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parsing and running must never panic, whatever the input
    if let Ok(input) = std::str::from_utf8(data) {
        let Ok(input) = ExperimentInput::from_json_str(input) else {
            return;
        };
        let Ok((scores, models)) = input.into_parts() else {
            return;
        };
        if let Ok(mut pipeline) =
            ExperimentalPipeline::new(scores, models, ExperimentConfig::default())
        {
            let _ = pipeline.run();
        }
    }
});
