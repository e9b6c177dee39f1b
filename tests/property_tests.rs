//! Property tests for the transition math and the document merge.

use proptest::prelude::*;
use serde_json::{Value, json};

use lightbridge::config::merge_document;
use lightbridge::light::{LightCommand, LightController, PowerState, Rgb};
use lightbridge::ports::PwmPort;

struct NullChannel;

impl PwmPort for NullChannel {
    fn set_intensity(&mut self, level: f32) {
        assert!((0.0..=1.0).contains(&level));
    }
    fn release(&mut self) {}
}

fn engine() -> LightController<NullChannel> {
    LightController::new(NullChannel, NullChannel, NullChannel)
}

// ── Transition convergence ────────────────────────────────────

proptest! {
    /// For strictly increasing sample times, the interpolation fraction is
    /// monotonically non-decreasing, `done` fires at most once, and the
    /// engine is settled once elapsed time reaches the duration.
    #[test]
    fn interpolation_converges(
        duration_secs in 1u32..=120u32,
        mut offsets in proptest::collection::vec(0u64..400_000u64, 1..40),
    ) {
        offsets.sort_unstable();
        offsets.dedup();

        let started = 5u64;
        let duration_ms = u64::from(duration_secs) * 1000;
        let mut e = engine();
        e.set_target(
            LightCommand {
                color: Some(Rgb::WHITE),
                transition: Some(duration_secs),
                state: Some(PowerState::On),
                ..LightCommand::default()
            },
            started,
        );

        let mut last_fraction = 0.0f32;
        let mut completed_at = None;
        for offset in offsets {
            let now = started + offset;
            let fraction = e.fraction(now);
            prop_assert!(
                fraction >= last_fraction - 1e-6,
                "fraction regressed: {} -> {}", last_fraction, fraction
            );
            last_fraction = fraction;

            if e.step(now) {
                prop_assert!(completed_at.is_none(), "completed twice");
                completed_at = Some(offset);
            }
            if offset >= duration_ms {
                prop_assert!(e.is_done(), "not settled at elapsed {} >= {}", offset, duration_ms);
            }
        }

        if let Some(offset) = completed_at {
            // Completion never fires meaningfully before the duration.
            prop_assert!(offset as f64 >= 0.998 * duration_ms as f64);
            prop_assert_eq!(e.current().color, Rgb::WHITE);
            prop_assert_eq!(e.current().state, PowerState::On);
        }
    }

    /// An interpolated channel never overshoots its target.
    #[test]
    fn interpolation_stays_in_bounds(
        target_r in 1u8..=255u8,
        brightness in 0u8..=255u8,
        offset in 0u64..10_000u64,
    ) {
        let mut e = engine();
        e.set_target(
            LightCommand {
                brightness: Some(brightness),
                color: Some(Rgb { r: target_r, g: 0, b: 0 }),
                transition: Some(8),
                state: Some(PowerState::On),
                ..LightCommand::default()
            },
            0,
        );
        e.step(offset);
        let r = e.current().color.r;
        prop_assert!(r <= target_r, "channel overshot: {} > {}", r, target_r);
    }
}

// ── Document merge ────────────────────────────────────────────

proptest! {
    /// Every fragment key ends up in the merged document with the
    /// fragment's value; untouched base keys survive.
    #[test]
    fn merge_is_fragment_biased(
        base in proptest::collection::btree_map("[a-d]{1,2}", any::<i64>(), 0..6),
        fragment in proptest::collection::btree_map("[c-f]{1,2}", any::<i64>(), 0..6),
    ) {
        let mut document = json!(base);
        merge_document(&mut document, json!(fragment.clone()));

        let merged = document.as_object().unwrap();
        for (key, value) in &fragment {
            prop_assert_eq!(merged.get(key.as_str()), Some(&json!(value)));
        }
        for (key, value) in &base {
            if !fragment.contains_key(key) {
                prop_assert_eq!(merged.get(key.as_str()), Some(&json!(value)));
            }
        }
    }

    /// Applying the same fragment twice gives the same document as
    /// applying it once.
    #[test]
    fn merge_is_idempotent(
        base in proptest::collection::btree_map("[a-d]{1,2}", any::<i64>(), 0..6),
        fragment in proptest::collection::btree_map("[c-f]{1,2}", any::<i64>(), 0..6),
    ) {
        let mut once = json!(base);
        merge_document(&mut once, json!(fragment.clone()));
        let mut twice = once.clone();
        merge_document(&mut twice, json!(fragment));
        prop_assert_eq!(once, twice);
    }
}

// ── Wire payload round trip ───────────────────────────────────

proptest! {
    /// Any command the engine can serialize parses back identically.
    #[test]
    fn command_serialization_round_trips(
        brightness in proptest::option::of(0u8..=255u8),
        r in 0u8..=255u8,
        g in 0u8..=255u8,
        b in 0u8..=255u8,
        transition in proptest::option::of(0u32..=600u32),
        on in proptest::option::of(any::<bool>()),
    ) {
        let command = LightCommand {
            brightness,
            color: Some(Rgb { r, g, b }),
            flash: None,
            transition,
            state: on.map(|on| if on { PowerState::On } else { PowerState::Off }),
        };
        let payload = serde_json::to_string(&command).unwrap();
        let parsed: LightCommand = serde_json::from_str(&payload).unwrap();
        prop_assert_eq!(parsed, command);

        let value: Value = serde_json::from_str(&payload).unwrap();
        prop_assert!(value.is_object());
    }
}
