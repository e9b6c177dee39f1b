//! Time-driven transition engine.
//!
//! Owns the `{start, target, current}` state triple and three PWM output
//! channels.  [`LightController::set_target`] arms a transition;
//! [`LightController::step`] advances the interpolation from an injected
//! monotonic timestamp, so the engine itself contains no clock and no
//! suspension points — the async loops in [`super::tasks`] drive it.
//!
//! Between `set_target` and completion, `current` always lies component-wise
//! between `start` and `target` along the interpolation parameter `t`.
//! On completion `current` snaps to `target` exactly.

use log::{info, warn};

use super::state::{LightCommand, LightState, PowerState, Rgb};
use crate::ports::PwmPort;

/// Interpolation fraction at which a transition counts as complete.
///
/// Slightly below 1.0 to absorb timer granularity and floating-point
/// rounding; without the tolerance a 100 ms update tick could leave a
/// transition permanently one step short of done.
pub const COMPLETE_THRESHOLD: f32 = 0.999;

/// Transition engine for one tri-color fixture.
pub struct LightController<P> {
    red: P,
    green: P,
    blue: P,
    start: LightState,
    target: LightState,
    current: LightState,
    /// Last fully-ON state, restored on OFF→ON with no usable color.
    remembered_on: LightState,
    started_ms: u64,
    duration_ms: u64,
    done: bool,
    alive: bool,
}

impl<P: PwmPort> LightController<P> {
    /// Construct a settled engine: all three states equal, everything dark.
    ///
    /// Drives the channels once so the hardware agrees with `current`.
    pub fn new(red: P, green: P, blue: P) -> Self {
        let mut controller = Self {
            red,
            green,
            blue,
            start: LightState::default(),
            target: LightState::default(),
            current: LightState::default(),
            remembered_on: LightState::default(),
            started_ms: 0,
            duration_ms: 0,
            done: true,
            alive: true,
        };
        controller.apply_output();
        controller
    }

    /// Whether no transition is in flight.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Whether the engine still owns its output channels.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// The tracked output state.
    pub fn current(&self) -> &LightState {
        &self.current
    }

    /// Serialized `current`, as published on the state topic.
    pub fn state_json(&self) -> String {
        serde_json::to_string(&self.current).unwrap_or_default()
    }

    /// Arm a transition toward `command`, starting at `now_ms`.
    ///
    /// ON→OFF snapshots the lit state and forces the target dark, so OFF
    /// animates through the same interpolation path as any other change.
    /// OFF→ON with an unspecified or all-zero color restores the remembered
    /// color (full white if nothing usable was remembered), and an
    /// unspecified brightness restores the remembered brightness — a bare
    /// "turn on" is never a no-op.
    pub fn set_target(&mut self, command: LightCommand, now_ms: u64) {
        let mut command = command;
        if self.current.state == PowerState::On && command.state != Some(PowerState::On) {
            self.remembered_on = self.current.clone();
        } else if self.current.state != PowerState::On && command.state == Some(PowerState::On) {
            if command.color.is_none_or(Rgb::is_black) {
                let mut color = self.remembered_on.color;
                if color.is_black() {
                    color = Rgb::WHITE;
                }
                command.color = Some(color);
            }
            if command.brightness.is_none() {
                command.brightness = Some(self.remembered_on.brightness);
            }
        }

        self.start = self.current.clone();
        let mut target = self.start.clone();
        target.apply(&command);
        if target.state != PowerState::On {
            target.color = Rgb::BLACK;
            target.brightness = 0;
        }

        info!(
            "light: transition to {:?} over {}s",
            target, target.transition
        );
        self.duration_ms = u64::from(target.transition) * 1000;
        self.target = target;
        self.started_ms = now_ms;
        self.done = false;
    }

    /// Advance the interpolation to `now_ms` and drive the channels.
    ///
    /// Returns `true` exactly once per transition, on the call that
    /// completes it.  A zero duration completes immediately; a timestamp
    /// before the recorded start reads as zero elapsed time (monotonic
    /// clock anomaly guard).
    pub fn step(&mut self, now_ms: u64) -> bool {
        if self.done {
            return false;
        }

        let elapsed = now_ms.saturating_sub(self.started_ms);
        let t = if self.duration_ms == 0 {
            1.0
        } else {
            (elapsed as f32 / self.duration_ms as f32).min(1.0)
        };

        self.current.brightness = lerp(self.start.brightness, self.target.brightness, t);
        self.current.color.r = lerp(self.start.color.r, self.target.color.r, t);
        self.current.color.g = lerp(self.start.color.g, self.target.color.g, t);
        self.current.color.b = lerp(self.start.color.b, self.target.color.b, t);
        self.apply_output();

        if t >= COMPLETE_THRESHOLD || self.current.matches(&self.target) {
            self.current = self.target.clone();
            self.apply_output();
            self.done = true;
            return true;
        }
        false
    }

    /// Release the three output channels and mark the engine dead.
    ///
    /// Idempotent; a killed engine ignores further `step` calls only in the
    /// sense that its channels no longer exist — callers stop stepping it.
    pub fn kill(&mut self) {
        if !self.alive {
            return;
        }
        self.red.release();
        self.green.release();
        self.blue.release();
        self.alive = false;
    }

    /// Interpolation fraction for `now_ms`, clamped to `[0, 1]`.
    ///
    /// Exposed for the convergence property tests; `1.0` when settled.
    pub fn fraction(&self, now_ms: u64) -> f32 {
        if self.done || self.duration_ms == 0 {
            return 1.0;
        }
        (now_ms.saturating_sub(self.started_ms) as f32 / self.duration_ms as f32).min(1.0)
    }

    fn apply_output(&mut self) {
        let brightness = f32::from(self.current.brightness) / 255.0;
        self.red
            .set_intensity(f32::from(self.current.color.r) * brightness / 255.0);
        self.green
            .set_intensity(f32::from(self.current.color.g) * brightness / 255.0);
        self.blue
            .set_intensity(f32::from(self.current.color.b) * brightness / 255.0);
    }
}

/// Linear interpolation with truncation to the 8-bit channel domain.
fn lerp(from: u8, to: u8, t: f32) -> u8 {
    (f32::from(from) + (f32::from(to) - f32::from(from)) * t) as u8
}

/// Parse a control payload.  Malformed payloads are reported by the caller
/// and leave the engine untouched.
pub fn parse_command(payload: &str) -> Option<LightCommand> {
    match serde_json::from_str(payload) {
        Ok(command) => Some(command),
        Err(e) => {
            warn!("light: malformed control payload {payload:?}: {e}");
            None
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
