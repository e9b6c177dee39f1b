//! Tri-color light module: state model, transition engine, async loops.

pub mod controller;
pub mod state;
pub mod tasks;

pub use controller::{COMPLETE_THRESHOLD, LightController};
pub use state::{LightCommand, LightState, PowerState, Rgb};
pub use tasks::SharedController;
