//! Async loops that drive one [`LightController`].
//!
//! Three cooperative tasks per module instance, all spawned by the
//! supervisor with retained handles:
//!
//! 1. **Control** — waits on the control event, parses the payload, arms
//!    the engine.  Malformed payloads are logged and discarded.
//! 2. **Update** — ticks the engine at the configured interval while a
//!    transition is in flight; publishes the serialized state on
//!    completion.
//! 3. **State request** — answers `get_state` queries with the current
//!    serialized state.
//!
//! Every loop re-checks liveness after waking: a closed event (`None` from
//! `wait`) or a killed engine means teardown is in progress and the task
//! must exit instead of acting on stale state.

use core::time::Duration;
use std::cell::RefCell;
use std::rc::Rc;

use super::controller::{LightController, parse_command};
use super::state::LightCommand;
use crate::event::Event;
use crate::ports::{ClockPort, PwmPort};

/// Shared handle to one engine, multiplexed between the three loops.
pub type SharedController<P> = Rc<RefCell<LightController<P>>>;

/// Control loop: decode control payloads into transition targets.
///
/// `default_state` is injected into the control event before the first
/// wait, as if it had arrived over the wire.
pub async fn control_loop<P: PwmPort, K: ClockPort>(
    controller: SharedController<P>,
    control: Event<String>,
    default_state: Option<LightCommand>,
    clock: Rc<K>,
) {
    if let Some(command) = default_state {
        if let Ok(payload) = serde_json::to_string(&command) {
            control.set(payload);
        }
    }
    loop {
        let Some(payload) = control.wait().await else {
            break;
        };
        if let Some(command) = parse_command(&payload) {
            controller.borrow_mut().set_target(command, clock.now_ms());
        }
        control.clear();
    }
}

/// Update loop: periodic engine ticks, state publish on completion.
///
/// Exits when the engine has been killed.
pub async fn update_loop<P: PwmPort, K: ClockPort>(
    controller: SharedController<P>,
    status: Event<String>,
    interval: Duration,
    clock: Rc<K>,
) {
    loop {
        let completed = {
            let mut engine = controller.borrow_mut();
            if !engine.is_alive() {
                break;
            }
            if !engine.is_done() && engine.step(clock.now_ms()) {
                Some(engine.state_json())
            } else {
                None
            }
        };
        if let Some(payload) = completed {
            status.set(payload);
        }
        async_io_mini::Timer::after(interval).await;
    }
}

/// State request loop: answer `get_state` queries.
pub async fn state_request_loop<P: PwmPort>(
    controller: SharedController<P>,
    request: Event<String>,
    status: Event<String>,
) {
    loop {
        if request.wait().await.is_none() {
            break;
        }
        status.set(controller.borrow().state_json());
        request.clear();
    }
}
