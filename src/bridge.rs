//! Broker bridge — one connection, many logical topic channels.
//!
//! Wraps one [`BrokerPort`] client by composition and demultiplexes it into
//! per-topic [`Event`] bindings:
//!
//! ```text
//!                      ┌──────────────────────────────┐
//!   broker ──frames──▶ │  poll loop (1 tick / poll    │ ──set──▶ subscriber
//!                      │  interval, fan-out by topic) │ ──set──▶ events
//!                      ├──────────────────────────────┤
//!   broker ◀──send──── │  sender loop per publish     │ ◀─wait── publisher
//!                      │  binding (fan-in, coalescing)│          events
//!                      └──────────────────────────────┘
//! ```
//!
//! Publishing is inverted: producers `set` a publisher event instead of
//! calling the client, and the binding's dedicated sender task performs the
//! actual send.  Only the bridge's tasks ever touch the connection, so no
//! two sends can interleave mid-frame.  A producer that sets again before
//! the sender ran overwrites the pending payload — latest-wins coalescing,
//! not a queue.
//!
//! Teardown contract: [`Bridge::disconnect`] marks the bridge dead and
//! closes every tracked event, so every suspended task observes shutdown on
//! its next scheduling turn.  Sender tasks re-check liveness after waking —
//! a legitimate `set` can race the closing `close` — and drop the payload
//! without sending when the bridge is dead.  [`Bridge::join`] then awaits
//! every retained task handle for deterministic quiescence.

use core::time::Duration;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use log::{info, warn};

use crate::event::Event;
use crate::ports::{BrokerError, BrokerPort};

/// Executor slots per pipeline generation: poll loop, per-topic senders,
/// and the module loops all fit comfortably.
pub const TASK_SLOTS: usize = 8;

/// The executor every pipeline task is spawned on.  All tasks own their
/// state (`Rc` handles), so the spawn lifetime is `'static`.
pub type Executor = edge_executor::LocalExecutor<'static, TASK_SLOTS>;

struct BridgeInner<C> {
    client: RefCell<C>,
    alive: Cell<bool>,
    /// Topic → subscriber events, in subscription order (= dispatch order).
    subscribers: RefCell<HashMap<String, Vec<Event<String>>>>,
    /// Topic → publisher events, one sender task each.
    publishers: RefCell<HashMap<String, Vec<Event<String>>>>,
}

impl<C: BrokerPort> BridgeInner<C> {
    /// Fan a decoded message out to every subscriber of its topic.
    ///
    /// # Panics
    ///
    /// A message for a topic with no subscription entry means the
    /// bookkeeping and the protocol-level subscriptions have diverged —
    /// a bug, not a runtime condition.
    fn dispatch(&self, topic: &str, payload: &str) {
        let subscribers = self.subscribers.borrow();
        let Some(events) = subscribers.get(topic) else {
            panic!("bridge: received message on unsubscribed topic {topic:?}");
        };
        for event in events {
            event.set(payload.to_string());
        }
    }
}

impl<C: BrokerPort + 'static> BridgeInner<C> {
    /// Check for one incoming message per tick and fan it out.
    async fn poll_loop(inner: Rc<BridgeInner<C>>, interval: Duration) {
        while inner.alive.get() {
            let polled = inner.client.borrow_mut().check_msg();
            match polled {
                Ok(Some(message)) => {
                    inner.dispatch(&message.topic, &message.payload);
                }
                Ok(None) => {}
                Err(e) => {
                    // Teardown closes the connection under us; only a poll
                    // failure on a live bridge is worth reporting.
                    if inner.alive.get() {
                        warn!("bridge: poll failed: {e}");
                    }
                    break;
                }
            }
            async_io_mini::Timer::after(interval).await;
        }
    }

    /// Forward each value set on `event` as one protocol publish.
    async fn sender_loop(inner: Rc<BridgeInner<C>>, topic: String, event: Event<String>) {
        loop {
            let Some(payload) = event.wait().await else {
                break;
            };
            // The wake may have raced disconnect; never send on a dead
            // bridge.
            if !inner.alive.get() {
                break;
            }
            if let Err(e) = inner.client.borrow_mut().publish(&topic, &payload) {
                warn!("bridge: publish to {topic} failed: {e}");
            }
            event.clear();
        }
    }
}

/// Asynchronous multi-topic facade over one protocol connection.
pub struct Bridge<'ex, C> {
    inner: Rc<BridgeInner<C>>,
    executor: &'ex Executor,
    tasks: RefCell<Vec<async_task::Task<()>>>,
    poll_interval: Duration,
}

impl<'ex, C: BrokerPort + 'static> Bridge<'ex, C> {
    /// Wrap an unconnected client.  No tasks run until [`Bridge::connect`].
    pub fn new(client: C, executor: &'ex Executor, poll_interval: Duration) -> Self {
        Self {
            inner: Rc::new(BridgeInner {
                client: RefCell::new(client),
                alive: Cell::new(true),
                subscribers: RefCell::new(HashMap::new()),
                publishers: RefCell::new(HashMap::new()),
            }),
            executor,
            tasks: RefCell::new(Vec::new()),
            poll_interval,
        }
    }

    /// Establish the connection and start the poll loop.
    ///
    /// A connect failure is returned to the caller and ends the pipeline —
    /// retry policy, if any, belongs to the outer driver.
    pub fn connect(&self) -> Result<(), BrokerError> {
        self.inner.client.borrow_mut().connect()?;
        info!("bridge: connected");
        let task = self
            .executor
            .spawn(BridgeInner::poll_loop(Rc::clone(&self.inner), self.poll_interval));
        self.tasks.borrow_mut().push(task);
        Ok(())
    }

    /// Register interest in `topic` with a fresh event.
    pub fn subscribe(&self, topic: &str) -> Result<Event<String>, BrokerError> {
        let event = Event::new();
        self.subscribe_with(topic, &event)?;
        Ok(event)
    }

    /// Bind an existing event to `topic` (fan-out: the same event may be
    /// bound to several topics, and several events to the same topic).
    ///
    /// The protocol-level subscribe is issued once per topic; later
    /// bindings only append to the dispatch list.
    pub fn subscribe_with(&self, topic: &str, event: &Event<String>) -> Result<(), BrokerError> {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        if !subscribers.contains_key(topic) {
            info!("bridge: subscribing to {topic}");
            self.inner.client.borrow_mut().subscribe(topic)?;
        }
        subscribers
            .entry(topic.to_string())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    /// Create a publish binding for `topic` and spawn its sender task.
    ///
    /// Publishing is `event.set(payload)`; the sender performs the protocol
    /// send and clears the slot.  Multiple bindings per topic are legal and
    /// run concurrently.
    pub fn publish(&self, topic: &str) -> Event<String> {
        let event = Event::new();
        self.inner
            .publishers
            .borrow_mut()
            .entry(topic.to_string())
            .or_default()
            .push(event.clone());
        let task = self.executor.spawn(BridgeInner::sender_loop(
            Rc::clone(&self.inner),
            topic.to_string(),
            event.clone(),
        ));
        self.tasks.borrow_mut().push(task);
        event
    }

    /// Tear down: mark dead, wake every suspended task with shutdown, close
    /// the connection.  Idempotent.
    pub fn disconnect(&self) {
        if !self.inner.alive.replace(false) {
            return;
        }
        info!("bridge: disconnecting");
        for events in self.inner.subscribers.borrow().values() {
            for event in events {
                event.close();
            }
        }
        for events in self.inner.publishers.borrow().values() {
            for event in events {
                event.close();
            }
        }
        self.inner.client.borrow_mut().disconnect();
    }

    /// Await every task this bridge spawned.
    ///
    /// Call after [`Bridge::disconnect`]; with the events closed and the
    /// liveness flag down, each loop exits on its next scheduling turn.
    pub async fn join(&self) {
        let tasks: Vec<_> = self.tasks.borrow_mut().drain(..).collect();
        for task in tasks {
            task.await;
        }
    }

    /// Whether [`Bridge::disconnect`] has not yet run.
    pub fn is_alive(&self) -> bool {
        self.inner.alive.get()
    }
}

// ── Tests ────────────────────────────────────────────────────
