//! Broadcast event cell — the synchronization primitive everything else is
//! built from.
//!
//! An [`Event`] is a single-slot, multi-waiter cell for a cooperatively
//! scheduled single-threaded executor.  Producers call [`Event::set`];
//! every task currently suspended in [`Event::wait`] wakes and observes the
//! value.  The slot holds one value at a time: a second `set` before the
//! consumer's [`Event::clear`] overwrites it (latest-wins, no queueing).
//!
//! ```text
//!   producer ──set(v)──▶ ┌───────────┐ ──wake──▶ waiter A
//!   producer ──set(v)──▶ │  Event<T> │ ──wake──▶ waiter B
//!            ──close()─▶ └───────────┘ ──wake──▶ waiter C (observes None)
//! ```
//!
//! [`Event::close`] is the shutdown convention: it poisons the slot so every
//! current and future waiter resumes with `None` and can exit its loop.  A
//! closed event stays closed — `clear` does not revive it, so a producer
//! racing a teardown cannot resurrect a dead binding.
//!
//! Consumers own the `clear` duty: a consumed value that is never cleared
//! makes every subsequent `wait` resolve immediately with the stale value.

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use std::cell::RefCell;
use std::rc::Rc;

enum Slot<T> {
    Empty,
    Value(T),
    Closed,
}

struct Inner<T> {
    slot: Slot<T>,
    wakers: Vec<Waker>,
}

/// A cloneable handle to one shared broadcast cell.
///
/// Clones refer to the same slot; the handle is reference-counted and meant
/// to be passed freely between the tasks of one executor.  Not `Send` — the
/// whole pipeline runs on a single cooperative scheduler.
pub struct Event<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Event<T> {
    /// Create an empty (unset) event.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                slot: Slot::Empty,
                wakers: Vec::new(),
            })),
        }
    }

    /// Store `value` and wake every current waiter.
    ///
    /// Overwrites an unconsumed prior value.  A `set` on a closed event is
    /// discarded — the consumer is already shutting down.
    pub fn set(&self, value: T) {
        let pending = {
            let mut inner = self.inner.borrow_mut();
            if matches!(inner.slot, Slot::Closed) {
                return;
            }
            inner.slot = Slot::Value(value);
            core::mem::take(&mut inner.wakers)
        };
        for waker in pending {
            waker.wake();
        }
    }

    /// Poison the slot and wake every current waiter with `None`.
    ///
    /// Idempotent.  Once closed, the event never yields a value again.
    pub fn close(&self) {
        let pending = {
            let mut inner = self.inner.borrow_mut();
            inner.slot = Slot::Closed;
            core::mem::take(&mut inner.wakers)
        };
        for waker in pending {
            waker.wake();
        }
    }

    /// Reset the slot to unset so the event can be awaited again.
    ///
    /// Never wakes anyone.  A no-op on a closed event.
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        if matches!(inner.slot, Slot::Value(_)) {
            inner.slot = Slot::Empty;
        }
    }

    /// Whether the event has been closed.
    pub fn is_closed(&self) -> bool {
        matches!(self.inner.borrow().slot, Slot::Closed)
    }
}

impl<T: Clone> Event<T> {
    /// Snapshot of the last stored value without blocking.
    ///
    /// `None` means unset or closed.
    pub fn value(&self) -> Option<T> {
        match &self.inner.borrow().slot {
            Slot::Value(v) => Some(v.clone()),
            Slot::Empty | Slot::Closed => None,
        }
    }

    /// Suspend until the slot is non-empty.
    ///
    /// Resolves immediately if a value is already stored (or the event is
    /// closed).  The output is the slot snapshot at wake time: `Some(value)`
    /// for a set value, `None` for shutdown.  The value is *not* consumed —
    /// call [`Event::clear`] after acting on it.
    pub fn wait(&self) -> Wait<T> {
        Wait {
            event: self.clone(),
        }
    }
}

/// Future returned by [`Event::wait`].
pub struct Wait<T> {
    event: Event<T>,
}

impl<T: Clone> Future for Wait<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.event.inner.borrow_mut();
        match &inner.slot {
            Slot::Value(v) => Poll::Ready(Some(v.clone())),
            Slot::Closed => Poll::Ready(None),
            Slot::Empty => {
                if !inner.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    inner.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use core::pin::pin;
    use std::cell::Cell;

    fn noop_cx() -> Context<'static> {
        Context::from_waker(Waker::noop())
    }

    #[test]
    fn wait_resolves_immediately_when_already_set() {
        let ev = Event::new();
        ev.set(7u32);
        let mut cx = noop_cx();
        let mut fut = pin!(ev.wait());
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Ready(Some(7)));
    }

    #[test]
    fn wait_suspends_until_set_and_sees_latest_value() {
        let ev = Event::new();
        let mut cx = noop_cx();
        let mut fut = pin!(ev.wait());
        assert!(fut.as_mut().poll(&mut cx).is_pending());

        ev.set(1u32);
        ev.set(2u32); // overwrites before the waiter runs
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Ready(Some(2)));
    }

    #[test]
    fn clear_alone_never_wakes() {
        let ev = Event::<u32>::new();
        let mut cx = noop_cx();
        let mut fut = pin!(ev.wait());
        assert!(fut.as_mut().poll(&mut cx).is_pending());

        ev.clear();
        assert!(fut.as_mut().poll(&mut cx).is_pending());
    }

    #[test]
    fn stale_value_resumes_every_subsequent_wait() {
        let ev = Event::new();
        ev.set("x".to_string());
        let mut cx = noop_cx();
        // Consumer forgot to clear: both waits resolve immediately.
        let mut first = pin!(ev.wait());
        let mut second = pin!(ev.wait());
        assert_eq!(
            first.as_mut().poll(&mut cx),
            Poll::Ready(Some("x".to_string()))
        );
        assert_eq!(
            second.as_mut().poll(&mut cx),
            Poll::Ready(Some("x".to_string()))
        );

        ev.clear();
        let mut third = pin!(ev.wait());
        assert!(third.as_mut().poll(&mut cx).is_pending());
    }

    #[test]
    fn close_wakes_with_none_and_is_sticky() {
        let ev = Event::<u32>::new();
        let mut cx = noop_cx();
        let mut fut = pin!(ev.wait());
        assert!(fut.as_mut().poll(&mut cx).is_pending());

        ev.close();
        assert_eq!(fut.as_mut().poll(&mut cx), Poll::Ready(None));

        // clear does not revive, set is discarded.
        ev.clear();
        ev.set(5);
        assert!(ev.is_closed());
        assert_eq!(ev.value(), None);
        let mut again = pin!(ev.wait());
        assert_eq!(again.as_mut().poll(&mut cx), Poll::Ready(None));
    }

    #[test]
    fn set_broadcasts_to_all_concurrent_waiters() {
        let executor: edge_executor::LocalExecutor<'static, 8> = edge_executor::LocalExecutor::new();
        let ev: Event<u32> = Event::new();
        let seen_a = Rc::new(Cell::new(None));
        let seen_b = Rc::new(Cell::new(None));

        let a = executor.spawn({
            let ev = ev.clone();
            let seen = Rc::clone(&seen_a);
            async move { seen.set(Some(ev.wait().await)) }
        });
        let b = executor.spawn({
            let ev = ev.clone();
            let seen = Rc::clone(&seen_b);
            async move { seen.set(Some(ev.wait().await)) }
        });

        futures_lite::future::block_on(executor.run(async {
            // Let both waiters register before the set.
            futures_lite::future::yield_now().await;
            ev.set(42);
            a.await;
            b.await;
        }));

        assert_eq!(seen_a.get(), Some(Some(42)));
        assert_eq!(seen_b.get(), Some(Some(42)));
    }

    #[test]
    fn value_is_nonblocking_snapshot() {
        let ev = Event::new();
        assert_eq!(ev.value(), None);
        ev.set(3u32);
        assert_eq!(ev.value(), Some(3));
        ev.clear();
        assert_eq!(ev.value(), None);
    }
}
