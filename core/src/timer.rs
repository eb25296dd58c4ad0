//! Clock and event-loop collaborators.
//!
//! The backend runs on a single cooperative event loop. It needs two things
//! from its host: a monotonic clock to measure time since the last
//! modification, and a way to arm and cancel a repeating timeout whose firing
//! the host routes back to `BackendManager::on_timeout`.
//!
//! `SimulatedLoop` is a deterministic loop over a `ManualClock`. It drives the
//! manager in tests and in the script runner.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Wall-clock backed `Clock`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Settable clock. Clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<Duration>>);

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: Duration) {
        self.0.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.0.get()
    }
}

/// Identifier of a scheduled timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(pub u64);

/// Shortest interval `SimulatedLoop` schedules; zero would fire forever.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Host event loop as seen by the backend.
pub trait EventLoop {
    /// Schedule a repeating timeout firing every `interval`.
    fn add_timeout(&mut self, interval: Duration) -> SourceId;

    /// Cancel a timeout. Returns `false` if it was not scheduled.
    fn remove_source(&mut self, id: SourceId) -> bool;
}

#[derive(Debug)]
struct Source {
    interval: Duration,
    due: Duration,
}

#[derive(Debug, Default)]
struct LoopState {
    next_id: u64,
    sources: BTreeMap<SourceId, Source>,
}

/// Deterministic single-threaded loop.
#[derive(Debug, Clone)]
pub struct SimulatedLoop {
    clock: ManualClock,
    state: Rc<RefCell<LoopState>>,
}

impl SimulatedLoop {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            state: Rc::new(RefCell::new(LoopState::default())),
        }
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// `EventLoop` handle sharing this loop's sources.
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            clock: self.clock.clone(),
            state: Rc::clone(&self.state),
        }
    }

    pub fn pending_sources(&self) -> usize {
        self.state.borrow().sources.len()
    }

    pub fn is_scheduled(&self, id: SourceId) -> bool {
        self.state.borrow().sources.contains_key(&id)
    }

    /// Move time forward by `by`, firing every source that comes due.
    ///
    /// Sources fire in due-time order (ties by id). The clock is set to each
    /// source's due time before `dispatch` runs. A source whose dispatch
    /// returns `Break` is removed; otherwise it is rescheduled one interval
    /// later. Returns the number of dispatches.
    pub fn advance<F>(&self, by: Duration, mut dispatch: F) -> usize
    where
        F: FnMut(SourceId) -> ControlFlow<()>,
    {
        let target = self.clock.now() + by;
        let mut fired = 0;

        loop {
            // Borrow ends before dispatch so handlers may add/remove sources.
            let next = {
                let state = self.state.borrow();
                state
                    .sources
                    .iter()
                    .filter(|(_, s)| s.due <= target)
                    .min_by_key(|(id, s)| (s.due, **id))
                    .map(|(id, s)| (*id, s.due))
            };
            let Some((id, due)) = next else { break };

            self.clock.set(due);
            fired += 1;
            let flow = dispatch(id);

            let mut state = self.state.borrow_mut();
            match flow {
                ControlFlow::Break(()) => {
                    state.sources.remove(&id);
                }
                ControlFlow::Continue(()) => {
                    if let Some(source) = state.sources.get_mut(&id) {
                        source.due = due + source.interval;
                    }
                }
            }
        }

        self.clock.set(target);
        fired
    }
}

/// Clonable `EventLoop` view of a `SimulatedLoop`.
#[derive(Debug, Clone)]
pub struct LoopHandle {
    clock: ManualClock,
    state: Rc<RefCell<LoopState>>,
}

impl EventLoop for LoopHandle {
    fn add_timeout(&mut self, interval: Duration) -> SourceId {
        let interval = interval.max(MIN_INTERVAL);
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = SourceId(state.next_id);
        let due = self.clock.now() + interval;
        state.sources.insert(id, Source { interval, due });
        id
    }

    fn remove_source(&mut self, id: SourceId) -> bool {
        self.state.borrow_mut().sources.remove(&id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn manual_clock_is_shared() {
        let a = ManualClock::new();
        let b = a.clone();
        a.advance(secs(5));
        assert_eq!(b.now(), secs(5));
    }

    #[test]
    fn repeating_source_fires_each_interval() {
        let lp = SimulatedLoop::new(ManualClock::new());
        let id = lp.handle().add_timeout(secs(10));

        let mut seen = Vec::new();
        let clock = lp.clock().clone();
        let fired = lp.advance(secs(35), |fired_id| {
            assert_eq!(fired_id, id);
            seen.push(clock.now());
            ControlFlow::Continue(())
        });

        assert_eq!(fired, 3);
        assert_eq!(seen, vec![secs(10), secs(20), secs(30)]);
        assert_eq!(lp.clock().now(), secs(35));
        assert!(lp.is_scheduled(id));
    }

    #[test]
    fn break_removes_source() {
        let lp = SimulatedLoop::new(ManualClock::new());
        let id = lp.handle().add_timeout(secs(10));
        let fired = lp.advance(secs(100), |_| ControlFlow::Break(()));
        assert_eq!(fired, 1);
        assert!(!lp.is_scheduled(id));
        assert_eq!(lp.pending_sources(), 0);
    }

    #[test]
    fn handler_may_remove_its_own_source() {
        let lp = SimulatedLoop::new(ManualClock::new());
        let mut handle = lp.handle();
        let id = handle.add_timeout(secs(1));
        let fired = lp.advance(secs(5), |fired_id| {
            assert!(handle.remove_source(fired_id));
            ControlFlow::Continue(())
        });
        assert_eq!(fired, 1);
        assert!(!lp.is_scheduled(id));
    }

    #[test]
    fn zero_interval_is_clamped() {
        let lp = SimulatedLoop::new(ManualClock::new());
        let id = lp.handle().add_timeout(Duration::ZERO);
        let fired = lp.advance(secs(1), |_| ControlFlow::Continue(()));
        assert_eq!(fired, 1000);
        assert!(lp.is_scheduled(id));
        assert_eq!(lp.clock().now(), secs(1));
    }

    #[test]
    fn remove_unknown_source() {
        let lp = SimulatedLoop::new(ManualClock::new());
        assert!(!lp.handle().remove_source(SourceId(42)));
    }
}
