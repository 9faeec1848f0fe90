//! The timer service a throttle consumes.
//!
//! [`Scheduler`] is the only thing [`Throttled`](crate::Throttled) needs from
//! its host: the current time, "run this after a delay", and "forget that".
//! [`EventLoop`] is a single-threaded implementation, driven by either a real
//! [`SystemClock`] or a virtual [`ManualClock`].

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap},
    fmt::{self, Debug},
    rc::Rc,
    thread,
    time::{Duration, Instant},
};

/// A one-shot task handed to a [`Scheduler`].
pub type Task = Box<dyn FnOnce() + 'static>;

/// Identify a scheduled task, use it to cancel the task before it fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// The "schedule callback after delay" / "cancel scheduled callback" capability.
pub trait Scheduler {
    /// Time passed since the scheduler's epoch.
    fn now(&self) -> Duration;

    /// Run `task` once, after `delay`.
    fn schedule(&self, delay: Duration, task: Task) -> TimerId;

    /// Cancel a scheduled task.
    ///
    /// Return `true` if the task was still pending.
    fn cancel(&self, id: TimerId) -> bool;
}

/// Time source of an [`EventLoop`].
pub trait Clock {
    /// Time passed since the clock's epoch.
    fn now(&self) -> Duration;

    /// Block until `deadline`. Return immediately if it is already passed.
    fn sleep_until(&self, deadline: Duration);
}

/// Monotonic wall clock. Waiting blocks the current thread.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
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
        self.epoch.elapsed()
    }

    fn sleep_until(&self, deadline: Duration) {
        // Instant::now() read once, or the remaining time may be inaccurate.
        if let Some(still_should_wait) = deadline.checked_sub(self.now()) {
            if still_should_wait > Duration::default() {
                thread::sleep(still_should_wait);
            }
        }
    }
}

/// Virtual clock. Time only moves when someone moves it.
///
/// Waiting on a `ManualClock` jumps straight to the deadline, so an
/// [`EventLoop`] driven by it replays any timer schedule instantly and
/// deterministically.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get().saturating_add(delta));
    }

    /// Move time to `at`. Time never goes backward, so an earlier `at` is ignored.
    pub fn set(&self, at: Duration) {
        if at > self.now.get() {
            self.now.set(at);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep_until(&self, deadline: Duration) {
        self.set(deadline);
    }
}

#[derive(Default)]
struct TimerQueue {
    next_id: u64,
    // (deadline, id): ids grow monotonically so equal deadlines keep scheduling order
    tasks: BTreeMap<(Duration, u64), Task>,
    deadlines: HashMap<u64, Duration>,
}

impl TimerQueue {
    fn push(&mut self, deadline: Duration, task: Task) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;

        self.tasks.insert((deadline, id), task);
        self.deadlines.insert(id, deadline);

        TimerId(id)
    }

    fn remove(&mut self, TimerId(id): TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline) => self.tasks.remove(&(deadline, id)).is_some(),
            None => false,
        }
    }

    /// Pop the earliest task if its deadline is not later than `limit`.
    fn pop_due(&mut self, limit: Option<Duration>) -> Option<(Duration, Task)> {
        let key = *self.tasks.keys().next()?;
        let (deadline, id) = key;

        if matches!(limit, Some(limit) if deadline > limit) {
            return None;
        }

        self.deadlines.remove(&id);
        self.tasks.remove(&key).map(|task| (deadline, task))
    }
}

struct LoopInner<C> {
    clock: C,
    queue: RefCell<TimerQueue>,
}

/// A single-threaded timer loop, the way a browser event loop runs timers.
///
/// `EventLoop` is a cheap handle: clones share the same queue and clock.
/// Tasks run one at a time on the thread driving the loop, in deadline
/// order (scheduling order for equal deadlines). A running task may
/// schedule or cancel other tasks.
///
/// # Example
///
/// ```
/// use std::{cell::RefCell, rc::Rc, time::Duration};
/// use scrollgate::{EventLoop, ManualClock, Scheduler};
///
/// let ev = EventLoop::new(ManualClock::new());
/// let fired = Rc::new(RefCell::new(Vec::new()));
///
/// for ms in [30, 10, 20] {
///     let fired = Rc::clone(&fired);
///     ev.schedule(Duration::from_millis(ms), Box::new(move || fired.borrow_mut().push(ms)));
/// }
///
/// assert_eq!(ev.advance(Duration::from_millis(20)), 2);
/// assert_eq!(*fired.borrow(), vec![10, 20]);
/// assert_eq!(ev.now(), Duration::from_millis(20));
/// ```
pub struct EventLoop<C: Clock = SystemClock> {
    inner: Rc<LoopInner<C>>,
}

impl<C: Clock> EventLoop<C> {
    pub fn new(clock: C) -> Self {
        Self {
            inner: Rc::new(LoopInner {
                clock,
                queue: RefCell::new(TimerQueue::default()),
            }),
        }
    }

    /// Get the clock driving this loop.
    pub fn clock(&self) -> &C {
        &self.inner.clock
    }

    /// Number of tasks still waiting to fire.
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().tasks.len()
    }

    /// Run every task whose deadline is not later than `deadline`, then wait
    /// until `deadline` itself.
    ///
    /// Tasks scheduled by running tasks are included when they fall in range.
    /// Return how many tasks ran.
    pub fn run_until(&self, deadline: Duration) -> usize {
        let ran = self.drain(Some(deadline));
        self.inner.clock.sleep_until(deadline);

        ran
    }

    /// Same as [`run_until()`](Self::run_until) with a deadline relative to now.
    pub fn advance(&self, delta: Duration) -> usize {
        self.run_until(self.now().saturating_add(delta))
    }

    /// Run until no task left, waiting on the clock between deadlines.
    ///
    /// Return how many tasks ran.
    pub fn run_until_idle(&self) -> usize {
        self.drain(None)
    }

    fn drain(&self, limit: Option<Duration>) -> usize {
        let mut ran = 0;

        loop {
            // the queue borrow must end before the task runs
            let next = self.inner.queue.borrow_mut().pop_due(limit);

            let (deadline, task) = match next {
                Some(next) => next,
                None => break ran,
            };

            self.inner.clock.sleep_until(deadline);
            tracing::trace!(?deadline, "timer fired");
            task();

            ran += 1;
        }
    }
}

impl<C: Clock> Scheduler for EventLoop<C> {
    fn now(&self) -> Duration {
        self.inner.clock.now()
    }

    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        // a huge delay means "never", not an overflow
        let deadline = self.now().checked_add(delay).unwrap_or(Duration::MAX);
        self.inner.queue.borrow_mut().push(deadline, task)
    }

    fn cancel(&self, id: TimerId) -> bool {
        self.inner.queue.borrow_mut().remove(id)
    }
}

impl<C: Clock> Clone for EventLoop<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C: Clock + Debug> Debug for EventLoop<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("clock", &self.inner.clock)
            .field("pending", &self.pending())
            .finish()
    }
}
