use std::{
    cell::RefCell,
    fmt::{self, Debug},
    rc::{Rc, Weak},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    timer::{Scheduler, TimerId},
};

mod stats;

pub use stats::ThrottleStats;

/// One frame at 60fps.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(16);

/// A boxed callback taking `A`.
pub type Callback<A> = dyn FnMut(A) + 'static;

/// How a [`Throttled`] handles calls arriving inside its window.
///
/// Under sustained rapid input the two policies produce very different
/// cadences:
///
/// ```text
/// calls:             x  x x  x x  x  x x  x          (stop)
///                    |  interval  |  interval  |  interval  |
///
/// LeadingTrailing:   R            R            R
///                    ^-- first call runs at once, then one run per window
///                        with the latest arguments
///
/// Trailing:                                              R
///                                                        ^-- only once calls
///                                                            stop for a window
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// Run the first call immediately, then at most once per interval. Calls
    /// inside the window collapse into a single deferred run at the end of
    /// the window.
    LeadingTrailing,
    /// Debounce-like: every call restarts the window, the callback only runs
    /// once calls stop arriving for a whole interval.
    Trailing,
}

impl Default for Policy {
    fn default() -> Self {
        Self::LeadingTrailing
    }
}

struct State<A> {
    /// The only live deferred invocation, if any.
    pending: Option<TimerId>,
    pending_args: Option<A>,
    last_run: Option<Duration>,
    running: bool,
    stats: ThrottleStats,
}

struct Inner<A> {
    callback: RefCell<Box<Callback<A>>>,
    state: RefCell<State<A>>,
    scheduler: Rc<dyn Scheduler>,
    interval: Duration,
    policy: Policy,
}

/// A callback wrapped so it runs at most once per interval.
///
/// `A` is the argument type forwarded to the callback: `()` for none, a tuple
/// for several. The most recent call's arguments always win over older ones
/// still waiting in the same window.
///
/// `Throttled` is a handle, clones share the same wrapper state. Different
/// wrappers never share state, even on the same scheduler.
pub struct Throttled<A: 'static> {
    inner: Rc<Inner<A>>,
}

impl Throttled<()> {
    /// Initialize a builder to create a throttled callback.
    ///
    /// The argument type is picked by the callback given to
    /// [`ThrottleBuilder::build()`].
    pub fn builder() -> ThrottleBuilder {
        ThrottleBuilder::new()
    }
}

impl<A: 'static> Throttled<A> {
    /// Wrap `callback` with the default [`Policy`].
    ///
    /// Return [`Error::InvalidInterval`] if `interval` is zero.
    pub fn new<S, F>(callback: F, interval: Duration, scheduler: &S) -> Result<Self>
    where
        S: Scheduler + Clone + 'static,
        F: FnMut(A) + 'static,
    {
        ThrottleBuilder::new()
            .interval(interval)
            .build(scheduler, callback)
    }

    /// Call the wrapped callback, subject to the throttle's policy.
    ///
    /// With [`Policy::LeadingTrailing`], the callback runs before `call()`
    /// returns when at least one interval passed since the last run (or it
    /// never ran). Otherwise the call is deferred to the end of the window,
    /// replacing any call already deferred.
    ///
    /// # Example
    ///
    /// ```
    /// use std::{cell::RefCell, rc::Rc, time::Duration};
    /// use scrollgate::{EventLoop, ManualClock, Throttled};
    ///
    /// let ev = EventLoop::new(ManualClock::new());
    /// let seen = Rc::new(RefCell::new(Vec::new()));
    ///
    /// let sink = Rc::clone(&seen);
    /// let throttled = Throttled::new(
    ///     move |y: u32| sink.borrow_mut().push(y),
    ///     Duration::from_millis(16),
    ///     &ev,
    /// )
    /// .unwrap();
    ///
    /// throttled.call(1); // runs now
    /// throttled.call(2); // deferred...
    /// throttled.call(3); // ...and replaced
    /// assert_eq!(*seen.borrow(), vec![1]);
    ///
    /// ev.run_until_idle();
    /// assert_eq!(*seen.borrow(), vec![1, 3]);
    /// ```
    pub fn call(&self, args: A) {
        let inner = &*self.inner;
        let mut state = inner.state.borrow_mut();
        state.stats.calls += 1;

        let now = inner.scheduler.now();

        let delay = match inner.policy {
            Policy::Trailing => inner.interval,
            Policy::LeadingTrailing => {
                let elapsed = state.last_run.map(|last| now.saturating_sub(last));

                match elapsed {
                    // a reentrant call from inside the callback never runs synchronously
                    Some(elapsed) if elapsed < inner.interval || state.running => {
                        inner.interval.saturating_sub(elapsed)
                    }
                    _ => {
                        self.supersede(&mut state);
                        state.last_run = Some(now);
                        state.stats.leading += 1;
                        drop(state);

                        tracing::trace!(?now, ?elapsed, "leading run");
                        self.invoke(args);
                        return;
                    }
                }
            }
        };

        self.defer(&mut state, args, delay);
    }

    /// Run the pending deferred invocation right now, if any.
    ///
    /// Return `true` if the callback ran.
    pub fn flush(&self) -> bool {
        let args = {
            let mut state = self.inner.state.borrow_mut();
            if state.running {
                return false;
            }

            let id = match state.pending.take() {
                Some(id) => id,
                None => return false,
            };
            self.inner.scheduler.cancel(id);

            let args = match state.pending_args.take() {
                Some(args) => args,
                None => return false,
            };

            state.last_run = Some(self.inner.scheduler.now());
            state.stats.trailing += 1;
            args
        };

        tracing::trace!("flushed deferred run");
        self.invoke(args);
        true
    }

    /// Drop the pending deferred invocation without running it.
    ///
    /// Return `true` if there was one.
    pub fn cancel(&self) -> bool {
        let mut state = self.inner.state.borrow_mut();
        self.supersede(&mut state)
    }

    /// Whether a deferred invocation is waiting for its timer.
    pub fn is_pending(&self) -> bool {
        self.inner.state.borrow().pending.is_some()
    }

    /// Scheduler time of the last callback run.
    pub fn last_run(&self) -> Option<Duration> {
        self.inner.state.borrow().last_run
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn policy(&self) -> Policy {
        self.inner.policy
    }

    pub fn stats(&self) -> ThrottleStats {
        self.inner.state.borrow().stats
    }

    fn defer(&self, state: &mut State<A>, args: A, delay: Duration) {
        self.supersede(state);

        // the timer must not keep a dropped wrapper alive
        let weak: Weak<Inner<A>> = Rc::downgrade(&self.inner);
        let id = self.inner.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    Throttled { inner }.fire();
                }
            }),
        );

        state.pending = Some(id);
        state.pending_args = Some(args);

        tracing::trace!(?delay, "deferred run scheduled");
    }

    /// Cancel the live deferred invocation.
    fn supersede(&self, state: &mut State<A>) -> bool {
        match state.pending.take() {
            Some(id) => {
                self.inner.scheduler.cancel(id);
                state.pending_args = None;
                state.stats.superseded += 1;

                tracing::trace!(?id, "deferred run superseded");
                true
            }
            None => false,
        }
    }

    fn fire(&self) {
        let inner = &*self.inner;

        let args = {
            let mut state = inner.state.borrow_mut();
            state.pending = None;

            let args = match state.pending_args.take() {
                Some(args) => args,
                None => return,
            };

            // the callback itself is driving the scheduler: keep the arguments
            // and reschedule once it returns
            if state.running {
                state.pending_args = Some(args);
                tracing::debug!("deferred run parked while callback is running");
                return;
            }

            let now = inner.scheduler.now();

            let remaining = match (inner.policy, state.last_run) {
                (Policy::LeadingTrailing, Some(last)) => {
                    inner.interval.saturating_sub(now.saturating_sub(last))
                }
                _ => Duration::default(),
            };

            // fired before the window elapsed: wait for the rest of it
            if remaining > Duration::default() {
                state.stats.skipped += 1;
                tracing::debug!(?now, ?remaining, "deferred run fired early");
                self.defer(&mut state, args, remaining);
                return;
            }

            state.last_run = Some(now);
            state.stats.trailing += 1;

            tracing::trace!(?now, "trailing run");
            args
        };

        self.invoke(args);
    }

    fn invoke(&self, args: A) {
        {
            let _running = RunningGuard::enter(&self.inner.state);

            let mut callback = self.inner.callback.borrow_mut();
            (&mut **callback)(args);
        }

        self.resume_parked();
    }

    /// Reschedule a deferred run that fired while the callback was running.
    fn resume_parked(&self) {
        let inner = &*self.inner;
        let mut state = inner.state.borrow_mut();

        // args without a timer only exist when parked
        if state.pending.is_some() {
            return;
        }
        let args = match state.pending_args.take() {
            Some(args) => args,
            None => return,
        };

        let delay = match (inner.policy, state.last_run) {
            (Policy::LeadingTrailing, Some(last)) => inner
                .interval
                .saturating_sub(inner.scheduler.now().saturating_sub(last)),
            _ => Duration::default(),
        };

        self.defer(&mut state, args, delay);
    }
}

impl<A: 'static> Clone for Throttled<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A: 'static> Debug for Throttled<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();

        f.debug_struct("Throttled")
            .field("interval", &self.inner.interval)
            .field("policy", &self.inner.policy)
            .field("pending", &state.pending)
            .field("last_run", &state.last_run)
            .field("stats", &state.stats)
            .finish()
    }
}

/// Flag the wrapper as running its callback, even if the callback panics.
struct RunningGuard<'a, A>(&'a RefCell<State<A>>);

impl<'a, A> RunningGuard<'a, A> {
    fn enter(state: &'a RefCell<State<A>>) -> Self {
        state.borrow_mut().running = true;
        Self(state)
    }
}

impl<A> Drop for RunningGuard<'_, A> {
    fn drop(&mut self) {
        self.0.borrow_mut().running = false;
    }
}

/// Use to build a [`Throttled`].
///
/// Created by [`Throttled::builder()`] API.
#[derive(Debug, Clone)]
pub struct ThrottleBuilder {
    interval: Duration,
    policy: Policy,
}

impl ThrottleBuilder {
    fn new() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            policy: Policy::default(),
        }
    }

    /// Set minimum time between effective invocations, default value is `16ms`.
    pub fn interval(&mut self, interval: Duration) -> &mut Self {
        self.interval = interval;
        self
    }

    /// Set policy, default value is [`Policy::LeadingTrailing`].
    pub fn policy(&mut self, policy: Policy) -> &mut Self {
        self.policy = policy;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.interval == Duration::default() {
            return Err(Error::InvalidInterval(self.interval));
        }

        Ok(())
    }

    /// Wrap `callback` with current configuration, scheduling deferred runs
    /// on `scheduler`.
    ///
    /// Return [`Error::InvalidInterval`] if `interval` is zero.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use scrollgate::{EventLoop, ManualClock, Policy, Throttled};
    ///
    /// let ev = EventLoop::new(ManualClock::new());
    ///
    /// let resize = Throttled::builder()
    ///     .interval(Duration::from_millis(100))
    ///     .policy(Policy::Trailing)
    ///     .build(&ev, |(w, h): (u32, u32)| println!("resized to {}x{}", w, h))
    ///     .unwrap();
    ///
    /// resize.call((800, 600));
    /// assert!(resize.is_pending());
    ///
    /// assert!(Throttled::builder()
    ///     .interval(Duration::default())
    ///     .build(&ev, |_: ()| {})
    ///     .is_err());
    /// ```
    pub fn build<A, S, F>(&self, scheduler: &S, callback: F) -> Result<Throttled<A>>
    where
        A: 'static,
        S: Scheduler + Clone + 'static,
        F: FnMut(A) + 'static,
    {
        self.build_boxed(Rc::new(scheduler.clone()), Box::new(callback))
    }

    pub(crate) fn build_boxed<A: 'static>(
        &self,
        scheduler: Rc<dyn Scheduler>,
        callback: Box<Callback<A>>,
    ) -> Result<Throttled<A>> {
        self.validate()?;

        Ok(Throttled {
            inner: Rc::new(Inner {
                callback: RefCell::new(callback),
                state: RefCell::new(State {
                    pending: None,
                    pending_args: None,
                    last_run: None,
                    running: false,
                    stats: ThrottleStats::default(),
                }),
                scheduler,
                interval: self.interval,
                policy: self.policy,
            }),
        })
    }
}

impl Default for ThrottleBuilder {
    fn default() -> Self {
        Self::new()
    }
}
