//! Throttle callbacks on a single-threaded event loop.
//!
//! # Concepts
//!
//! This crate contain two primary types: [`Throttled`] and [`EventLoop`].
//!
//! A [`Throttled`] wraps a callback so it runs at most once per interval,
//! usually behind a high-frequency event source like scroll or resize
//! events. It never measures or waits for time by itself: it asks a
//! [`Scheduler`] for the current time and to run deferred invocations later.
//! [`EventLoop`] is such a scheduler, running timers one at a time on the
//! thread driving it, the way a browser runs `setTimeout`.
//!
//! With the default [`Policy::LeadingTrailing`] and `interval == 16ms`,
//! a stream of calls is handled like this:
//!
//! ```text
//! c: call, R: callback run, x: deferred run superseded by a newer call
//!
//! calls:      c    c    c              c      c
//!             0    5    10             20     30
//!             |    |    |              |      |
//! runs:       R    x    |  R(args@10)  |      x     R(args@30)
//!             0         |  16          |            32
//!             |   interval   |   interval    |
//!
//! time pass ----->
//! ```
//!
//! - The first call runs immediately.
//! - A call inside the window becomes the one deferred run at the end of the
//!   window, replacing the previously deferred one (and its arguments).
//! - A call arriving at least one interval after the last run runs
//!   immediately again.
//!
//! [`Policy::Trailing`] instead restarts the window on every call, so the
//! callback only runs once the calls stop for a whole interval.
//!
//! Use [`ThrottlePool`] when several event sources each need their own
//! window, and [`ScrollEffect`] for the navbar-on-scroll case.
//!
//!
//!
//! # Examples
//!
//! ```rust
//! use std::{cell::RefCell, rc::Rc, time::Duration};
//! use scrollgate::{EventLoop, ManualClock, Scheduler, Throttled};
//!
//! // A virtual clock makes the timeline exact. Use `SystemClock` for real time.
//! let ev = EventLoop::new(ManualClock::new());
//! let runs = Rc::new(RefCell::new(Vec::new()));
//!
//! let (clock, sink) = (ev.clone(), Rc::clone(&runs));
//! let on_scroll = Throttled::new(
//!     move |offset: u32| sink.borrow_mut().push((clock.now().as_millis(), offset)),
//!     Duration::from_millis(16),
//!     &ev,
//! )
//! .unwrap();
//!
//! for &(at, offset) in &[(0, 0), (5, 50), (10, 100), (20, 200), (30, 300)] {
//!     ev.run_until(Duration::from_millis(at));
//!     on_scroll.call(offset);
//! }
//! ev.run_until_idle();
//!
//! assert_eq!(*runs.borrow(), vec![(0, 0), (16, 100), (32, 300)]);
//! ```

mod config;
mod error;
mod scroll;
mod throttle;
mod throttle_pool;
mod timer;

#[doc(inline)]
pub use config::ThrottleConfig;

#[doc(inline)]
pub use error::{Error, Result};

#[doc(inline)]
pub use scroll::{NavbarAppearance, ScrollEffect, DEFAULT_SCROLL_INTERVAL, DEFAULT_THRESHOLD};

#[doc(inline)]
pub use throttle::{
    Callback, Policy, ThrottleBuilder, ThrottleStats, Throttled, DEFAULT_INTERVAL,
};

#[doc(inline)]
pub use throttle_pool::{ThrottlePool, ThrottlePoolBuilder};

#[doc(inline)]
pub use timer::{Clock, EventLoop, ManualClock, Scheduler, SystemClock, Task, TimerId};

#[cfg(test)]
pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}
