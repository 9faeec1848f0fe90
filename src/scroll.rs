//! Navbar appearance driven by a throttled scroll listener.
//!
//! A page's navbar turns solid once the page scrolled past a threshold and
//! back to transparent near the top. Scroll events come far faster than
//! frames, so the decision runs through a [`Throttled`] at frame rate.

use std::time::Duration;

use crate::{
    error::Result,
    throttle::{Throttled, DEFAULT_INTERVAL},
    timer::Scheduler,
};

/// Scroll listeners run at most once per frame.
pub const DEFAULT_SCROLL_INTERVAL: Duration = DEFAULT_INTERVAL;

/// Scroll offset, in pixels, past which the navbar turns solid.
pub const DEFAULT_THRESHOLD: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavbarAppearance {
    /// Near the top of the page.
    Transparent,
    /// Scrolled down: solid background with a shadow.
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollEffect {
    threshold: f64,
    interval: Duration,
}

impl ScrollEffect {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            interval: DEFAULT_SCROLL_INTERVAL,
        }
    }

    /// Change how often the listener may run.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Appearance for a vertical scroll offset. The threshold itself is
    /// still transparent.
    pub fn appearance(&self, offset: f64) -> NavbarAppearance {
        if offset > self.threshold {
            NavbarAppearance::Solid
        } else {
            NavbarAppearance::Transparent
        }
    }

    /// Build a scroll listener: feed it every scroll offset, `apply` receives
    /// the resulting appearance at most once per interval.
    ///
    /// # Example
    ///
    /// ```
    /// use std::{cell::Cell, rc::Rc};
    /// use scrollgate::{EventLoop, ManualClock, NavbarAppearance, ScrollEffect};
    ///
    /// let ev = EventLoop::new(ManualClock::new());
    /// let navbar = Rc::new(Cell::new(NavbarAppearance::Transparent));
    ///
    /// let target = Rc::clone(&navbar);
    /// let on_scroll = ScrollEffect::default()
    ///     .listener(&ev, move |appearance| target.set(appearance))
    ///     .unwrap();
    ///
    /// on_scroll.call(40.0);
    /// on_scroll.call(180.0); // inside the frame: deferred
    /// assert_eq!(navbar.get(), NavbarAppearance::Transparent);
    ///
    /// ev.run_until_idle();
    /// assert_eq!(navbar.get(), NavbarAppearance::Solid);
    /// ```
    pub fn listener<S, F>(&self, scheduler: &S, mut apply: F) -> Result<Throttled<f64>>
    where
        S: Scheduler + Clone + 'static,
        F: FnMut(NavbarAppearance) + 'static,
    {
        let effect = *self;

        Throttled::builder()
            .interval(self.interval)
            .build(scheduler, move |offset: f64| {
                let appearance = effect.appearance(offset);
                tracing::trace!(offset, ?appearance, "navbar updated");
                apply(appearance)
            })
    }
}

impl Default for ScrollEffect {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
