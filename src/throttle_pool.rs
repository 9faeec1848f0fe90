use std::{
    cell::RefCell,
    collections::HashMap,
    fmt::{self, Debug},
    hash::Hash,
    marker::PhantomData,
    rc::Rc,
    time::Duration,
};

use crate::{
    error::Result,
    throttle::{Callback, Policy, ThrottleBuilder, Throttled},
    timer::Scheduler,
};

type Factory<K, A> = dyn Fn(&K) -> Box<Callback<A>> + 'static;

/// A [`Throttled`] pool, one independent throttle per event source.
///
/// Every throttle in the pool shares the same configuration and scheduler,
/// but has its own window: a burst on `"scroll"` never delays `"resize"`.
///
/// # Example
///
/// ```
/// use std::{cell::RefCell, rc::Rc, time::Duration};
/// use scrollgate::{EventLoop, ManualClock, ThrottlePool};
///
/// let ev = EventLoop::new(ManualClock::new());
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// let sink = Rc::clone(&seen);
/// let pool: ThrottlePool<&str, u32> = ThrottlePool::builder()
///     .interval(Duration::from_millis(16))
///     .build(&ev, move |source: &&str| {
///         let (source, sink) = (*source, Rc::clone(&sink));
///         Box::new(move |value: u32| sink.borrow_mut().push((source, value)))
///             as Box<dyn FnMut(u32)>
///     })
///     .unwrap();
///
/// pool.get("scroll").call(1);
/// pool.get("scroll").call(2); // deferred: same source
/// pool.get("resize").call(3); // runs: different source
///
/// assert_eq!(*seen.borrow(), vec![("scroll", 1), ("resize", 3)]);
/// ```
pub struct ThrottlePool<K: Hash + Eq, A: 'static> {
    throttles: RefCell<HashMap<K, Throttled<A>>>,
    throttle_builder: ThrottleBuilder,
    scheduler: Rc<dyn Scheduler>,
    factory: Box<Factory<K, A>>,
}

impl<K: Hash + Eq> ThrottlePool<K, ()> {
    /// Start to create a `ThrottlePool` by [`ThrottlePoolBuilder`].
    pub fn builder() -> ThrottlePoolBuilder<K> {
        ThrottlePoolBuilder::default()
    }
}

impl<K: Hash + Eq, A: 'static> ThrottlePool<K, A> {
    /// Get a throttle from pool, if not exists, create it.
    pub fn get(&self, id: K) -> Throttled<A> {
        if let Some(throttled) = self.throttles.borrow().get(&id) {
            return throttled.clone();
        }

        // the factory runs without the map borrowed, it may use the pool
        let callback = (self.factory)(&id);
        let throttled = self
            .throttle_builder
            .build_boxed(Rc::clone(&self.scheduler), callback)
            .expect("configuration already verified when ThrottlePool created");

        let mut throttles = self.throttles.borrow_mut();
        tracing::debug!(pooled = throttles.len() + 1, "throttle created");

        // keep the first one if the factory already created this id
        throttles.entry(id).or_insert(throttled).clone()
    }

    /// Remove a throttle from pool.
    ///
    /// Its pending deferred invocation, if any, is dropped with it unless
    /// someone still hold a handle.
    pub fn remove(&self, id: &K) -> Option<Throttled<A>> {
        self.throttles.borrow_mut().remove(id)
    }

    /// Flush every pending deferred invocation in the pool.
    ///
    /// Return how many callbacks ran.
    pub fn flush_all(&self) -> usize {
        // clone handles first, a callback may touch the pool
        let throttles: Vec<Throttled<A>> = self.throttles.borrow().values().cloned().collect();

        throttles
            .iter()
            .filter(|throttled| throttled.flush())
            .count()
    }

    pub fn len(&self) -> usize {
        self.throttles.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Hash + Eq, A: 'static> Debug for ThrottlePool<K, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(&format!(
            "ThrottlePool<{}, {}>",
            std::any::type_name::<K>(),
            std::any::type_name::<A>(),
        ))
        .field("throttle_builder", &self.throttle_builder)
        .field("len", &self.len())
        .finish()
    }
}

/// Use to build a [`ThrottlePool`].
///
/// Created by [`ThrottlePool::builder()`] API.
pub struct ThrottlePoolBuilder<K: Hash + Eq> {
    throttle_builder: ThrottleBuilder,
    phantom: PhantomData<K>,
}

impl<K: Hash + Eq> Default for ThrottlePoolBuilder<K> {
    fn default() -> Self {
        Self {
            throttle_builder: ThrottleBuilder::default(),
            phantom: PhantomData,
        }
    }
}

impl<K: Hash + Eq> ThrottlePoolBuilder<K> {
    /// Set interval of throttles in this pool, default value is `16ms`.
    pub fn interval(&mut self, interval: Duration) -> &mut Self {
        self.throttle_builder.interval(interval);
        self
    }

    /// Set policy of throttles in this pool.
    pub fn policy(&mut self, policy: Policy) -> &mut Self {
        self.throttle_builder.policy(policy);
        self
    }

    /// Create a new [`ThrottlePool`] with current configuration.
    ///
    /// `factory` is called once per id, the first time the id is used, to
    /// produce the callback of that id's throttle.
    ///
    /// Return [`Error::InvalidInterval`](crate::Error::InvalidInterval) if
    /// `interval` is zero.
    pub fn build<A, S, F>(&self, scheduler: &S, factory: F) -> Result<ThrottlePool<K, A>>
    where
        A: 'static,
        S: Scheduler + Clone + 'static,
        F: Fn(&K) -> Box<Callback<A>> + 'static,
    {
        // check the configurations can initialize throttles properly.
        self.throttle_builder.validate()?;

        Ok(ThrottlePool {
            throttles: RefCell::new(HashMap::new()),
            throttle_builder: self.throttle_builder.clone(),
            scheduler: Rc::new(scheduler.clone()),
            factory: Box::new(factory),
        })
    }
}

impl<K: Hash + Eq> Debug for ThrottlePoolBuilder<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(&format!(
            "ThrottlePoolBuilder<{}>",
            std::any::type_name::<K>()
        ))
        .field("throttle_builder", &self.throttle_builder)
        .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Error,
        timer::{EventLoop, ManualClock},
    };
    use std::{cell::Cell, rc::Weak};

    type Seen = Rc<RefCell<Vec<(u32, u32)>>>;

    fn pool(ev: &EventLoop<ManualClock>, created: &Rc<Cell<usize>>) -> (ThrottlePool<u32, u32>, Seen) {
        let seen: Seen = Rc::default();

        let (sink, created) = (Rc::clone(&seen), Rc::clone(created));
        let pool = ThrottlePool::builder()
            .interval(Duration::from_millis(10))
            .build(ev, move |&id: &u32| {
                created.set(created.get() + 1);

                let sink = Rc::clone(&sink);
                Box::new(move |value: u32| sink.borrow_mut().push((id, value))) as Box<Callback<u32>>
            })
            .unwrap();

        (pool, seen)
    }

    #[test]
    fn throttle_created_once_per_id() {
        let ev = EventLoop::new(ManualClock::new());
        let created = Rc::new(Cell::new(0));
        let (pool, _seen) = pool(&ev, &created);

        pool.get(1);
        pool.get(1);
        pool.get(2);

        assert_eq!(created.get(), 2);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn ids_have_independent_windows() {
        let ev = EventLoop::new(ManualClock::new());
        let (pool, seen) = pool(&ev, &Rc::default());

        pool.get(1).call(100);
        pool.get(2).call(200);
        pool.get(1).call(101);
        pool.get(2).call(201);

        assert_eq!(*seen.borrow(), vec![(1, 100), (2, 200)]);
        assert_eq!(ev.pending(), 2);

        ev.run_until_idle();
        assert_eq!(
            *seen.borrow(),
            vec![(1, 100), (2, 200), (1, 101), (2, 201)]
        );
    }

    #[test]
    fn flush_all_pending() {
        let ev = EventLoop::new(ManualClock::new());
        let (pool, seen) = pool(&ev, &Rc::default());

        for id in 0..3 {
            pool.get(id).call(0);
            pool.get(id).call(1);
        }

        assert_eq!(pool.flush_all(), 3);
        assert_eq!(pool.flush_all(), 0);
        assert_eq!(seen.borrow().len(), 6);
        assert_eq!(ev.pending(), 0);
    }

    #[test]
    fn removed_throttle_drop_pending_run() {
        let ev = EventLoop::new(ManualClock::new());
        let (pool, seen) = pool(&ev, &Rc::default());

        pool.get(1).call(0);
        pool.get(1).call(1);
        assert!(pool.remove(&1).is_some());
        assert!(pool.is_empty());

        ev.run_until_idle();
        assert_eq!(*seen.borrow(), vec![(1, 0)]);
    }

    #[test]
    fn factory_can_use_the_pool() {
        let ev = EventLoop::new(ManualClock::new());
        let sizes: Rc<RefCell<Vec<usize>>> = Rc::default();
        let slot: Rc<RefCell<Weak<ThrottlePool<u32, ()>>>> = Rc::default();

        let (sink, pool_ref) = (Rc::clone(&sizes), Rc::clone(&slot));
        let pool = Rc::new(
            ThrottlePool::builder()
                .build(&ev, move |_: &u32| {
                    if let Some(pool) = pool_ref.borrow().upgrade() {
                        sink.borrow_mut().push(pool.len());
                    }
                    Box::new(|_: ()| {}) as Box<Callback<()>>
                })
                .unwrap(),
        );
        *slot.borrow_mut() = Rc::downgrade(&pool);

        pool.get(1);
        pool.get(2);
        pool.get(2);

        assert_eq!(*sizes.borrow(), vec![0, 1]);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn zero_interval_rejected() {
        let ev = EventLoop::new(ManualClock::new());

        let result: Result<ThrottlePool<u8, ()>> = ThrottlePool::builder()
            .interval(Duration::default())
            .build(&ev, |_: &u8| Box::new(|_: ()| {}) as Box<Callback<()>>);

        assert!(matches!(result, Err(Error::InvalidInterval(_))));
    }
}
