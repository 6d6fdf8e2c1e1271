//! The virtual clock and event loop shared by every component of a run.
//!
//! A `Context` holds a time-ordered queue of plans, a queue of callbacks to
//! run at the current time, and any data plugins the model registers. All
//! "processes" in a simulation are chains of plans: a process suspends by
//! scheduling its continuation with `add_plan_after` and is spawned with
//! `queue_callback`. Only one callback runs at a time, so model state can be
//! mutated freely from inside any of them.
use std::{
    any::{Any, TypeId},
    cell::RefCell,
    collections::{HashMap, VecDeque},
    rc::{Rc, Weak},
};

use log::trace;

use crate::data_plugin::DataPlugin;
use crate::plan::{PlanId, Queue};

pub(crate) type Callback = dyn FnOnce(&mut Context);
type WakeupQueue = RefCell<VecDeque<Box<Callback>>>;

pub struct Context {
    // Declared first so that it is dropped before the plan queue: grants
    // released while pending plans are torn down find no queue to wake into.
    wakeups: Rc<WakeupQueue>,
    plan_queue: Queue<Box<Callback>>,
    callback_queue: VecDeque<Box<Callback>>,
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
    current_time: f64,
    shutdown_requested: bool,
}

impl Context {
    #[must_use]
    pub fn new() -> Context {
        Context {
            wakeups: Rc::new(RefCell::new(VecDeque::new())),
            plan_queue: Queue::new(),
            callback_queue: VecDeque::new(),
            data_plugins: HashMap::new(),
            current_time: 0.0,
            shutdown_requested: false,
        }
    }

    /// Schedules `callback` to run at virtual time `time`.
    ///
    /// # Panics
    ///
    /// Panics if `time` is NaN, infinite, or earlier than the current time.
    pub fn add_plan(&mut self, time: f64, callback: impl FnOnce(&mut Context) + 'static) -> PlanId {
        assert!(
            !(time.is_nan() || time.is_infinite() || time < self.current_time),
            "Invalid time value"
        );
        let id = self.plan_queue.add_plan(time, Box::new(callback));
        trace!("plan {id:?} at {time}");
        id
    }

    /// Suspends the calling process for `delay` and resumes it with `callback`.
    pub fn add_plan_after(
        &mut self,
        delay: f64,
        callback: impl FnOnce(&mut Context) + 'static,
    ) -> PlanId {
        self.add_plan(self.current_time + delay, callback)
    }

    /// Spawns `callback` at the current time. Callbacks run in the order
    /// they were queued and always before the next plan.
    pub fn queue_callback(&mut self, callback: impl FnOnce(&mut Context) + 'static) {
        self.callback_queue.push_back(Box::new(callback));
    }

    /// A handle that can queue callbacks from places that do not hold the
    /// `Context`, such as `Drop` impls.
    #[must_use]
    pub fn spawner(&self) -> Spawner {
        Spawner {
            queue: Rc::downgrade(&self.wakeups),
        }
    }

    pub fn get_data_mut<T: DataPlugin>(&mut self, _plugin: T) -> &mut T::DataContainer {
        self.data_plugins
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::create_data_container()))
            .downcast_mut::<T::DataContainer>()
            .expect("data plugin container has the wrong type")
    }

    /// Returns the plugin's container if anything has created it yet.
    #[must_use]
    pub fn get_data<T: DataPlugin>(&self, _plugin: T) -> Option<&T::DataContainer> {
        self.data_plugins
            .get(&TypeId::of::<T>())
            .and_then(|data| data.downcast_ref::<T::DataContainer>())
    }

    #[must_use]
    pub fn get_current_time(&self) -> f64 {
        self.current_time
    }

    /// Stops the event loop once the running callback returns.
    pub fn shutdown(&mut self) {
        trace!("shutdown requested at {}", self.current_time);
        self.shutdown_requested = true;
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_requested
    }

    /// Number of plans still waiting in the queue.
    #[must_use]
    pub fn pending_plans(&self) -> usize {
        self.plan_queue.len()
    }

    /// Runs until there are no callbacks or plans left.
    pub fn execute(&mut self) {
        self.run_loop(None);
    }

    /// Runs every event scheduled strictly before `horizon`, then advances
    /// the clock to `horizon`. Anything still pending is left unexecuted.
    pub fn execute_until(&mut self, horizon: f64) {
        self.run_loop(Some(horizon));
        if horizon > self.current_time && !self.shutdown_requested {
            self.current_time = horizon;
        }
    }

    fn run_loop(&mut self, horizon: Option<f64>) {
        loop {
            if self.shutdown_requested {
                break;
            }
            if horizon.is_some_and(|horizon| self.current_time >= horizon) {
                break;
            }

            self.collect_wakeups();

            // If there is a callback, run it.
            if let Some(callback) = self.callback_queue.pop_front() {
                callback(self);
                continue;
            }

            // There aren't any callbacks, so look at the first plan.
            match self.plan_queue.next_time() {
                None => break,
                Some(time) if horizon.is_some_and(|horizon| time >= horizon) => break,
                Some(_) => {
                    if let Some(plan) = self.plan_queue.get_next_plan() {
                        self.current_time = plan.time;
                        (plan.data)(self);
                    }
                }
            }
        }
    }

    fn collect_wakeups(&mut self) {
        let mut wakeups = self.wakeups.borrow_mut();
        self.callback_queue.extend(wakeups.drain(..));
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// A weak handle onto a `Context`'s callback queue.
#[derive(Clone)]
pub struct Spawner {
    queue: Weak<WakeupQueue>,
}

impl Spawner {
    /// Queues `callback` to run at the current time. Returns `false` if the
    /// owning `Context` no longer exists.
    pub fn spawn(&self, callback: impl FnOnce(&mut Context) + 'static) -> bool {
        match self.queue.upgrade() {
            Some(queue) => {
                queue.borrow_mut().push_back(Box::new(callback));
                true
            }
            None => false,
        }
    }
}
