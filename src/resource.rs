//! A bounded-capacity resource shared between processes.
//!
//! Processes call `Resource::request` with the continuation to run once a
//! slot is available. The continuation receives a `ResourceGrant`; the slot
//! stays occupied for as long as the grant is alive and is handed to the
//! next waiter (first come, first served) when it is dropped. Because
//! release happens in `Drop`, a grant captured by a plan that is abandoned at
//! the horizon, or dropped early on any other path, still frees its slot.
use std::{cell::RefCell, collections::VecDeque, fmt, rc::Rc};

use log::trace;

use crate::context::{Context, Spawner};

type Waiter = Box<dyn FnOnce(&mut Context, ResourceGrant)>;

struct ResourceState {
    capacity: usize,
    in_use: usize,
    waiters: VecDeque<Waiter>,
}

/// A cloneable handle onto a single resource.
#[derive(Clone)]
pub struct Resource {
    state: Rc<RefCell<ResourceState>>,
}

impl Resource {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Resource {
        assert!(capacity > 0, "Resource capacity must be positive");
        Resource {
            state: Rc::new(RefCell::new(ResourceState {
                capacity,
                in_use: 0,
                waiters: VecDeque::new(),
            })),
        }
    }

    /// Runs `callback` with a grant as soon as a slot is free. When a slot is
    /// free now the callback runs before `request` returns.
    pub fn request(
        &self,
        context: &mut Context,
        callback: impl FnOnce(&mut Context, ResourceGrant) + 'static,
    ) {
        {
            let mut state = self.state.borrow_mut();
            if state.in_use == state.capacity {
                state.waiters.push_back(Box::new(callback));
                trace!("resource busy, {} waiting", state.waiters.len());
                return;
            }
            state.in_use += 1;
        }
        let grant = ResourceGrant {
            state: Rc::clone(&self.state),
            spawner: context.spawner(),
        };
        callback(context, grant);
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.state.borrow().capacity
    }

    #[must_use]
    pub fn in_use(&self) -> usize {
        self.state.borrow().in_use
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.state.borrow().waiters.len()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Resource")
            .field("capacity", &state.capacity)
            .field("in_use", &state.in_use)
            .field("waiting", &state.waiters.len())
            .finish()
    }
}

/// Proof of holding one slot of a `Resource`. Dropping it releases the slot.
pub struct ResourceGrant {
    state: Rc<RefCell<ResourceState>>,
    spawner: Spawner,
}

impl Drop for ResourceGrant {
    fn drop(&mut self) {
        let next = {
            let mut state = self.state.borrow_mut();
            state.in_use -= 1;
            state.waiters.pop_front()
        };
        let Some(waiter) = next else {
            return;
        };

        // The slot passes straight to the next waiter.
        self.state.borrow_mut().in_use += 1;
        let grant = ResourceGrant {
            state: Rc::clone(&self.state),
            spawner: self.spawner.clone(),
        };
        if !self.spawner.spawn(move |context| waiter(context, grant)) {
            trace!("resource released after its context was dropped");
        }
    }
}
