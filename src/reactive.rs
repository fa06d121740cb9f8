//! Observable values and a coalescing redraw scheduler.
//!
//! View parameters (visible range, levels, split position, toggles) live in
//! [`Cell`]s. A reader can take the current value, take it while registering
//! a one-shot dependency, or subscribe permanently. Redraw work triggered by
//! those notifications is funneled through a [`Scheduler`], which keeps at
//! most one pending redraw per component until the next animation frame
//! drains it.
//!
//! Everything here is single-threaded (`Rc`/`RefCell`): it all runs on the
//! UI thread.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

pub type Callback = Rc<dyn Fn()>;

/// Handle returned by [`Cell::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct CellInner<T> {
    value: T,
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Callback)>,
    dependents: Vec<Callback>,
}

/// Shared observable value.
pub struct Cell<T> {
    inner: Rc<RefCell<CellInner<T>>>,
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq> Cell<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CellInner {
                value,
                next_id: 0,
                subscribers: Vec::new(),
                dependents: Vec::new(),
            })),
        }
    }

    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Read the value and ask to be called back once, on its next change.
    pub fn depend(&self, on_change: &Callback) -> T {
        let mut inner = self.inner.borrow_mut();
        inner.dependents.push(Rc::clone(on_change));
        inner.value.clone()
    }

    /// Call `on_change` after every change until unsubscribed.
    pub fn subscribe(&self, on_change: impl Fn() + 'static) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.push((id, Rc::new(on_change)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.borrow_mut().subscribers.retain(|(sid, _)| *sid != id);
    }

    /// Store `value`, notifying observers if it differs from the old one.
    /// Returns whether anything changed.
    pub fn set(&self, value: T) -> bool {
        let callbacks = {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return false;
            }
            inner.value = value;
            let mut callbacks: Vec<Callback> = std::mem::take(&mut inner.dependents);
            callbacks.extend(inner.subscribers.iter().map(|(_, cb)| Rc::clone(cb)));
            callbacks
        };
        // callbacks may read or write this cell again, so run them unborrowed
        for cb in callbacks {
            cb();
        }
        true
    }

    /// Apply `f` to a copy of the value and store the result.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = f(&self.inner.borrow().value);
        self.set(next)
    }

    pub fn subscriber_count(&self) -> usize {
        let inner = self.inner.borrow();
        inner.subscribers.len() + inner.dependents.len()
    }
}

/// Identity of a redraw-able component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub u32);

impl ComponentId {
    pub const WATERFALL: ComponentId = ComponentId(0);
    pub const AXIS: ComponentId = ComponentId(1);
    pub const MARKS: ComponentId = ComponentId(2);
}

#[derive(Default)]
struct SchedulerInner {
    queue: Vec<ComponentId>,
    pending: HashSet<ComponentId>,
}

/// Per-frame redraw queue, deduplicated by component.
#[derive(Default)]
pub struct Scheduler {
    inner: RefCell<SchedulerInner>,
    wake: RefCell<Option<Box<dyn Fn()>>>,
}

impl Scheduler {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Hook called when the queue goes from empty to non-empty, e.g. to ask
    /// egui for another frame.
    pub fn set_waker(&self, wake: impl Fn() + 'static) {
        *self.wake.borrow_mut() = Some(Box::new(wake));
    }

    /// Queue a redraw of `id`. Returns `false` if one was already pending.
    pub fn schedule(&self, id: ComponentId) -> bool {
        let was_idle = {
            let mut inner = self.inner.borrow_mut();
            if !inner.pending.insert(id) {
                return false;
            }
            inner.queue.push(id);
            inner.queue.len() == 1
        };
        if was_idle {
            if let Some(wake) = self.wake.borrow().as_ref() {
                wake();
            }
        }
        true
    }

    pub fn is_pending(&self, id: ComponentId) -> bool {
        self.inner.borrow().pending.contains(&id)
    }

    /// Take everything queued for this animation frame, in request order.
    pub fn drain(&self) -> Vec<ComponentId> {
        let mut inner = self.inner.borrow_mut();
        inner.pending.clear();
        std::mem::take(&mut inner.queue)
    }

    /// Callback that schedules `id`; hand it to [`Cell::subscribe`].
    pub fn trigger(self: &Rc<Self>, id: ComponentId) -> impl Fn() + 'static {
        let weak = Rc::downgrade(self);
        move || {
            if let Some(scheduler) = weak.upgrade() {
                scheduler.schedule(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell as StdCell;

    #[test]
    fn depend_fires_once_subscribe_fires_always() {
        let cell = Cell::new(1);
        let once = Rc::new(StdCell::new(0));
        let always = Rc::new(StdCell::new(0));
        let o = once.clone();
        let cb: Callback = Rc::new(move || o.set(o.get() + 1));
        assert_eq!(cell.depend(&cb), 1);
        let a = always.clone();
        cell.subscribe(move || a.set(a.get() + 1));

        assert!(cell.set(2));
        assert!(cell.set(3));
        assert!(!cell.set(3));
        assert_eq!(once.get(), 1);
        assert_eq!(always.get(), 2);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let cell = Cell::new(0.5_f32);
        let hits = Rc::new(StdCell::new(0));
        let h = hits.clone();
        let id = cell.subscribe(move || h.set(h.get() + 1));
        cell.set(0.6);
        cell.unsubscribe(id);
        cell.set(0.7);
        assert_eq!(hits.get(), 1);
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn scheduler_coalesces_per_component() {
        let scheduler = Scheduler::new();
        let wakes = Rc::new(StdCell::new(0));
        let w = wakes.clone();
        scheduler.set_waker(move || w.set(w.get() + 1));

        assert!(scheduler.schedule(ComponentId::WATERFALL));
        assert!(!scheduler.schedule(ComponentId::WATERFALL));
        assert!(scheduler.schedule(ComponentId::AXIS));
        assert_eq!(wakes.get(), 1);
        assert_eq!(
            scheduler.drain(),
            vec![ComponentId::WATERFALL, ComponentId::AXIS]
        );
        assert!(scheduler.drain().is_empty());
        assert!(scheduler.schedule(ComponentId::WATERFALL));
        assert_eq!(wakes.get(), 2);
    }
}
