//! The per-world synchronous, typed publish/subscribe bus.
//!
//! Grounded in the teacher crate's use of `shrev::EventChannel` for component
//! change tracking (`storage/track.rs`, `storage/deref_flagged.rs`): one
//! ordered channel of handlers per message type, dispatched synchronously on
//! the calling thread. Unlike `shrev`, subscribers here are arbitrary
//! closures rather than buffered readers, since query sets need to react
//! immediately rather than drain a ring buffer once per frame.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use ahash::AHashMap as HashMap;
use std::rc::Rc;

type Slot<M> = Rc<RefCell<Option<Box<dyn FnMut(&M)>>>>;

/// A token returned by [`Publisher::subscribe`]. Dropping it (or calling
/// [`Disposable::dispose`] explicitly) removes the handler.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Subscription {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

/// A resource that can release itself early.
pub trait Disposable {
    /// Releases whatever this value holds (e.g. a bus subscription).
    fn dispose(self);
}

impl Disposable for Subscription {
    fn dispose(self) {
        // Drop runs the unsubscribe closure.
    }
}

/// A typed, synchronous, in-process message bus, one per [`World`](crate::world::World).
///
/// `publish::<M>` invokes every live handler registered for `M`, in
/// subscription order, on the calling thread. There is no re-entrancy guard:
/// a handler may publish further messages, or subscribe/dispose handlers for
/// the type currently being dispatched. Removal during dispatch is deferred
/// (the slot is tombstoned, not spliced out of the list) so an in-flight
/// iteration is never disturbed; a handler appended mid-dispatch is still
/// picked up within the same round, since the list length is re-read on
/// every step.
#[derive(Default)]
pub struct Publisher {
    handlers: RefCell<HashMap<TypeId, Box<dyn Any>>>,
}

impl Publisher {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Publisher::default()
    }

    fn list_for<M: 'static>(&self) -> Rc<RefCell<Vec<Slot<M>>>> {
        let mut handlers = self.handlers.borrow_mut();
        let erased = handlers
            .entry(TypeId::of::<M>())
            .or_insert_with(|| Box::new(Rc::new(RefCell::new(Vec::<Slot<M>>::new()))));
        erased
            .downcast_ref::<Rc<RefCell<Vec<Slot<M>>>>>()
            .expect("handler list type mismatch")
            .clone()
    }

    /// Registers `handler` to run on every future `publish::<M>` call.
    pub fn subscribe<M, F>(&self, handler: F) -> Subscription
    where
        M: 'static,
        F: FnMut(&M) + 'static,
    {
        let list = self.list_for::<M>();
        let slot: Slot<M> = Rc::new(RefCell::new(Some(Box::new(handler))));
        list.borrow_mut().push(slot.clone());
        Subscription::new(move || {
            *slot.borrow_mut() = None;
        })
    }

    /// Invokes every live `M` handler, in registration order, with `msg`.
    ///
    /// A panicking handler propagates immediately; handlers that ran before
    /// it keep whatever effects they already had — there is no transactional
    /// rollback.
    pub fn publish<M: 'static>(&self, msg: &M) {
        let list = self.list_for::<M>();
        let mut i = 0;
        loop {
            let slot = {
                let guard = list.borrow();
                match guard.get(i) {
                    Some(slot) => slot.clone(),
                    None => break,
                }
            };
            if let Ok(mut occupant) = slot.try_borrow_mut() {
                if let Some(handler) = occupant.as_mut() {
                    handler(msg);
                }
            }
            i += 1;
        }
    }

    /// Number of live handlers registered for `M` (tombstoned/removed
    /// handlers are not counted). Mostly useful for tests.
    #[cfg(test)]
    fn handler_count<M: 'static>(&self) -> usize {
        let list = self.list_for::<M>();
        let guard = list.borrow();
        guard.iter().filter(|s| s.borrow().is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Ping(i32);

    #[test]
    fn dispatch_order_matches_subscription_order() {
        let bus = Publisher::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let o1 = order.clone();
        let _s1 = bus.subscribe::<Ping, _>(move |p| o1.borrow_mut().push((1, p.0)));
        let o2 = order.clone();
        let _s2 = bus.subscribe::<Ping, _>(move |p| o2.borrow_mut().push((2, p.0)));

        bus.publish(&Ping(42));
        assert_eq!(*order.borrow(), vec![(1, 42), (2, 42)]);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let bus = Publisher::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let sub = bus.subscribe::<Ping, _>(move |_| c.set(c.get() + 1));
        bus.publish(&Ping(1));
        assert_eq!(count.get(), 1);
        drop(sub);
        bus.publish(&Ping(2));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn handler_can_subscribe_a_new_handler_for_same_type() {
        let bus = Rc::new(Publisher::new());
        let late_sub: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let bus_clone = bus.clone();
        let late_sub_clone = late_sub.clone();
        let _first = bus.subscribe::<Ping, _>(move |_| {
            let sub = bus_clone.subscribe::<Ping, _>(move |_| {});
            *late_sub_clone.borrow_mut() = Some(sub);
        });

        bus.publish(&Ping(1));
        assert_eq!(bus.handler_count::<Ping>(), 2);
        drop(late_sub);
    }
}
