//! # Typed Message Bus
//!
//! A per-world, synchronous publish/subscribe bus. For each message type the
//! bus keeps an append-ordered handler list; publishing invokes every handler
//! in registration order on the calling thread.
//!
//! ## Reentrancy
//! Handlers may publish further messages and may subscribe or unsubscribe
//! during dispatch:
//!
//! - A handler subscribed during dispatch of the same message type is
//!   appended to the tail and still runs in the current round.
//! - A handler removed during dispatch is tombstoned and skipped; the list is
//!   compacted once the outermost dispatch returns.
//!
//! ## Failure policy
//! A panicking handler propagates to the publisher's caller; handlers that
//! already ran keep their effects. The bus is not thread-safe.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

type HandlerId = u64;

struct HandlerSlot<M> {
    id: HandlerId,
    removed: bool,
    // None while the handler is executing or after removal.
    handler: Option<Box<dyn FnMut(&M)>>,
}

struct HandlerList<M> {
    slots: RefCell<Vec<HandlerSlot<M>>>,
    depth: Cell<u32>,
}

impl<M: 'static> HandlerList<M> {
    fn new() -> Self {
        Self {
            slots: RefCell::new(Vec::new()),
            depth: Cell::new(0),
        }
    }

    fn subscribe(&self, id: HandlerId, handler: Box<dyn FnMut(&M)>) {
        self.slots.borrow_mut().push(HandlerSlot {
            id,
            removed: false,
            handler: Some(handler),
        });
    }

    fn publish(&self, message: &M) {
        self.depth.set(self.depth.get() + 1);

        let mut index = 0;
        loop {
            // Take the handler out of its slot so the list stays borrowable
            // while the handler runs; the length is re-read every step so
            // handlers appended mid-dispatch are reached this round.
            let taken = {
                let mut slots = self.slots.borrow_mut();
                if index >= slots.len() {
                    break;
                }
                let slot = &mut slots[index];
                if slot.removed { None } else { slot.handler.take() }
            };

            if let Some(mut handler) = taken {
                handler(message);
                let mut slots = self.slots.borrow_mut();
                let slot = &mut slots[index];
                if !slot.removed {
                    slot.handler = Some(handler);
                }
            }
            index += 1;
        }

        self.depth.set(self.depth.get() - 1);
        if self.depth.get() == 0 {
            self.slots.borrow_mut().retain(|slot| !slot.removed);
        }
    }
}

trait ErasedHandlerList {
    fn remove(&self, id: HandlerId);
}

impl<M: 'static> ErasedHandlerList for HandlerList<M> {
    fn remove(&self, id: HandlerId) {
        let mut slots = self.slots.borrow_mut();
        if self.depth.get() > 0 {
            if let Some(slot) = slots.iter_mut().find(|slot| slot.id == id) {
                slot.removed = true;
                slot.handler = None;
            }
        } else {
            slots.retain(|slot| slot.id != id);
        }
    }
}

/// Token holding one bus subscription.
///
/// Dropping the token removes the handler from its list; query sets and
/// pools keep their tokens for as long as they want to observe the world.
pub struct Subscription {
    list: Rc<dyn ErasedHandlerList>,
    id: HandlerId,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.list.remove(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Typed synchronous message bus of one world.
///
/// Handler lists are kept per message type behind a type map; dispatch
/// passes `&M` through the erased slot without allocation.
pub struct Publisher {
    lists: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
    next_id: Cell<HandlerId>,
}

impl Publisher {
    pub(crate) fn new() -> Self {
        Self {
            lists: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
        }
    }

    fn list_for<M: 'static>(&self) -> Rc<HandlerList<M>> {
        let mut lists = self.lists.borrow_mut();
        let entry = lists
            .entry(TypeId::of::<M>())
            .or_insert_with(|| Rc::new(HandlerList::<M>::new()) as Rc<dyn Any>);
        entry
            .clone()
            .downcast::<HandlerList<M>>()
            .expect("handler list registered under a foreign message type")
    }

    /// Registers `handler` for message type `M`.
    ///
    /// Handlers run in registration order. The returned token removes the
    /// handler when dropped.
    pub fn subscribe<M: 'static, F: FnMut(&M) + 'static>(&self, handler: F) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let list = self.list_for::<M>();
        list.subscribe(id, Box::new(handler));
        Subscription { list, id }
    }

    /// Invokes every handler registered for `M`, in registration order, on
    /// the calling thread.
    pub fn publish<M: 'static>(&self, message: &M) {
        let list = self.lists.borrow().get(&TypeId::of::<M>()).cloned();
        if let Some(list) = list {
            if let Ok(list) = list.downcast::<HandlerList<M>>() {
                list.publish(message);
            }
        }
    }
}
