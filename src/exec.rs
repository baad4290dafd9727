// src/exec.rs
use std::collections::{BTreeMap, HashMap};

/// Identifier of a registered callback. Issued monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallerId(pub(crate) u64);

// Total order: sorting order first, registration id as the deterministic
// tie-break.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct CallerKey {
    order: i32,
    id: CallerId,
}

struct Caller {
    func: Box<dyn FnMut()>,
    order_fn: Box<dyn Fn() -> i32>,
}

/// Priority-bucketed callback list with deterministic ties.
///
/// Each entry carries an order-producing function. [`call`] re-evaluates every
/// entry's order, re-buckets the ones that changed, then invokes all callbacks
/// in ascending `(order, id)` order. An order change made mid-cycle is
/// observed only at the next cycle boundary.
///
/// [`call`]: OrderedExecutor::call
pub struct OrderedExecutor {
    next_id: u64,
    callers: BTreeMap<CallerKey, Caller>,
    key_by_id: HashMap<CallerId, CallerKey>,
}

impl Default for OrderedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderedExecutor {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            callers: BTreeMap::new(),
            key_by_id: HashMap::new(),
        }
    }

    pub fn add(
        &mut self,
        func: impl FnMut() + 'static,
        order_fn: impl Fn() -> i32 + 'static,
    ) -> CallerId {
        let id = CallerId(self.next_id);
        self.next_id += 1;

        let order = order_fn();
        let key = CallerKey { order, id };
        let caller = Caller {
            func: Box::new(func),
            order_fn: Box::new(order_fn),
        };
        if self.callers.insert(key, caller).is_some() {
            panic!("ordered executor: id {} cannot be inserted", id.0);
        }
        if self.key_by_id.insert(id, key).is_some() {
            panic!("ordered executor: id {} inconsistency detected", id.0);
        }
        id
    }

    /// Drops an entry. Unknown ids are ignored.
    pub fn remove(&mut self, id: CallerId) {
        let Some(key) = self.key_by_id.remove(&id) else {
            return;
        };
        if self.callers.remove(&key).is_none() {
            panic!("ordered executor: id {} inconsistency detected", id.0);
        }
    }

    fn refresh_order(&mut self) {
        let mut moved: Vec<(CallerKey, i32)> = Vec::new();
        for (key, caller) in &self.callers {
            let order = (caller.order_fn)();
            if order != key.order {
                moved.push((*key, order));
            }
        }
        for (old_key, order) in moved {
            let caller = self
                .callers
                .remove(&old_key)
                .expect("re-bucketed entry vanished");
            let new_key = CallerKey {
                order,
                id: old_key.id,
            };
            tracing::trace!(id = old_key.id.0, from = old_key.order, to = order, "re-bucket");
            self.callers.insert(new_key, caller);
            self.key_by_id.insert(old_key.id, new_key);
        }
    }

    /// One dispatch cycle: re-bucket, then invoke every callback in order.
    pub fn call(&mut self) {
        self.refresh_order();
        for caller in self.callers.values_mut() {
            (caller.func)();
        }
    }

    /// True if any entry's current order equals `order` (evaluated live, not
    /// from the cached bucket).
    pub fn has_order(&self, order: i32) -> bool {
        self.callers.values().any(|c| (c.order_fn)() == order)
    }

    /// True if any entry's current order falls in `min..=max`.
    pub fn has_order_in_range(&self, min: i32, max: i32) -> bool {
        self.callers.values().any(|c| {
            let order = (c.order_fn)();
            min <= order && order <= max
        })
    }

    pub fn len(&self) -> usize {
        self.callers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn FnMut()>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let make = {
            let log = log.clone();
            move |tag: &'static str| -> Box<dyn FnMut()> {
                let log = log.clone();
                Box::new(move || log.borrow_mut().push(tag))
            }
        };
        (log, make)
    }

    #[test]
    fn ascending_order_with_registration_tie_break() {
        let (log, make) = recorder();
        let mut exec = OrderedExecutor::new();

        exec.add(make("p10"), || 10);
        exec.add(make("p5a"), || 5);
        exec.add(make("p5b"), || 5);

        exec.call();
        assert_eq!(*log.borrow(), vec!["p5a", "p5b", "p10"]);
    }

    #[test]
    fn order_change_takes_effect_next_cycle() {
        let (log, make) = recorder();
        let mut exec = OrderedExecutor::new();

        let order_b = Rc::new(Cell::new(10));

        // Entry A flips B's order while a cycle is already dispatching.
        let order_b_for_a = order_b.clone();
        let mut a_inner = make("a");
        exec.add(
            move || {
                order_b_for_a.set(-1);
                a_inner();
            },
            || 0,
        );
        let order_b_for_b = order_b.clone();
        exec.add(make("b"), move || order_b_for_b.get());

        exec.call();
        // B was bucketed at 10 when the cycle began.
        assert_eq!(*log.borrow(), vec!["a", "b"]);

        log.borrow_mut().clear();
        exec.call();
        assert_eq!(*log.borrow(), vec!["b", "a"]);
    }

    #[test]
    fn remove_is_idempotent() {
        let (log, make) = recorder();
        let mut exec = OrderedExecutor::new();
        let id = exec.add(make("x"), || 0);
        exec.remove(id);
        exec.remove(id);
        exec.call();
        assert!(log.borrow().is_empty());
        assert!(exec.is_empty());
    }

    #[test]
    fn band_queries_use_live_order() {
        let mut exec = OrderedExecutor::new();
        let order = Rc::new(Cell::new(3));
        let order2 = order.clone();
        exec.add(|| {}, move || order2.get());

        assert!(exec.has_order(3));
        assert!(exec.has_order_in_range(0, 5));
        assert!(!exec.has_order(4));

        // Live query: no call() needed for the new order to be visible.
        order.set(42);
        assert!(exec.has_order(42));
        assert!(!exec.has_order_in_range(0, 5));
    }
}
