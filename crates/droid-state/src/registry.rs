#![forbid(unsafe_code)]

//! Ordered listener storage for a single state.
//!
//! A [`ListenerRegistry`] keeps three independent, ordered lists: begin
//! triggers, value listeners and end triggers. Dispatch always works on a
//! [`Snapshot`] taken before the first callback runs, so the registry is never
//! borrowed while user code executes.
//!
//! # Invariants
//!
//! 1. Callbacks of each phase run in registration order.
//! 2. A callback registered after the snapshot was taken does not run for
//!    that dispatch.
//! 3. A callback removed after the snapshot was taken does not run for the
//!    remainder of that dispatch (its `active` flag is cleared on removal).

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of one registered listener or trigger.
///
/// Identifiers are unique for the lifetime of the process, so a stale id
/// can never detach a listener that was registered later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

pub(crate) type Trigger = dyn Fn();
pub(crate) type ValueListener<T> = dyn Fn(&T, &T);

pub(crate) struct Entry<F: ?Sized> {
    id: ListenerId,
    active: Cell<bool>,
    callback: Box<F>,
}

impl<F: ?Sized> Entry<F> {
    fn new(id: ListenerId, callback: Box<F>) -> Rc<Self> {
        Rc::new(Self {
            id,
            active: Cell::new(true),
            callback,
        })
    }
}

/// Callbacks detached from a registry.
///
/// Holding on to this value until the registry borrow has been released keeps
/// closure destructors (which may drop other states) out of the borrow.
pub(crate) struct Removed<T> {
    pub(crate) count: usize,
    _begin: Vec<Rc<Entry<Trigger>>>,
    _listeners: Vec<Rc<Entry<ValueListener<T>>>>,
    _end: Vec<Rc<Entry<Trigger>>>,
}

impl<T> Removed<T> {
    fn none() -> Self {
        Self {
            count: 0,
            _begin: Vec::new(),
            _listeners: Vec::new(),
            _end: Vec::new(),
        }
    }
}

pub(crate) struct ListenerRegistry<T> {
    begin: Vec<Rc<Entry<Trigger>>>,
    listeners: Vec<Rc<Entry<ValueListener<T>>>>,
    end: Vec<Rc<Entry<Trigger>>>,
}

impl<T> ListenerRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            begin: Vec::new(),
            listeners: Vec::new(),
            end: Vec::new(),
        }
    }

    pub(crate) fn add_begin(&mut self, trigger: Box<Trigger>) -> ListenerId {
        let id = ListenerId::next();
        self.begin.push(Entry::new(id, trigger));
        id
    }

    pub(crate) fn add_listener(&mut self, listener: Box<ValueListener<T>>) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.push(Entry::new(id, listener));
        id
    }

    pub(crate) fn add_end(&mut self, trigger: Box<Trigger>) -> ListenerId {
        let id = ListenerId::next();
        self.end.push(Entry::new(id, trigger));
        id
    }

    /// Remove the callback registered under `id`, whichever phase it is in.
    pub(crate) fn remove(&mut self, id: ListenerId) -> Removed<T> {
        let mut removed = Removed::none();
        if let Some(entry) = take_entry(&mut self.begin, id) {
            removed._begin.push(entry);
        } else if let Some(entry) = take_entry(&mut self.listeners, id) {
            removed._listeners.push(entry);
        } else if let Some(entry) = take_entry(&mut self.end, id) {
            removed._end.push(entry);
        } else {
            return removed;
        }
        removed.count = 1;
        removed
    }

    pub(crate) fn clear(&mut self) -> Removed<T> {
        let begin = std::mem::take(&mut self.begin);
        let listeners = std::mem::take(&mut self.listeners);
        let end = std::mem::take(&mut self.end);
        for entry in &begin {
            entry.active.set(false);
        }
        for entry in &listeners {
            entry.active.set(false);
        }
        for entry in &end {
            entry.active.set(false);
        }
        Removed {
            count: begin.len() + listeners.len() + end.len(),
            _begin: begin,
            _listeners: listeners,
            _end: end,
        }
    }

    pub(crate) fn contains(&self, id: ListenerId) -> bool {
        self.begin.iter().any(|e| e.id == id)
            || self.listeners.iter().any(|e| e.id == id)
            || self.end.iter().any(|e| e.id == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.begin.len() + self.listeners.len() + self.end.len()
    }

    pub(crate) fn snapshot(&self) -> Snapshot<T> {
        Snapshot {
            begin: self.begin.clone(),
            listeners: self.listeners.clone(),
            end: self.end.clone(),
        }
    }
}

impl<T> fmt::Debug for ListenerRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("begin", &self.begin.len())
            .field("listeners", &self.listeners.len())
            .field("end", &self.end.len())
            .finish()
    }
}

fn take_entry<F: ?Sized>(entries: &mut Vec<Rc<Entry<F>>>, id: ListenerId) -> Option<Rc<Entry<F>>> {
    let index = entries.iter().position(|e| e.id == id)?;
    let entry = entries.remove(index);
    entry.active.set(false);
    Some(entry)
}

/// Frozen copy of a registry's callbacks for one dispatch.
pub(crate) struct Snapshot<T> {
    begin: Vec<Rc<Entry<Trigger>>>,
    listeners: Vec<Rc<Entry<ValueListener<T>>>>,
    end: Vec<Rc<Entry<Trigger>>>,
}

impl<T> Snapshot<T> {
    /// Run begin triggers, then value listeners, then end triggers.
    pub(crate) fn dispatch(&self, old: &T, new: &T) {
        for entry in &self.begin {
            if entry.active.get() {
                (entry.callback)();
            }
        }
        for entry in &self.listeners {
            if entry.active.get() {
                (entry.callback)(old, new);
            }
        }
        for entry in &self.end {
            if entry.active.get() {
                (entry.callback)();
            }
        }
    }
}
