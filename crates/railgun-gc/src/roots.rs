//! Root registration
//!
//! Mutator structures that own GC references (the VM value stack, realm
//! globals) register here so the collector can find them. Registration is
//! scoped: [`RootSet::register`] returns a guard that borrows the root for
//! its whole lifetime and removes the entry when dropped, so a registered
//! root can never be moved or freed while the collector might call it.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::object::GcHeader;

/// A GC root: anything that can enumerate the cells it keeps alive.
pub trait Root {
    /// Report every cell header directly reachable from this root.
    fn mark_children(&self, tracer: &mut dyn FnMut(*const GcHeader));
}

struct RootEntry {
    ptr: *const dyn Root,
}

// SAFETY: entries are only dereferenced during stop-the-world marking on
// the VM thread, and the RootGuard borrow keeps the pointee alive and
// in place for the whole registration.
unsafe impl Send for RootEntry {}
unsafe impl Sync for RootEntry {}

/// The set of registered roots consulted at every collection.
pub struct RootSet {
    entries: Mutex<FxHashMap<u64, RootEntry>>,
    next_id: AtomicU64,
}

impl RootSet {
    /// Create an empty root set
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a root for the lifetime of the returned guard.
    pub fn register<'a>(&'a self, root: &'a dyn Root) -> RootGuard<'a> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        // SAFETY: the pointer is only ever dereferenced while the RootGuard
        // (which borrows `root` for 'a) is alive, so erasing the lifetime
        // here is sound; see the SAFETY note on the `Send`/`Sync` impls.
        let ptr: *const dyn Root = root as *const dyn Root;
        let ptr: *const dyn Root = unsafe {
            std::mem::transmute::<*const dyn Root, *const (dyn Root + 'static)>(ptr)
        };
        self.entries.lock().insert(id, RootEntry { ptr });
        RootGuard {
            set: self,
            id,
            _root: PhantomData,
        }
    }

    /// Number of registered roots
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no roots are registered
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Invoke `mark_children` on every registered root.
    pub fn mark_all(&self, tracer: &mut dyn FnMut(*const GcHeader)) {
        let entries = self.entries.lock();
        for entry in entries.values() {
            // SAFETY: the guard borrow guarantees the root is alive
            unsafe { (*entry.ptr).mark_children(tracer) };
        }
    }
}

impl Default for RootSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped root registration; unregisters on drop.
pub struct RootGuard<'a> {
    set: &'a RootSet,
    id: u64,
    _root: PhantomData<&'a dyn Root>,
}

impl Drop for RootGuard<'_> {
    fn drop(&mut self) {
        self.set.entries.lock().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;

    impl Root for Nothing {
        fn mark_children(&self, _tracer: &mut dyn FnMut(*const GcHeader)) {}
    }

    #[test]
    fn test_register_and_unregister() {
        let set = RootSet::new();
        let root = Nothing;
        assert!(set.is_empty());
        {
            let _guard = set.register(&root);
            assert_eq!(set.len(), 1);
        }
        assert!(set.is_empty());
    }

    #[test]
    fn test_mark_all_visits_each_root() {
        struct Counting(std::cell::Cell<usize>);
        impl Root for Counting {
            fn mark_children(&self, _tracer: &mut dyn FnMut(*const GcHeader)) {
                self.0.set(self.0.get() + 1);
            }
        }

        let set = RootSet::new();
        let a = Counting(std::cell::Cell::new(0));
        let b = Counting(std::cell::Cell::new(0));
        let _ga = set.register(&a);
        let _gb = set.register(&b);

        set.mark_all(&mut |_| {});
        assert_eq!(a.0.get(), 1);
        assert_eq!(b.0.get(), 1);
    }
}
