//! Cell allocation and collection
//!
//! Every GC-managed value lives in a `(GcHeader, T)` box tracked by an
//! [`AllocationRegistry`]. Collection is stop-the-world: roots are pushed
//! onto a gray worklist, children are traced through each cell's
//! [`GcTraceable::trace`], and unmarked cells are swept.

use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::object::{GcHeader, MarkColor, bump_mark_version, tags};
use crate::roots::{Root, RootSet};

/// Trait for types that can be traced by the GC
pub trait GcTraceable {
    /// Whether this type contains GC references that need tracing
    const NEEDS_TRACE: bool;

    /// Cell type tag stamped into the header on allocation
    const TYPE_ID: u8 = tags::OTHER;

    /// Trace all GC references in this value
    fn trace(&self, tracer: &mut dyn FnMut(*const GcHeader));
}

/// GC configuration
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Bytes of live allocation before a collection is requested
    pub gc_threshold: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            gc_threshold: 1024 * 1024,
        }
    }
}

/// Collection statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct GcStats {
    /// Number of collections performed
    pub collections: usize,
    /// Bytes reclaimed by the last collection
    pub last_reclaimed: usize,
    /// Live bytes after the last collection
    pub live_bytes: usize,
}

/// A GC cell: header followed by the value, `repr(C)` so the header
/// address is the box address.
#[repr(C)]
struct GcBox<T> {
    header: GcHeader,
    value: T,
}

type DropFn = unsafe fn(*mut u8);
type TraceFn = unsafe fn(*const u8, &mut dyn FnMut(*const GcHeader));

/// Drop function for GC boxes: reconstitutes the box and drops it.
unsafe fn drop_gc_box<T>(ptr: *mut u8) {
    // SAFETY: ptr was produced by Box::into_raw for a GcBox<T>
    unsafe {
        drop(Box::from_raw(ptr as *mut GcBox<T>));
    }
}

/// Trace function for GC boxes
unsafe fn trace_gc_box<T: GcTraceable>(ptr: *const u8, tracer: &mut dyn FnMut(*const GcHeader)) {
    let boxed = ptr as *const GcBox<T>;
    // SAFETY: ptr is valid and points to an initialized GcBox<T>
    unsafe {
        (*boxed).value.trace(tracer);
    }
}

/// One tracked allocation.
struct Allocation {
    header: *mut GcHeader,
    size: usize,
    drop_fn: DropFn,
    trace_fn: Option<TraceFn>,
}

// SAFETY: Allocation contains raw pointers managed exclusively by the
// registry; the mutator is single-threaded and collection is
// stop-the-world.
unsafe impl Send for Allocation {}
unsafe impl Sync for Allocation {}

/// Handle to a GC-managed cell.
///
/// `GcRef` is `Copy`: it is a bare pointer into the registry-owned box.
/// Liveness is the collector's business: a `GcRef` reachable from a
/// registered [`Root`] survives collection.
pub struct GcRef<T> {
    ptr: NonNull<GcBox<T>>,
}

impl<T> Clone for GcRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for GcRef<T> {}

// SAFETY: cells are only accessed from the single VM thread; thread
// confinement is enforced by the embedding context.
unsafe impl<T> Send for GcRef<T> {}
unsafe impl<T> Sync for GcRef<T> {}

impl<T: GcTraceable> GcRef<T> {
    /// Allocate a new cell in the global registry.
    pub fn new(value: T) -> Self {
        AllocationRegistry::global().alloc(value)
    }
}

impl<T> GcRef<T> {
    /// Get the cell's GC header
    pub fn header(&self) -> &GcHeader {
        // SAFETY: the box outlives every handle reachable from a root
        unsafe { &self.ptr.as_ref().header }
    }

    /// Get a raw pointer to the value
    pub fn as_ptr(&self) -> *const T {
        // SAFETY: as above
        unsafe { &self.ptr.as_ref().value as *const T }
    }

    /// Pointer identity comparison
    pub fn ptr_eq(a: Self, b: Self) -> bool {
        a.ptr == b.ptr
    }
}

impl<T> Deref for GcRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the box outlives every handle reachable from a root
        unsafe { &self.ptr.as_ref().value }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for GcRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        (**self).fmt(f)
    }
}

impl<T: PartialEq> PartialEq for GcRef<T> {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl<T: Eq> Eq for GcRef<T> {}

impl<T: std::hash::Hash> std::hash::Hash for GcRef<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (**self).hash(state);
    }
}

/// Central registry tracking all GC-managed allocations.
pub struct AllocationRegistry {
    allocations: Mutex<FxHashMap<usize, Allocation>>,
    total_bytes: AtomicUsize,
    gc_threshold: AtomicUsize,
    collection_count: AtomicUsize,
    last_reclaimed: AtomicUsize,
}

static GLOBAL_REGISTRY: std::sync::LazyLock<AllocationRegistry> =
    std::sync::LazyLock::new(AllocationRegistry::new);

/// Collections are stop-the-world and serialized process-wide: the logical
/// mark reset is a global counter, so a concurrent collection would turn
/// another collection's marked cells white mid-cycle.
static COLLECT_LOCK: Mutex<()> = Mutex::new(());

impl AllocationRegistry {
    /// Create a registry with the default configuration
    pub fn new() -> Self {
        Self::with_config(GcConfig::default())
    }

    /// Create a registry with an explicit configuration
    pub fn with_config(config: GcConfig) -> Self {
        Self {
            allocations: Mutex::new(FxHashMap::default()),
            total_bytes: AtomicUsize::new(0),
            gc_threshold: AtomicUsize::new(config.gc_threshold),
            collection_count: AtomicUsize::new(0),
            last_reclaimed: AtomicUsize::new(0),
        }
    }

    /// The process-wide registry used by [`GcRef::new`]
    pub fn global() -> &'static AllocationRegistry {
        &GLOBAL_REGISTRY
    }

    /// Allocate a cell in this registry
    pub fn alloc<T: GcTraceable>(&self, value: T) -> GcRef<T> {
        let boxed = Box::new(GcBox {
            header: GcHeader::new(T::TYPE_ID),
            value,
        });
        let size = std::mem::size_of::<GcBox<T>>();
        let ptr = Box::into_raw(boxed);
        let header = ptr as *mut GcHeader;
        self.allocations.lock().insert(
            header as usize,
            Allocation {
                header,
                size,
                drop_fn: drop_gc_box::<T>,
                trace_fn: if T::NEEDS_TRACE {
                    Some(trace_gc_box::<T>)
                } else {
                    None
                },
            },
        );
        self.total_bytes.fetch_add(size, Ordering::Relaxed);
        GcRef {
            // SAFETY: Box::into_raw never returns null
            ptr: unsafe { NonNull::new_unchecked(ptr) },
        }
    }

    /// Total bytes currently tracked
    pub fn total_bytes(&self) -> usize {
        self.total_bytes.load(Ordering::Relaxed)
    }

    /// Number of live allocations
    pub fn allocation_count(&self) -> usize {
        self.allocations.lock().len()
    }

    /// The configured collection threshold
    pub fn gc_threshold(&self) -> usize {
        self.gc_threshold.load(Ordering::Relaxed)
    }

    /// Whether allocation pressure warrants a collection
    pub fn should_collect(&self) -> bool {
        self.total_bytes() > self.gc_threshold()
    }

    /// Collection statistics
    pub fn stats(&self) -> GcStats {
        GcStats {
            collections: self.collection_count.load(Ordering::Relaxed),
            last_reclaimed: self.last_reclaimed.load(Ordering::Relaxed),
            live_bytes: self.total_bytes(),
        }
    }

    /// Collect, treating the given root set as the only roots.
    ///
    /// Returns the number of bytes reclaimed.
    pub fn collect(&self, roots: &RootSet) -> usize {
        self.collect_with(roots, &[])
    }

    /// Collect with additional transient roots (e.g. values held on the
    /// native stack at the allocation point).
    pub fn collect_with(&self, roots: &RootSet, extra: &[&dyn Root]) -> usize {
        let _serialized = COLLECT_LOCK.lock();
        bump_mark_version();

        let mut worklist: Vec<*const GcHeader> = Vec::with_capacity(64);
        {
            let mut push = |header: *const GcHeader| {
                if !header.is_null() {
                    worklist.push(header);
                }
            };
            roots.mark_all(&mut push);
            for root in extra {
                root.mark_children(&mut push);
            }
        }

        // Mark phase: explicit gray worklist, mark-and-push children.
        {
            let allocations = self.allocations.lock();
            while let Some(header_ptr) = worklist.pop() {
                // SAFETY: headers on the worklist come from live cells;
                // nothing is swept while marking is in progress.
                let header = unsafe { &*header_ptr };
                if header.mark() != MarkColor::White {
                    continue;
                }
                header.set_mark(MarkColor::Black);
                if let Some(alloc) = allocations.get(&(header_ptr as usize)) {
                    if let Some(trace_fn) = alloc.trace_fn {
                        let mut children: Vec<*const GcHeader> = Vec::new();
                        // SAFETY: the allocation is live and typed for trace_fn
                        unsafe {
                            trace_fn(alloc.header as *const u8, &mut |child| {
                                children.push(child)
                            });
                        }
                        worklist.extend(children);
                    }
                }
            }
        }

        // Sweep phase: drop every cell still white.
        let mut reclaimed = 0usize;
        {
            let mut allocations = self.allocations.lock();
            allocations.retain(|_, alloc| {
                // SAFETY: the header pointer is valid until the drop below
                let live = unsafe { (*alloc.header).mark() } != MarkColor::White;
                if !live {
                    reclaimed += alloc.size;
                    // SAFETY: the cell is unreachable; no handle to it can
                    // be used again by a correct mutator.
                    unsafe { (alloc.drop_fn)(alloc.header as *mut u8) };
                }
                live
            });
        }

        self.total_bytes.fetch_sub(reclaimed, Ordering::Relaxed);
        self.collection_count.fetch_add(1, Ordering::Relaxed);
        self.last_reclaimed.store(reclaimed, Ordering::Relaxed);

        #[cfg(feature = "gc_logging")]
        tracing::debug!(
            reclaimed,
            live_bytes = self.total_bytes(),
            "gc collection finished"
        );

        reclaimed
    }
}

impl Default for AllocationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
