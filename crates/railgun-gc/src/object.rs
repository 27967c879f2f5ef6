//! GC cell layout

use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

/// Global mark version counter.
/// Bumped at the start of each GC cycle instead of iterating all cells
/// to reset marks to White. A cell is "white" (unmarked) if its
/// `mark_version` doesn't match this global counter, an O(1) phase reset.
static MARK_VERSION: AtomicU32 = AtomicU32::new(0);

/// Get the current global mark version.
#[inline]
pub fn current_mark_version() -> u32 {
    MARK_VERSION.load(Ordering::Acquire)
}

/// Bump the global mark version (O(1) mark reset).
///
/// After bumping, all cells are effectively "white" because their
/// `mark_version` no longer matches the new global version.
#[inline]
pub fn bump_mark_version() -> u32 {
    MARK_VERSION.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
}

/// GC cell header (8 bytes, repr(C), alignment 4)
#[repr(C)]
pub struct GcHeader {
    /// Mark bits for tri-color marking (White=0, Gray=1, Black=2)
    mark: AtomicU8,
    /// Cell type tag
    tag: u8,
    /// Explicit padding to align `mark_version` to a 4-byte boundary.
    _pad: [u8; 2],
    /// Logical mark version. The cell is "white" if this doesn't match
    /// `MARK_VERSION`.
    mark_version: AtomicU32,
}

/// Mark color for tri-color marking
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkColor {
    /// Not yet visited
    White = 0,
    /// In worklist
    Gray = 1,
    /// Fully scanned
    Black = 2,
}

impl GcHeader {
    /// Create new header
    pub const fn new(tag: u8) -> Self {
        Self {
            mark: AtomicU8::new(MarkColor::White as u8),
            tag,
            _pad: [0; 2],
            mark_version: AtomicU32::new(0),
        }
    }

    /// Get mark color, taking logical versioning into account.
    ///
    /// If this cell's `mark_version` doesn't match the global version,
    /// it's considered White (unmarked) regardless of the mark byte.
    #[inline]
    pub fn mark(&self) -> MarkColor {
        if self.mark_version.load(Ordering::Acquire) != current_mark_version() {
            return MarkColor::White;
        }
        match self.mark.load(Ordering::Acquire) {
            1 => MarkColor::Gray,
            2 => MarkColor::Black,
            _ => MarkColor::White,
        }
    }

    /// Set mark color.
    ///
    /// Also stamps the current global `mark_version` so the cell is
    /// recognized as belonging to the current GC cycle.
    #[inline]
    pub fn set_mark(&self, color: MarkColor) {
        self.mark.store(color as u8, Ordering::Release);
        self.mark_version
            .store(current_mark_version(), Ordering::Release);
    }

    /// Get cell tag
    pub fn tag(&self) -> u8 {
        self.tag
    }
}

impl std::fmt::Debug for GcHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcHeader")
            .field("mark", &self.mark())
            .field("tag", &self.tag)
            .finish()
    }
}

/// Well-known cell type tags
pub mod tags {
    /// Untyped cell
    pub const OTHER: u8 = 0;
    /// Interned or constructed string
    pub const STRING: u8 = 1;
    /// Plain object
    pub const OBJECT: u8 = 2;
    /// Array exotic object
    pub const ARRAY: u8 = 3;
    /// Compiled regular expression
    pub const REGEXP: u8 = 4;
    /// Executable code cell
    pub const CODE: u8 = 5;
    /// Environment record
    pub const ENVIRONMENT: u8 = 6;
}
