//! # Railgun Garbage Collector
//!
//! Stop-the-world mark/sweep collector for the railgun VM.
//!
//! ## Design
//!
//! - **Registry-tracked allocation**: every GC cell is a `(GcHeader, T)` box
//!   recorded in an [`AllocationRegistry`]
//! - **Tri-color marking**: white/gray/black with an explicit gray worklist
//! - **Logical mark reset**: a global mark version is bumped per cycle
//!   instead of touching every header, an O(1) phase reset
//! - **Root registration**: mutator structures (the VM value stack, realm
//!   globals) register as [`Root`]s and are unregistered by RAII guard

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod heap;
pub mod object;
pub mod roots;

pub use heap::{AllocationRegistry, GcConfig, GcRef, GcStats, GcTraceable};
pub use object::{GcHeader, MarkColor};
pub use roots::{Root, RootGuard, RootSet};
