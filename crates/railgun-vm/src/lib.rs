//! Railgun VM execution machinery.
//!
//! The interpreter's activation records live against a single value-typed
//! [`stack::Stack`]: each call reserves a frame-sized span of the stack,
//! argument slots stay in the caller's operand region (zero-copy argument
//! passing), and the GC scans the whole frame chain through the stack's
//! [`railgun_gc::Root`] registration.

#![warn(clippy::all)]

pub mod code;
pub mod env;
pub mod frame;
pub mod stack;

pub use code::Code;
pub use env::Environment;
pub use frame::{Frame, FrameRef};
pub use stack::Stack;
