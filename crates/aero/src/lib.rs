//! Regular expression front end for the railgun VM.
//!
//! This crate owns the *analyzable* half of the regex pipeline: the pattern
//! AST, flag parsing, and the quick-check first-character filter computed
//! over the AST. Actual matching is performed by an opaque backend; the VM
//! parses a pattern here solely to decide whether match positions can be
//! pre-filtered by their first code unit.

pub mod ast;
pub mod flags;
pub mod parser;
pub mod quick_check;
pub mod range_builder;

pub use ast::{Alternative, Assertion, Atom, CharacterRange, Disjunction, Pattern, Term};
pub use flags::RegExpFlags;
pub use parser::{PatternError, parse};
pub use quick_check::{FirstCharFilter, QuickCheck};
pub use range_builder::RangeBuilder;
