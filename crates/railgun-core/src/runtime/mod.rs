//! Runtime method implementations backing the standard library.

pub mod string;
