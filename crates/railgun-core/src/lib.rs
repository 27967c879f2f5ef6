//! Core runtime for the railgun VM.
//!
//! This crate owns the data model the interpreter executes over: NaN-boxed
//! [`value::Value`]s, UTF-16 [`string::JsString`]s, the generic
//! [`object::JsObject`] property machinery, the dense/sparse
//! [`array::JsArray`] hybrid, the [`regexp::JsRegExp`] match primitive, and
//! the string `replace`/`split` engines under [`runtime`].

#![warn(clippy::all)]

pub mod array;
pub mod character;
pub mod conversions;
pub mod error;
pub mod object;
pub mod object_cell;
pub mod regexp;
pub mod runtime;
pub mod string;
pub mod value;

pub use array::JsArray;
pub use error::{VmError, VmResult};
pub use object::{EnumerationMode, JsObject, PropertyDescriptor, PropertyKey};
pub use regexp::{JsRegExp, MatchData};
pub use string::{JsString, StringBuilder};
pub use value::Value;
