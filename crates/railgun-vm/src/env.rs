//! Environment records

use railgun_gc::object::tags;
use railgun_gc::{GcHeader, GcRef, GcTraceable};
use railgun_core::error::{VmError, VmResult};
use railgun_core::object_cell::ObjectCell;
use railgun_core::value::Value;
use rustc_hash::FxHashMap;

/// A declarative environment record: named bindings plus the outer link.
pub struct Environment {
    bindings: ObjectCell<FxHashMap<String, Value>>,
    outer: Option<GcRef<Environment>>,
}

impl Environment {
    /// Create a top-level environment.
    pub fn new() -> Self {
        Self {
            bindings: ObjectCell::new(FxHashMap::default()),
            outer: None,
        }
    }

    /// Create an environment chained to `outer`.
    pub fn with_outer(outer: GcRef<Environment>) -> Self {
        Self {
            bindings: ObjectCell::new(FxHashMap::default()),
            outer: Some(outer),
        }
    }

    /// The outer environment, if any
    pub fn outer(&self) -> Option<GcRef<Environment>> {
        self.outer
    }

    /// Create or overwrite a binding in this record.
    pub fn define(&self, name: &str, value: Value) {
        self.bindings.borrow_mut().insert(name.to_string(), value);
    }

    /// Resolve `name` through the chain.
    pub fn get(&self, name: &str) -> VmResult<Value> {
        {
            let bindings = self.bindings.borrow();
            if let Some(value) = bindings.get(name) {
                return Ok(*value);
            }
        }
        match self.outer {
            Some(outer) => outer.get(name),
            None => Err(VmError::reference_error(format!("{name} is not defined"))),
        }
    }

    /// Assign to an existing binding through the chain.
    pub fn set(&self, name: &str, value: Value) -> VmResult<()> {
        {
            let mut bindings = self.bindings.borrow_mut();
            if let Some(slot) = bindings.get_mut(name) {
                *slot = value;
                return Ok(());
            }
        }
        match self.outer {
            Some(outer) => outer.set(name, value),
            None => Err(VmError::reference_error(format!("{name} is not defined"))),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl GcTraceable for Environment {
    const NEEDS_TRACE: bool = true;
    const TYPE_ID: u8 = tags::ENVIRONMENT;

    fn trace(&self, tracer: &mut dyn FnMut(*const GcHeader)) {
        for value in self.bindings.borrow().values() {
            value.trace(tracer);
        }
        if let Some(outer) = self.outer {
            tracer(outer.header() as *const _);
        }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("bindings", &self.bindings.borrow().len())
            .field("has_outer", &self.outer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_get() {
        let env = Environment::new();
        env.define("x", Value::int32(1));
        assert_eq!(env.get("x").unwrap(), Value::int32(1));
        assert!(env.get("y").is_err());
    }

    #[test]
    fn test_chain_resolution() {
        let global = GcRef::new(Environment::new());
        global.define("x", Value::int32(1));
        let inner = Environment::with_outer(global);
        assert_eq!(inner.get("x").unwrap(), Value::int32(1));

        inner.set("x", Value::int32(2)).unwrap();
        assert_eq!(global.get("x").unwrap(), Value::int32(2));
        assert!(inner.set("missing", Value::null()).is_err());
    }
}
