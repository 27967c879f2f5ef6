//! Executable code cells

use railgun_gc::object::tags;
use railgun_gc::{GcHeader, GcRef, GcTraceable};
use railgun_core::string::JsString;
use railgun_core::value::Value;

/// A compiled function body: the sizing facts the frame model needs plus
/// the constant pool.
pub struct Code {
    name: Option<GcRef<JsString>>,
    local_count: u32,
    stack_depth: u32,
    constants: Vec<Value>,
}

impl Code {
    /// Create a code cell.
    pub fn new(name: Option<GcRef<JsString>>, local_count: u32, stack_depth: u32) -> Self {
        Self {
            name,
            local_count,
            stack_depth,
            constants: Vec::new(),
        }
    }

    /// Create a code cell with a constant pool.
    pub fn with_constants(
        name: Option<GcRef<JsString>>,
        local_count: u32,
        stack_depth: u32,
        constants: Vec<Value>,
    ) -> Self {
        Self {
            name,
            local_count,
            stack_depth,
            constants,
        }
    }

    /// The function name, if any
    pub fn name(&self) -> Option<GcRef<JsString>> {
        self.name
    }

    /// Number of declared locals
    pub fn local_count(&self) -> u32 {
        self.local_count
    }

    /// Maximum operand-stack depth
    pub fn stack_depth(&self) -> u32 {
        self.stack_depth
    }

    /// The constant pool
    pub fn constants(&self) -> &[Value] {
        &self.constants
    }
}

impl GcTraceable for Code {
    const NEEDS_TRACE: bool = true;
    const TYPE_ID: u8 = tags::CODE;

    fn trace(&self, tracer: &mut dyn FnMut(*const GcHeader)) {
        if let Some(name) = self.name {
            tracer(name.header() as *const _);
        }
        for constant in &self.constants {
            constant.trace(tracer);
        }
    }
}

impl std::fmt::Debug for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Code")
            .field("local_count", &self.local_count)
            .field("stack_depth", &self.stack_depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizing_facts() {
        let code = Code::new(None, 3, 8);
        assert_eq!(code.local_count(), 3);
        assert_eq!(code.stack_depth(), 8);
        assert!(code.constants().is_empty());
    }
}
