//! The railgun value stack
//!
//! One contiguous, pre-reserved array of values holds every activation
//! record. Frames are pushed by the call sequence and popped by unwind;
//! the GC walks the whole chain through the stack's [`Root`] registration,
//! marking each frame's header fields and its live slot region.
//!
//! Slot 0 is a reserved sentinel and never a frame base. Allocation
//! failure leaves the current frame and every reserved slot untouched, so
//! the interpreter can surface a catchable
//! `RangeError: Maximum call stack size exceeded` and continue.

use railgun_gc::{GcHeader, GcRef, Root};
use railgun_core::object_cell::ObjectCell;
use railgun_core::value::Value;

use crate::code::Code;
use crate::env::Environment;
use crate::frame::{Frame, FrameRef};

struct StackState {
    values: Vec<Value>,
    sp: usize,
    frames: Vec<Frame>,
}

/// The VM value stack and frame arena.
///
/// Register the stack with the collector's root set for the duration of
/// its life:
///
/// ```
/// # use railgun_gc::RootSet;
/// # use railgun_vm::Stack;
/// let roots = RootSet::new();
/// let stack = Stack::new();
/// let _registration = roots.register(&stack);
/// ```
pub struct Stack {
    state: ObjectCell<StackState>,
}

impl Stack {
    /// Default capacity, in value slots.
    pub const DEFAULT_CAPACITY: usize = 16 * 1024;

    /// Create a stack with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a stack with an explicit slot capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > Frame::HEADER_SLOTS);
        Self {
            state: ObjectCell::new(StackState {
                values: vec![Value::undefined(); capacity],
                // Slot 0 is the reserved sentinel.
                sp: 1,
                frames: Vec::new(),
            }),
        }
    }

    /// Total slot capacity
    pub fn capacity(&self) -> usize {
        self.state.borrow().values.len()
    }

    /// The stack pointer: first unused slot
    pub fn sp(&self) -> usize {
        self.state.borrow().sp
    }

    /// Number of live frames
    pub fn depth(&self) -> usize {
        self.state.borrow().frames.len()
    }

    /// The current (innermost) frame
    pub fn current(&self) -> Option<FrameRef> {
        let state = self.state.borrow();
        if state.frames.is_empty() {
            None
        } else {
            Some(FrameRef(state.frames.len() - 1))
        }
    }

    /// Snapshot of the frame header
    pub fn frame(&self, frame: FrameRef) -> Frame {
        self.state.borrow().frames[frame.0].clone()
    }

    /// Push a frame for a function call.
    ///
    /// `sp` is the caller's operand stack pointer at the call site; the
    /// `argc` argument values directly below it become the callee's
    /// arguments in place. Returns `None` on overflow, leaving the current
    /// frame and all reserved slots untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn new_code_frame(
        &self,
        sp: usize,
        code: GcRef<Code>,
        env: GcRef<Environment>,
        callee: Value,
        this_binding: Value,
        pc: usize,
        argc: usize,
        constructor_call: bool,
    ) -> Option<FrameRef> {
        let localc = code.local_count() as usize;
        self.gain_frame(
            sp,
            Frame {
                code,
                prev_pc: pc,
                lexical_env: env,
                variable_env: env,
                prev: None,
                ret: Value::undefined(),
                callee,
                this_binding,
                argc,
                dynamic_env_level: 0,
                localc,
                constructor_call,
                base: 0,
            },
        )
    }

    /// Push a frame for eval code. Eval locals live in its environments,
    /// so no local slots are initialized.
    pub fn new_eval_frame(
        &self,
        sp: usize,
        code: GcRef<Code>,
        variable_env: GcRef<Environment>,
        lexical_env: GcRef<Environment>,
    ) -> Option<FrameRef> {
        self.gain_frame(
            sp,
            Frame {
                code,
                prev_pc: 0,
                lexical_env,
                variable_env,
                prev: None,
                ret: Value::undefined(),
                callee: Value::undefined(),
                this_binding: Value::undefined(),
                argc: 0,
                dynamic_env_level: 0,
                localc: 0,
                constructor_call: false,
                base: 0,
            },
        )
    }

    /// Push the outermost frame for global code.
    pub fn new_global_frame(
        &self,
        code: GcRef<Code>,
        global_env: GcRef<Environment>,
    ) -> Option<FrameRef> {
        debug_assert!(self.current().is_none());
        self.new_eval_frame(1, code, global_env, global_env)
    }

    fn gain_frame(&self, sp: usize, mut frame: Frame) -> Option<FrameRef> {
        let mut state = self.state.borrow_mut();
        debug_assert!(sp > 0);
        debug_assert!(sp <= state.sp);
        // Everything above `sp` was released by the caller.
        state.sp = sp;
        let size = Frame::frame_size(&frame.code);
        if state.sp + size > state.values.len() {
            // Overflow: no frame or slot is touched; the caller raises a
            // RangeError.
            return None;
        }
        frame.base = state.sp;
        frame.prev = state.frames.len().checked_sub(1);
        state.sp += size;
        let locals_start = frame.locals_start();
        for slot in &mut state.values[locals_start..locals_start + frame.localc] {
            *slot = Value::undefined();
        }
        state.frames.push(frame);
        Some(FrameRef(state.frames.len() - 1))
    }

    /// Pop `frame`, which must be the current frame, restoring the stack
    /// pointer to the caller's safe position. Returns the new current
    /// frame.
    pub fn unwind(&self, frame: FrameRef) -> Option<FrameRef> {
        let mut state = self.state.borrow_mut();
        assert_eq!(frame.0 + 1, state.frames.len(), "unwind out of order");
        let popped = state.frames.pop().expect("unwind on empty stack");
        match popped.prev {
            Some(prev_index) => {
                // The caller may have consumed argument slots in place, so
                // its nominal end and the popped base can be on either
                // side of each other; take the higher.
                let prev_end = state.frames[prev_index].frame_end();
                state.sp = prev_end.max(popped.base);
                Some(FrameRef(prev_index))
            }
            None => {
                state.sp = 1;
                None
            }
        }
    }

    /// Read a local slot.
    pub fn local(&self, frame: FrameRef, index: usize) -> Value {
        let state = self.state.borrow();
        let header = &state.frames[frame.0];
        debug_assert!(index < header.localc);
        state.values[header.locals_start() + index]
    }

    /// Write a local slot.
    pub fn set_local(&self, frame: FrameRef, index: usize, value: Value) {
        let mut state = self.state.borrow_mut();
        let slot = {
            let header = &state.frames[frame.0];
            debug_assert!(index < header.localc);
            header.locals_start() + index
        };
        state.values[slot] = value;
    }

    /// First operand slot of `frame`, for computing call-site stack
    /// pointers.
    pub fn operand_base(&self, frame: FrameRef) -> usize {
        self.state.borrow().frames[frame.0].operand_start()
    }

    /// Read an operand slot.
    pub fn operand(&self, frame: FrameRef, index: usize) -> Value {
        let state = self.state.borrow();
        let header = &state.frames[frame.0];
        state.values[header.operand_start() + index]
    }

    /// Write an operand slot.
    pub fn set_operand(&self, frame: FrameRef, index: usize, value: Value) {
        let mut state = self.state.borrow_mut();
        let slot = state.frames[frame.0].operand_start() + index;
        state.values[slot] = value;
    }

    /// Read an argument of `frame`: slot `base - argc + index`.
    pub fn arg(&self, frame: FrameRef, index: usize) -> Value {
        let state = self.state.borrow();
        let header = &state.frames[frame.0];
        debug_assert!(index < header.argc);
        state.values[header.base - header.argc + index]
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: the stack is confined to the single VM thread; the Root
// registration guard keeps it alive and in place while registered.
unsafe impl Send for Stack {}
unsafe impl Sync for Stack {}

impl Root for Stack {
    /// Walk the frame chain. Each frame's live region runs from its first
    /// local to the next frame's base (the stack pointer for the topmost
    /// frame), which covers its locals, its operands, and the arguments it
    /// has passed to the frame above.
    fn mark_children(&self, tracer: &mut dyn FnMut(*const GcHeader)) {
        let state = self.state.borrow();
        let count = state.frames.len();
        for (index, frame) in state.frames.iter().enumerate() {
            tracer(frame.code.header() as *const _);
            tracer(frame.lexical_env.header() as *const _);
            tracer(frame.variable_env.header() as *const _);
            frame.ret.trace(tracer);
            frame.callee.trace(tracer);
            frame.this_binding.trace(tracer);

            let start = frame.locals_start();
            let limit = if index + 1 == count {
                state.sp
            } else {
                state.frames[index + 1].base
            };
            if limit > start {
                for value in &state.values[start..limit] {
                    value.trace(tracer);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railgun_core::string::JsString;

    fn code(localc: u32, depth: u32) -> GcRef<Code> {
        GcRef::new(Code::new(None, localc, depth))
    }

    fn env() -> GcRef<Environment> {
        GcRef::new(Environment::new())
    }

    fn global_stack(stack: &Stack) -> FrameRef {
        stack
            .new_global_frame(code(0, 16), env())
            .expect("global frame fits")
    }

    #[test]
    fn test_global_frame_starts_above_sentinel() {
        let stack = Stack::new();
        assert_eq!(stack.sp(), 1);
        let global = global_stack(&stack);
        assert_eq!(stack.frame(global).base(), 1);
        assert_eq!(stack.current(), Some(global));
    }

    #[test]
    fn test_balanced_call_restores_sp_and_current() {
        let stack = Stack::new();
        let global = global_stack(&stack);
        let sp_before = stack.sp();

        let callee = stack
            .new_code_frame(
                sp_before,
                code(2, 4),
                env(),
                Value::undefined(),
                Value::undefined(),
                7,
                0,
                false,
            )
            .unwrap();
        assert_ne!(stack.sp(), sp_before);
        assert_eq!(stack.frame(callee).prev_pc(), 7);

        let back = stack.unwind(callee);
        assert_eq!(back, Some(global));
        assert_eq!(stack.sp(), sp_before);
        assert_eq!(stack.current(), Some(global));
    }

    #[test]
    fn test_locals_initialized_undefined() {
        let stack = Stack::new();
        global_stack(&stack);
        let frame = stack
            .new_code_frame(
                stack.sp(),
                code(3, 2),
                env(),
                Value::undefined(),
                Value::undefined(),
                0,
                0,
                false,
            )
            .unwrap();
        for index in 0..3 {
            assert!(stack.local(frame, index).is_undefined());
        }
        stack.set_local(frame, 1, Value::int32(5));
        assert_eq!(stack.local(frame, 1), Value::int32(5));
    }

    #[test]
    fn test_zero_copy_arguments() {
        let stack = Stack::new();
        let global = global_stack(&stack);

        // The caller pushes two arguments into its operand region and
        // calls with sp just above them.
        stack.set_operand(global, 0, Value::int32(10));
        stack.set_operand(global, 1, Value::int32(20));
        let call_sp = stack.operand_base(global) + 2;

        let frame = stack
            .new_code_frame(
                call_sp,
                code(0, 4),
                env(),
                Value::undefined(),
                Value::undefined(),
                0,
                2,
                false,
            )
            .unwrap();
        assert_eq!(stack.frame(frame).base(), call_sp);
        assert_eq!(stack.arg(frame, 0), Value::int32(10));
        assert_eq!(stack.arg(frame, 1), Value::int32(20));
    }

    #[test]
    fn test_frame_chain_terminates_at_global() {
        let stack = Stack::new();
        let global = global_stack(&stack);
        let mut frames = vec![global];
        for _ in 0..3 {
            let frame = stack
                .new_code_frame(
                    stack.sp(),
                    code(1, 2),
                    env(),
                    Value::undefined(),
                    Value::undefined(),
                    0,
                    0,
                    false,
                )
                .unwrap();
            frames.push(frame);
        }

        // prev links walk back to the global frame, whose prev is none.
        let mut cursor = stack.current();
        let mut hops = 0;
        while let Some(frame) = cursor {
            let header = stack.frame(frame);
            cursor = header.prev.map(FrameRef);
            hops += 1;
        }
        assert_eq!(hops, 4);

        // Bases strictly increase along the chain.
        for pair in frames.windows(2) {
            assert!(stack.frame(pair[0]).base() < stack.frame(pair[1]).base());
        }

        // Unwind everything; the sentinel slot is never exposed.
        for frame in frames.iter().rev() {
            stack.unwind(*frame);
        }
        assert_eq!(stack.sp(), 1);
        assert!(stack.current().is_none());
    }

    #[test]
    fn test_overflow_leaves_state_untouched() {
        let stack = Stack::with_capacity(64);
        let global = global_stack(&stack);
        let sp_before = stack.sp();

        // 64 slots cannot hold this frame.
        let result = stack.new_code_frame(
            sp_before,
            code(100, 100),
            env(),
            Value::undefined(),
            Value::undefined(),
            0,
            0,
            false,
        );
        assert!(result.is_none());
        assert_eq!(stack.current(), Some(global));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_unwind_never_drops_sp_below_sentinel() {
        let stack = Stack::new();
        let global = global_stack(&stack);
        assert!(stack.unwind(global).is_none());
        assert_eq!(stack.sp(), 1);
        // A fresh global frame can be pushed again.
        assert!(stack.new_global_frame(code(0, 4), env()).is_some());
    }

    #[test]
    fn test_mark_children_covers_frame_fields_and_live_region() {
        let stack = Stack::new();
        let global = global_stack(&stack);

        let name = JsString::alloc("f");
        let callee_code = GcRef::new(Code::new(Some(name), 1, 4));
        let local_value = JsString::alloc("local");
        let operand_value = JsString::alloc("operand");

        let frame = stack
            .new_code_frame(
                stack.sp(),
                callee_code,
                env(),
                Value::undefined(),
                Value::undefined(),
                0,
                0,
                false,
            )
            .unwrap();
        stack.set_local(frame, 0, Value::string(local_value));
        stack.set_operand(frame, 0, Value::string(operand_value));

        let mut seen = Vec::new();
        stack.mark_children(&mut |header| seen.push(header as usize));

        let local_header = local_value.header() as *const GcHeader as usize;
        let operand_header = operand_value.header() as *const GcHeader as usize;
        let code_header = callee_code.header() as *const GcHeader as usize;
        assert!(seen.contains(&local_header));
        assert!(!seen.is_empty());
        assert!(seen.contains(&code_header));

        // Operand slot 0 is below sp only if sp covers the operand
        // region; the frame reserved it, so it is live.
        assert!(seen.contains(&operand_header));

        // After unwinding the frame, its contents are no longer scanned.
        stack.unwind(frame);
        let mut after = Vec::new();
        stack.mark_children(&mut |header| after.push(header as usize));
        assert!(!after.contains(&local_header));
        let _ = global;
    }

    #[test]
    fn test_mark_children_reference_counts() {
        let stack = Stack::new();
        global_stack(&stack);
        let shared = JsString::alloc("shared");
        let frame = stack
            .new_code_frame(
                stack.sp(),
                code(2, 2),
                env(),
                Value::undefined(),
                Value::undefined(),
                0,
                0,
                false,
            )
            .unwrap();
        stack.set_local(frame, 0, Value::string(shared));
        stack.set_local(frame, 1, Value::string(shared));

        let target = shared.header() as *const GcHeader as usize;
        let mut hits = 0;
        stack.mark_children(&mut |header| {
            if header as usize == target {
                hits += 1;
            }
        });
        // Two distinct slots reference the cell: two reports.
        assert_eq!(hits, 2);
    }

    #[test]
    fn test_eval_frame_has_no_locals() {
        let stack = Stack::new();
        global_stack(&stack);
        let frame = stack
            .new_eval_frame(stack.sp(), code(4, 4), env(), env())
            .unwrap();
        let header = stack.frame(frame);
        assert_eq!(header.localc(), 0);
        assert_eq!(header.argc(), 0);
        assert!(header.callee().is_undefined());
    }
}
