//! Stack ↔ collector integration: the registered stack keeps everything
//! reachable from live frames alive, and nothing else.

use railgun_core::string::JsString;
use railgun_core::value::Value;
use railgun_gc::{AllocationRegistry, RootSet};
use railgun_vm::{Code, Environment, Stack};

#[test]
fn test_collect_retains_frame_reachable_cells() {
    let registry = AllocationRegistry::new();
    let roots = RootSet::new();
    let stack = Stack::new();
    let _registration = roots.register(&stack);

    let global_env = registry.alloc(Environment::new());
    let global_code = registry.alloc(Code::new(None, 0, 8));
    stack
        .new_global_frame(global_code, global_env)
        .expect("global frame fits");

    let callee_code = registry.alloc(Code::new(None, 1, 4));
    let frame = stack
        .new_code_frame(
            stack.sp(),
            callee_code,
            global_env,
            Value::undefined(),
            Value::undefined(),
            0,
            0,
            false,
        )
        .expect("code frame fits");

    let live = registry.alloc(JsString::new("live"));
    stack.set_local(frame, 0, Value::string(live));
    let _garbage = registry.alloc(JsString::new("garbage"));
    assert_eq!(registry.allocation_count(), 5);

    registry.collect(&roots);
    // The unreferenced string is swept; everything reachable from the
    // frame chain survives.
    assert_eq!(registry.allocation_count(), 4);
    assert_eq!(live.to_string_lossy(), "live");

    // Popping the frame drops its code and local from the root set.
    stack.unwind(frame);
    registry.collect(&roots);
    assert_eq!(registry.allocation_count(), 2);
}

#[test]
fn test_environment_bindings_survive_through_frames() {
    let registry = AllocationRegistry::new();
    let roots = RootSet::new();
    let stack = Stack::new();
    let _registration = roots.register(&stack);

    let global_env = registry.alloc(Environment::new());
    let bound = registry.alloc(JsString::new("bound"));
    global_env.define("name", Value::string(bound));

    let code = registry.alloc(Code::new(None, 0, 4));
    stack
        .new_global_frame(code, global_env)
        .expect("global frame fits");

    registry.collect(&roots);
    assert_eq!(registry.allocation_count(), 3);
    assert_eq!(
        global_env.get("name").unwrap(),
        Value::string(bound)
    );
}

#[test]
fn test_unregistered_stack_is_not_a_root() {
    let registry = AllocationRegistry::new();
    let roots = RootSet::new();
    let stack = Stack::new();

    let env = registry.alloc(Environment::new());
    let code = registry.alloc(Code::new(None, 0, 4));
    stack.new_global_frame(code, env).expect("fits");

    // Registration scoped to a block: after the guard drops, the stack no
    // longer keeps its frames' cells alive.
    {
        let _registration = roots.register(&stack);
        registry.collect(&roots);
        assert_eq!(registry.allocation_count(), 2);
    }
    registry.collect(&roots);
    assert_eq!(registry.allocation_count(), 0);
}
