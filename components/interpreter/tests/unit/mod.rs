//! Unit tests for interpreter components

use bytecode_system::{BytecodeChunk, FunctionDescriptor, Opcode};
use core_types::{CompareOp, FaultCode, Value};
use fault_handling::{FaultConfig, FaultHandler};
use interpreter::{
    EngineConfig, ForeignValue, HostError, HostFunctions, Runtime, RuntimeConfig, VM,
};
use jit_compiler::{JitCompiler, JitConfig};
use std::sync::Arc;
use telemetry::{names, MetricRegistry};

fn vm_with(engine: EngineConfig, jit: JitConfig) -> VM {
    let telemetry = Arc::new(MetricRegistry::default());
    VM::new(
        engine,
        Arc::new(FaultHandler::new(FaultConfig::default())),
        telemetry.clone(),
        Arc::new(JitCompiler::new(jit, telemetry)),
    )
}

fn vm() -> VM {
    vm_with(EngineConfig::default(), JitConfig::default())
}

fn function(name: &str, params: &[&str], ops: Vec<Opcode>) -> FunctionDescriptor {
    let mut body = BytecodeChunk::new(name);
    for op in ops {
        body.emit(op);
    }
    FunctionDescriptor::new(name, params.iter().copied(), body)
}

fn function_with(
    name: &str,
    params: &[&str],
    constants: Vec<Value>,
    ops: Vec<Opcode>,
) -> FunctionDescriptor {
    let mut f = function(name, params, ops);
    for c in constants {
        f.chunk.add_constant(c);
    }
    f
}

fn square() -> FunctionDescriptor {
    function(
        "square",
        &["x"],
        vec![
            Opcode::LoadName("x".into()),
            Opcode::LoadName("x".into()),
            Opcode::BinaryMul,
            Opcode::ReturnValue,
        ],
    )
}

fn sub() -> FunctionDescriptor {
    function(
        "sub",
        &["a", "b"],
        vec![
            Opcode::LoadName("a".into()),
            Opcode::LoadName("b".into()),
            Opcode::BinarySub,
            Opcode::ReturnValue,
        ],
    )
}

/// `acc = 0; i = 0; while i < n { acc = acc + callee(i); i = i + 1 } return acc`
fn call_loop(callee: &str, n: i64) -> BytecodeChunk {
    let mut c = BytecodeChunk::new("main");
    let zero = c.add_constant(Value::Int(0));
    let one = c.add_constant(Value::Int(1));
    let limit = c.add_constant(Value::Int(n));
    c.emit(Opcode::LoadConst(zero));
    c.emit(Opcode::StoreName("acc".into()));
    c.emit(Opcode::LoadConst(zero));
    c.emit(Opcode::StoreName("i".into()));
    let head = c.emit(Opcode::LoadName("i".into()));
    c.emit(Opcode::LoadConst(limit));
    c.emit(Opcode::CompareOp(CompareOp::Lt));
    let exit = c.emit(Opcode::PopJumpIfFalse(0));
    c.emit(Opcode::LoadName("acc".into()));
    c.emit(Opcode::LoadName("i".into()));
    c.emit(Opcode::CallFunction(callee.into(), 1));
    c.emit(Opcode::BinaryAdd);
    c.emit(Opcode::StoreName("acc".into()));
    c.emit(Opcode::LoadName("i".into()));
    c.emit(Opcode::LoadConst(one));
    c.emit(Opcode::BinaryAdd);
    c.emit(Opcode::StoreName("i".into()));
    c.emit(Opcode::Jump(head));
    let end = c.emit(Opcode::LoadName("acc".into()));
    c.emit(Opcode::ReturnValue);
    c.patch_jump(exit, end);
    c
}

// ============================================================================
// Arithmetic and control flow
// ============================================================================

#[test]
fn test_add_then_multiply() {
    let mut vm = vm();
    let mut chunk = BytecodeChunk::new("main");
    chunk.emit_constant(Value::Int(2));
    chunk.emit_constant(Value::Int(3));
    chunk.emit(Opcode::BinaryAdd);
    chunk.emit_constant(Value::Int(4));
    chunk.emit(Opcode::BinaryMul);
    assert_eq!(vm.execute(&chunk).unwrap(), Value::Int(20));
    assert!(vm.stack().is_empty());
}

#[test]
fn test_division_results() {
    let mut vm = vm();
    let divide = |vm: &mut VM, a: i64, b: i64| {
        let mut chunk = BytecodeChunk::new("div");
        chunk.emit_constant(Value::Int(a));
        chunk.emit_constant(Value::Int(b));
        chunk.emit(Opcode::BinaryDiv);
        vm.execute(&chunk)
    };
    assert_eq!(divide(&mut vm, 6, 3).unwrap(), Value::Int(2));
    assert_eq!(divide(&mut vm, 7, 2).unwrap(), Value::Float(3.5));
    assert_eq!(
        divide(&mut vm, 1, 0).unwrap_err().code(),
        FaultCode::DIVISION_BY_ZERO
    );
}

#[test]
fn test_list_arithmetic() {
    let mut vm = vm();
    let mut chunk = BytecodeChunk::new("main");
    chunk.emit_constant(Value::Int(1));
    chunk.emit_constant(Value::Int(2));
    chunk.emit(Opcode::BuildList(2));
    chunk.emit_constant(Value::Int(3));
    chunk.emit(Opcode::BinaryMul);
    assert_eq!(
        vm.execute(&chunk).unwrap(),
        Value::List(vec![Value::Int(3), Value::Int(6)])
    );
}

#[test]
fn test_unary_and_stack_ops() {
    let mut vm = vm();
    let mut chunk = BytecodeChunk::new("main");
    chunk.emit_constant(Value::Int(5));
    chunk.emit(Opcode::UnaryNeg);
    chunk.emit(Opcode::Dup);
    chunk.emit(Opcode::BinaryAdd);
    chunk.emit_constant(Value::Bool(false));
    chunk.emit(Opcode::UnaryNot);
    chunk.emit(Opcode::PopTop);
    assert_eq!(vm.execute(&chunk).unwrap(), Value::Int(-10));
}

#[test]
fn test_conditional_jump() {
    let mut vm = vm();
    let mut chunk = BytecodeChunk::new("main");
    chunk.emit_constant(Value::Int(1));
    chunk.emit_constant(Value::Int(2));
    chunk.emit(Opcode::CompareOp(CompareOp::Gt));
    let branch = chunk.emit(Opcode::PopJumpIfFalse(0));
    chunk.emit_constant(Value::Str("taken".into()));
    chunk.emit(Opcode::ReturnValue);
    let target = chunk.emit_constant(Value::Str("skipped".into()));
    chunk.emit(Opcode::ReturnValue);
    chunk.patch_jump(branch, target);
    assert_eq!(vm.execute(&chunk).unwrap(), Value::Str("skipped".into()));
}

#[test]
fn test_jump_to_end_falls_off() {
    let mut vm = vm();
    let mut chunk = BytecodeChunk::new("main");
    chunk.emit(Opcode::Jump(2));
    chunk.emit_constant(Value::Int(1));
    assert_eq!(vm.execute(&chunk).unwrap(), Value::None);
}

#[test]
fn test_undefined_name() {
    let mut vm = vm();
    let mut chunk = BytecodeChunk::new("main");
    chunk.emit(Opcode::LoadName("ghost".into()));
    let err = vm.execute(&chunk).unwrap_err();
    assert_eq!(err.code(), FaultCode::UNDEFINED_NAME);
    assert!(err.message().contains("ghost"));
}

// ============================================================================
// Call protocol
// ============================================================================

#[test]
fn test_user_call_binds_in_declaration_order() {
    let mut vm = vm();
    let mut chunk = BytecodeChunk::new("main");
    chunk.define_function(sub());
    chunk.emit_constant(Value::Int(10));
    chunk.emit_constant(Value::Int(3));
    chunk.emit(Opcode::CallFunction("sub".into(), 2));
    assert_eq!(vm.execute(&chunk).unwrap(), Value::Int(7));
    assert_eq!(vm.stats().user_calls, 1);
    assert_eq!(vm.chain().depth(), 0);
}

#[test]
fn test_locals_do_not_leak_into_globals() {
    let mut vm = vm();
    let mut chunk = BytecodeChunk::new("main");
    chunk.define_function(function_with(
        "set_local",
        &[],
        vec![Value::Int(9)],
        vec![
            Opcode::LoadConst(0),
            Opcode::StoreName("t".into()),
            Opcode::LoadName("t".into()),
            Opcode::ReturnValue,
        ],
    ));
    chunk.emit(Opcode::CallFunction("set_local".into(), 0));
    assert_eq!(vm.execute(&chunk).unwrap(), Value::Int(9));
    assert_eq!(vm.get_global("t"), None);
}

#[test]
fn test_function_reads_globals() {
    let mut vm = vm();
    vm.set_global("scale", Value::Int(3));
    vm.register_function(function(
        "scaled",
        &["x"],
        vec![
            Opcode::LoadName("x".into()),
            Opcode::LoadName("scale".into()),
            Opcode::BinaryMul,
            Opcode::ReturnValue,
        ],
    ));
    assert_eq!(
        vm.call_function("scaled", vec![Value::Int(5)]).unwrap(),
        Value::Int(15)
    );
}

#[test]
fn test_native_builtins() {
    let mut vm = vm();
    let mut chunk = BytecodeChunk::new("main");
    chunk.emit_constant(Value::Int(4));
    chunk.emit_constant(Value::Int(-9));
    chunk.emit_constant(Value::Int(2));
    chunk.emit(Opcode::BuildList(3));
    chunk.emit(Opcode::Dup);
    chunk.emit(Opcode::CallFunction("min".into(), 1));
    chunk.emit(Opcode::CallFunction("abs".into(), 1));
    chunk.emit(Opcode::StoreName("m".into()));
    chunk.emit(Opcode::CallFunction("sum".into(), 1));
    assert_eq!(vm.execute(&chunk).unwrap(), Value::Int(-3));
    assert_eq!(vm.get_global("m"), Some(Value::Int(9)));
    assert_eq!(vm.stats().native_calls, 3);
}

#[test]
fn test_native_arity_mismatch() {
    let mut vm = vm();
    let mut chunk = BytecodeChunk::new("main");
    chunk.emit_constant(Value::Int(1));
    chunk.emit_constant(Value::Int(2));
    chunk.emit(Opcode::CallFunction("len".into(), 2));
    let err = vm.execute(&chunk).unwrap_err();
    assert_eq!(err.code(), FaultCode::ARITY_MISMATCH);
    assert_eq!(vm.stack().len(), 2);
}

#[test]
fn test_host_bridged_call() {
    let mut vm = vm();
    let host = Arc::new(HostFunctions::new());
    host.register("host_sum", |args| {
        let mut total = 0;
        for arg in args {
            match arg {
                ForeignValue::Int(i) => total += i,
                other => return Err(HostError(format!("not an int: {other:?}"))),
            }
        }
        Ok(ForeignValue::Int(total))
    });
    vm.set_host_bridge(host);

    let mut chunk = BytecodeChunk::new("main");
    chunk.emit_constant(Value::Int(20));
    chunk.emit_constant(Value::Int(22));
    chunk.emit(Opcode::CallFunction("host_sum".into(), 2));
    assert_eq!(vm.execute(&chunk).unwrap(), Value::Int(42));
    assert_eq!(vm.stats().host_calls, 1);

    let err = vm
        .call_function("host_sum", vec![Value::Str("x".into())])
        .unwrap_err();
    assert_eq!(err.code(), FaultCode::HOST_FUNCTION_FAILED);
}

#[test]
fn test_user_function_shadows_builtin() {
    let mut vm = vm();
    vm.register_function(function_with(
        "len",
        &["x"],
        vec![Value::Int(-1)],
        vec![Opcode::LoadConst(0), Opcode::ReturnValue],
    ));
    let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
    assert_eq!(vm.call_function("len", vec![list]).unwrap(), Value::Int(-1));
    assert_eq!(vm.stats().user_calls, 1);
    assert_eq!(vm.stats().native_calls, 0);
}

// ============================================================================
// Faults
// ============================================================================

#[test]
fn test_unresolved_callee_then_reuse() {
    let mut vm = vm();
    let mut bad = BytecodeChunk::new("bad");
    bad.emit_constant(Value::Int(5));
    bad.emit(Opcode::CallFunction("nope".into(), 1));
    let err = vm.execute(&bad).unwrap_err();
    assert_eq!(err.code(), FaultCode::SYMBOL_NOT_FOUND);
    assert_eq!(vm.stack().as_slice(), &[Value::Int(5)]);

    let mut good = BytecodeChunk::new("good");
    good.emit_constant(Value::Int(2));
    good.emit_constant(Value::Int(3));
    good.emit(Opcode::BinaryAdd);
    assert_eq!(vm.execute(&good).unwrap(), Value::Int(5));
    assert_eq!(vm.stack().as_slice(), &[Value::Int(5)]);
    vm.clear_stack();
    assert!(vm.stack().is_empty());
}

#[test]
fn test_underflow_leaves_stack_untouched() {
    let mut vm = vm();
    vm.register_function(sub());
    let mut chunk = BytecodeChunk::new("main");
    chunk.emit_constant(Value::Int(1));
    chunk.emit(Opcode::CallFunction("sub".into(), 2));
    let err = vm.execute(&chunk).unwrap_err();
    assert_eq!(err.code(), FaultCode::STACK_UNDERFLOW);
    assert_eq!(vm.stack().as_slice(), &[Value::Int(1)]);
}

#[test]
fn test_recursion_limit_and_trace() {
    let mut vm = vm_with(
        EngineConfig {
            max_call_depth: 8,
            ..EngineConfig::default()
        },
        JitConfig::default(),
    );
    vm.register_function(function(
        "f",
        &[],
        vec![Opcode::CallFunction("f".into(), 0), Opcode::ReturnValue],
    ));
    let err = vm.call_function("f", vec![]).unwrap_err();
    assert_eq!(err.code(), FaultCode::STACK_OVERFLOW);
    assert_eq!(err.record.trace.len(), 9);
    assert_eq!(err.record.trace[0], "<f>");
    assert!(err.record.trace[1..].iter().all(|name| name == "f"));
    assert_eq!(vm.chain().depth(), 0);
    assert_eq!(vm.stats().max_call_depth, 8);
}

#[test]
fn test_faults_reach_handler_and_telemetry() {
    let mut vm = vm();
    for _ in 0..3 {
        let _ = vm.call_function("missing", vec![]);
    }
    let metrics = vm.faults().get_error_metrics();
    assert_eq!(metrics.by_code[&FaultCode::SYMBOL_NOT_FOUND], 3);
    assert_eq!(vm.telemetry().total(names::FAULTS_TOTAL), 3.0);
}

// ============================================================================
// JIT integration
// ============================================================================

#[test]
fn test_hot_function_compiled_after_threshold() {
    let mut vm = vm();
    vm.register_function(square());
    let result = vm.execute(&call_loop("square", 150)).unwrap();
    assert_eq!(result, Value::Int(1_113_775));

    let stats = vm.stats();
    assert_eq!(stats.user_calls, 100);
    assert_eq!(stats.compiled_calls, 50);
    assert_eq!(vm.jit().stats().compilations, 1);
    assert_eq!(vm.telemetry().total(names::VM_COMPILED_CALLS), 50.0);
}

#[test]
fn test_compile_failure_reported_and_interpreted() {
    let mut vm = vm_with(
        EngineConfig::default(),
        JitConfig {
            hot_threshold: 1,
            ..JitConfig::default()
        },
    );
    vm.register_function(function_with(
        "inner",
        &[],
        vec![Value::Int(4)],
        vec![Opcode::LoadConst(0), Opcode::ReturnValue],
    ));
    // nested calls are not translatable
    vm.register_function(function(
        "outer",
        &[],
        vec![Opcode::CallFunction("inner".into(), 0), Opcode::ReturnValue],
    ));

    for _ in 0..3 {
        assert_eq!(vm.call_function("outer", vec![]).unwrap(), Value::Int(4));
    }
    let metrics = vm.faults().get_error_metrics();
    assert_eq!(metrics.by_code[&FaultCode::UNSUPPORTED_CONSTRUCT], 1);
    assert_eq!(vm.jit().stats().failures, 1);
}

// ============================================================================
// Telemetry and configuration
// ============================================================================

#[test]
fn test_instruction_and_timer_metrics() {
    let mut vm = vm();
    let mut chunk = BytecodeChunk::new("main");
    chunk.emit_constant(Value::Int(1));
    chunk.emit_constant(Value::Int(2));
    chunk.emit(Opcode::BinaryAdd);
    vm.execute(&chunk).unwrap();
    vm.execute(&chunk).unwrap();

    let telemetry = vm.telemetry();
    assert_eq!(telemetry.total(names::VM_INSTRUCTIONS), 6.0);
    assert_eq!(vm.stats().instructions, 6);
    assert_eq!(telemetry.summary(names::VM_EXECUTE_TIME).unwrap().count, 2);
    assert_eq!(telemetry.latest(names::VM_STACK_DEPTH).unwrap(), Some(2.0));

    let stats = serde_json::to_value(vm.stats()).unwrap();
    assert_eq!(stats["instructions"], 6);
    assert_eq!(stats["max_stack_depth"], 2);
}

#[test]
fn test_runtime_from_toml() {
    let config = RuntimeConfig::from_toml_str(
        r#"
        [jit]
        hot_threshold = 2
        "#,
    )
    .unwrap();
    let runtime = Runtime::new(config).unwrap();
    let region = runtime.register_function(square());
    let mut vm = runtime.vm();
    for x in 1..=3 {
        assert_eq!(
            vm.call_function("square", vec![Value::Int(x)]).unwrap(),
            Value::Int(x * x)
        );
    }
    assert!(runtime.jit().compiled(region).is_some());
    let report = runtime.performance_report();
    assert!(report.metrics.contains_key(names::JIT_COMPILATIONS));
    assert!(runtime.shutdown());
}
