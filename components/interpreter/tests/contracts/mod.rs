//! Contract tests for the interpreter's call protocol and tier equivalence

use bytecode_system::{BytecodeChunk, FunctionDescriptor, Opcode};
use core_types::{CompareOp, FaultCode, Value};
use fault_handling::{FaultConfig, FaultHandler};
use interpreter::{EngineConfig, VM};
use jit_compiler::{BackendMode, BackendTarget, JitCompiler, JitConfig, SimulatedGpu};
use proptest::prelude::*;
use std::sync::Arc;
use telemetry::MetricRegistry;

fn vm(hot_threshold: u64) -> VM {
    let telemetry = Arc::new(MetricRegistry::default());
    let jit = JitConfig {
        hot_threshold,
        ..JitConfig::default()
    };
    VM::new(
        EngineConfig::default(),
        Arc::new(FaultHandler::new(FaultConfig::default())),
        telemetry.clone(),
        Arc::new(JitCompiler::new(jit, telemetry)),
    )
}

fn gpu_vm(device: Arc<SimulatedGpu>) -> VM {
    let telemetry = Arc::new(MetricRegistry::default());
    let jit = JitConfig {
        hot_threshold: 1,
        backend: BackendMode::Gpu,
        ..JitConfig::default()
    };
    VM::new(
        EngineConfig::default(),
        Arc::new(FaultHandler::new(FaultConfig::default())),
        telemetry.clone(),
        Arc::new(JitCompiler::with_gpu(jit, telemetry, device)),
    )
}

/// Runs `name(args)` once interpreted and once compiled
fn both_tiers(vm: &mut VM, name: &str, args: Vec<Value>) -> (Value, Value) {
    let interpreted = vm.call_function(name, args.clone()).unwrap();
    let compiled = vm.call_function(name, args).unwrap();
    (interpreted, compiled)
}

/// `ident(x)`: loads `x` and falls off the end without returning
fn ident() -> FunctionDescriptor {
    let mut body = BytecodeChunk::new("ident");
    body.emit(Opcode::LoadName("x".into()));
    FunctionDescriptor::new("ident", ["x"], body)
}

/// `bump() { x = x + 1; return x }` where the first `x` is read before any store
fn bump() -> FunctionDescriptor {
    let mut body = BytecodeChunk::new("bump");
    let one = body.add_constant(Value::Int(1));
    body.emit(Opcode::LoadName("x".into()));
    body.emit(Opcode::LoadConst(one));
    body.emit(Opcode::BinaryAdd);
    body.emit(Opcode::StoreName("x".into()));
    body.emit(Opcode::LoadName("x".into()));
    body.emit(Opcode::ReturnValue);
    FunctionDescriptor::new("bump", Vec::<String>::new(), body)
}

/// `sum_below(n) = 0 + 1 + .. + (n - 1)` as a counting loop
fn sum_below() -> FunctionDescriptor {
    let mut c = BytecodeChunk::new("sum_below");
    let zero = c.add_constant(Value::Int(0));
    let one = c.add_constant(Value::Int(1));
    c.emit(Opcode::LoadConst(zero));
    c.emit(Opcode::StoreName("acc".into()));
    c.emit(Opcode::LoadConst(zero));
    c.emit(Opcode::StoreName("i".into()));
    let head = c.emit(Opcode::LoadName("i".into()));
    c.emit(Opcode::LoadName("n".into()));
    c.emit(Opcode::CompareOp(CompareOp::Lt));
    let exit = c.emit(Opcode::PopJumpIfFalse(0));
    c.emit(Opcode::LoadName("acc".into()));
    c.emit(Opcode::LoadName("i".into()));
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
    FunctionDescriptor::new("sum_below", ["n"], c)
}

/// `scale(a, b, k) = [k, k] + [a, b] * k`
fn scale() -> FunctionDescriptor {
    let mut body = BytecodeChunk::new("scale");
    body.emit(Opcode::LoadName("k".into()));
    body.emit(Opcode::LoadName("k".into()));
    body.emit(Opcode::BuildList(2));
    body.emit(Opcode::LoadName("a".into()));
    body.emit(Opcode::LoadName("b".into()));
    body.emit(Opcode::BuildList(2));
    body.emit(Opcode::LoadName("k".into()));
    body.emit(Opcode::BinaryMul);
    body.emit(Opcode::BinaryAdd);
    body.emit(Opcode::ReturnValue);
    FunctionDescriptor::new("scale", ["a", "b", "k"], body)
}

/// `collect(p0, .., pn) = [p0, .., pn]`
fn collect(arity: usize) -> FunctionDescriptor {
    let params: Vec<String> = (0..arity).map(|i| format!("p{i}")).collect();
    let mut body = BytecodeChunk::new("collect");
    for p in &params {
        body.emit(Opcode::LoadName(p.clone()));
    }
    body.emit(Opcode::BuildList(arity));
    body.emit(Opcode::ReturnValue);
    FunctionDescriptor::new("collect", params, body)
}

/// `mix(a, b) = (a + b) * (a - b) % 7 + a / b`
fn mix() -> FunctionDescriptor {
    let mut body = BytecodeChunk::new("mix");
    let seven = body.add_constant(Value::Int(7));
    body.emit(Opcode::LoadName("a".into()));
    body.emit(Opcode::LoadName("b".into()));
    body.emit(Opcode::BinaryAdd);
    body.emit(Opcode::LoadName("a".into()));
    body.emit(Opcode::LoadName("b".into()));
    body.emit(Opcode::BinarySub);
    body.emit(Opcode::BinaryMul);
    body.emit(Opcode::LoadConst(seven));
    body.emit(Opcode::BinaryMod);
    body.emit(Opcode::LoadName("a".into()));
    body.emit(Opcode::LoadName("b".into()));
    body.emit(Opcode::BinaryDiv);
    body.emit(Opcode::BinaryAdd);
    body.emit(Opcode::ReturnValue);
    FunctionDescriptor::new("mix", ["a", "b"], body)
}

proptest! {
    /// A call consumes exactly its arity and pushes exactly one result,
    /// binding arguments in push order.
    #[test]
    fn prop_call_consumes_arity_in_order(
        below in prop::collection::vec(any::<i64>(), 0..4),
        args in prop::collection::vec(any::<i64>(), 0..6),
    ) {
        let mut vm = vm(100);
        vm.register_function(collect(args.len()));

        let mut chunk = BytecodeChunk::new("main");
        for v in below.iter().chain(args.iter()) {
            chunk.emit_constant(Value::Int(*v));
        }
        chunk.emit(Opcode::CallFunction("collect".into(), args.len()));
        chunk.emit(Opcode::BuildList(below.len() + 1));

        let mut expected: Vec<Value> = below.iter().copied().map(Value::Int).collect();
        expected.push(Value::List(args.iter().copied().map(Value::Int).collect()));
        prop_assert_eq!(vm.execute(&chunk).unwrap(), Value::List(expected));
        prop_assert!(vm.stack().is_empty());
    }

    /// A call with too few operands fails without touching the stack
    #[test]
    fn prop_underflow_leaves_stack_untouched(
        arity in 1usize..6,
        depth_seed in any::<usize>(),
    ) {
        let depth = depth_seed % arity;
        let mut vm = vm(100);
        vm.register_function(collect(arity));

        let mut chunk = BytecodeChunk::new("main");
        for i in 0..depth {
            chunk.emit_constant(Value::Int(i as i64));
        }
        chunk.emit(Opcode::CallFunction("collect".into(), arity));

        let err = vm.execute(&chunk).unwrap_err();
        prop_assert_eq!(err.code(), FaultCode::STACK_UNDERFLOW);
        let pushed: Vec<Value> = (0..depth as i64).map(Value::Int).collect();
        prop_assert_eq!(vm.stack().as_slice(), pushed.as_slice());
        prop_assert_eq!(vm.chain().depth(), 0);
    }

    /// Interpreted and compiled executions of a region agree, faults included
    #[test]
    fn prop_tiers_agree(a in -1000i64..1000, b in -50i64..50) {
        let mut vm = vm(1);
        vm.register_function(mix());

        let interpreted = vm.call_function("mix", vec![Value::Int(a), Value::Int(b)]);
        let compiled = vm.call_function("mix", vec![Value::Int(a), Value::Int(b)]);
        prop_assert_eq!(vm.stats().compiled_calls, 1);
        match (interpreted, compiled) {
            (Ok(x), Ok(y)) => prop_assert_eq!(x, y),
            (Err(x), Err(y)) => prop_assert_eq!(x.code(), y.code()),
            (x, y) => prop_assert!(false, "tiers diverged: {:?} vs {:?}", x.is_ok(), y.is_ok()),
        }
    }
}

proptest! {
    /// Falling off the end yields the top of stack in both tiers
    #[test]
    fn prop_tiers_agree_on_fall_through(x in any::<i64>()) {
        let mut vm = vm(1);
        vm.register_function(ident());
        let (interpreted, compiled) = both_tiers(&mut vm, "ident", vec![Value::Int(x)]);
        prop_assert_eq!(&interpreted, &Value::Int(x));
        prop_assert_eq!(interpreted, compiled);
        prop_assert_eq!(vm.stats().compiled_calls, 1);
    }

    /// An unrolled loop computes what the interpreted loop computes
    #[test]
    fn prop_tiers_agree_on_unrolled_loop(n in -3i64..40) {
        let mut vm = vm(1);
        vm.register_function(sum_below());
        let (interpreted, compiled) = both_tiers(&mut vm, "sum_below", vec![Value::Int(n)]);
        let expected = (0..n.max(0)).sum::<i64>();
        prop_assert_eq!(&interpreted, &Value::Int(expected));
        prop_assert_eq!(interpreted, compiled);
        prop_assert_eq!(vm.stats().compiled_calls, 1);
        let stats = vm.jit().stats();
        prop_assert!(stats.pass_rewrites.get("loop_unrolling").copied().unwrap_or(0) >= 1);
    }

    /// List bodies outlined to the GPU agree with the interpreter
    #[test]
    fn prop_tiers_agree_on_gpu_kernels(a in -100i64..100, b in -100i64..100, k in -10i64..10) {
        let device = Arc::new(SimulatedGpu::new("sim0"));
        let mut vm = gpu_vm(device.clone());
        let region = vm.register_function(scale());
        let args = vec![Value::Int(a), Value::Int(b), Value::Int(k)];
        let (interpreted, compiled) = both_tiers(&mut vm, "scale", args);
        prop_assert_eq!(
            &interpreted,
            &Value::List(vec![Value::Int(k + a * k), Value::Int(k + b * k)])
        );
        prop_assert_eq!(interpreted, compiled);
        prop_assert_eq!(vm.stats().compiled_calls, 1);
        let handle = vm.jit().compiled(region).unwrap();
        prop_assert_eq!(handle.target(), BackendTarget::Gpu);
        prop_assert_eq!(device.launches(), 1);
    }
}

#[test]
fn test_local_shadowing_global_stays_interpreted() {
    let mut vm = vm(1);
    vm.set_global("x", Value::Int(5));
    vm.register_function(bump());

    let (interpreted, second) = both_tiers(&mut vm, "bump", vec![]);
    assert_eq!(interpreted, Value::Int(6));
    assert_eq!(second, Value::Int(6));
    assert_eq!(vm.get_global("x"), Some(Value::Int(5)));
    assert_eq!(vm.stats().compiled_calls, 0);
    assert_eq!(vm.jit().stats().failures, 1);
    assert_eq!(vm.jit().stats().compilations, 0);
}

#[test]
fn test_depth_limit_is_exact() {
    let telemetry = Arc::new(MetricRegistry::default());
    let mut vm = VM::new(
        EngineConfig {
            max_call_depth: 3,
            ..EngineConfig::default()
        },
        Arc::new(FaultHandler::new(FaultConfig::default())),
        telemetry.clone(),
        Arc::new(JitCompiler::new(JitConfig::default(), telemetry)),
    );
    let wrap = |name: &str, callee: Option<&str>| {
        let mut body = BytecodeChunk::new(name);
        match callee {
            Some(callee) => {
                body.emit(Opcode::CallFunction(callee.into(), 0));
            }
            None => {
                body.emit_constant(Value::Int(1));
            }
        }
        body.emit(Opcode::ReturnValue);
        FunctionDescriptor::new(name, Vec::<String>::new(), body)
    };
    vm.register_function(wrap("c", None));
    vm.register_function(wrap("b", Some("c")));
    vm.register_function(wrap("a", Some("b")));
    vm.register_function(wrap("top", Some("a")));

    assert_eq!(vm.call_function("a", vec![]).unwrap(), Value::Int(1));
    assert_eq!(
        vm.call_function("top", vec![]).unwrap_err().code(),
        FaultCode::STACK_OVERFLOW
    );
}
