//! VM tests: compiled programs executed on the stack machine

use ministack::native;
use ministack::programs::{self, compile_source};
use ministack::vm::bytecode::{MemoryType, Module};
use ministack::vm::compiler::{CompileOptions, IMPORT_MODULE};
use ministack::vm::host::Host;
use ministack::vm::machine::VM;
use ministack::vm::memory::{Memory, MAX_PAGES, PAGE_SIZE};
use ministack::vm::opcodes::{ValType, Value};

// ── Helpers ──────────────────────────────────────────────────────

fn instantiate(example: programs::ExampleProgram) -> VM {
    VM::new(example.compile(CompileOptions::default()).unwrap()).unwrap()
}

/// Compile with every function and global exported
fn vm_for(source: &str) -> VM {
    let options = CompileOptions {
        export_all: true,
        ..CompileOptions::default()
    };
    VM::new(compile_source(source, "test.c", options).unwrap()).unwrap()
}

fn instantiate_err(module: Module, host: &Host) -> String {
    match VM::with_host(module, host) {
        Ok(_) => panic!("instantiation succeeded"),
        Err(e) => e.message,
    }
}

fn call_f64(vm: &mut VM, name: &str, x: f64) -> f64 {
    vm.invoke(name, &[Value::F64(x)]).unwrap().unwrap().as_f64().unwrap()
}

fn call_i32(vm: &mut VM, name: &str, args: &[Value]) -> i32 {
    vm.invoke(name, args).unwrap().unwrap().as_i32().unwrap()
}

fn trap_message(vm: &mut VM, name: &str, args: &[Value]) -> String {
    vm.invoke(name, args).unwrap_err().message
}

fn bump_pointer(vm: &VM) -> i32 {
    vm.global("bump_pointer").unwrap().as_i32().unwrap()
}

const HEAP_BASE: i32 = 66560;

// ── Conditional ──────────────────────────────────────────────────

#[test]
fn conditional_boundary() {
    let mut vm = instantiate(programs::CONDITIONAL);
    assert_eq!(call_f64(&mut vm, "fn", 5.5), 16.5);
    assert_eq!(call_f64(&mut vm, "fn", 6.0), 12.0);
    assert_eq!(call_f64(&mut vm, "fn", -1.0), -3.0);
}

#[test]
fn conditional_nan_takes_else_branch() {
    let mut vm = instantiate(programs::CONDITIONAL);
    assert!(call_f64(&mut vm, "fn", f64::NAN).is_nan());
}

#[test]
fn conditional_matches_native() {
    let mut vm = instantiate(programs::CONDITIONAL);
    for i in -40..40 {
        let x = i as f64 * 0.37;
        assert_eq!(call_f64(&mut vm, "fn", x), native::conditional(x), "x = {}", x);
    }
}

// ── Accumulator ──────────────────────────────────────────────────

#[test]
fn accumulator_values() {
    let mut vm = instantiate(programs::ACCUMULATOR);
    assert_eq!(call_f64(&mut vm, "fn", 5.0), 25.0);
    assert_eq!(call_f64(&mut vm, "fn", 5.5), 33.0);
    assert_eq!(call_f64(&mut vm, "fn", 0.0), 0.0);
    assert_eq!(call_f64(&mut vm, "fn", -2.0), 0.0);
    assert_eq!(call_f64(&mut vm, "fn", f64::NAN), 0.0);
}

#[test]
fn accumulator_matches_native() {
    let mut vm = instantiate(programs::ACCUMULATOR);
    for i in -5..60 {
        let x = i as f64 * 0.25;
        assert_eq!(call_f64(&mut vm, "fn", x), native::accumulate(x), "x = {}", x);
    }
}

// ── Allocator and sampler ────────────────────────────────────────

#[test]
fn pmalloc_hands_out_consecutive_slots() {
    let mut vm = instantiate(programs::SAMPLER);
    assert_eq!(bump_pointer(&vm), HEAP_BASE);
    for k in 0..4 {
        assert_eq!(call_i32(&mut vm, "pmalloc", &[Value::I32(8)]), HEAP_BASE + 8 * k);
    }
    assert_eq!(bump_pointer(&vm), HEAP_BASE + 32);
}

#[test]
fn pfree_rewinds() {
    let mut vm = instantiate(programs::SAMPLER);
    let a = call_i32(&mut vm, "pmalloc", &[Value::I32(8)]);
    vm.invoke("pfree", &[Value::I32(8)]).unwrap();
    let b = call_i32(&mut vm, "pmalloc", &[Value::I32(8)]);
    assert_eq!(a, b);
}

#[test]
fn pfree_below_base_is_unchecked() {
    let mut vm = instantiate(programs::SAMPLER);
    assert_eq!(vm.invoke("pfree", &[Value::I32(70000)]).unwrap(), None);
    assert_eq!(bump_pointer(&vm), HEAP_BASE - 70000);
}

#[test]
fn fn2_doubles() {
    let mut vm = instantiate(programs::SAMPLER);
    assert_eq!(call_f64(&mut vm, "fn2", 2.5), 5.0);
}

#[test]
fn fn1_is_not_exported() {
    let mut vm = instantiate(programs::SAMPLER);
    assert!(trap_message(&mut vm, "fn1", &[Value::F64(1.0)]).contains("not exported"));
}

#[test]
fn redraw_fills_heap_slots() {
    let mut vm = instantiate(programs::SAMPLER);
    let result = vm.invoke("redraw", &[Value::F64(640.0), Value::F64(480.0)]).unwrap();
    assert_eq!(result, None);
    assert_eq!(bump_pointer(&vm), HEAP_BASE + 800);

    let values = vm.memory().read_f64s(HEAP_BASE as u64, 100).unwrap();
    for (j, y) in values.iter().enumerate() {
        let x = 3.0 + 0.01 * j as f64;
        assert_eq!(*y, x * x, "slot {}", j);
    }
    assert_eq!(values[0], 9.0);
    assert!(values.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn redraw_twice_appends() {
    let mut vm = instantiate(programs::SAMPLER);
    let args = [Value::F64(0.0), Value::F64(0.0)];
    vm.invoke("redraw", &args).unwrap();
    vm.invoke("redraw", &args).unwrap();
    assert_eq!(bump_pointer(&vm), HEAP_BASE + 1600);
    let first = vm.memory().read_f64s(HEAP_BASE as u64, 100).unwrap();
    let second = vm.memory().read_f64s(HEAP_BASE as u64 + 800, 100).unwrap();
    assert_eq!(first, second);
}

#[test]
fn redraw_matches_native_sampler() {
    let mut vm = instantiate(programs::SAMPLER);
    vm.invoke("redraw", &[Value::F64(0.0), Value::F64(0.0)]).unwrap();

    let mut arena = native::BumpArena::new(HEAP_BASE as usize);
    let mut memory = Memory::new(2).unwrap();
    native::redraw(0.0, 0.0, &mut arena, &mut memory).unwrap();

    assert_eq!(arena.offset(), bump_pointer(&vm) as usize);
    assert_eq!(memory.bytes(), vm.memory().bytes());
}

#[test]
fn redraw_past_end_of_memory_traps() {
    let options = CompileOptions {
        heap_base: (2 * PAGE_SIZE - 400) as u32,
        ..CompileOptions::default()
    };
    let mut vm = VM::new(programs::SAMPLER.compile(options).unwrap()).unwrap();
    let msg = trap_message(&mut vm, "redraw", &[Value::F64(0.0), Value::F64(0.0)]);
    assert!(msg.contains("out of bounds"), "{}", msg);
}

// ── Instance surface ─────────────────────────────────────────────

#[test]
fn exported_functions_lists_signatures() {
    let vm = instantiate(programs::SAMPLER);
    let names: Vec<String> = vm.exported_functions().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["pmalloc", "pfree", "fn2", "redraw"]);
    let (_, redraw) = &vm.exported_functions()[3];
    assert_eq!(redraw.params, vec![ValType::F64, ValType::F64]);
    assert!(redraw.results.is_empty());
}

#[test]
fn memory_is_two_pages() {
    let vm = instantiate(programs::SAMPLER);
    assert_eq!(vm.memory().pages(), 2);
    assert_eq!(vm.memory().size(), 2 * PAGE_SIZE);
}

#[test]
fn oversized_memory_is_a_trap() {
    let mut module = programs::CONDITIONAL.compile(CompileOptions::default()).unwrap();
    module.memory = Some(MemoryType {
        min_pages: MAX_PAGES + 1,
        max_pages: None,
    });
    let msg = instantiate_err(module, &Host::math());
    assert!(msg.contains("exceeds the limit"), "{}", msg);
    assert!(Memory::new(MAX_PAGES + 1).is_err());
}

#[test]
fn unexported_global_is_hidden() {
    let vm = VM::new(compile_source("int hidden = 3;", "t.c", CompileOptions::default()).unwrap()).unwrap();
    assert_eq!(vm.global("hidden"), None);
}

#[test]
fn argument_checks() {
    let mut vm = instantiate(programs::CONDITIONAL);
    assert!(trap_message(&mut vm, "fn", &[]).contains("expects 1 argument(s), got 0"));
    assert!(trap_message(&mut vm, "fn", &[Value::I32(5)]).contains("expects f64"));
}

#[test]
fn decoded_module_behaves_the_same() {
    let module = programs::ACCUMULATOR.compile(CompileOptions::default()).unwrap();
    let decoded = Module::decode(&module.encode()).unwrap();
    let mut vm = VM::new(decoded).unwrap();
    assert_eq!(call_f64(&mut vm, "fn", 5.5), 33.0);
}

// ── Host imports ─────────────────────────────────────────────────

const HYPOT: &str = "extern double sqrt(double); \
    export double hyp(double a, double b) { return sqrt(a * a + b * b); }";

#[test]
fn imported_sqrt() {
    let mut vm = VM::new(compile_source(HYPOT, "hyp.c", CompileOptions::default()).unwrap()).unwrap();
    let result = vm.invoke("hyp", &[Value::F64(3.0), Value::F64(4.0)]).unwrap();
    assert_eq!(result, Some(Value::F64(5.0)));
}

#[test]
fn decoded_module_with_imports_runs() {
    let module = compile_source(HYPOT, "hyp.c", CompileOptions::default()).unwrap();
    let mut vm = VM::new(Module::decode(&module.encode()).unwrap()).unwrap();
    let result = vm.invoke("hyp", &[Value::F64(5.0), Value::F64(12.0)]).unwrap();
    assert_eq!(result, Some(Value::F64(13.0)));
}

#[test]
fn custom_host_function() {
    let source = "extern double twice(double x); export double f(double x) { return twice(x) + 1; }";
    let module = compile_source(source, "t.c", CompileOptions::default()).unwrap();
    let mut host = Host::new();
    host.define(IMPORT_MODULE, "twice", 1, |args| args[0] * 2.0);
    let mut vm = VM::with_host(module, &host).unwrap();
    assert_eq!(call_f64(&mut vm, "f", 2.0), 5.0);
}

#[test]
fn unresolved_import_fails_instantiation() {
    let source = "extern double twice(double x); export double f(double x) { return twice(x); }";
    let module = compile_source(source, "t.c", CompileOptions::default()).unwrap();
    let msg = instantiate_err(module, &Host::math());
    assert_eq!(msg, "unresolved import 'imports.twice'");
}

#[test]
fn import_arity_must_match_host() {
    let module = compile_source(HYPOT, "hyp.c", CompileOptions::default()).unwrap();
    let mut host = Host::new();
    host.define(IMPORT_MODULE, "sqrt", 2, |args| args[0] + args[1]);
    let msg = instantiate_err(module, &host);
    assert!(msg.contains("host function takes 2"), "{}", msg);
}

// ── Execution semantics ──────────────────────────────────────────

#[test]
fn recursion() {
    let mut vm = vm_for("int fact(int n) { if (n <= 1) { return 1; } return n * fact(n - 1); }");
    assert_eq!(call_i32(&mut vm, "fact", &[Value::I32(10)]), 3628800);
}

#[test]
fn runaway_recursion_traps() {
    let mut vm = vm_for("int f(int n) { return f(n + 1); }");
    assert!(trap_message(&mut vm, "f", &[Value::I32(0)]).contains("call stack exhausted"));
}

#[test]
fn i32_arithmetic_wraps() {
    let mut vm = vm_for("int inc(int a) { return a + 1; }");
    assert_eq!(call_i32(&mut vm, "inc", &[Value::I32(i32::MAX)]), i32::MIN);
}

#[test]
fn integer_division_traps() {
    let mut vm = vm_for("int div(int a, int b) { return a / b; }");
    assert_eq!(call_i32(&mut vm, "div", &[Value::I32(-7), Value::I32(2)]), -3);
    assert!(trap_message(&mut vm, "div", &[Value::I32(1), Value::I32(0)]).contains("divide by zero"));
    assert!(trap_message(&mut vm, "div", &[Value::I32(i32::MIN), Value::I32(-1)]).contains("overflow"));
}

#[test]
fn truncation_traps() {
    let mut vm = vm_for("int trunc(double x) { return x; }");
    assert_eq!(call_i32(&mut vm, "trunc", &[Value::F64(-2.9)]), -2);
    assert!(trap_message(&mut vm, "trunc", &[Value::F64(f64::NAN)]).contains("invalid conversion"));
    assert!(trap_message(&mut vm, "trunc", &[Value::F64(1e10)]).contains("integer overflow"));
}

#[test]
fn falling_off_non_void_function_traps() {
    let mut vm = vm_for("int f(int a) { if (a > 0) { return 1; } }");
    assert_eq!(call_i32(&mut vm, "f", &[Value::I32(1)]), 1);
    assert!(trap_message(&mut vm, "f", &[Value::I32(0)]).contains("unreachable"));
}

#[test]
fn while_loop_and_double_counter() {
    let mut vm = vm_for(
        "double halves(double x) { int n = 0; while (x > 1.0) { x /= 2.0; n++; } return n; }",
    );
    assert_eq!(call_f64(&mut vm, "halves", 64.0), 6.0);
    assert_eq!(call_f64(&mut vm, "halves", 0.5), 0.0);
}

#[test]
fn pointer_load_and_store() {
    let mut vm = vm_for(
        "void set(double *p, double v) { *p = v; } \
         double get(double *p) { return *p; }",
    );
    vm.invoke("set", &[Value::I32(64), Value::F64(1.25)]).unwrap();
    assert_eq!(vm.invoke("get", &[Value::I32(64)]).unwrap(), Some(Value::F64(1.25)));
    assert_eq!(vm.memory().load_f64(64).unwrap(), 1.25);
}

#[test]
fn store_to_negative_address_traps() {
    let mut vm = vm_for("void set(double *p) { *p = 1.0; }");
    assert!(trap_message(&mut vm, "set", &[Value::I32(-8)]).contains("out of bounds"));
}

#[test]
fn globals_persist_between_calls() {
    let mut vm = vm_for("int count = 0; int tick() { count += 1; return count; }");
    call_i32(&mut vm, "tick", &[]);
    call_i32(&mut vm, "tick", &[]);
    assert_eq!(call_i32(&mut vm, "tick", &[]), 3);
    assert_eq!(vm.global("count"), Some(Value::I32(3)));
}

#[test]
fn trap_display() {
    let mut vm = vm_for("int f(int a) { if (a > 0) { return 1; } }");
    let err = vm.invoke("f", &[Value::I32(0)]).unwrap_err();
    assert_eq!(err.to_string(), "trap: unreachable executed");
}

// ── Demo cross-check ─────────────────────────────────────────────

#[test]
fn demo_report_agrees() {
    let report = ministack::demo::run(CompileOptions::default()).unwrap();
    assert!(report.all_agree());
    assert_eq!(report.conditional.len(), ministack::demo::CONDITIONAL_INPUTS.len());
    assert_eq!(report.sampler.vm_offset, HEAP_BASE as u32 + 800);
    assert_eq!(report.sampler.values.len(), 100);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["sampler"]["native_offset"], 67360);
    assert_eq!(json["accumulator"][4]["vm"], 33.0);
}
