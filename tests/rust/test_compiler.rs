//! Compiler tests: lowering of the bundled programs, typing rules, errors

use ministack::lexer::Lexer;
use ministack::parser::Parser;
use ministack::programs;
use ministack::vm::bytecode::{ExportKind, FuncType, Import, Module};
use ministack::vm::compiler::{CompileOptions, Compiler};
use ministack::vm::opcodes::{BlockType, Instruction, MemArg, ValType, Value};

use Instruction::*;

// ── Helpers ──────────────────────────────────────────────────────

fn compile_with(source: &str, options: CompileOptions) -> Module {
    let tokens = Lexer::new(source, "test.c").tokenize().unwrap();
    let program = Parser::new(tokens, "test.c").parse().unwrap();
    Compiler::new(options).compile(&program).unwrap()
}

fn compile(source: &str) -> Module {
    compile_with(source, CompileOptions::default())
}

fn compile_err(source: &str) -> String {
    let tokens = Lexer::new(source, "test.c").tokenize().unwrap();
    let program = Parser::new(tokens, "test.c").parse().unwrap();
    Compiler::new(CompileOptions::default())
        .compile(&program)
        .unwrap_err()
        .message
}

fn code_of(module: &Module, name: &str) -> Vec<Instruction> {
    module
        .functions
        .iter()
        .find(|f| f.name == name)
        .map(|f| f.code.clone())
        .unwrap_or_else(|| panic!("no function {}", name))
}

const EMPTY: BlockType = BlockType::Empty;

// ── Bundled programs ─────────────────────────────────────────────

#[test]
fn conditional_program_lowering() {
    let module = programs::CONDITIONAL.compile(CompileOptions::default()).unwrap();
    assert_eq!(
        code_of(&module, "fn"),
        vec![
            LocalGet(0),
            F64Const(5.5),
            F64Gt,
            If(EMPTY),
            F64Const(2.0),
            LocalGet(0),
            F64Mul,
            Return,
            Else,
            F64Const(3.0),
            LocalGet(0),
            F64Mul,
            Return,
            End,
            Unreachable,
        ]
    );
    assert_eq!(
        module.types,
        vec![FuncType { params: vec![ValType::F64], results: vec![ValType::F64] }]
    );
}

#[test]
fn accumulator_program_lowering() {
    let module = programs::ACCUMULATOR.compile(CompileOptions::default()).unwrap();
    let func = &module.functions[0];
    assert_eq!(func.locals, vec![ValType::F64, ValType::I32]);
    assert_eq!(
        func.code,
        vec![
            F64Const(0.0),
            LocalSet(1),
            I32Const(0),
            LocalSet(2),
            Loop(EMPTY),
            LocalGet(2),
            F64ConvertI32S,
            LocalGet(0),
            F64Lt,
            If(EMPTY),
            LocalGet(1),
            LocalGet(0),
            F64Add,
            LocalSet(1),
            LocalGet(2),
            I32Const(1),
            I32Add,
            LocalSet(2),
            Br(1),
            End,
            End,
            LocalGet(1),
            Return,
        ]
    );
}

#[test]
fn allocator_lowering() {
    let module = programs::SAMPLER.compile(CompileOptions::default()).unwrap();
    assert_eq!(
        code_of(&module, "pmalloc"),
        vec![
            GlobalGet(0),
            LocalSet(1),
            GlobalGet(0),
            LocalGet(0),
            I32Add,
            GlobalSet(0),
            LocalGet(1),
            Return,
        ]
    );
    assert_eq!(
        code_of(&module, "pfree"),
        vec![GlobalGet(0), LocalGet(0), I32Sub, GlobalSet(0)]
    );
}

#[test]
fn sampler_loop_lowering() {
    let module = programs::SAMPLER.compile(CompileOptions::default()).unwrap();
    assert_eq!(
        code_of(&module, "redraw"),
        vec![
            F64Const(3.0),
            LocalSet(2),
            F64Const(0.01),
            LocalSet(3),
            I32Const(0),
            LocalSet(4),
            Loop(EMPTY),
            LocalGet(4),
            I32Const(100),
            I32LtS,
            If(EMPTY),
            LocalGet(2),
            LocalGet(3),
            LocalGet(4),
            F64ConvertI32S,
            F64Mul,
            F64Add,
            LocalSet(5),
            LocalGet(5),
            Call(2),
            LocalSet(6),
            I32Const(8),
            Call(0),
            LocalSet(7),
            LocalGet(7),
            LocalGet(6),
            F64Store(MemArg::F64),
            LocalGet(4),
            I32Const(1),
            I32Add,
            LocalSet(4),
            Br(1),
            End,
            End,
        ]
    );
}

#[test]
fn sampler_module_layout() {
    let module = programs::SAMPLER.compile(CompileOptions::default()).unwrap();
    let names: Vec<&str> = module.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["pmalloc", "pfree", "fn1", "fn2", "redraw"]);

    // fn1 and fn2 share a signature
    assert_eq!(module.types.len(), 4);
    assert_eq!(module.functions[2].type_index, module.functions[3].type_index);

    assert_eq!(module.globals.len(), 1);
    assert_eq!(module.globals[0].name, "bump_pointer");
    assert_eq!(module.globals[0].ty, ValType::I32);
    assert!(module.globals[0].mutable);
    assert_eq!(module.globals[0].init, Value::I32(66560));

    let exports: Vec<(&str, ExportKind)> =
        module.exports.iter().map(|e| (e.name.as_str(), e.kind)).collect();
    assert_eq!(
        exports,
        vec![
            ("memory", ExportKind::Memory(0)),
            ("pmalloc", ExportKind::Func(0)),
            ("pfree", ExportKind::Func(1)),
            ("fn2", ExportKind::Func(3)),
            ("redraw", ExportKind::Func(4)),
            ("bump_pointer", ExportKind::Global(0)),
        ]
    );
    assert_eq!(module.memory.map(|m| m.min_pages), Some(2));
}

// ── Options ──────────────────────────────────────────────────────

#[test]
fn heap_base_and_pages_follow_options() {
    let options = CompileOptions {
        heap_base: 1024,
        memory_pages: 1,
        export_all: false,
    };
    let module = compile_with("int top = __heap_base; int f() { return __heap_base; }", options);
    assert_eq!(module.globals[0].init, Value::I32(1024));
    assert_eq!(code_of(&module, "f"), vec![I32Const(1024), Return]);
    assert_eq!(module.memory.map(|m| m.min_pages), Some(1));
}

#[test]
fn export_all_exports_everything() {
    let source = "double g = 1.5; double f(double x) { return x; }";
    assert_eq!(compile(source).exports.len(), 1);

    let options = CompileOptions {
        export_all: true,
        ..CompileOptions::default()
    };
    let module = compile_with(source, options);
    assert!(module.exported_func("f").is_some());
    assert!(module.exported_global("g").is_some());
}

#[test]
fn memory_pages_over_limit() {
    let tokens = Lexer::new("int f() { return 0; }", "test.c").tokenize().unwrap();
    let program = Parser::new(tokens, "test.c").parse().unwrap();
    let options = CompileOptions {
        memory_pages: 65537,
        ..CompileOptions::default()
    };
    let err = Compiler::new(options).compile(&program).unwrap_err();
    assert!(err.message.contains("exceeds the limit of 65536"), "{}", err);
}

// ── Imports ──────────────────────────────────────────────────────

#[test]
fn extern_becomes_function_import() {
    let module = compile(
        "extern double sqrt(double); \
         export double hyp(double a, double b) { return sqrt(a * a + b * b); }",
    );
    assert_eq!(
        module.imports,
        vec![Import {
            module: "imports".to_string(),
            name: "sqrt".to_string(),
            type_index: 0,
        }]
    );
    assert_eq!(
        module.types[0],
        FuncType {
            params: vec![ValType::F64],
            results: vec![ValType::F64],
        }
    );
    assert_eq!(
        code_of(&module, "hyp"),
        vec![
            LocalGet(0),
            LocalGet(0),
            F64Mul,
            LocalGet(1),
            LocalGet(1),
            F64Mul,
            F64Add,
            Call(0),
            Return,
        ]
    );
    assert_eq!(module.exported_func("hyp"), Some(1));
}

#[test]
fn defined_functions_are_indexed_after_imports() {
    let module = compile(
        "extern double exp(double); \
         double g(double x) { return exp(x); } \
         double h(double x) { return g(x); }",
    );
    assert_eq!(code_of(&module, "g"), vec![LocalGet(0), Call(0), Return]);
    assert_eq!(code_of(&module, "h"), vec![LocalGet(0), Call(1), Return]);
}

#[test]
fn extern_arguments_convert_to_double() {
    let module = compile("extern double exp(double); double f(int n) { return exp(n) + 1; }");
    assert_eq!(
        code_of(&module, "f"),
        vec![LocalGet(0), F64ConvertI32S, Call(0), F64Const(1.0), F64Add, Return]
    );
}

#[test]
fn extern_must_be_all_double() {
    assert!(compile_err("extern int abs(int);").contains("must take and return double"));
    assert!(compile_err("extern double ldexp(double, int);").contains("must take and return double"));
    assert!(compile_err("extern double sqrt(double); double sqrt(double x) { return x; }")
        .contains("Duplicate definition of 'sqrt'"));
}

// ── Typing ───────────────────────────────────────────────────────

#[test]
fn int_literal_in_double_context_is_f64_const() {
    assert_eq!(code_of(&compile("double f() { return 2; }"), "f"), vec![F64Const(2.0), Return]);
}

#[test]
fn double_to_int_truncates() {
    assert_eq!(
        code_of(&compile("int f(double x) { return x; }"), "f"),
        vec![LocalGet(0), I32TruncF64S, Return]
    );
}

#[test]
fn explicit_cast() {
    assert_eq!(
        code_of(&compile("double f(int i) { return (double) i; }"), "f"),
        vec![LocalGet(0), F64ConvertI32S, Return]
    );
}

#[test]
fn int_arithmetic_stays_i32() {
    assert_eq!(
        code_of(&compile("int f(int a, int b) { return a * b / 2 - 1; }"), "f"),
        vec![LocalGet(0), LocalGet(1), I32Mul, I32Const(2), I32DivS, I32Const(1), I32Sub, Return]
    );
}

#[test]
fn negation() {
    assert_eq!(
        code_of(&compile("int f(int a) { return -a; }"), "f"),
        vec![I32Const(0), LocalGet(0), I32Sub, Return]
    );
    assert_eq!(
        code_of(&compile("double f(double a) { return -a; }"), "f"),
        vec![LocalGet(0), F64Neg, Return]
    );
    assert_eq!(code_of(&compile("int f() { return -7; }"), "f"), vec![I32Const(-7), Return]);
}

#[test]
fn double_condition_compares_against_zero() {
    assert_eq!(
        code_of(&compile("void f(double x) { if (x) { return; } }"), "f"),
        vec![LocalGet(0), F64Const(0.0), F64Ne, If(EMPTY), Return, End]
    );
}

#[test]
fn int_compound_assignment_with_double_truncates() {
    assert_eq!(
        code_of(&compile("void f(int a) { a *= 1.5; }"), "f"),
        vec![LocalGet(0), F64ConvertI32S, F64Const(1.5), F64Mul, I32TruncF64S, LocalSet(0)]
    );
}

#[test]
fn deref_loads_f64() {
    assert_eq!(
        code_of(&compile("double f(double *p) { return *p; }"), "f"),
        vec![LocalGet(0), F64Load(MemArg::F64), Return]
    );
}

// ── Control flow ─────────────────────────────────────────────────

#[test]
fn while_loop_shape() {
    assert_eq!(
        code_of(&compile("void f(int n) { while (n > 0) n--; }"), "f"),
        vec![
            Loop(EMPTY),
            LocalGet(0),
            I32Const(0),
            I32GtS,
            If(EMPTY),
            LocalGet(0),
            I32Const(-1),
            I32Add,
            LocalSet(0),
            Br(1),
            End,
            End,
        ]
    );
}

#[test]
fn discarded_call_result_is_dropped() {
    let module = compile("double g() { return 1.0; } void f() { g(); }");
    assert_eq!(code_of(&module, "f"), vec![Call(0), Drop]);
}

#[test]
fn call_to_later_function() {
    let module = compile("double f(double x) { return g(x); } double g(double x) { return x; }");
    assert_eq!(code_of(&module, "f"), vec![LocalGet(0), Call(1), Return]);
}

#[test]
fn block_scoped_locals_get_fresh_slots() {
    let module = compile("double f() { { double a = 1.0; } { double a = 2.0; } return 0.0; }");
    assert_eq!(module.functions[0].locals, vec![ValType::F64, ValType::F64]);
}

#[test]
fn shadowing_in_inner_scope() {
    let module = compile("int f(int a) { { int a = 5; } return a; }");
    assert_eq!(code_of(&module, "f"), vec![I32Const(5), LocalSet(1), LocalGet(0), Return]);
}

#[test]
fn non_void_without_final_return_gets_unreachable() {
    let code = code_of(&compile("int f(int a) { if (a < 0) { return 0; } else { return 1; } }"), "f");
    assert_eq!(code.last(), Some(&Unreachable));
    let code = code_of(&compile("int f(int a) { return a; }"), "f");
    assert_eq!(code.last(), Some(&Return));
}

// ── Errors ───────────────────────────────────────────────────────

#[test]
fn unknown_identifier() {
    assert!(compile_err("double f() { return y; }").contains("Unknown identifier 'y'"));
}

#[test]
fn unknown_function() {
    assert!(compile_err("double f() { return g(); }").contains("Unknown function 'g'"));
}

#[test]
fn arity_mismatch() {
    assert!(compile_err("double g(double x) { return x; } double f() { return g(1.0, 2.0); }")
        .contains("expects 1 argument(s), got 2"));
}

#[test]
fn void_value_used() {
    assert!(compile_err("void g() { } double f() { return g(); }").contains("Void value used"));
    assert!(compile_err("void g() { } double f() { return g() + 1.0; }").contains("Void value used"));
}

#[test]
fn deref_of_non_pointer() {
    assert!(compile_err("double f(double x) { return *x; }")
        .contains("Cannot dereference a value of type double"));
}

#[test]
fn store_through_non_pointer() {
    assert!(compile_err("void f(int a) { *a = 1.0; }")
        .contains("Cannot store through a value of type int"));
}

#[test]
fn pointer_to_double_is_a_mismatch() {
    assert!(compile_err("double f(double *p) { return p; }").contains("Type mismatch"));
}

#[test]
fn pointer_arithmetic_rejected() {
    assert!(compile_err("void f(double *p) { p++; }").contains("Pointer arithmetic"));
    assert!(compile_err("void f(double *p) { p += 8; }").contains("Pointer arithmetic"));
}

#[test]
fn missing_return_value() {
    assert!(compile_err("double f() { return; }").contains("Missing return value"));
}

#[test]
fn void_function_returning_value() {
    assert!(compile_err("void f() { return 1; }").contains("cannot return a value"));
}

#[test]
fn duplicate_definitions() {
    assert!(compile_err("int a; double a;").contains("Duplicate definition of 'a'"));
    assert!(compile_err("int f() { return 0; } int f() { return 1; }").contains("Duplicate definition"));
    assert!(compile_err("void f() { int a = 1; int a = 2; }").contains("Duplicate definition of 'a'"));
    assert!(compile_err("int memory;").contains("Duplicate definition of 'memory'"));
}

#[test]
fn non_constant_global() {
    assert!(compile_err("int a = 1 + 2;").contains("is not a constant"));
}

#[test]
fn integer_literal_out_of_range() {
    assert!(compile_err("int a = 3000000000;").contains("does not fit"));
}

#[test]
fn long_sum_compiles_left_to_right() {
    let chain = vec!["x"; 200].join(" + ");
    let code = code_of(&compile(&format!("double f(double x) {{ return {}; }}", chain)), "f");
    assert_eq!(code.len(), 1 + 2 * 199 + 1);
    assert_eq!(code[..3], [LocalGet(0), LocalGet(0), F64Add]);
    assert_eq!(code[code.len() - 1], Return);
}

#[test]
fn mixed_chain_converts_each_int_operand() {
    let module = compile("double f(int i) { return i + 1.5 * i; }");
    assert_eq!(
        code_of(&module, "f"),
        vec![
            LocalGet(0),
            F64ConvertI32S,
            F64Const(1.5),
            LocalGet(0),
            F64ConvertI32S,
            F64Mul,
            F64Add,
            Return,
        ]
    );
}

#[test]
fn over_long_chain_is_a_parse_error() {
    let chain = vec!["x"; 1000].join(" + ");
    let source = format!("export double f(double x) {{ return {}; }}", chain);
    let result = programs::compile_source(&source, "t.c", CompileOptions::default());
    assert!(matches!(result, Err(programs::BuildError::Parse(_))));
}

#[test]
fn error_carries_location() {
    let tokens = Lexer::new("double f() {\n    return y;\n}", "loc.c").tokenize().unwrap();
    let program = Parser::new(tokens, "loc.c").parse().unwrap();
    let err = Compiler::new(CompileOptions::default()).compile(&program).unwrap_err();
    assert_eq!(err.to_string(), "loc.c:2:12: Unknown identifier 'y'");
}
