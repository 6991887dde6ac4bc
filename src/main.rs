use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser as ClapParser, Subcommand};
use sha2::{Digest, Sha256};
use tracing::info;

use ministack::ast::*;
use ministack::demo::{self, CaseResult, DemoReport};
use ministack::lexer::Lexer;
use ministack::logging;
use ministack::parser::Parser;
use ministack::programs::compile_source;
use ministack::vm::bytecode::Module;
use ministack::vm::compiler::{CompileOptions, DEFAULT_HEAP_BASE, DEFAULT_MEMORY_PAGES};
use ministack::vm::machine::VM;
use ministack::vm::memory::MAX_PAGES;
use ministack::vm::opcodes::{ValType, Value};
use ministack::vm::wat::print_module;

#[derive(ClapParser)]
#[command(
    name = "ministack",
    version,
    about = "Compile small C programs to WebAssembly and run them on a stack VM"
)]
struct Cli {
    /// Log filter directive, e.g. `debug` (overrides MINISTACK_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Address `__heap_base` resolves to
    #[arg(long, global = true, env = "MINISTACK_HEAP_BASE", default_value_t = DEFAULT_HEAP_BASE)]
    heap_base: u32,

    /// Linear memory size in 64 KiB pages (at most 65536)
    #[arg(
        long,
        global = true,
        env = "MINISTACK_MEMORY_PAGES",
        default_value_t = DEFAULT_MEMORY_PAGES,
        value_parser = clap::value_parser!(u32).range(0..=MAX_PAGES as i64)
    )]
    memory_pages: u32,

    /// Export every function and global
    #[arg(long, global = true)]
    export_all: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the token stream (debug)
    Tokenize {
        /// Path to .c file
        file: PathBuf,
    },
    /// Parse and summarize globals and functions
    Parse {
        /// Path to .c file
        file: PathBuf,
    },
    /// Compile to a .wasm binary
    Compile {
        /// Path to .c file
        file: PathBuf,
        /// Output path (defaults to the input with a .wasm extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the text listing of a .c or .wasm file
    Disasm {
        /// Path to .c or .wasm file
        file: PathBuf,
    },
    /// Invoke an exported function
    Run {
        /// Path to .c or .wasm file
        file: PathBuf,
        /// Function to invoke (defaults to the first exported function)
        #[arg(short, long)]
        function: Option<String>,
        /// Arguments, parsed against the function signature
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run the bundled programs natively and on the VM and compare
    Demo {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref());

    let options = CompileOptions {
        heap_base: cli.heap_base,
        memory_pages: cli.memory_pages,
        export_all: cli.export_all,
    };

    let exit_code = match cli.command {
        Commands::Tokenize { file } => cmd_tokenize(&file),
        Commands::Parse { file } => cmd_parse(&file),
        Commands::Compile { file, output } => cmd_compile(&file, output.as_deref(), options),
        Commands::Disasm { file } => cmd_disasm(&file, options),
        Commands::Run {
            file,
            function,
            args,
        } => cmd_run(&file, function.as_deref(), &args, options),
        Commands::Demo { json } => cmd_demo(json, options),
    };
    process::exit(exit_code);
}

const MAX_SOURCE_SIZE: u64 = 10 * 1024 * 1024; // 10 MB

fn check_size(path: &Path) -> Result<String, i32> {
    let filename = path.to_string_lossy().to_string();
    match std::fs::metadata(path) {
        Ok(meta) => {
            if meta.len() > MAX_SOURCE_SIZE {
                eprintln!(
                    "Error: file {} is too large ({} bytes, max {} bytes)",
                    filename,
                    meta.len(),
                    MAX_SOURCE_SIZE
                );
                return Err(1);
            }
            Ok(filename)
        }
        Err(e) => {
            eprintln!("Error: cannot read file {}: {}", filename, e);
            Err(1)
        }
    }
}

fn read_source(path: &Path) -> Result<(String, String), i32> {
    let filename = check_size(path)?;
    match std::fs::read_to_string(path) {
        Ok(source) => Ok((source, filename)),
        Err(e) => {
            eprintln!("Error: cannot read file {}: {}", filename, e);
            Err(1)
        }
    }
}

fn is_wasm(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "wasm")
}

/// Compile a .c file or decode a .wasm file
fn load_module(path: &Path, options: CompileOptions) -> Result<Module, i32> {
    if is_wasm(path) {
        let filename = check_size(path)?;
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("Error: cannot read file {}: {}", filename, e);
                return Err(1);
            }
        };
        return Module::decode(&bytes).map_err(|e| {
            eprintln!("{}: {}", filename, e);
            1
        });
    }

    let (source, filename) = read_source(path)?;
    compile_source(&source, &filename, options).map_err(|e| {
        eprintln!("{}", e);
        1
    })
}

fn cmd_tokenize(path: &Path) -> i32 {
    let (source, filename) = match read_source(path) {
        Ok(r) => r,
        Err(code) => return code,
    };

    let tokens = match Lexer::new(&source, &filename).tokenize() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Lexer error: {}", e);
            return 1;
        }
    };

    for tok in &tokens {
        println!("{}", tok);
    }
    0
}

fn cmd_parse(path: &Path) -> i32 {
    let (source, filename) = match read_source(path) {
        Ok(r) => r,
        Err(code) => return code,
    };

    let tokens = match Lexer::new(&source, &filename).tokenize() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Lexer error: {}", e);
            return 1;
        }
    };

    let program = match Parser::new(tokens, &filename).parse() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            return 1;
        }
    };

    print_program(&program);
    0
}

fn cmd_compile(path: &Path, output: Option<&Path>, options: CompileOptions) -> i32 {
    let module = match load_module(path, options) {
        Ok(m) => m,
        Err(code) => return code,
    };

    let bytes = module.encode();
    let out_path = match output {
        Some(p) => p.to_path_buf(),
        None => path.with_extension("wasm"),
    };
    if let Err(e) = std::fs::write(&out_path, &bytes) {
        eprintln!("Error: cannot write {}: {}", out_path.display(), e);
        return 1;
    }

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();

    info!(path = %out_path.display(), size = bytes.len(), "wrote module");
    println!("{}: {} bytes", out_path.display(), bytes.len());
    println!("sha256: {:x}", digest);
    0
}

fn cmd_disasm(path: &Path, options: CompileOptions) -> i32 {
    match load_module(path, options) {
        Ok(module) => {
            print!("{}", print_module(&module));
            0
        }
        Err(code) => code,
    }
}

fn cmd_run(path: &Path, function: Option<&str>, args: &[String], options: CompileOptions) -> i32 {
    let module = match load_module(path, options) {
        Ok(m) => m,
        Err(code) => return code,
    };

    let mut vm = match VM::new(module) {
        Ok(vm) => vm,
        Err(e) => {
            eprintln!("{}", e);
            return 1;
        }
    };

    let exported = vm.exported_functions();
    let (name, ty) = match function {
        Some(name) => match exported.iter().find(|(n, _)| n == name) {
            Some(found) => found.clone(),
            None => {
                eprintln!("Error: no exported function named '{}'", name);
                return 1;
            }
        },
        None => match exported.first() {
            Some(first) => first.clone(),
            None => {
                eprintln!("Error: module exports no functions");
                return 1;
            }
        },
    };

    if args.len() != ty.params.len() {
        eprintln!(
            "Error: '{}' has signature {} but {} argument(s) were given",
            name,
            ty,
            args.len()
        );
        return 1;
    }

    let mut values = Vec::with_capacity(args.len());
    for (arg, param) in args.iter().zip(&ty.params) {
        match parse_value(arg, *param) {
            Ok(v) => values.push(v),
            Err(msg) => {
                eprintln!("Error: {}", msg);
                return 1;
            }
        }
    }

    match vm.invoke(&name, &values) {
        Ok(Some(result)) => {
            println!("{}", result);
            0
        }
        Ok(None) => 0,
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}

fn parse_value(s: &str, ty: ValType) -> Result<Value, String> {
    match ty {
        ValType::I32 => s
            .parse::<i32>()
            .map(Value::I32)
            .map_err(|_| format!("'{}' is not a valid i32", s)),
        ValType::F64 => s
            .parse::<f64>()
            .map(Value::F64)
            .map_err(|_| format!("'{}' is not a valid f64", s)),
    }
}

fn cmd_demo(json: bool, options: CompileOptions) -> i32 {
    let report = match demo::run(options) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e);
            return 1;
        }
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: cannot serialize report: {}", e);
                return 1;
            }
        }
    } else {
        print_report(&report);
    }

    if report.all_agree() {
        0
    } else {
        1
    }
}

// ── Output ──────────────────────────────────────────────────────────────

fn print_program(program: &Program) {
    for i in &program.imports {
        let params: Vec<String> = i.params.iter().map(|t| t.to_string()).collect();
        println!("Import: {} {}({})", i.return_type, i.name, params.join(", "));
    }
    if !program.imports.is_empty() {
        println!();
    }

    for g in &program.globals {
        let export = if g.exported { "export " } else { "" };
        println!("Global: {}{} {}", export, g.ty, g.name);
    }
    if !program.globals.is_empty() {
        println!();
    }

    for f in &program.functions {
        let export = if f.exported { "export " } else { "" };
        let params: Vec<String> = f
            .params
            .iter()
            .map(|p| format!("{} {}", p.ty, p.name))
            .collect();
        println!(
            "Function: {}{} {}({})",
            export,
            f.return_type,
            f.name,
            params.join(", ")
        );
        println!("  statements: {}", f.body.len());
    }
}

fn print_cases(title: &str, cases: &[CaseResult]) {
    println!("{}:", title);
    for c in cases {
        let mark = if c.agree { "ok" } else { "MISMATCH" };
        println!(
            "  fn({}) native={} vm={} {}",
            c.input, c.native, c.vm, mark
        );
    }
}

fn print_report(report: &DemoReport) {
    print_cases("conditional (test_if.c)", &report.conditional);
    println!();
    print_cases("accumulator (test_loop.c)", &report.accumulator);
    println!();

    let s = &report.sampler;
    println!("sampler (redraw.c):");
    println!("  heap base:     {}", s.heap_base);
    println!("  native offset: {}", s.native_offset);
    println!("  vm offset:     {}", s.vm_offset);
    if let (Some(first), Some(last)) = (s.values.first(), s.values.last()) {
        println!("  slots:         {} values, {} .. {}", s.values.len(), first, last);
    }
    println!("  slots agree:   {}", s.slots_agree);
    println!();

    if report.all_agree() {
        println!("OK: native and VM results agree");
    } else {
        println!("FAIL: native and VM results differ");
    }
}
