//! Cross-check of the bundled programs: native Rust against the VM

use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::native::{self, BumpArena};
use crate::programs::{self, BuildError};
use crate::vm::compiler::CompileOptions;
use crate::vm::machine::{Trap, VM};
use crate::vm::memory::Memory;
use crate::vm::opcodes::Value;

pub const CONDITIONAL_INPUTS: [f64; 6] = [-1.0, 0.0, 5.0, 5.5, 6.0, 10.25];
pub const ACCUMULATOR_INPUTS: [f64; 6] = [-3.0, 0.0, 1.0, 5.0, 5.5, 10.0];

#[derive(Debug)]
pub enum DemoError {
    Build(BuildError),
    Trap(Trap),
    /// The module does not have the shape the bundled program should give it
    Shape(String),
}

impl fmt::Display for DemoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemoError::Build(e) => write!(f, "{}", e),
            DemoError::Trap(e) => write!(f, "{}", e),
            DemoError::Shape(msg) => write!(f, "unexpected module shape: {}", msg),
        }
    }
}

impl std::error::Error for DemoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DemoError::Build(e) => Some(e),
            DemoError::Trap(e) => Some(e),
            DemoError::Shape(_) => None,
        }
    }
}

impl From<BuildError> for DemoError {
    fn from(e: BuildError) -> Self {
        DemoError::Build(e)
    }
}

impl From<Trap> for DemoError {
    fn from(e: Trap) -> Self {
        DemoError::Trap(e)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub input: f64,
    pub native: f64,
    pub vm: f64,
    pub agree: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SamplerReport {
    pub heap_base: u32,
    pub native_offset: usize,
    pub vm_offset: u32,
    /// Stored values, in slot order
    pub values: Vec<f64>,
    pub slots_agree: bool,
    pub agree: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub conditional: Vec<CaseResult>,
    pub accumulator: Vec<CaseResult>,
    pub sampler: SamplerReport,
}

impl DemoReport {
    pub fn all_agree(&self) -> bool {
        self.conditional.iter().all(|c| c.agree)
            && self.accumulator.iter().all(|c| c.agree)
            && self.sampler.agree
    }
}

fn same(a: f64, b: f64) -> bool {
    a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
}

fn unary_cases(
    vm: &mut VM,
    inputs: &[f64],
    native: fn(f64) -> f64,
) -> Result<Vec<CaseResult>, DemoError> {
    let mut cases = Vec::with_capacity(inputs.len());
    for &input in inputs {
        let expected = native(input);
        let got = vm
            .invoke("fn", &[Value::F64(input)])?
            .and_then(|v| v.as_f64())
            .ok_or_else(|| DemoError::Shape("'fn' did not return a double".to_string()))?;
        cases.push(CaseResult {
            input,
            native: expected,
            vm: got,
            agree: same(expected, got),
        });
    }
    Ok(cases)
}

fn sampler(options: CompileOptions) -> Result<SamplerReport, DemoError> {
    let mut vm = VM::new(programs::SAMPLER.compile(options)?)?;
    let base = vm
        .global("bump_pointer")
        .and_then(|v| v.as_i32())
        .ok_or_else(|| DemoError::Shape("'bump_pointer' is not an exported int".to_string()))?;
    vm.invoke("redraw", &[Value::F64(0.0), Value::F64(0.0)])?;
    let vm_offset = vm
        .global("bump_pointer")
        .and_then(|v| v.as_i32())
        .ok_or_else(|| DemoError::Shape("'bump_pointer' is not an exported int".to_string()))?;

    let mut arena = BumpArena::new(options.heap_base as usize);
    let mut memory = Memory::new(options.memory_pages)?;
    native::redraw(0.0, 0.0, &mut arena, &mut memory)?;

    let count = native::sampler::SAMPLE_COUNT;
    let addr = options.heap_base as u64;
    let native_values = memory.read_f64s(addr, count)?;
    let vm_values = vm.memory().read_f64s(base as u32 as u64, count)?;

    let slots_agree = native_values.len() == vm_values.len()
        && native_values.iter().zip(&vm_values).all(|(a, b)| same(*a, *b));
    let agree = slots_agree && arena.offset() as u64 == vm_offset as u32 as u64;

    Ok(SamplerReport {
        heap_base: options.heap_base,
        native_offset: arena.offset(),
        vm_offset: vm_offset as u32,
        values: vm_values,
        slots_agree,
        agree,
    })
}

/// Run every bundled program natively and on the VM
pub fn run(options: CompileOptions) -> Result<DemoReport, DemoError> {
    let mut vm = VM::new(programs::CONDITIONAL.compile(options)?)?;
    let conditional = unary_cases(&mut vm, &CONDITIONAL_INPUTS, native::conditional)?;

    let mut vm = VM::new(programs::ACCUMULATOR.compile(options)?)?;
    let accumulator = unary_cases(&mut vm, &ACCUMULATOR_INPUTS, native::accumulate)?;

    let sampler = sampler(options)?;

    let report = DemoReport {
        conditional,
        accumulator,
        sampler,
    };
    info!(agree = report.all_agree(), "demo finished");
    Ok(report)
}
