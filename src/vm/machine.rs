//! Stack-based execution engine for compiled modules
//!
//! - Instructions are Copy enums fetched out of a flat code vector
//! - Operand stack is one contiguous Vec shared by all frames
//! - Block/loop/if targets are resolved once at instantiation, so a branch
//!   is a label lookup plus a jump
//! - Main dispatch loop is a single match
//! - Imported functions are resolved against a `Host` at instantiation and
//!   run without a frame of their own

use std::fmt;

use tracing::{debug, trace};

use super::bytecode::{ExportKind, FuncType, Module};
use super::host::{Host, HostFunction};
use super::memory::Memory;
use super::opcodes::{Instruction, MemArg, ValType, Value};

const MAX_CALL_DEPTH: usize = 256;
const MAX_STACK_SIZE: usize = 65536;

/// An execution failure inside the VM
#[derive(Debug, Clone, PartialEq)]
pub struct Trap {
    pub message: String,
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trap: {}", self.message)
    }
}

impl std::error::Error for Trap {}

fn trap<T>(message: impl Into<String>) -> Result<T, Trap> {
    Err(Trap {
        message: message.into(),
    })
}

/// A function body with its structured-control targets resolved
struct FunctionBody {
    code: Vec<Instruction>,
    /// For each block/loop/if/else position, the position of its `end`
    ends: Vec<usize>,
    /// For each `if` position, the position of its `else` if present
    elses: Vec<Option<usize>>,
    params: Vec<ValType>,
    locals: Vec<ValType>,
    result_arity: usize,
}

#[derive(Debug, Clone, Copy)]
struct Label {
    /// Values a branch to this label carries
    arity: usize,
    /// Operand stack height when the label was entered
    height: usize,
    /// Where execution continues after a branch
    target: usize,
    is_loop: bool,
}

/// An import bound to its host function
#[derive(Clone)]
struct HostImport {
    name: String,
    function: HostFunction,
}

/// A call frame on the VM call stack
struct CallFrame {
    func: usize,
    pc: usize,
    locals: Vec<Value>,
    labels: Vec<Label>,
    stack_base: usize,
}

/// A module instance: globals, memory and the execution state
pub struct VM {
    module: Module,
    imports: Vec<HostImport>,
    bodies: Vec<FunctionBody>,
    globals: Vec<Value>,
    memory: Memory,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
}

impl VM {
    /// Instantiate with the `Host::math` import table
    pub fn new(module: Module) -> Result<Self, Trap> {
        Self::with_host(module, &Host::math())
    }

    /// Instantiate, resolving every import against `host`
    pub fn with_host(module: Module, host: &Host) -> Result<Self, Trap> {
        let mut imports = Vec::with_capacity(module.imports.len());
        for import in &module.imports {
            let qualified = format!("{}.{}", import.module, import.name);
            let function = host.resolve(&import.module, &import.name).ok_or_else(|| Trap {
                message: format!("unresolved import '{}'", qualified),
            })?;
            let ty = module.types.get(import.type_index as usize).ok_or_else(|| Trap {
                message: format!("import '{}' has invalid type index {}", qualified, import.type_index),
            })?;
            let fits = ty.params.len() == function.arity
                && ty.params.iter().all(|t| *t == ValType::F64)
                && ty.results == [ValType::F64];
            if !fits {
                return trap(format!(
                    "import '{}' has type {} but the host function takes {} f64 argument(s)",
                    qualified, ty, function.arity
                ));
            }
            imports.push(HostImport {
                name: qualified,
                function: function.clone(),
            });
        }

        let mut bodies = Vec::with_capacity(module.functions.len());
        for func in &module.functions {
            let ty = module.types.get(func.type_index as usize).ok_or_else(|| Trap {
                message: format!("function '{}' has invalid type index {}", func.name, func.type_index),
            })?;
            let (ends, elses) = resolve_blocks(&func.code).map_err(|message| Trap {
                message: format!("malformed body of '{}': {}", func.name, message),
            })?;
            bodies.push(FunctionBody {
                code: func.code.clone(),
                ends,
                elses,
                params: ty.params.clone(),
                locals: func.locals.clone(),
                result_arity: ty.results.len(),
            });
        }

        let globals = module.globals.iter().map(|g| g.init).collect();
        let memory = Memory::new(module.memory.map(|m| m.min_pages).unwrap_or(0))?;
        debug!(
            imports = imports.len(),
            functions = bodies.len(),
            memory_pages = memory.pages(),
            "instantiated module"
        );

        Ok(Self {
            module,
            imports,
            bodies,
            globals,
            memory,
            stack: Vec::with_capacity(256),
            frames: Vec::with_capacity(16),
        })
    }

    /// Call an exported function by name
    pub fn invoke(&mut self, name: &str, args: &[Value]) -> Result<Option<Value>, Trap> {
        let idx = self.module.exported_func(name).ok_or_else(|| Trap {
            message: format!("function '{}' is not exported", name),
        })?;
        let ty = self.module.func_type(idx).cloned().ok_or_else(|| Trap {
            message: format!("export '{}' refers to missing function {}", name, idx),
        })?;

        if args.len() != ty.params.len() {
            return trap(format!(
                "'{}' expects {} argument(s), got {}",
                name,
                ty.params.len(),
                args.len()
            ));
        }
        for (i, (arg, expected)) in args.iter().zip(&ty.params).enumerate() {
            if arg.ty() != *expected {
                return trap(format!(
                    "argument {} of '{}' expects {}, got {} ({})",
                    i,
                    name,
                    expected,
                    arg.ty(),
                    arg
                ));
            }
        }

        debug!(function = name, ?args, "invoke");
        self.stack.clear();
        self.frames.clear();
        self.stack.extend_from_slice(args);
        self.call(idx)?;
        self.run()?;

        let result = if ty.results.is_empty() {
            None
        } else {
            Some(self.pop()?)
        };
        debug!(function = name, ?result, "returned");
        Ok(result)
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Current value of an exported global
    pub fn global(&self, name: &str) -> Option<Value> {
        let idx = self.module.exported_global(name)?;
        self.globals.get(idx as usize).copied()
    }

    pub fn exported_functions(&self) -> Vec<(String, FuncType)> {
        self.module
            .exports
            .iter()
            .filter_map(|e| match e.kind {
                ExportKind::Func(idx) => self.module.func_type(idx).map(|t| (e.name.clone(), t.clone())),
                _ => None,
            })
            .collect()
    }

    // ── Main execution loop ──────────────────────────────────────────

    fn run(&mut self) -> Result<(), Trap> {
        loop {
            let frame = match self.frames.last_mut() {
                Some(f) => f,
                None => return Ok(()),
            };
            let body = &self.bodies[frame.func];
            if frame.pc >= body.code.len() {
                // Falling off the body is an implicit return
                self.do_return()?;
                continue;
            }

            let pc = frame.pc;
            let inst = body.code[pc];
            frame.pc += 1;

            self.dispatch(inst, pc)?;
        }
    }

    // ── Instruction dispatch ─────────────────────────────────────────

    fn dispatch(&mut self, inst: Instruction, pc: usize) -> Result<(), Trap> {
        match inst {
            // ── Control ─────────────────────────────────────────────
            Instruction::Unreachable => return trap("unreachable executed"),
            Instruction::Nop => {}
            Instruction::Block(bt) => {
                let end = self.current_body().ends[pc];
                let height = self.stack.len();
                self.frame_mut().labels.push(Label {
                    arity: bt.arity(),
                    height,
                    target: end + 1,
                    is_loop: false,
                });
            }
            Instruction::Loop(_) => {
                let height = self.stack.len();
                self.frame_mut().labels.push(Label {
                    arity: 0,
                    height,
                    target: pc + 1,
                    is_loop: true,
                });
            }
            Instruction::If(bt) => {
                let cond = self.pop_i32()?;
                let end = self.current_body().ends[pc];
                let else_pc = self.current_body().elses[pc];
                let height = self.stack.len();
                let label = Label {
                    arity: bt.arity(),
                    height,
                    target: end + 1,
                    is_loop: false,
                };
                let frame = self.frame_mut();
                if cond != 0 {
                    frame.labels.push(label);
                } else if let Some(e) = else_pc {
                    frame.labels.push(label);
                    frame.pc = e + 1;
                } else {
                    frame.pc = end + 1;
                }
            }
            Instruction::Else => {
                // Then-branch finished: skip the else-branch
                let end = self.current_body().ends[pc];
                let frame = self.frame_mut();
                frame.labels.pop();
                frame.pc = end + 1;
            }
            Instruction::End => {
                self.frame_mut().labels.pop();
            }
            Instruction::Br(depth) => self.branch(depth)?,
            Instruction::BrIf(depth) => {
                if self.pop_i32()? != 0 {
                    self.branch(depth)?;
                }
            }
            Instruction::Return => self.do_return()?,
            Instruction::Call(idx) => self.call(idx)?,

            Instruction::Drop => {
                self.pop()?;
            }

            // ── Variables ───────────────────────────────────────────
            Instruction::LocalGet(idx) => {
                let val = self.local(idx)?;
                self.push(val)?;
            }
            Instruction::LocalSet(idx) => {
                let val = self.pop()?;
                self.set_local(idx, val)?;
            }
            Instruction::LocalTee(idx) => {
                let val = self.pop()?;
                self.set_local(idx, val)?;
                self.push(val)?;
            }
            Instruction::GlobalGet(idx) => {
                let val = self.globals.get(idx as usize).copied().ok_or_else(|| Trap {
                    message: format!("invalid global index {}", idx),
                })?;
                self.push(val)?;
            }
            Instruction::GlobalSet(idx) => {
                let val = self.pop()?;
                let global = self.module.globals.get(idx as usize).ok_or_else(|| Trap {
                    message: format!("invalid global index {}", idx),
                })?;
                if !global.mutable {
                    return trap(format!("global '{}' is immutable", global.name));
                }
                if global.ty != val.ty() {
                    return trap(format!("global '{}' expects {}, got {}", global.name, global.ty, val.ty()));
                }
                self.globals[idx as usize] = val;
            }

            // ── Memory ──────────────────────────────────────────────
            Instruction::I32Load(m) => {
                let addr = self.effective_address(m)?;
                let val = self.memory.load_i32(addr)?;
                self.push(Value::I32(val))?;
            }
            Instruction::F64Load(m) => {
                let addr = self.effective_address(m)?;
                let val = self.memory.load_f64(addr)?;
                self.push(Value::F64(val))?;
            }
            Instruction::I32Store(m) => {
                let val = self.pop_i32()?;
                let addr = self.effective_address(m)?;
                self.memory.store_i32(addr, val)?;
            }
            Instruction::F64Store(m) => {
                let val = self.pop_f64()?;
                let addr = self.effective_address(m)?;
                self.memory.store_f64(addr, val)?;
            }

            // ── Constants ───────────────────────────────────────────
            Instruction::I32Const(n) => self.push(Value::I32(n))?,
            Instruction::F64Const(n) => self.push(Value::F64(n))?,

            // ── Comparison ──────────────────────────────────────────
            Instruction::I32Eqz => {
                let a = self.pop_i32()?;
                self.push_bool(a == 0)?;
            }
            Instruction::I32Eq => self.cmp_i32(|a, b| a == b)?,
            Instruction::I32Ne => self.cmp_i32(|a, b| a != b)?,
            Instruction::I32LtS => self.cmp_i32(|a, b| a < b)?,
            Instruction::I32GtS => self.cmp_i32(|a, b| a > b)?,
            Instruction::I32LeS => self.cmp_i32(|a, b| a <= b)?,
            Instruction::I32GeS => self.cmp_i32(|a, b| a >= b)?,
            Instruction::F64Eq => self.cmp_f64(|a, b| a == b)?,
            Instruction::F64Ne => self.cmp_f64(|a, b| a != b)?,
            Instruction::F64Lt => self.cmp_f64(|a, b| a < b)?,
            Instruction::F64Gt => self.cmp_f64(|a, b| a > b)?,
            Instruction::F64Le => self.cmp_f64(|a, b| a <= b)?,
            Instruction::F64Ge => self.cmp_f64(|a, b| a >= b)?,

            // ── Arithmetic ──────────────────────────────────────────
            Instruction::I32Add => self.arith_i32(|a, b| Ok(a.wrapping_add(b)))?,
            Instruction::I32Sub => self.arith_i32(|a, b| Ok(a.wrapping_sub(b)))?,
            Instruction::I32Mul => self.arith_i32(|a, b| Ok(a.wrapping_mul(b)))?,
            Instruction::I32DivS => self.arith_i32(|a, b| {
                if b == 0 {
                    trap("integer divide by zero")
                } else {
                    a.checked_div(b).ok_or_else(|| Trap {
                        message: "integer overflow".to_string(),
                    })
                }
            })?,
            Instruction::F64Neg => {
                let a = self.pop_f64()?;
                self.push(Value::F64(-a))?;
            }
            Instruction::F64Add => self.arith_f64(|a, b| a + b)?,
            Instruction::F64Sub => self.arith_f64(|a, b| a - b)?,
            Instruction::F64Mul => self.arith_f64(|a, b| a * b)?,
            Instruction::F64Div => self.arith_f64(|a, b| a / b)?,

            // ── Conversion ──────────────────────────────────────────
            Instruction::I32TruncF64S => {
                let a = self.pop_f64()?;
                if a.is_nan() {
                    return trap("invalid conversion to integer");
                }
                if a >= 2147483648.0 || a <= -2147483649.0 {
                    return trap("integer overflow");
                }
                self.push(Value::I32(a.trunc() as i32))?;
            }
            Instruction::F64ConvertI32S => {
                let a = self.pop_i32()?;
                self.push(Value::F64(a as f64))?;
            }
        }
        Ok(())
    }

    // ── Calls and branches ───────────────────────────────────────────

    fn call(&mut self, idx: u32) -> Result<(), Trap> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return trap(format!("call stack exhausted (max depth {})", MAX_CALL_DEPTH));
        }
        let idx = idx as usize;
        if idx < self.imports.len() {
            return self.call_host(idx);
        }
        let body_index = idx - self.imports.len();
        let body = self.bodies.get(body_index).ok_or_else(|| Trap {
            message: format!("call to unknown function {}", idx),
        })?;
        let param_count = body.params.len();
        if self.stack.len() < param_count {
            return trap("stack underflow in call arguments");
        }
        let base = self.stack.len() - param_count;
        let mut locals: Vec<Value> = self.stack.drain(base..).collect();
        for (arg, ty) in locals.iter().zip(&body.params) {
            if arg.ty() != *ty {
                return trap(format!("call argument type mismatch: expected {}, got {}", ty, arg.ty()));
            }
        }
        locals.extend(body.locals.iter().map(|t| Value::zero(*t)));
        trace!(func = %self.module.functions[body_index].name, depth = self.frames.len() + 1, "call");

        self.frames.push(CallFrame {
            func: body_index,
            pc: 0,
            locals,
            labels: Vec::new(),
            stack_base: base,
        });
        Ok(())
    }

    /// Pop the f64 arguments, run the host function, push its result
    fn call_host(&mut self, idx: usize) -> Result<(), Trap> {
        let import = self.imports[idx].clone();
        let arity = import.function.arity;
        let floor = self.frames.last().map(|f| f.stack_base).unwrap_or(0);
        if self.stack.len() < floor + arity {
            return trap("stack underflow in call arguments");
        }
        let base = self.stack.len() - arity;
        let args = self
            .stack
            .drain(base..)
            .map(|v| match v {
                Value::F64(x) => Ok(x),
                other => trap(format!(
                    "argument of import '{}' expects f64, got {}",
                    import.name,
                    other.ty()
                )),
            })
            .collect::<Result<Vec<f64>, Trap>>()?;
        let result = import.function.call(&args);
        trace!(import = %import.name, ?args, result, "host call");
        self.push(Value::F64(result))
    }

    fn do_return(&mut self) -> Result<(), Trap> {
        let frame = match self.frames.pop() {
            Some(f) => f,
            None => return trap("return outside of a function"),
        };
        let arity = self.bodies[frame.func].result_arity;
        if self.stack.len() < frame.stack_base + arity {
            return trap("stack underflow at function return");
        }
        let results = self.stack.split_off(self.stack.len() - arity);
        self.stack.truncate(frame.stack_base);
        self.stack.extend(results);
        Ok(())
    }

    fn branch(&mut self, depth: u32) -> Result<(), Trap> {
        let depth = depth as usize;
        let label_count = self.frame_mut().labels.len();
        if depth == label_count {
            // The outermost label is the function body itself
            return self.do_return();
        }
        if depth > label_count {
            return trap(format!("branch depth {} exceeds {} enclosing label(s)", depth, label_count));
        }
        let at = label_count - 1 - depth;
        let label = self.frame_mut().labels[at];
        if self.stack.len() < label.height + label.arity {
            return trap("stack underflow at branch");
        }
        let carried = self.stack.split_off(self.stack.len() - label.arity);
        self.stack.truncate(label.height);
        self.stack.extend(carried);

        let frame = self.frame_mut();
        if label.is_loop {
            frame.labels.truncate(at + 1);
        } else {
            frame.labels.truncate(at);
        }
        frame.pc = label.target;
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn current_body(&self) -> &FunctionBody {
        let func = self.frames.last().map(|f| f.func).unwrap_or(0);
        &self.bodies[func]
    }

    fn frame_mut(&mut self) -> &mut CallFrame {
        // dispatch only runs with an active frame
        self.frames.last_mut().expect("no active call frame")
    }

    fn local(&self, idx: u32) -> Result<Value, Trap> {
        self.frames
            .last()
            .and_then(|f| f.locals.get(idx as usize).copied())
            .ok_or_else(|| Trap {
                message: format!("invalid local index {}", idx),
            })
    }

    fn set_local(&mut self, idx: u32, val: Value) -> Result<(), Trap> {
        let slot = self.frame_mut().locals.get_mut(idx as usize).ok_or_else(|| Trap {
            message: format!("invalid local index {}", idx),
        })?;
        if slot.ty() != val.ty() {
            return trap(format!("local {} expects {}, got {}", idx, slot.ty(), val.ty()));
        }
        *slot = val;
        Ok(())
    }

    fn effective_address(&mut self, m: MemArg) -> Result<u64, Trap> {
        let base = self.pop_i32()? as u32;
        Ok(base as u64 + m.offset as u64)
    }

    fn push(&mut self, val: Value) -> Result<(), Trap> {
        if self.stack.len() >= MAX_STACK_SIZE {
            return trap("operand stack overflow");
        }
        self.stack.push(val);
        Ok(())
    }

    fn push_bool(&mut self, b: bool) -> Result<(), Trap> {
        self.push(Value::I32(b as i32))
    }

    fn pop(&mut self) -> Result<Value, Trap> {
        let floor = self.frames.last().map(|f| f.stack_base).unwrap_or(0);
        if self.stack.len() <= floor {
            return trap("operand stack underflow");
        }
        self.stack.pop().ok_or_else(|| Trap {
            message: "operand stack underflow".to_string(),
        })
    }

    fn pop_i32(&mut self) -> Result<i32, Trap> {
        match self.pop()? {
            Value::I32(n) => Ok(n),
            other => trap(format!("type mismatch: expected i32, got {}", other.ty())),
        }
    }

    fn pop_f64(&mut self) -> Result<f64, Trap> {
        match self.pop()? {
            Value::F64(n) => Ok(n),
            other => trap(format!("type mismatch: expected f64, got {}", other.ty())),
        }
    }

    fn cmp_i32(&mut self, op: impl Fn(i32, i32) -> bool) -> Result<(), Trap> {
        let b = self.pop_i32()?;
        let a = self.pop_i32()?;
        self.push_bool(op(a, b))
    }

    fn cmp_f64(&mut self, op: impl Fn(f64, f64) -> bool) -> Result<(), Trap> {
        let b = self.pop_f64()?;
        let a = self.pop_f64()?;
        self.push_bool(op(a, b))
    }

    fn arith_i32(&mut self, op: impl Fn(i32, i32) -> Result<i32, Trap>) -> Result<(), Trap> {
        let b = self.pop_i32()?;
        let a = self.pop_i32()?;
        self.push(Value::I32(op(a, b)?))
    }

    fn arith_f64(&mut self, op: impl Fn(f64, f64) -> f64) -> Result<(), Trap> {
        let b = self.pop_f64()?;
        let a = self.pop_f64()?;
        self.push(Value::F64(op(a, b)))
    }
}

/// Match every block/loop/if with its `end` (and `else`)
fn resolve_blocks(code: &[Instruction]) -> Result<(Vec<usize>, Vec<Option<usize>>), String> {
    let mut ends = vec![0usize; code.len()];
    let mut elses: Vec<Option<usize>> = vec![None; code.len()];
    let mut open: Vec<usize> = Vec::new();

    for (pc, inst) in code.iter().enumerate() {
        match inst {
            Instruction::Block(_) | Instruction::Loop(_) | Instruction::If(_) => open.push(pc),
            Instruction::Else => {
                let start = *open.last().ok_or_else(|| format!("'else' at {} outside of 'if'", pc))?;
                if !matches!(code[start], Instruction::If(_)) {
                    return Err(format!("'else' at {} does not belong to an 'if'", pc));
                }
                if elses[start].is_some() {
                    return Err(format!("duplicate 'else' at {}", pc));
                }
                elses[start] = Some(pc);
            }
            Instruction::End => {
                let start = open.pop().ok_or_else(|| format!("unbalanced 'end' at {}", pc))?;
                ends[start] = pc;
                if let Some(e) = elses[start] {
                    ends[e] = pc;
                }
            }
            _ => {}
        }
    }
    if let Some(start) = open.last() {
        return Err(format!("block opened at {} is never closed", start));
    }
    Ok((ends, elses))
}
