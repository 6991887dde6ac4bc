//! Compiler: AST → WebAssembly instruction stream
//!
//! Every function is lowered to structured control flow. `if` becomes
//! `if/else/end`, loops become `loop; cond; if; body; step; br 1; end; end`
//! and `return` pops straight out of the function. Locals are typed
//! `i32` (int, double*) or `f64` (double).
//!
//! `extern` declarations become function imports from the `imports`
//! module. They take the lowest function indices.

use std::fmt;

use tracing::{debug, info};

use crate::ast::*;
use super::bytecode::{Export, ExportKind, FuncType, Function, Global, Import, MemoryType, Module};
use super::memory::MAX_PAGES;
use super::opcodes::{BlockType, Instruction, MemArg, ValType, Value};

pub const DEFAULT_HEAP_BASE: u32 = 66560;
pub const DEFAULT_MEMORY_PAGES: u32 = 2;

/// Name the compiler substitutes with the configured heap base
pub const HEAP_BASE_SYMBOL: &str = "__heap_base";

/// Module name every `extern` function is imported from
pub const IMPORT_MODULE: &str = "imports";

#[derive(Debug)]
pub struct CompileError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub file: String,
}

impl CompileError {
    fn at(loc: &SourceLocation, message: impl Into<String>) -> Self {
        CompileError {
            message: message.into(),
            line: loc.line,
            column: loc.column,
            file: loc.file.clone(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: {}", self.file, self.line, self.column, self.message)
    }
}

impl std::error::Error for CompileError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Address `__heap_base` resolves to
    pub heap_base: u32,
    /// Size of the linear memory in 64 KiB pages
    pub memory_pages: u32,
    /// Export every function and global, not just those marked `export`
    pub export_all: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            heap_base: DEFAULT_HEAP_BASE,
            memory_pages: DEFAULT_MEMORY_PAGES,
            export_all: false,
        }
    }
}

fn val_type(ty: Type) -> Option<ValType> {
    match ty {
        Type::Int | Type::Pointer => Some(ValType::I32),
        Type::Double => Some(ValType::F64),
        Type::Void => None,
    }
}

struct Signature {
    name: String,
    params: Vec<Type>,
    return_type: Type,
}

struct GlobalSlot {
    name: String,
    ty: Type,
}

/// Top-level compiler: compiles a full Program into a Module
pub struct Compiler {
    options: CompileOptions,
    signatures: Vec<Signature>,
    globals: Vec<GlobalSlot>,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            signatures: Vec::new(),
            globals: Vec::new(),
        }
    }

    pub fn compile(&mut self, program: &Program) -> Result<Module, CompileError> {
        self.signatures.clear();
        self.globals.clear();

        if self.options.memory_pages > MAX_PAGES {
            return Err(CompileError::at(
                &program.loc,
                format!(
                    "Memory of {} pages exceeds the limit of {}",
                    self.options.memory_pages, MAX_PAGES
                ),
            ));
        }

        // Collect every name up front so calls may refer to later functions.
        // Imports come first so signature positions are function indices.
        for import in &program.imports {
            self.check_unique(&import.name, &import.loc)?;
            let all_double = import.return_type == Type::Double
                && import.params.iter().all(|t| *t == Type::Double);
            if !all_double {
                return Err(CompileError::at(
                    &import.loc,
                    format!("Imported function '{}' must take and return double", import.name),
                ));
            }
            self.signatures.push(Signature {
                name: import.name.clone(),
                params: import.params.clone(),
                return_type: import.return_type,
            });
        }
        for global in &program.globals {
            self.check_unique(&global.name, &global.loc)?;
            self.globals.push(GlobalSlot {
                name: global.name.clone(),
                ty: global.ty,
            });
        }
        for func in &program.functions {
            self.check_unique(&func.name, &func.loc)?;
            self.signatures.push(Signature {
                name: func.name.clone(),
                params: func.params.iter().map(|p| p.ty).collect(),
                return_type: func.return_type,
            });
        }

        let mut module = Module::new();
        for import in &program.imports {
            let type_index = module.intern_type(FuncType {
                params: vec![ValType::F64; import.params.len()],
                results: vec![ValType::F64],
            });
            module.imports.push(Import {
                module: IMPORT_MODULE.to_string(),
                name: import.name.clone(),
                type_index,
            });
        }
        module.memory = Some(MemoryType {
            min_pages: self.options.memory_pages,
            max_pages: None,
        });
        module.exports.push(Export {
            name: "memory".to_string(),
            kind: ExportKind::Memory(0),
        });

        for global in &program.globals {
            let init = self.constant_initializer(global)?;
            let ty = init.ty();
            module.globals.push(Global {
                name: global.name.clone(),
                ty,
                mutable: true,
                init,
            });
        }

        for func in &program.functions {
            let compiled = self.compile_function(func, &mut module)?;
            module.functions.push(compiled);
        }

        let first_body = program.imports.len();
        for (i, func) in program.functions.iter().enumerate() {
            if func.exported || self.options.export_all {
                module.exports.push(Export {
                    name: func.name.clone(),
                    kind: ExportKind::Func((first_body + i) as u32),
                });
            }
        }
        for (i, global) in program.globals.iter().enumerate() {
            if global.exported || self.options.export_all {
                module.exports.push(Export {
                    name: global.name.clone(),
                    kind: ExportKind::Global(i as u32),
                });
            }
        }

        info!(
            imports = module.imports.len(),
            functions = module.functions.len(),
            globals = module.globals.len(),
            exports = module.exports.len(),
            "compiled module"
        );
        Ok(module)
    }

    fn check_unique(&self, name: &str, loc: &SourceLocation) -> Result<(), CompileError> {
        let taken = name == "memory"
            || name == HEAP_BASE_SYMBOL
            || self.globals.iter().any(|g| g.name == name)
            || self.signatures.iter().any(|s| s.name == name);
        if taken {
            return Err(CompileError::at(loc, format!("Duplicate definition of '{}'", name)));
        }
        Ok(())
    }

    /// Globals take a literal, a negated literal, or `__heap_base`
    fn constant_initializer(&self, global: &GlobalDecl) -> Result<Value, CompileError> {
        let non_constant = || {
            CompileError::at(
                global.init.loc(),
                format!("Initializer of global '{}' is not a constant", global.name),
            )
        };

        let (int_value, float_value) = match &global.init {
            Expr::IntLiteral { value, loc } => (Some(int_literal(*value, loc)?), None),
            Expr::FloatLiteral { value, .. } => (None, Some(*value)),
            Expr::Identifier { name, .. } if name == HEAP_BASE_SYMBOL => {
                (Some(self.options.heap_base as i32), None)
            }
            Expr::Negate { operand, .. } => match operand.as_ref() {
                Expr::IntLiteral { value, loc } => (Some(int_literal(-*value, loc)?), None),
                Expr::FloatLiteral { value, .. } => (None, Some(-*value)),
                _ => return Err(non_constant()),
            },
            _ => return Err(non_constant()),
        };

        match (global.ty, int_value, float_value) {
            (Type::Double, Some(n), _) => Ok(Value::F64(n as f64)),
            (Type::Double, None, Some(f)) => Ok(Value::F64(f)),
            (Type::Int | Type::Pointer, Some(n), _) => Ok(Value::I32(n)),
            _ => Err(CompileError::at(
                global.init.loc(),
                format!("Cannot initialize {} global '{}' with a double", global.ty, global.name),
            )),
        }
    }

    fn compile_function(
        &self,
        func: &FunctionDef,
        module: &mut Module,
    ) -> Result<Function, CompileError> {
        let mut fc = FunctionCompiler::new(self, func.return_type);

        // Reserve local slots for parameters
        fc.push_scope();
        for param in &func.params {
            fc.declare(&param.name, param.ty, &param.loc)?;
        }

        fc.compile_statements(&func.body)?;

        let ends_in_return = matches!(func.body.last(), Some(Statement::Return { .. }));
        if func.return_type != Type::Void && !ends_in_return {
            fc.emit(Instruction::Unreachable);
        }

        let params: Vec<ValType> = func.params.iter().filter_map(|p| val_type(p.ty)).collect();
        let results: Vec<ValType> = val_type(func.return_type).into_iter().collect();
        let type_index = module.intern_type(FuncType { params, results });

        let locals: Vec<ValType> = fc.local_types[func.params.len()..]
            .iter()
            .filter_map(|t| val_type(*t))
            .collect();

        debug!(
            function = %func.name,
            type_index,
            locals = locals.len(),
            instructions = fc.instructions.len(),
            "compiled function"
        );

        Ok(Function {
            name: func.name.clone(),
            type_index,
            locals,
            code: fc.instructions,
        })
    }
}

fn int_literal(value: i64, loc: &SourceLocation) -> Result<i32, CompileError> {
    i32::try_from(value)
        .map_err(|_| CompileError::at(loc, format!("Integer literal {} does not fit in int", value)))
}

// ── Per-function compiler state ──────────────────────────────────────────

struct FunctionCompiler<'a> {
    compiler: &'a Compiler,
    return_type: Type,
    instructions: Vec<Instruction>,
    local_types: Vec<Type>,
    scopes: Vec<Vec<(String, u32)>>,
}

enum Variable {
    Local(u32, Type),
    Global(u32, Type),
}

impl<'a> FunctionCompiler<'a> {
    fn new(compiler: &'a Compiler, return_type: Type) -> Self {
        Self {
            compiler,
            return_type,
            instructions: Vec::new(),
            local_types: Vec::new(),
            scopes: Vec::new(),
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn emit(&mut self, inst: Instruction) {
        self.instructions.push(inst);
    }

    fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Allocate a fresh slot; slots are never reused across scopes
    fn declare(&mut self, name: &str, ty: Type, loc: &SourceLocation) -> Result<u32, CompileError> {
        let scope = match self.scopes.last_mut() {
            Some(scope) => scope,
            None => return Err(CompileError::at(loc, "Declaration outside of a scope")),
        };
        if scope.iter().any(|(n, _)| n == name) {
            return Err(CompileError::at(loc, format!("Duplicate definition of '{}'", name)));
        }
        let slot = self.local_types.len() as u32;
        self.local_types.push(ty);
        scope.push((name.to_string(), slot));
        Ok(slot)
    }

    fn lookup(&self, name: &str, loc: &SourceLocation) -> Result<Variable, CompileError> {
        for scope in self.scopes.iter().rev() {
            if let Some((_, slot)) = scope.iter().rev().find(|(n, _)| n == name) {
                return Ok(Variable::Local(*slot, self.local_types[*slot as usize]));
            }
        }
        if let Some(pos) = self.compiler.globals.iter().position(|g| g.name == name) {
            return Ok(Variable::Global(pos as u32, self.compiler.globals[pos].ty));
        }
        Err(CompileError::at(loc, format!("Unknown identifier '{}'", name)))
    }

    fn signature(&self, name: &str, loc: &SourceLocation) -> Result<(u32, &'a Signature), CompileError> {
        let compiler = self.compiler;
        compiler
            .signatures
            .iter()
            .enumerate()
            .find(|(_, s)| s.name == name)
            .map(|(i, s)| (i as u32, s))
            .ok_or_else(|| CompileError::at(loc, format!("Unknown function '{}'", name)))
    }

    fn emit_get(&mut self, var: &Variable) {
        match var {
            Variable::Local(slot, _) => self.emit(Instruction::LocalGet(*slot)),
            Variable::Global(idx, _) => self.emit(Instruction::GlobalGet(*idx)),
        }
    }

    fn emit_set(&mut self, var: &Variable) {
        match var {
            Variable::Local(slot, _) => self.emit(Instruction::LocalSet(*slot)),
            Variable::Global(idx, _) => self.emit(Instruction::GlobalSet(*idx)),
        }
    }

    // ── Statements ───────────────────────────────────────────────────

    fn compile_statements(&mut self, stmts: &[Statement]) -> Result<(), CompileError> {
        for stmt in stmts {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    fn compile_scoped(&mut self, stmts: &[Statement]) -> Result<(), CompileError> {
        self.push_scope();
        let result = self.compile_statements(stmts);
        self.pop_scope();
        result
    }

    fn compile_statement(&mut self, stmt: &Statement) -> Result<(), CompileError> {
        match stmt {
            Statement::VarDecl { loc, name, ty, init } => {
                if let Some(init) = init {
                    self.compile_expr_as(init, *ty)?;
                    let slot = self.declare(name, *ty, loc)?;
                    self.emit(Instruction::LocalSet(slot));
                } else {
                    self.declare(name, *ty, loc)?;
                }
            }

            Statement::Assign { loc, target, op, value } => {
                let var = self.lookup(target, loc)?;
                let target_ty = match var {
                    Variable::Local(_, t) | Variable::Global(_, t) => t,
                };
                match op {
                    AssignOp::Set => {
                        self.compile_expr_as(value, target_ty)?;
                    }
                    _ => {
                        let (value_ty, value_code) = self.compile_detached(value)?;
                        let operand_ty = arithmetic_type(target_ty, value_ty, loc)?;
                        self.emit_get(&var);
                        self.coerce(target_ty, operand_ty, loc)?;
                        self.emit_operand(value, value_ty, value_code, operand_ty)?;
                        let binop = match op {
                            AssignOp::Add => BinaryOp::Add,
                            AssignOp::Sub => BinaryOp::Sub,
                            AssignOp::Mul => BinaryOp::Mul,
                            _ => BinaryOp::Div,
                        };
                        self.emit_binary(binop, operand_ty);
                        self.coerce(operand_ty, target_ty, loc)?;
                    }
                }
                self.emit_set(&var);
            }

            Statement::Store { loc, pointer, value } => {
                let pointer_ty = self.compile_expr(pointer)?;
                if pointer_ty != Type::Pointer {
                    return Err(CompileError::at(
                        loc,
                        format!("Cannot store through a value of type {}", pointer_ty),
                    ));
                }
                self.compile_expr_as(value, Type::Double)?;
                self.emit(Instruction::F64Store(MemArg::F64));
            }

            Statement::Increment { loc, target, delta } => {
                let var = self.lookup(target, loc)?;
                self.emit_get(&var);
                match var {
                    Variable::Local(_, Type::Double) | Variable::Global(_, Type::Double) => {
                        self.emit(Instruction::F64Const(*delta as f64));
                        self.emit(Instruction::F64Add);
                    }
                    Variable::Local(_, Type::Int) | Variable::Global(_, Type::Int) => {
                        self.emit(Instruction::I32Const(*delta));
                        self.emit(Instruction::I32Add);
                    }
                    _ => {
                        return Err(CompileError::at(
                            loc,
                            "Pointer arithmetic is not supported",
                        ))
                    }
                }
                self.emit_set(&var);
            }

            Statement::If { condition, then_body, else_body, .. } => {
                self.compile_condition(condition)?;
                self.emit(Instruction::If(BlockType::Empty));
                self.compile_scoped(then_body)?;
                if let Some(else_body) = else_body {
                    self.emit(Instruction::Else);
                    self.compile_scoped(else_body)?;
                }
                self.emit(Instruction::End);
            }

            Statement::For { init, condition, step, body, .. } => {
                // The init declaration lives in its own scope around the loop
                self.push_scope();
                let result = self.compile_for(init.as_deref(), condition.as_ref(), step.as_deref(), body);
                self.pop_scope();
                result?;
            }

            Statement::While { condition, body, .. } => {
                self.compile_for(None, Some(condition), None, body)?;
            }

            Statement::Return { loc, value } => {
                match (value, self.return_type) {
                    (Some(_), Type::Void) => {
                        return Err(CompileError::at(loc, "Void function cannot return a value"));
                    }
                    (None, Type::Void) => {}
                    (None, ty) => {
                        return Err(CompileError::at(
                            loc,
                            format!("Missing return value in function returning {}", ty),
                        ));
                    }
                    (Some(expr), ty) => {
                        self.compile_expr_as(expr, ty)?;
                    }
                }
                self.emit(Instruction::Return);
            }

            Statement::Expression { expr, .. } => {
                let ty = self.compile_expr(expr)?;
                if ty != Type::Void {
                    self.emit(Instruction::Drop);
                }
            }

            Statement::Block { body, .. } => {
                self.compile_scoped(body)?;
            }
        }
        Ok(())
    }

    /// `init; loop; cond; if; body; step; br 1; end; end`
    fn compile_for(
        &mut self,
        init: Option<&Statement>,
        condition: Option<&Expr>,
        step: Option<&Statement>,
        body: &[Statement],
    ) -> Result<(), CompileError> {
        if let Some(init) = init {
            self.compile_statement(init)?;
        }
        self.emit(Instruction::Loop(BlockType::Empty));
        match condition {
            Some(cond) => self.compile_condition(cond)?,
            None => self.emit(Instruction::I32Const(1)),
        }
        self.emit(Instruction::If(BlockType::Empty));
        self.compile_scoped(body)?;
        if let Some(step) = step {
            self.compile_statement(step)?;
        }
        self.emit(Instruction::Br(1));
        self.emit(Instruction::End);
        self.emit(Instruction::End);
        Ok(())
    }

    /// Leave an i32 truth value on the stack
    fn compile_condition(&mut self, expr: &Expr) -> Result<(), CompileError> {
        let ty = self.compile_expr(expr)?;
        match ty {
            Type::Int | Type::Pointer => Ok(()),
            Type::Double => {
                self.emit(Instruction::F64Const(0.0));
                self.emit(Instruction::F64Ne);
                Ok(())
            }
            Type::Void => Err(CompileError::at(expr.loc(), "Void value used as a condition")),
        }
    }

    // ── Expressions ──────────────────────────────────────────────────

    /// Compile `expr` and convert the result to `want`
    fn compile_expr_as(&mut self, expr: &Expr, want: Type) -> Result<(), CompileError> {
        if let (Expr::IntLiteral { value, loc }, Type::Double) = (expr, want) {
            // Integer literals in a double context are emitted as f64 directly
            int_literal(*value, loc)?;
            self.emit(Instruction::F64Const(*value as f64));
            return Ok(());
        }
        let got = self.compile_expr(expr)?;
        self.coerce(got, want, expr.loc())
    }

    /// Compile `expr` into a separate buffer so its type is known before
    /// the code lands in the function body
    fn compile_detached(&mut self, expr: &Expr) -> Result<(Type, Vec<Instruction>), CompileError> {
        let outer = std::mem::take(&mut self.instructions);
        let result = self.compile_expr(expr);
        let code = std::mem::replace(&mut self.instructions, outer);
        result.map(|ty| (ty, code))
    }

    /// Append detached code for `expr`, converting `got` to `want`
    fn emit_operand(
        &mut self,
        expr: &Expr,
        got: Type,
        code: Vec<Instruction>,
        want: Type,
    ) -> Result<(), CompileError> {
        if let (Expr::IntLiteral { value, .. }, Type::Int, Type::Double) = (expr, got, want) {
            // Integer literals in a double context are emitted as f64 directly
            self.emit(Instruction::F64Const(*value as f64));
            return Ok(());
        }
        self.instructions.extend(code);
        self.coerce(got, want, expr.loc())
    }

    fn coerce(&mut self, from: Type, to: Type, loc: &SourceLocation) -> Result<(), CompileError> {
        match (from, to) {
            (a, b) if a == b => Ok(()),
            (Type::Void, _) => Err(CompileError::at(loc, "Void value used")),
            (Type::Int, Type::Pointer) | (Type::Pointer, Type::Int) => Ok(()),
            (Type::Int, Type::Double) => {
                self.emit(Instruction::F64ConvertI32S);
                Ok(())
            }
            (Type::Double, Type::Int) => {
                self.emit(Instruction::I32TruncF64S);
                Ok(())
            }
            (from, to) => Err(CompileError::at(
                loc,
                format!("Type mismatch: cannot convert {} to {}", from, to),
            )),
        }
    }

    fn compile_expr(&mut self, expr: &Expr) -> Result<Type, CompileError> {
        match expr {
            Expr::IntLiteral { value, loc } => {
                self.emit(Instruction::I32Const(int_literal(*value, loc)?));
                Ok(Type::Int)
            }

            Expr::FloatLiteral { value, .. } => {
                self.emit(Instruction::F64Const(*value));
                Ok(Type::Double)
            }

            Expr::Identifier { name, loc } => {
                if name == HEAP_BASE_SYMBOL {
                    self.emit(Instruction::I32Const(self.compiler.options.heap_base as i32));
                    return Ok(Type::Int);
                }
                let var = self.lookup(name, loc)?;
                self.emit_get(&var);
                match var {
                    Variable::Local(_, t) | Variable::Global(_, t) => Ok(t),
                }
            }

            Expr::Call { loc, callee, arguments } => {
                let (index, sig) = self.signature(callee, loc)?;
                if sig.params.len() != arguments.len() {
                    return Err(CompileError::at(
                        loc,
                        format!(
                            "Function '{}' expects {} argument(s), got {}",
                            callee,
                            sig.params.len(),
                            arguments.len()
                        ),
                    ));
                }
                for (arg, ty) in arguments.iter().zip(sig.params.iter()) {
                    self.compile_expr_as(arg, *ty)?;
                }
                self.emit(Instruction::Call(index));
                Ok(sig.return_type)
            }

            Expr::Negate { loc, operand } => match operand.as_ref() {
                Expr::IntLiteral { value, loc } => {
                    self.emit(Instruction::I32Const(int_literal(-*value, loc)?));
                    Ok(Type::Int)
                }
                Expr::FloatLiteral { value, .. } => {
                    self.emit(Instruction::F64Const(-*value));
                    Ok(Type::Double)
                }
                _ => match self.compile_detached(operand)? {
                    (Type::Double, code) => {
                        self.instructions.extend(code);
                        self.emit(Instruction::F64Neg);
                        Ok(Type::Double)
                    }
                    (Type::Int, code) => {
                        // i32 has no neg: 0 - x
                        self.emit(Instruction::I32Const(0));
                        self.instructions.extend(code);
                        self.emit(Instruction::I32Sub);
                        Ok(Type::Int)
                    }
                    (Type::Pointer, _) => {
                        Err(CompileError::at(loc, "Pointer arithmetic is not supported"))
                    }
                    (Type::Void, _) => Err(CompileError::at(loc, "Void value used")),
                },
            },

            Expr::Binary { loc, op, left, right } => {
                let (lt, left_code) = self.compile_detached(left)?;
                let (rt, right_code) = self.compile_detached(right)?;
                let operand_ty = if op.is_comparison() {
                    comparison_type(lt, rt, loc)?
                } else {
                    arithmetic_type(lt, rt, loc)?
                };
                self.emit_operand(left, lt, left_code, operand_ty)?;
                self.emit_operand(right, rt, right_code, operand_ty)?;
                self.emit_binary(*op, operand_ty);
                if op.is_comparison() {
                    Ok(Type::Int)
                } else {
                    Ok(operand_ty)
                }
            }

            Expr::Cast { ty, operand, .. } => {
                self.compile_expr_as(operand, *ty)?;
                Ok(*ty)
            }

            Expr::Deref { loc, pointer } => {
                let ty = self.compile_expr(pointer)?;
                if ty != Type::Pointer {
                    return Err(CompileError::at(
                        loc,
                        format!("Cannot dereference a value of type {}", ty),
                    ));
                }
                self.emit(Instruction::F64Load(MemArg::F64));
                Ok(Type::Double)
            }
        }
    }

    /// `operand_ty` is `Int` (pointers compare as i32) or `Double`
    fn emit_binary(&mut self, op: BinaryOp, operand_ty: Type) {
        let inst = if operand_ty == Type::Double {
            match op {
                BinaryOp::Add => Instruction::F64Add,
                BinaryOp::Sub => Instruction::F64Sub,
                BinaryOp::Mul => Instruction::F64Mul,
                BinaryOp::Div => Instruction::F64Div,
                BinaryOp::Eq => Instruction::F64Eq,
                BinaryOp::Ne => Instruction::F64Ne,
                BinaryOp::Lt => Instruction::F64Lt,
                BinaryOp::Le => Instruction::F64Le,
                BinaryOp::Gt => Instruction::F64Gt,
                BinaryOp::Ge => Instruction::F64Ge,
            }
        } else {
            match op {
                BinaryOp::Add => Instruction::I32Add,
                BinaryOp::Sub => Instruction::I32Sub,
                BinaryOp::Mul => Instruction::I32Mul,
                BinaryOp::Div => Instruction::I32DivS,
                BinaryOp::Eq => Instruction::I32Eq,
                BinaryOp::Ne => Instruction::I32Ne,
                BinaryOp::Lt => Instruction::I32LtS,
                BinaryOp::Le => Instruction::I32LeS,
                BinaryOp::Gt => Instruction::I32GtS,
                BinaryOp::Ge => Instruction::I32GeS,
            }
        };
        self.emit(inst);
    }
}

/// Usual arithmetic conversions restricted to int and double
fn arithmetic_type(a: Type, b: Type, loc: &SourceLocation) -> Result<Type, CompileError> {
    match (a, b) {
        (Type::Void, _) | (_, Type::Void) => Err(CompileError::at(loc, "Void value used")),
        (Type::Pointer, _) | (_, Type::Pointer) => {
            Err(CompileError::at(loc, "Pointer arithmetic is not supported"))
        }
        (Type::Double, _) | (_, Type::Double) => Ok(Type::Double),
        _ => Ok(Type::Int),
    }
}

fn comparison_type(a: Type, b: Type, loc: &SourceLocation) -> Result<Type, CompileError> {
    match (a, b) {
        (Type::Void, _) | (_, Type::Void) => Err(CompileError::at(loc, "Void value used")),
        (Type::Double, Type::Pointer) | (Type::Pointer, Type::Double) => Err(CompileError::at(
            loc,
            "Type mismatch: cannot compare double* with double",
        )),
        (Type::Double, _) | (_, Type::Double) => Ok(Type::Double),
        _ => Ok(Type::Int),
    }
}
