//! Text listing of a module in the WebAssembly text format style

use std::fmt::Write;

use super::bytecode::{ExportKind, Module};
use super::opcodes::{Instruction, Value};

pub fn print_module(module: &Module) -> String {
    let mut out = String::new();
    out.push_str("(module\n");

    for (i, ty) in module.types.iter().enumerate() {
        let _ = write!(out, "  (type (;{};) (func", i);
        if !ty.params.is_empty() {
            let p: Vec<String> = ty.params.iter().map(|t| t.to_string()).collect();
            let _ = write!(out, " (param {})", p.join(" "));
        }
        if !ty.results.is_empty() {
            let r: Vec<String> = ty.results.iter().map(|t| t.to_string()).collect();
            let _ = write!(out, " (result {})", r.join(" "));
        }
        out.push_str("))\n");
    }

    for (i, import) in module.imports.iter().enumerate() {
        let _ = writeln!(
            out,
            "  (import \"{}\" \"{}\" (func ${} (;{};) (type {})))",
            import.module, import.name, import.name, i, import.type_index
        );
    }

    let first_body = module.imports.len();
    for (i, func) in module.functions.iter().enumerate() {
        let index = first_body + i;
        let _ = write!(out, "  (func ${} (;{};) (type {})", func.name, index, func.type_index);
        if let Some(ty) = module.types.get(func.type_index as usize) {
            for p in &ty.params {
                let _ = write!(out, " (param {})", p);
            }
            for r in &ty.results {
                let _ = write!(out, " (result {})", r);
            }
        }
        out.push('\n');
        for local in &func.locals {
            let _ = writeln!(out, "    (local {})", local);
        }
        let mut depth = 2usize;
        for inst in &func.code {
            if matches!(inst, Instruction::End | Instruction::Else) {
                depth = depth.saturating_sub(1).max(2);
            }
            let _ = writeln!(out, "{}{}", "  ".repeat(depth), inst);
            if matches!(
                inst,
                Instruction::Block(_) | Instruction::Loop(_) | Instruction::If(_) | Instruction::Else
            ) {
                depth += 1;
            }
        }
        // Drop the trailing newline so the closing paren sits on the last line
        out.pop();
        out.push_str(")\n");
    }

    if let Some(mem) = module.memory {
        match mem.max_pages {
            Some(max) => {
                let _ = writeln!(out, "  (memory (;0;) {} {})", mem.min_pages, max);
            }
            None => {
                let _ = writeln!(out, "  (memory (;0;) {})", mem.min_pages);
            }
        }
    }

    for (i, g) in module.globals.iter().enumerate() {
        let ty = if g.mutable {
            format!("(mut {})", g.ty)
        } else {
            g.ty.to_string()
        };
        let init = match g.init {
            Value::I32(n) => Instruction::I32Const(n),
            Value::F64(n) => Instruction::F64Const(n),
        };
        let _ = writeln!(out, "  (global ${} (;{};) {} ({}))", g.name, i, ty, init);
    }

    for e in &module.exports {
        let target = match e.kind {
            ExportKind::Func(i) => format!("func {}", i),
            ExportKind::Memory(i) => format!("memory {}", i),
            ExportKind::Global(i) => format!("global {}", i),
        };
        let _ = writeln!(out, "  (export \"{}\" ({}))", e.name, target);
    }

    // Close the module on the last line
    if out.ends_with('\n') {
        out.pop();
    }
    out.push_str(")\n");
    out
}
