//! Stack machine back end
//!
//! Compiler from the AST to WebAssembly instructions, the binary module
//! format, a text printer, and a VM that hosts compiled modules and
//! supplies their imports.

pub mod opcodes;
pub mod bytecode;
pub mod compiler;
pub mod memory;
pub mod host;
pub mod machine;
pub mod wat;
