//! The bundled example programs and the source → module pipeline

use std::fmt;

use crate::lexer::{Lexer, LexerError};
use crate::parser::{ParseError, Parser};
use crate::vm::bytecode::Module;
use crate::vm::compiler::{CompileError, CompileOptions, Compiler};

pub const TEST_IF: &str = include_str!("../programs/test_if.c");
pub const TEST_LOOP: &str = include_str!("../programs/test_loop.c");
pub const REDRAW: &str = include_str!("../programs/redraw.c");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExampleProgram {
    pub name: &'static str,
    pub file: &'static str,
    pub source: &'static str,
}

pub const CONDITIONAL: ExampleProgram = ExampleProgram {
    name: "conditional",
    file: "test_if.c",
    source: TEST_IF,
};

pub const ACCUMULATOR: ExampleProgram = ExampleProgram {
    name: "accumulator",
    file: "test_loop.c",
    source: TEST_LOOP,
};

pub const SAMPLER: ExampleProgram = ExampleProgram {
    name: "sampler",
    file: "redraw.c",
    source: REDRAW,
};

pub fn all() -> [ExampleProgram; 3] {
    [CONDITIONAL, ACCUMULATOR, SAMPLER]
}

impl ExampleProgram {
    pub fn compile(&self, options: CompileOptions) -> Result<Module, BuildError> {
        compile_source(self.source, self.file, options)
    }
}

/// Failure in any front-end or compiler stage
#[derive(Debug)]
pub enum BuildError {
    Lex(LexerError),
    Parse(ParseError),
    Compile(CompileError),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Lex(e) => write!(f, "Lexer error: {}", e),
            BuildError::Parse(e) => write!(f, "Parse error: {}", e),
            BuildError::Compile(e) => write!(f, "Compile error: {}", e),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Lex(e) => Some(e),
            BuildError::Parse(e) => Some(e),
            BuildError::Compile(e) => Some(e),
        }
    }
}

impl From<LexerError> for BuildError {
    fn from(e: LexerError) -> Self {
        BuildError::Lex(e)
    }
}

impl From<ParseError> for BuildError {
    fn from(e: ParseError) -> Self {
        BuildError::Parse(e)
    }
}

impl From<CompileError> for BuildError {
    fn from(e: CompileError) -> Self {
        BuildError::Compile(e)
    }
}

/// Lex, parse and compile one source file
pub fn compile_source(
    source: &str,
    filename: &str,
    options: CompileOptions,
) -> Result<Module, BuildError> {
    let tokens = Lexer::new(source, filename).tokenize()?;
    let program = Parser::new(tokens, filename).parse()?;
    let module = Compiler::new(options).compile(&program)?;
    Ok(module)
}
