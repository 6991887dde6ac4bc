pub mod lexer;
pub mod ast;
pub mod parser;
pub mod vm;
pub mod native;
pub mod programs;
pub mod logging;
pub mod demo;
