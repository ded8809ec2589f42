// pdc — Pure Data patch compiler
//
// Library root. Phases in pipeline order: lexer → parser → graph → schedule
// → codegen, orchestrated by pipeline and driven from files by driver.

pub mod ast;
pub mod codegen;
pub mod diag;
pub mod driver;
pub mod graph;
pub mod id;
pub mod lexer;
pub mod operator;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod schedule;
