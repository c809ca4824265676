//! Parser module for the legacy deck format

pub mod ast;
pub mod parser;

pub use ast::*;
pub use parser::*;
