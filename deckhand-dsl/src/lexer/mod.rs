//! Line lexer for the legacy deck format

pub mod token;
pub mod scanner;

pub use token::*;
pub use scanner::*;
