//! Lexer module for Formedible source

pub mod scanner;
pub mod token;

pub use scanner::*;
pub use token::*;
