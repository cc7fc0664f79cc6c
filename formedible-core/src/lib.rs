//! Formedible Core - Form Configuration Types
//!
//! Pure data structures shared by the parser pipeline and its consumers:
//! the parsed form model, the reconstructed validation-rule tree, the error
//! taxonomy and the operator-facing `ParserConfig`.
//!
//! This crate contains no parsing logic. Everything here is plain data that
//! serializes with serde (camelCase), so a renderer on the other side of an
//! FFI or HTTP boundary receives exactly the same shape.

pub mod config;
pub mod error;
pub mod field;
pub mod form;
pub mod validation;

pub use config::*;
pub use error::*;
pub use field::*;
pub use form::*;
pub use validation::*;
