//! Specification tree for minitla.

pub mod analyze;
pub mod build;
pub mod ir;
pub mod span;

pub use ir::*;
pub use span::Span;
