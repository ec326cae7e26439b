pub mod catalog;
pub mod codegen;
pub mod config;
pub mod error;
pub mod expression;
pub mod function;
pub mod types;
pub mod vdbe;

pub use catalog::Catalog;
pub use codegen::CodeGen;
pub use config::CompilerConfig;
pub use error::{CompileError, Result};
pub use expression::{Expr, ExprList};
pub use types::{Affinity, Value};
pub use vdbe::{Machine, MemoryStore, Program};
