//! Error types for expression compilation.

use thiserror::Error;

/// Errors that abort compilation of the current statement.
///
/// None of these are sticky: the caller discards the partially built program
/// and may compile the next statement with a fresh [`crate::codegen::CodeGen`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Expression tree is too large (maximum depth {max})")]
    ExpressionTooDeep { max: u32 },

    #[error("too many arguments on function {function} (maximum {max})")]
    TooManyArguments { function: String, max: usize },

    #[error("no such collation sequence: {0}")]
    NoSuchCollation(String),

    #[error("unknown function: {0}()")]
    UnknownFunction(String),

    #[error("wrong number of arguments to function {0}()")]
    WrongArgumentCount(String),

    #[error("misuse of aggregate: {0}()")]
    MisuseOfAggregate(String),

    #[error("row value misused")]
    RowValueMisused,

    #[error("sub-select returns {actual} columns - expected {expected}")]
    SubselectColumns { actual: usize, expected: usize },

    #[error("{columns} columns assigned {values} values")]
    VectorAssignment { columns: usize, values: usize },

    #[error("RAISE() may only be used within a trigger-program")]
    RaiseOutsideTrigger,

    #[error("no such column: {0}")]
    UnresolvedIdentifier(String),

    #[error("ambiguous column name: {0}")]
    AmbiguousColumn(String),

    #[error("bound parameters are not allowed here")]
    BoundParameterNotAllowed,

    #[error("no select compiler available for sub-select")]
    NoSelectCoder,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;
