//! Compiler tunables.

use serde::Deserialize;

/// Limits and heuristics consulted while generating code.
///
/// The thresholds are empirically tuned and kept configurable so an embedding
/// engine can load them from its own configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Maximum height of an expression tree.
    pub max_expr_depth: u32,
    /// Maximum number of arguments to a single function call.
    pub max_function_args: usize,
    /// Number of single registers kept on the temporary free-list.
    pub temp_register_pool: usize,
    /// Constant `IN (...)` lists with at most this many items are compiled as
    /// a chain of equality tests instead of an ephemeral table.
    pub in_list_table_threshold: usize,
    /// Allow loop-invariant expressions to be moved to the init section.
    pub const_factoring: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_expr_depth: 1000,
            max_function_args: 127,
            temp_register_pool: 8,
            in_list_table_threshold: 2,
            const_factoring: true,
        }
    }
}
