//! Expression code generation.
//!
//! A [`CodeGen`] owns the state of one statement compilation: the program
//! under construction, the register and cursor counters, the scratch
//! register pool and the list of constant expressions hoisted into the
//! initialization section. Statement compilers drive it through
//! [`CodeGen::code_expr`], [`CodeGen::if_true`], [`CodeGen::if_false`],
//! [`CodeGen::code_in`] and [`CodeGen::code_expr_list`], then call
//! [`CodeGen::finish`] to obtain the [`Program`].
//!
//! The layout of a finished program is:
//!
//! ```text
//! 0      Init        -> init section
//! 1..    statement body
//!        Halt
//! init:  hoisted constant expressions
//!        Goto 1
//! ```

use crate::catalog::Catalog;
use crate::config::CompilerConfig;
use crate::error::{CompileError, Result};
use crate::expression::{Expr, NodeId};
use crate::vdbe::{Opcode, Program, ProgramBuilder};
use std::collections::HashMap;
use std::sync::Arc;

pub mod boolean;
pub mod in_op;
pub mod list;
pub mod register;
pub mod scalar;
pub mod select_coder;
pub mod subquery;
pub mod vector;

pub use in_op::{InFlags, InPlan, InStrategy};
pub use list::ListFlags;
pub use select_coder::{ScanSelectCoder, SelectCoder, SelectDest};

/// A constant expression evaluated once in the initialization section.
#[derive(Debug)]
struct HoistedExpr {
    expr: Expr,
    reg: i32,
    /// Only entries placed in a register of their own may be shared
    reusable: bool,
}

/// Code generated once for a sub-select or IN right-hand side and called
/// as a subroutine by later uses of the same node.
#[derive(Debug, Clone, Copy)]
struct Subroutine {
    /// Register holding the return address
    ret_reg: i32,
    /// Entry point for `Gosub`
    addr: i32,
    /// Ephemeral table cursor, or the first result register
    result: i32,
}

/// Where column references with a negative cursor read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfRow {
    /// Column values in consecutive registers starting at the given one,
    /// the rowid in the register before it
    Registers(i32),
    /// Columns of the table open on this cursor
    Cursor(i32),
}

pub struct CodeGen<'a> {
    catalog: &'a Catalog,
    config: CompilerConfig,
    builder: ProgramBuilder,
    /// Highest register allocated so far
    n_mem: i32,
    /// Number of cursors allocated so far
    n_cursor: i32,
    temp_regs: Vec<i32>,
    /// Largest contiguous range released so far, as (first, count)
    temp_range: (i32, i32),
    const_exprs: Vec<HoistedExpr>,
    const_factor: bool,
    init_addr: Option<i32>,
    subroutines: HashMap<NodeId, Subroutine>,
    /// First result register of shared multi-column sub-selects
    select_results: HashMap<usize, i32>,
    select_coder: Option<Arc<dyn SelectCoder>>,
    self_row: Option<SelfRow>,
    in_trigger: bool,
    agg_columns: Vec<i32>,
    agg_functions: Vec<i32>,
    window_results: HashMap<NodeId, i32>,
}

impl<'a> CodeGen<'a> {
    pub fn new(catalog: &'a Catalog, config: CompilerConfig) -> Self {
        let const_factor = config.const_factoring;
        Self {
            catalog,
            config,
            builder: ProgramBuilder::new(),
            n_mem: 0,
            n_cursor: 0,
            temp_regs: Vec::new(),
            temp_range: (0, 0),
            const_exprs: Vec::new(),
            const_factor,
            init_addr: None,
            subroutines: HashMap::new(),
            select_results: HashMap::new(),
            select_coder: Some(Arc::new(ScanSelectCoder)),
            self_row: None,
            in_trigger: false,
            agg_columns: Vec::new(),
            agg_functions: Vec::new(),
            window_results: HashMap::new(),
        }
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn builder(&mut self) -> &mut ProgramBuilder {
        &mut self.builder
    }

    /// Install the compiler used for sub-selects. `None` makes every
    /// sub-select a compile error.
    pub fn set_select_coder(&mut self, coder: Option<Arc<dyn SelectCoder>>) {
        self.select_coder = coder;
    }

    /// Compile column references with a negative cursor against a row
    /// that is not on an ordinary table cursor.
    pub fn set_self_row(&mut self, self_row: Option<SelfRow>) {
        self.self_row = self_row;
    }

    /// Mark the statement as a trigger program, where RAISE() is allowed.
    pub fn set_trigger(&mut self, in_trigger: bool) {
        self.in_trigger = in_trigger;
    }

    /// Registers holding aggregate accumulator values, indexed like the
    /// `index` of aggregate column and aggregate function nodes.
    pub fn set_aggregate_registers(&mut self, columns: Vec<i32>, functions: Vec<i32>) {
        self.agg_columns = columns;
        self.agg_functions = functions;
    }

    /// Register holding the result of the window function call `call`,
    /// computed by the window machinery of the statement compiler.
    pub fn set_window_result(&mut self, call: &Expr, reg: i32) {
        self.window_results.insert(call.id(), reg);
    }

    /// Whether constant expressions may be moved into the initialization
    /// section.
    pub fn const_factor_ok(&self) -> bool {
        self.const_factor
    }

    pub fn set_const_factor(&mut self, enabled: bool) {
        self.const_factor = enabled;
    }

    /// Emit the `Init` instruction that starts every program.
    pub fn begin(&mut self) {
        let addr = self.builder.emit_op2(Opcode::Init, 0, 1);
        self.init_addr = Some(addr);
    }

    /// End the statement body, code the hoisted constants and assemble the
    /// program.
    pub fn finish(mut self) -> Result<Program> {
        self.builder.emit_op0(Opcode::Halt);
        if let Some(init) = self.init_addr {
            self.builder.jump_here(init);
            self.const_factor = false;
            let hoisted = std::mem::take(&mut self.const_exprs);
            log::debug!("coding {} hoisted constant(s)", hoisted.len());
            for entry in &hoisted {
                self.code_expr(&entry.expr, entry.reg)?;
            }
            self.builder.emit_op2(Opcode::Goto, 0, init + 1);
        } else if !self.const_exprs.is_empty() {
            return Err(CompileError::Internal(
                "constants were hoisted but the program has no Init".to_string(),
            ));
        }
        let (n_mem, n_cursor) = (self.n_mem, self.n_cursor);
        self.builder.build(n_mem, n_cursor)
    }

    fn check_height(&self, expr: &Expr) -> Result<()> {
        if expr.height() > self.config.max_expr_depth {
            return Err(CompileError::ExpressionTooDeep {
                max: self.config.max_expr_depth,
            });
        }
        Ok(())
    }
}
