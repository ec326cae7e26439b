//! Scalar and EXISTS sub-selects.
//!
//! An uncorrelated sub-select runs at most once per statement execution.
//! Its code is wrapped as a subroutine so that a second use of the same
//! node only emits a `Gosub`:
//!
//! ```text
//!        Integer  <addr of Return>  ret
//! entry: Once     -> skip
//!        ... sub-select ...
//! skip:  Return   ret
//! ```

use crate::codegen::{CodeGen, SelectDest, Subroutine};
use crate::error::{CompileError, Result};
use crate::expression::{Expr, ExprFlags, ExprKind};
use crate::vdbe::Opcode;
use std::sync::Arc;

impl<'a> CodeGen<'a> {
    /// Emit the prologue of a run-once subroutine. Returns the return
    /// register, the address of the `Integer` that loads it and the
    /// address of the `Once`, which is also the entry point.
    pub(crate) fn begin_subroutine(&mut self) -> (i32, i32, i32) {
        let ret_reg = self.alloc_reg();
        let load = self.builder.emit_op2(Opcode::Integer, 0, ret_reg);
        let once = self.builder.emit_op0(Opcode::Once);
        (ret_reg, load, once)
    }

    /// Close a subroutine opened with [`CodeGen::begin_subroutine`].
    pub(crate) fn end_subroutine(&mut self, ret_reg: i32, load: i32) {
        let ret = self.builder.emit_op1(Opcode::Return, ret_reg);
        // Falling through the first time returns to the instruction after
        // the Return
        self.builder.change_p1(load, ret);
    }

    /// Run a scalar sub-query or EXISTS and return the register holding
    /// the result: the first column of a sub-query, 1 or 0 for EXISTS.
    /// A sub-query with no rows yields NULLs.
    pub fn code_subselect(&mut self, expr: &Expr) -> Result<i32> {
        let (select, exists) = match expr.kind() {
            ExprKind::Subquery(select) => (select, false),
            ExprKind::Exists(select) => (select, true),
            _ => {
                return Err(CompileError::Internal(format!(
                    "not a sub-select: {}",
                    expr
                )))
            }
        };

        let mut routine = None;
        if !expr.has_flag(ExprFlags::VAR_SELECT) {
            if let Some(sub) = self.subroutines.get(&expr.id()).copied() {
                self.builder.emit_op2(Opcode::Gosub, sub.ret_reg, sub.addr);
                return Ok(sub.result);
            }
            routine = Some(self.begin_subroutine());
        }

        let n = if exists { 1 } else { select.columns.len() as i32 };
        let base = self.alloc_regs(n);
        let dest = if exists {
            self.builder.emit_op2(Opcode::Integer, 0, base);
            SelectDest::Exists { reg: base }
        } else {
            self.builder.emit_op3(Opcode::Null, 0, base, base + n - 1);
            SelectDest::Mem { base }
        };
        let coder = self.select_coder.clone().ok_or(CompileError::NoSelectCoder)?;
        log::debug!("coding sub-select {:?} into r{}", select.id(), base);
        coder.code_select(self, select, dest)?;

        if let Some((ret_reg, load, once)) = routine {
            self.builder.jump_here(once);
            self.end_subroutine(ret_reg, load);
            // Temps used by the body are live again whenever a later Gosub
            // runs it
            self.clear_temp_cache();
            self.subroutines.insert(
                expr.id(),
                Subroutine {
                    ret_reg,
                    addr: once,
                    result: base,
                },
            );
        }
        Ok(base)
    }

    /// Column `column` of a multi-column sub-query. Every column of the
    /// sub-query is computed by the first reference.
    pub(crate) fn code_select_column(
        &mut self,
        subquery: &Arc<Expr>,
        column: usize,
        expected: usize,
    ) -> Result<i32> {
        let n = subquery.vector_size();
        if expected != 0 && expected != n {
            return Err(CompileError::VectorAssignment {
                columns: expected,
                values: n,
            });
        }
        let key = Arc::as_ptr(subquery) as usize;
        let base = match self.select_results.get(&key) {
            Some(&base) => base,
            None => {
                let base = self.code_subselect(subquery)?;
                self.select_results.insert(key, base);
                base
            }
        };
        Ok(base + column as i32)
    }
}
