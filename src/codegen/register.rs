//! Register and cursor allocation, the scratch register pool and the
//! constant hoisting cache.

use crate::codegen::{CodeGen, HoistedExpr};
use crate::expression::{compare, Expr, ExprMatch};

impl<'a> CodeGen<'a> {
    /// Allocate a register for the lifetime of the statement.
    pub fn alloc_reg(&mut self) -> i32 {
        self.n_mem += 1;
        self.n_mem
    }

    /// Allocate `n` consecutive registers and return the first.
    pub fn alloc_regs(&mut self, n: i32) -> i32 {
        let first = self.n_mem + 1;
        self.n_mem += n;
        first
    }

    pub fn alloc_cursor(&mut self) -> i32 {
        self.n_cursor += 1;
        self.n_cursor - 1
    }

    /// Record that `cursor` is used by code generated elsewhere.
    pub fn note_cursor(&mut self, cursor: i32) {
        self.n_cursor = self.n_cursor.max(cursor + 1);
    }

    pub fn n_mem(&self) -> i32 {
        self.n_mem
    }

    /// A scratch register, from the free-list when possible.
    pub fn get_temp(&mut self) -> i32 {
        match self.temp_regs.pop() {
            Some(reg) => reg,
            None => self.alloc_reg(),
        }
    }

    /// Return a scratch register. Register 0 is ignored. When the
    /// free-list is full the register is simply not reused.
    pub fn release_temp(&mut self, reg: i32) {
        if reg != 0 && self.temp_regs.len() < self.config.temp_register_pool {
            self.temp_regs.push(reg);
        }
    }

    pub fn get_temp_range(&mut self, n: i32) -> i32 {
        if n == 1 {
            return self.get_temp();
        }
        let (first, count) = self.temp_range;
        if n <= count {
            self.temp_range = (first + n, count - n);
            first
        } else {
            self.alloc_regs(n)
        }
    }

    /// Return a range; only the largest released range is remembered.
    pub fn release_temp_range(&mut self, first: i32, n: i32) {
        if n == 1 {
            self.release_temp(first);
            return;
        }
        if n > self.temp_range.1 {
            self.temp_range = (first, n);
        }
    }

    /// Forget every pooled register, e.g. before code that other code
    /// jumps into.
    pub fn clear_temp_cache(&mut self) {
        self.temp_regs.clear();
        self.temp_range = (0, 0);
    }

    /// Arrange for `expr` to be evaluated once in the initialization
    /// section and return the register that holds its value.
    ///
    /// With no `target`, a structurally equal expression hoisted earlier
    /// without a target of its own is reused.
    pub fn code_at_init(&mut self, expr: &Expr, target: Option<i32>) -> i32 {
        if target.is_none() {
            if let Some(entry) = self
                .const_exprs
                .iter()
                .find(|e| e.reusable && compare(&e.expr, expr, None) == ExprMatch::Equal)
            {
                log::trace!("reusing hoisted constant in r{} for {}", entry.reg, expr);
                return entry.reg;
            }
        }
        let reg = match target {
            Some(reg) => reg,
            None => self.alloc_reg(),
        };
        log::trace!("hoisting {} into r{}", expr, reg);
        self.const_exprs.push(HoistedExpr {
            expr: expr.clone(),
            reg,
            reusable: target.is_none(),
        });
        reg
    }
}
