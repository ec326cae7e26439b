//! Conditional jumps: branch on the truth of an expression without
//! materializing its value.
//!
//! `jump_if_null` selects where a NULL outcome goes. When set, a NULL
//! behaves like the outcome that takes the jump; otherwise it falls
//! through.

use crate::codegen::scalar::comparison_opcode;
use crate::codegen::CodeGen;
use crate::error::Result;
use crate::expression::{BinaryOperator, Expr, ExprKind, UnaryOperator};
use crate::vdbe::{CmpFlags, Label, Opcode, P4};

/// Drop the operand of AND/OR that a literal makes irrelevant. Returns
/// the expression to code in place of `expr`.
pub(crate) fn simplified_and_or(expr: &Expr) -> &Expr {
    let ExprKind::Binary { op, left, right } = expr.kind() else {
        return expr;
    };
    match op {
        BinaryOperator::And => {
            if left.is_always_true() || right.is_always_false() {
                right
            } else if right.is_always_true() || left.is_always_false() {
                left
            } else {
                expr
            }
        }
        BinaryOperator::Or => {
            if left.is_always_true() || right.is_always_false() {
                left
            } else if right.is_always_true() || left.is_always_false() {
                right
            } else {
                expr
            }
        }
        _ => expr,
    }
}

fn null_flag(jump_if_null: bool) -> CmpFlags {
    if jump_if_null {
        CmpFlags::JUMPIFNULL
    } else {
        CmpFlags::empty()
    }
}

impl<'a> CodeGen<'a> {
    /// Jump to `dest` if `expr` is true, fall through if it is false.
    pub fn if_true(&mut self, expr: &Expr, dest: Label, jump_if_null: bool) -> Result<()> {
        self.jump_if_true(expr, dest, null_flag(jump_if_null))
    }

    /// Jump to `dest` if `expr` is false, fall through if it is true.
    pub fn if_false(&mut self, expr: &Expr, dest: Label, jump_if_null: bool) -> Result<()> {
        self.jump_if_false(expr, dest, null_flag(jump_if_null))
    }

    pub(crate) fn jump_if_true(&mut self, expr: &Expr, dest: Label, jin: CmpFlags) -> Result<()> {
        self.check_height(expr)?;
        let expr = simplified_and_or(expr);
        match expr.kind() {
            ExprKind::Binary {
                op: BinaryOperator::And,
                left,
                right,
            } => {
                let skip = self.builder.emit_label();
                self.jump_if_false(left, skip, jin ^ CmpFlags::JUMPIFNULL)?;
                self.jump_if_true(right, dest, jin)?;
                self.builder.resolve_label(skip);
                Ok(())
            }
            ExprKind::Binary {
                op: BinaryOperator::Or,
                left,
                right,
            } => {
                self.jump_if_true(left, dest, jin)?;
                self.jump_if_true(right, dest, jin)
            }
            ExprKind::Unary {
                op: UnaryOperator::Not,
                operand,
            } => self.jump_if_false(operand, dest, jin),
            ExprKind::Unary { op, operand } if op.truth_test().is_some() => {
                let (is_true, negated) = op.truth_test().unwrap_or((true, false));
                if is_true != negated {
                    self.jump_if_true(operand, dest, null_flag(negated))
                } else {
                    self.jump_if_false(operand, dest, null_flag(negated))
                }
            }
            ExprKind::Unary {
                op: op @ (UnaryOperator::IsNull | UnaryOperator::NotNull),
                operand,
            } => {
                let opcode = if *op == UnaryOperator::IsNull {
                    Opcode::IsNull
                } else {
                    Opcode::NotNull
                };
                self.jump_on_null(opcode, operand, dest)
            }
            ExprKind::Binary { op, left, right }
                if comparison_opcode(*op).is_some() && !left.is_vector() && !right.is_vector() =>
            {
                let (opcode, flags) = match op {
                    BinaryOperator::Is => (Opcode::Eq, CmpFlags::NULLEQ),
                    BinaryOperator::IsNot => (Opcode::Ne, CmpFlags::NULLEQ),
                    _ => (comparison_opcode(*op).unwrap_or(Opcode::Eq), jin),
                };
                self.jump_compare(left, right, opcode, dest, flags)
            }
            ExprKind::Between { .. } => self.code_between_jump(expr, dest, jin, true),
            ExprKind::In { .. } => {
                let if_false = self.builder.emit_label();
                let if_null = if jin.contains(CmpFlags::JUMPIFNULL) {
                    dest
                } else {
                    if_false
                };
                self.code_in(expr, if_false, if_null)?;
                self.builder.emit_goto(dest);
                self.builder.resolve_label(if_false);
                Ok(())
            }
            _ => {
                if expr.is_always_true() {
                    self.builder.emit_goto(dest);
                } else if !expr.is_always_false() {
                    let (r1, free1) = self.code_temp(expr)?;
                    self.builder.emit_jump_to_label(
                        Opcode::If,
                        r1,
                        jin.contains(CmpFlags::JUMPIFNULL) as i32,
                        dest,
                        P4::None,
                        0,
                    );
                    self.release(free1);
                }
                Ok(())
            }
        }
    }

    pub(crate) fn jump_if_false(&mut self, expr: &Expr, dest: Label, jin: CmpFlags) -> Result<()> {
        self.check_height(expr)?;
        let expr = simplified_and_or(expr);
        match expr.kind() {
            ExprKind::Binary {
                op: BinaryOperator::And,
                left,
                right,
            } => {
                self.jump_if_false(left, dest, jin)?;
                self.jump_if_false(right, dest, jin)
            }
            ExprKind::Binary {
                op: BinaryOperator::Or,
                left,
                right,
            } => {
                let skip = self.builder.emit_label();
                self.jump_if_true(left, skip, jin ^ CmpFlags::JUMPIFNULL)?;
                self.jump_if_false(right, dest, jin)?;
                self.builder.resolve_label(skip);
                Ok(())
            }
            ExprKind::Unary {
                op: UnaryOperator::Not,
                operand,
            } => self.jump_if_true(operand, dest, jin),
            ExprKind::Unary { op, operand } if op.truth_test().is_some() => {
                let (is_true, negated) = op.truth_test().unwrap_or((true, false));
                if is_true != negated {
                    self.jump_if_false(operand, dest, null_flag(!negated))
                } else {
                    self.jump_if_true(operand, dest, null_flag(!negated))
                }
            }
            ExprKind::Unary {
                op: op @ (UnaryOperator::IsNull | UnaryOperator::NotNull),
                operand,
            } => {
                let opcode = if *op == UnaryOperator::IsNull {
                    Opcode::NotNull
                } else {
                    Opcode::IsNull
                };
                self.jump_on_null(opcode, operand, dest)
            }
            ExprKind::Binary { op, left, right }
                if comparison_opcode(*op).is_some() && !left.is_vector() && !right.is_vector() =>
            {
                let (opcode, flags) = match op {
                    BinaryOperator::Is => (Opcode::Ne, CmpFlags::NULLEQ),
                    BinaryOperator::IsNot => (Opcode::Eq, CmpFlags::NULLEQ),
                    _ => {
                        let opcode = comparison_opcode(*op).unwrap_or(Opcode::Eq);
                        (opcode.negate_comparison().unwrap_or(opcode), jin)
                    }
                };
                self.jump_compare(left, right, opcode, dest, flags)
            }
            ExprKind::Between { .. } => self.code_between_jump(expr, dest, jin, false),
            ExprKind::In { .. } => {
                if jin.contains(CmpFlags::JUMPIFNULL) {
                    self.code_in(expr, dest, dest)
                } else {
                    let if_null = self.builder.emit_label();
                    self.code_in(expr, dest, if_null)?;
                    self.builder.resolve_label(if_null);
                    Ok(())
                }
            }
            _ => {
                if expr.is_always_false() {
                    self.builder.emit_goto(dest);
                } else if !expr.is_always_true() {
                    let (r1, free1) = self.code_temp(expr)?;
                    self.builder.emit_jump_to_label(
                        Opcode::IfNot,
                        r1,
                        jin.contains(CmpFlags::JUMPIFNULL) as i32,
                        dest,
                        P4::None,
                        0,
                    );
                    self.release(free1);
                }
                Ok(())
            }
        }
    }

    fn jump_on_null(&mut self, opcode: Opcode, operand: &Expr, dest: Label) -> Result<()> {
        let (r1, free1) = self.code_temp(operand)?;
        self.builder
            .emit_jump_to_label(opcode, r1, 0, dest, P4::None, 0);
        self.release(free1);
        Ok(())
    }

    fn jump_compare(
        &mut self,
        left: &Expr,
        right: &Expr,
        opcode: Opcode,
        dest: Label,
        flags: CmpFlags,
    ) -> Result<()> {
        let (r1, free1) = self.code_temp(left)?;
        let (r2, free2) = self.code_temp(right)?;
        let (p4, p5) = self.compare_operands(left, right, flags)?;
        self.builder
            .emit_jump_to_label(opcode, r1, r2, dest, p4, p5.bits());
        self.release(free1);
        self.release(free2);
        Ok(())
    }

    /// `x BETWEEN low AND high` as `x >= low AND x <= high` with `x`
    /// evaluated once.
    fn between_as_and(&mut self, expr: &Expr) -> Result<(Expr, Option<i32>)> {
        let ExprKind::Between { operand, low, high } = expr.kind() else {
            return Ok((expr.clone(), None));
        };
        let (reg, free) = self.code_vector(operand)?;
        let x = Expr::register(reg, operand.as_ref().clone());
        let and = Expr::and(
            Expr::ge(x.clone(), low.as_ref().clone()),
            Expr::le(x, high.as_ref().clone()),
        );
        Ok((and, free))
    }

    pub(crate) fn code_between_value(&mut self, expr: &Expr, target: i32) -> Result<()> {
        let (and, free) = self.between_as_and(expr)?;
        self.code_expr(&and, target)?;
        self.release(free);
        Ok(())
    }

    fn code_between_jump(
        &mut self,
        expr: &Expr,
        dest: Label,
        jin: CmpFlags,
        jump_if_true: bool,
    ) -> Result<()> {
        let (and, free) = self.between_as_and(expr)?;
        if jump_if_true {
            self.jump_if_true(&and, dest, jin)?;
        } else {
            self.jump_if_false(&and, dest, jin)?;
        }
        self.release(free);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::CompilerConfig;
    use crate::types::Value;
    use crate::vdbe::{Machine, MemoryStore};

    /// Outcome of branching on `expr`: 1 when the jump was taken.
    fn branch(expr: &Expr, jump_if_true: bool, jump_if_null: bool) -> anyhow::Result<Value> {
        let catalog = Catalog::new();
        let mut cg = CodeGen::new(&catalog, CompilerConfig::default());
        cg.begin();
        let out = cg.alloc_reg();
        let taken = cg.builder().emit_label();
        let done = cg.builder().emit_label();
        if jump_if_true {
            cg.if_true(expr, taken, jump_if_null)?;
        } else {
            cg.if_false(expr, taken, jump_if_null)?;
        }
        cg.builder().emit_op2(Opcode::Integer, 0, out);
        cg.builder().emit_goto(done);
        cg.builder().resolve_label(taken);
        cg.builder().emit_op2(Opcode::Integer, 1, out);
        cg.builder().resolve_label(done);
        cg.builder().emit_op2(Opcode::ResultRow, out, 1);
        let program = cg.finish()?;
        let store = MemoryStore::new();
        let mut rows = Machine::new(&program, &catalog, &store).run()?;
        Ok(rows.remove(0).remove(0))
    }

    #[test]
    fn test_simplified_and_or() {
        let x = Expr::variable(1);
        let and = Expr::and(Expr::boolean(true), x.clone());
        assert!(matches!(simplified_and_or(&and).kind(), ExprKind::Variable { .. }));
        let or = Expr::or(x.clone(), Expr::boolean(true));
        assert!(simplified_and_or(&or).is_always_true());
        let and = Expr::and(x.clone(), Expr::integer(0));
        assert!(simplified_and_or(&and).is_always_false());
        let plain = Expr::and(x.clone(), x);
        assert!(std::ptr::eq(simplified_and_or(&plain), &plain));
    }

    #[test]
    fn test_null_routing() -> anyhow::Result<()> {
        let unknown = Expr::eq(Expr::integer(1), Expr::null());
        assert_eq!(branch(&unknown, true, false)?, Value::Integer(0));
        assert_eq!(branch(&unknown, true, true)?, Value::Integer(1));
        assert_eq!(branch(&unknown, false, false)?, Value::Integer(0));
        assert_eq!(branch(&unknown, false, true)?, Value::Integer(1));
        Ok(())
    }

    #[test]
    fn test_and_or_three_valued() -> anyhow::Result<()> {
        // NULL AND 0 is false, NULL OR 1 is true
        let e = Expr::and(Expr::eq(Expr::integer(1), Expr::null()), Expr::lt(Expr::integer(2), Expr::integer(1)));
        assert_eq!(branch(&e, false, false)?, Value::Integer(1));
        let e = Expr::or(Expr::eq(Expr::integer(1), Expr::null()), Expr::lt(Expr::integer(1), Expr::integer(2)));
        assert_eq!(branch(&e, true, false)?, Value::Integer(1));
        // NULL AND 1 is NULL
        let e = Expr::and(Expr::eq(Expr::integer(1), Expr::null()), Expr::lt(Expr::integer(1), Expr::integer(2)));
        assert_eq!(branch(&e, true, false)?, Value::Integer(0));
        assert_eq!(branch(&e, false, false)?, Value::Integer(0));
        assert_eq!(branch(&e, false, true)?, Value::Integer(1));
        Ok(())
    }

    #[test]
    fn test_is_and_truth_operators() -> anyhow::Result<()> {
        let e = Expr::is(Expr::null(), Expr::null());
        assert_eq!(branch(&e, true, false)?, Value::Integer(1));
        let e = Expr::is_not(Expr::integer(1), Expr::null());
        assert_eq!(branch(&e, false, false)?, Value::Integer(0));
        let e = Expr::unary(UnaryOperator::IsNotTrue, Expr::null());
        assert_eq!(branch(&e, true, false)?, Value::Integer(1));
        let e = Expr::unary(UnaryOperator::IsFalse, Expr::null());
        assert_eq!(branch(&e, true, true)?, Value::Integer(0));
        assert_eq!(branch(&e, false, false)?, Value::Integer(1));
        Ok(())
    }

    #[test]
    fn test_literal_shortcuts() -> anyhow::Result<()> {
        assert_eq!(branch(&Expr::boolean(true), true, false)?, Value::Integer(1));
        assert_eq!(branch(&Expr::integer(0), true, false)?, Value::Integer(0));
        assert_eq!(branch(&Expr::integer(0), false, false)?, Value::Integer(1));
        let e = Expr::not(Expr::is_null(Expr::null()));
        assert_eq!(branch(&e, true, false)?, Value::Integer(0));
        Ok(())
    }

    #[test]
    fn test_between_jumps() -> anyhow::Result<()> {
        let e = Expr::between(Expr::integer(3), Expr::integer(1), Expr::integer(5));
        assert_eq!(branch(&e, true, false)?, Value::Integer(1));
        let e = Expr::not_between(Expr::integer(3), Expr::integer(1), Expr::integer(5));
        assert_eq!(branch(&e, true, false)?, Value::Integer(0));
        Ok(())
    }
}
