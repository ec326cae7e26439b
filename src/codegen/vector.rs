//! Row value comparisons, `(a, b) < (c, d)`.

use crate::codegen::CodeGen;
use crate::error::{CompileError, Result};
use crate::expression::{Expr, ExprKind};
use crate::vdbe::{CmpFlags, Opcode, P4};

impl<'a> CodeGen<'a> {
    /// Base register of a row value operand that must be computed as a
    /// whole before its fields can be read, 0 otherwise.
    fn vector_base(&mut self, expr: &Expr) -> Result<i32> {
        match expr.kind() {
            ExprKind::Subquery(_) => self.code_subselect(expr),
            _ => Ok(0),
        }
    }

    /// Register and expression for field `i` of a row value.
    fn vector_register<'e>(
        &mut self,
        vector: &'e Expr,
        i: usize,
        base: i32,
    ) -> Result<(i32, &'e Expr, Option<i32>)> {
        match vector.kind() {
            ExprKind::Register { reg, .. } => Ok((reg + i as i32, vector.vector_field(i), None)),
            ExprKind::Subquery(_) => Ok((base + i as i32, vector.vector_field(i), None)),
            _ => {
                let field = vector.vector_field(i);
                let (reg, free) = self.code_temp(field)?;
                Ok((reg, field, Some(reg).filter(|_| free.is_some())))
            }
        }
    }

    /// Compare two row values field by field, storing 1, 0 or NULL into
    /// `dest`. `opcode` is Eq, Ne, Lt, Le, Gt or Ge; `flags` may carry
    /// [`CmpFlags::NULLEQ`] for IS and IS NOT.
    pub(crate) fn code_vector_compare(
        &mut self,
        left: &Expr,
        right: &Expr,
        opcode: Opcode,
        flags: CmpFlags,
        dest: i32,
    ) -> Result<()> {
        let n = left.vector_size();
        if n != right.vector_size() {
            return Err(CompileError::RowValueMisused);
        }
        let done = self.builder.emit_label();
        let mut flags = flags | CmpFlags::STOREP2;
        // Earlier fields decide with a strict compare, only the last field
        // uses the original operator.
        let mut op = match opcode {
            Opcode::Le => Opcode::Lt,
            Opcode::Ge => Opcode::Gt,
            other => other,
        };

        let left_base = self.vector_base(left)?;
        let right_base = self.vector_base(right)?;

        for i in 0..n {
            let (r1, l, free1) = self.vector_register(left, i, left_base)?;
            let (r2, r, free2) = self.vector_register(right, i, right_base)?;
            self.code_compare(l, r, op, r1, r2, dest, flags)?;
            self.release(free1);
            self.release(free2);
            if i == n - 1 {
                break;
            }
            match op {
                Opcode::Eq => {
                    self.builder
                        .emit_jump_to_label(Opcode::IfNot, dest, 0, done, P4::None, 0);
                    flags |= CmpFlags::KEEPNULL;
                }
                Opcode::Ne => {
                    self.builder
                        .emit_jump_to_label(Opcode::If, dest, 0, done, P4::None, 0);
                    flags |= CmpFlags::KEEPNULL;
                }
                _ => {
                    self.builder
                        .emit_jump_to_label(Opcode::ElseNotEq, 0, 0, done, P4::None, 0);
                    if i == n - 2 {
                        op = opcode;
                    }
                }
            }
        }
        self.builder.resolve_label(done);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::Catalog;
    use crate::codegen::CodeGen;
    use crate::config::CompilerConfig;
    use crate::error::CompileError;
    use crate::expression::Expr;
    use crate::types::Value;
    use crate::vdbe::{Machine, MemoryStore, Opcode};

    fn eval(expr: &Expr) -> anyhow::Result<Value> {
        let catalog = Catalog::new();
        let mut cg = CodeGen::new(&catalog, CompilerConfig::default());
        cg.begin();
        let target = cg.alloc_reg();
        cg.code_expr(expr, target)?;
        cg.builder().emit_op2(Opcode::ResultRow, target, 1);
        let program = cg.finish()?;
        let store = MemoryStore::new();
        let mut rows = Machine::new(&program, &catalog, &store).run()?;
        Ok(rows.remove(0).remove(0))
    }

    fn row(values: &[Option<i64>]) -> Expr {
        Expr::vector(
            values
                .iter()
                .map(|v| v.map_or_else(Expr::null, Expr::integer))
                .collect(),
        )
    }

    #[test]
    fn test_lexicographic_ordering() -> anyhow::Result<()> {
        let a = row(&[Some(1), Some(2)]);
        let b = row(&[Some(1), Some(3)]);
        assert_eq!(eval(&Expr::lt(a.clone(), b.clone()))?, Value::Integer(1));
        assert_eq!(eval(&Expr::ge(a.clone(), b.clone()))?, Value::Integer(0));
        assert_eq!(eval(&Expr::le(a.clone(), a.clone()))?, Value::Integer(1));
        assert_eq!(eval(&Expr::gt(b, a))?, Value::Integer(1));
        Ok(())
    }

    #[test]
    fn test_null_fields() -> anyhow::Result<()> {
        // Decided before the NULL is reached
        let e = Expr::lt(row(&[Some(1), None]), row(&[Some(2), Some(0)]));
        assert_eq!(eval(&e)?, Value::Integer(1));
        let e = Expr::eq(row(&[None, Some(1)]), row(&[Some(2), Some(3)]));
        assert_eq!(eval(&e)?, Value::Integer(0));
        // Undecided
        let e = Expr::lt(row(&[Some(1), Some(2)]), row(&[Some(1), None]));
        assert_eq!(eval(&e)?, Value::Null);
        let e = Expr::eq(row(&[None, Some(3)]), row(&[Some(2), Some(3)]));
        assert_eq!(eval(&e)?, Value::Null);
        let e = Expr::ne(row(&[None, Some(3)]), row(&[Some(2), Some(4)]));
        assert_eq!(eval(&e)?, Value::Integer(1));
        Ok(())
    }

    #[test]
    fn test_is_compares_nulls_equal() -> anyhow::Result<()> {
        let e = Expr::is(row(&[None, Some(1)]), row(&[None, Some(1)]));
        assert_eq!(eval(&e)?, Value::Integer(1));
        let e = Expr::is_not(row(&[None, Some(1)]), row(&[Some(1), Some(1)]));
        assert_eq!(eval(&e)?, Value::Integer(1));
        Ok(())
    }

    #[test]
    fn test_size_mismatch() {
        let catalog = Catalog::new();
        let mut cg = CodeGen::new(&catalog, CompilerConfig::default());
        cg.begin();
        let e = Expr::eq(row(&[Some(1), Some(2)]), row(&[Some(1), Some(2), Some(3)]));
        assert_eq!(cg.code_target(&e, 1), Err(CompileError::RowValueMisused));
        let e = Expr::eq(row(&[Some(1), Some(2)]), Expr::integer(1));
        assert_eq!(cg.code_target(&e, 1), Err(CompileError::RowValueMisused));
    }
}
