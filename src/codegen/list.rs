//! Evaluation of expression lists into consecutive registers.

use crate::codegen::CodeGen;
use crate::error::Result;
use crate::expression::ExprList;
use crate::vdbe::Opcode;
use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ListFlags: u8 {
        /// Deep copies instead of shallow ones
        const DUP = 0x01;
        /// Hoist constant items into the initialization section
        const FACTOR = 0x02;
        /// Items that refer to a result column are copied from it
        const REF = 0x04;
        /// With REF, skip such items entirely
        const OMIT_REF = 0x08;
    }
}

impl<'a> CodeGen<'a> {
    /// Evaluate every item of `list` into `target`, `target + 1`, ...
    ///
    /// With [`ListFlags::REF`], an item whose `order_by_col` is `j > 0` is
    /// copied from register `src_reg + j - 1` instead. Returns the number
    /// of registers filled.
    pub fn code_expr_list(
        &mut self,
        list: &ExprList,
        target: i32,
        src_reg: i32,
        mut flags: ListFlags,
    ) -> Result<usize> {
        let copy_op = if flags.contains(ListFlags::DUP) {
            Opcode::Copy
        } else {
            Opcode::SCopy
        };
        if !self.const_factor {
            flags.remove(ListFlags::FACTOR);
        }

        let mut n = 0;
        for item in list.items() {
            let dest = target + n as i32;
            let j = item.order_by_col as i32;
            if flags.contains(ListFlags::REF) && j > 0 {
                if flags.contains(ListFlags::OMIT_REF) {
                    continue;
                }
                self.builder.emit_op2(copy_op, src_reg + j - 1, dest);
            } else if flags.contains(ListFlags::FACTOR) && item.expr.is_constant_not_join() {
                self.code_at_init(&item.expr, Some(dest));
            } else {
                let reg = self.code_target(&item.expr, dest)?;
                if reg != dest {
                    self.emit_list_copy(copy_op, reg, dest);
                }
            }
            n += 1;
        }
        Ok(n)
    }

    /// Copy `from` into `to`, widening the previous Copy when the two
    /// are adjacent.
    fn emit_list_copy(&mut self, copy_op: Opcode, from: i32, to: i32) {
        if copy_op == Opcode::Copy {
            if let Some(last) = self.builder.last_op() {
                if last.opcode == Opcode::Copy
                    && last.p1 + last.p3 + 1 == from
                    && last.p2 + last.p3 + 1 == to
                {
                    let (addr, p3) = (self.builder.current_addr() - 1, last.p3 + 1);
                    self.builder.change_p3(addr, p3);
                    return;
                }
            }
        }
        self.builder.emit_op2(copy_op, from, to);
    }
}
