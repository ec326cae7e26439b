//! The seam between expression code generation and SELECT compilation.
//!
//! Sub-selects inside expressions are compiled by a [`SelectCoder`]
//! installed on the [`CodeGen`]. A full statement compiler provides its own;
//! [`ScanSelectCoder`] handles the simple shapes that show up as IN lists
//! and scalar sub-queries: at most one table, an optional WHERE clause and
//! compound arms.

use crate::codegen::{CodeGen, ListFlags};
use crate::error::{CompileError, Result};
use crate::expression::{Select, SelectFlags};
use crate::vdbe::{Label, Opcode, P4};

/// Where the rows of a sub-select go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectDest {
    /// Insert each row as a key into the ephemeral table on `cursor`,
    /// applying `affinity` first
    Set { cursor: i32, affinity: String },
    /// Store the first row into consecutive registers starting at `base`
    Mem { base: i32 },
    /// Set `reg` to 1 if there is at least one row
    Exists { reg: i32 },
}

pub trait SelectCoder {
    /// Emit code that runs `select` and delivers its rows to `dest`.
    fn code_select(&self, cg: &mut CodeGen<'_>, select: &Select, dest: SelectDest) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ScanSelectCoder;

impl SelectCoder for ScanSelectCoder {
    fn code_select(&self, cg: &mut CodeGen<'_>, select: &Select, dest: SelectDest) -> Result<()> {
        let end = cg.builder().emit_label();
        let mut arms = Vec::new();
        let mut arm = Some(select);
        while let Some(s) = arm {
            arms.push(s);
            arm = s.prior.as_deref();
        }
        // The prior arm is the left operand and runs first
        for arm in arms.into_iter().rev() {
            code_arm(cg, arm, &dest, end)?;
        }
        cg.builder().resolve_label(end);
        Ok(())
    }
}

fn code_arm(cg: &mut CodeGen<'_>, select: &Select, dest: &SelectDest, end: Label) -> Result<()> {
    if select.flags.contains(SelectFlags::AGGREGATE) || select.group_by.is_some() {
        return Err(CompileError::Internal(
            "aggregate sub-selects need a statement compiler".to_string(),
        ));
    }
    if select.limit.is_some() {
        return Err(CompileError::Internal(
            "LIMIT in a sub-select needs a statement compiler".to_string(),
        ));
    }

    let next = cg.builder().emit_label();
    match select.from.as_slice() {
        [] => {
            if let Some(predicate) = &select.where_clause {
                cg.if_false(predicate, next, true)?;
            }
            code_row(cg, select, dest, end)?;
            cg.builder().resolve_label(next);
        }
        [item] => {
            cg.note_cursor(item.cursor);
            cg.builder()
                .emit_op4(Opcode::OpenRead, item.cursor, 0, 0, P4::Table(item.table.clone()));
            let done = cg.builder().emit_label();
            cg.builder()
                .emit_jump_to_label(Opcode::Rewind, item.cursor, 0, done, P4::None, 0);
            let top = cg.builder().current_addr();
            if let Some(predicate) = &select.where_clause {
                cg.if_false(predicate, next, true)?;
            }
            code_row(cg, select, dest, end)?;
            cg.builder().resolve_label(next);
            cg.builder().emit_op2(Opcode::Next, item.cursor, top);
            cg.builder().resolve_label(done);
        }
        _ => {
            return Err(CompileError::Internal(
                "joins in a sub-select need a statement compiler".to_string(),
            ))
        }
    }
    Ok(())
}

fn code_row(cg: &mut CodeGen<'_>, select: &Select, dest: &SelectDest, end: Label) -> Result<()> {
    let n = select.columns.len() as i32;
    match dest {
        SelectDest::Set { cursor, affinity } => {
            let first = cg.get_temp_range(n);
            cg.code_expr_list(&select.columns, first, 0, ListFlags::empty())?;
            let record = cg.get_temp();
            cg.builder().emit_op4(
                Opcode::MakeRecord,
                first,
                n,
                record,
                P4::Affinity(affinity.clone()),
            );
            cg.builder().emit_op2(Opcode::IdxInsert, *cursor, record);
            cg.release_temp(record);
            cg.release_temp_range(first, n);
        }
        SelectDest::Mem { base } => {
            cg.code_expr_list(&select.columns, *base, 0, ListFlags::empty())?;
            cg.builder().emit_goto(end);
        }
        SelectDest::Exists { reg } => {
            cg.builder().emit_op2(Opcode::Integer, 1, *reg);
            cg.builder().emit_goto(end);
        }
    }
    Ok(())
}
