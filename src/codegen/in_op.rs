//! The IN operator.
//!
//! Planning picks the structure the right-hand side is probed through:
//! the rowid of a table, an existing index, an ephemeral table filled from
//! the list or sub-select, or no table at all for short literal lists,
//! which are compared one item at a time.
//!
//! Membership code distinguishes three outcomes. The result is TRUE when
//! the probe finds the left-hand side. Otherwise it is NULL when the
//! left-hand side has a NULL field or the right-hand side holds a NULL
//! that could have matched, and FALSE in every other case.

use crate::catalog::{CollSeq, IndexInfo, TableInfo, ROWID_COLUMN};
use crate::codegen::{CodeGen, SelectDest, Subroutine};
use crate::error::{CompileError, Result};
use crate::expression::typing::resolve_collation;
use crate::expression::{
    binary_compare_collation, collation_of, in_affinity, Expr, ExprFlags, ExprKind, InRhs,
    Select, SelectFlags,
};
use crate::types::Affinity;
use crate::vdbe::{CmpFlags, Label, Opcode, P4};
use bitflags::bitflags;
use std::sync::Arc;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InFlags: u8 {
        /// The caller can handle [`InStrategy::NoTable`]
        const NOOP_OK = 0x01;
        /// The structure is probed for membership
        const MEMBERSHIP = 0x02;
        /// The structure is iterated to drive a loop, so it must not
        /// contain duplicates
        const LOOP = 0x04;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InStrategy {
    /// Compare against each list item in turn
    NoTable,
    /// Seek the rowid of the sub-select's table
    UseRowidTable,
    /// Probe an index of the sub-select's table
    UseExistingIndex,
    /// Probe a transient table holding the right-hand side
    UseEphemeralTable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InPlan {
    pub strategy: InStrategy,
    /// Cursor on the probed structure
    pub cursor: i32,
    /// Register set to NULL when the structure's first key is NULL, for
    /// callers that asked for it
    pub rhs_has_null: Option<i32>,
    /// The right-hand side provably holds no NULL
    pub rhs_not_null: bool,
    /// Key column of the structure that each left-hand field is compared
    /// with
    pub map: Vec<usize>,
}

impl InPlan {
    fn is_identity(&self) -> bool {
        self.map.iter().enumerate().all(|(i, &j)| i == j)
    }
}

/// The table and result column numbers of a sub-select that can be
/// answered from the table itself: a plain single-table projection of
/// columns.
fn lookup_candidate(in_expr: &Expr, select: &Select) -> Option<(Arc<TableInfo>, Vec<i16>)> {
    if in_expr.has_flag(ExprFlags::VAR_SELECT)
        || select.prior.is_some()
        || select
            .flags
            .intersects(SelectFlags::DISTINCT | SelectFlags::AGGREGATE)
        || select.group_by.is_some()
        || select.limit.is_some()
        || select.where_clause.is_some()
    {
        return None;
    }
    let [item] = select.from.as_slice() else {
        return None;
    };
    let columns = select
        .columns
        .iter()
        .map(|e| match e.kind() {
            ExprKind::Column(col) if col.cursor == item.cursor && col.fixed.is_none() => {
                Some(col.column)
            }
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some((item.table.clone(), columns))
}

fn same_column(table: &TableInfo, a: i16, b: i16) -> bool {
    a == b || (table.is_rowid(a) && table.is_rowid(b))
}

/// Whether every item of the right-hand side is known not to be NULL.
fn rhs_not_null(rhs: &InRhs) -> bool {
    match rhs {
        InRhs::Select(select) => select.columns.iter().all(|e| !e.can_be_null()),
        InRhs::List(list) => list.iter().all(|e| !e.can_be_null()),
    }
}

fn rhs_is_constant(rhs: &InRhs) -> bool {
    match rhs {
        InRhs::Select(_) => false,
        InRhs::List(list) => list.iter().all(Expr::is_constant),
    }
}

impl<'a> CodeGen<'a> {
    /// Choose how the right-hand side of `in_expr` is probed and emit the
    /// code that opens or builds the structure.
    ///
    /// With `want_rhs_has_null`, strategies that probe a structure which may
    /// contain NULL keys also get a register recording whether it does.
    pub fn plan_in_rhs(
        &mut self,
        in_expr: &Expr,
        flags: InFlags,
        want_rhs_has_null: bool,
    ) -> Result<InPlan> {
        let ExprKind::In { operand, rhs } = in_expr.kind() else {
            return Err(CompileError::Internal(format!("not an IN operator: {}", in_expr)));
        };
        let n = operand.vector_size();
        let cursor = self.alloc_cursor();
        let not_null = rhs_not_null(rhs);
        let want_rhs_has_null = want_rhs_has_null && !not_null;
        let identity: Vec<usize> = (0..n).collect();

        let mut plan = None;
        if let InRhs::Select(select) = rhs {
            if let Some((table, columns)) = lookup_candidate(in_expr, select) {
                plan = self.plan_table_lookup(
                    operand,
                    &table,
                    &columns,
                    cursor,
                    flags,
                    want_rhs_has_null,
                )?;
            }
        }

        let plan = match plan {
            Some(plan) => plan,
            None => {
                let short_list = matches!(rhs, InRhs::List(list)
                    if !rhs_is_constant(rhs) || list.len() <= self.config.in_list_table_threshold);
                if flags.contains(InFlags::NOOP_OK) && short_list {
                    InPlan {
                        strategy: InStrategy::NoTable,
                        cursor,
                        rhs_has_null: None,
                        rhs_not_null: not_null,
                        map: identity,
                    }
                } else {
                    let rhs_has_null = if want_rhs_has_null && !flags.contains(InFlags::LOOP) {
                        Some(self.alloc_reg())
                    } else {
                        None
                    };
                    self.code_rhs_of_in(in_expr, cursor)?;
                    if let Some(reg) = rhs_has_null {
                        self.set_has_null_flag(cursor, reg);
                    }
                    InPlan {
                        strategy: InStrategy::UseEphemeralTable,
                        cursor,
                        rhs_has_null,
                        rhs_not_null: not_null,
                        map: identity,
                    }
                }
            }
        };
        log::debug!(
            "IN operator {} uses {:?} on cursor {}",
            in_expr,
            plan.strategy,
            plan.cursor
        );
        Ok(plan)
    }

    /// Rowid or index plan for a sub-select that projects columns of one
    /// table. `None` when neither applies.
    fn plan_table_lookup(
        &mut self,
        operand: &Expr,
        table: &Arc<TableInfo>,
        columns: &[i16],
        cursor: i32,
        flags: InFlags,
        want_rhs_has_null: bool,
    ) -> Result<Option<InPlan>> {
        let n = columns.len();
        if let [column] = columns {
            if table.is_rowid(*column) {
                let once = self.builder.emit_op0(Opcode::Once);
                self.builder
                    .emit_op4(Opcode::OpenRead, cursor, 0, 0, P4::Table(table.clone()));
                self.builder.jump_here(once);
                return Ok(Some(InPlan {
                    strategy: InStrategy::UseRowidTable,
                    cursor,
                    rhs_has_null: None,
                    rhs_not_null: true,
                    map: vec![0],
                }));
            }
        }

        let affinity_ok = columns.iter().enumerate().all(|(i, &column)| {
            let index_aff = table.column_affinity(column);
            match operand.vector_field(i).compare_affinity(index_aff) {
                Affinity::Blob | Affinity::None | Affinity::Text => true,
                _ => index_aff.is_numeric(),
            }
        });
        if !affinity_ok {
            return Ok(None);
        }

        for index in &table.indexes {
            let Some(map) = self.index_map(operand, table, columns, index, flags)? else {
                continue;
            };
            let once = self.builder.emit_op0(Opcode::Once);
            self.builder
                .emit_op4(Opcode::OpenRead, cursor, 0, 0, P4::Index(index.clone()));
            let not_null = map.iter().all(|&j| {
                index
                    .key_columns
                    .get(j)
                    .map_or(true, |key| key.not_null)
            });
            let rhs_has_null = if want_rhs_has_null && !not_null {
                let reg = self.alloc_reg();
                if n == 1 {
                    self.set_has_null_flag(cursor, reg);
                }
                Some(reg)
            } else {
                None
            };
            self.builder.jump_here(once);
            return Ok(Some(InPlan {
                strategy: InStrategy::UseExistingIndex,
                cursor,
                rhs_has_null,
                rhs_not_null: not_null,
                map,
            }));
        }
        Ok(None)
    }

    /// For each left-hand field, the key position of `index` it can be
    /// compared with, if the index covers the right-hand side with
    /// matching collations.
    fn index_map(
        &self,
        operand: &Expr,
        table: &Arc<TableInfo>,
        columns: &[i16],
        index: &IndexInfo,
        flags: InFlags,
    ) -> Result<Option<Vec<usize>>> {
        let n = columns.len();
        // The rowid follows the declared key columns
        let mut keys: Vec<(i16, &str)> = index
            .key_columns
            .iter()
            .map(|k| (k.column, k.collation.as_str()))
            .collect();
        keys.push((ROWID_COLUMN, "BINARY"));

        if keys.len() < n || index.partial.is_some() {
            return Ok(None);
        }
        if flags.contains(InFlags::LOOP)
            && (index.key_columns.len() > n || (keys.len() > n && !index.is_unique))
        {
            return Ok(None);
        }

        let mut map = Vec::with_capacity(n);
        let mut used = vec![false; n];
        for (i, &column) in columns.iter().enumerate() {
            let lhs = operand.vector_field(i);
            let rhs = Expr::column(0, column, Some(table.clone()));
            let required = binary_compare_collation(lhs, &rhs, self.catalog)?;
            let found = (0..n).find(|&j| {
                let (key_column, key_coll) = keys[j];
                same_column(table, key_column, column)
                    && required
                        .as_ref()
                        .map_or(true, |c| c.name.eq_ignore_ascii_case(key_coll))
            });
            match found {
                Some(j) if !used[j] => {
                    used[j] = true;
                    map.push(j);
                }
                _ => return Ok(None),
            }
        }
        Ok(Some(map))
    }

    /// Set `reg` to the first key of the structure on `cursor`, which is
    /// NULL if any key is, or 0 when it is empty.
    fn set_has_null_flag(&mut self, cursor: i32, reg: i32) {
        self.builder.emit_op2(Opcode::Integer, 0, reg);
        let rewind = self.builder.emit_op1(Opcode::Rewind, cursor);
        self.builder.emit_op3(Opcode::Column, cursor, 0, reg);
        self.builder.jump_here(rewind);
    }

    /// Fill an ephemeral table on `cursor` with the right-hand side of
    /// `in_expr`. An uncorrelated right-hand side is built once; later uses
    /// of the same node share it through a duplicate cursor.
    pub fn code_rhs_of_in(&mut self, in_expr: &Expr, cursor: i32) -> Result<()> {
        let ExprKind::In { operand, rhs } = in_expr.kind() else {
            return Err(CompileError::Internal(format!("not an IN operator: {}", in_expr)));
        };

        let mut routine = None;
        if !in_expr.has_flag(ExprFlags::VAR_SELECT) && self.self_row.is_none() {
            if let Some(sub) = self.subroutines.get(&in_expr.id()).copied() {
                let once = self.builder.emit_op0(Opcode::Once);
                self.builder.emit_op2(Opcode::Gosub, sub.ret_reg, sub.addr);
                self.builder.emit_op2(Opcode::OpenDup, cursor, sub.result);
                self.builder.jump_here(once);
                return Ok(());
            }
            routine = Some(self.begin_subroutine());
        }
        let mut once = routine.map(|(_, _, once)| once);

        let n = operand.vector_size();
        match rhs {
            InRhs::Select(select) => {
                let mut key_info = Vec::with_capacity(n);
                for i in 0..n {
                    let coll = match select.columns.items().get(i) {
                        Some(item) => {
                            binary_compare_collation(operand.vector_field(i), &item.expr, self.catalog)?
                        }
                        None => None,
                    };
                    key_info.push(self.or_binary(coll)?);
                }
                self.builder
                    .emit_op4(Opcode::OpenEphemeral, cursor, n as i32, 0, P4::KeyInfo(key_info));
                let coder = self.select_coder.clone().ok_or(CompileError::NoSelectCoder)?;
                let dest = SelectDest::Set {
                    cursor,
                    affinity: in_affinity(in_expr),
                };
                coder.code_select(self, select, dest)?;
            }
            InRhs::List(list) => {
                let affinity = match operand.affinity() {
                    Affinity::None => Affinity::Blob,
                    other => other,
                };
                let coll = collation_of(operand, self.catalog)?;
                let key_info = vec![self.or_binary(coll)?];
                self.builder
                    .emit_op4(Opcode::OpenEphemeral, cursor, n as i32, 0, P4::KeyInfo(key_info));
                let r1 = self.get_temp();
                let r2 = self.get_temp();
                for item in list.iter() {
                    if let Some(addr) = once {
                        if !item.is_constant() {
                            // Must be rebuilt on every execution
                            self.builder.change_to_noop(addr);
                            once = None;
                        }
                    }
                    let r3 = self.code_target(item, r1)?;
                    self.builder.emit_op4(
                        Opcode::MakeRecord,
                        r3,
                        1,
                        r2,
                        P4::Affinity(affinity.code().to_string()),
                    );
                    self.builder.emit_op2(Opcode::IdxInsert, cursor, r2);
                }
                self.release_temp(r1);
                self.release_temp(r2);
            }
        }

        if let (Some((ret_reg, load, addr)), Some(_)) = (routine, once) {
            self.builder.jump_here(addr);
            self.end_subroutine(ret_reg, load);
            self.clear_temp_cache();
            self.subroutines.insert(
                in_expr.id(),
                Subroutine {
                    ret_reg,
                    addr,
                    result: cursor,
                },
            );
        }
        Ok(())
    }

    fn or_binary(&self, coll: Option<Arc<CollSeq>>) -> Result<Arc<CollSeq>> {
        match coll {
            Some(coll) => Ok(coll),
            None => resolve_collation(self.catalog, "BINARY"),
        }
    }

    fn check_in(&self, operand: &Expr, rhs: &InRhs) -> Result<()> {
        let n = operand.vector_size();
        match rhs {
            InRhs::Select(select) if select.columns.len() != n => {
                Err(CompileError::SubselectColumns {
                    actual: select.columns.len(),
                    expected: n,
                })
            }
            InRhs::List(_) if n != 1 => match operand.kind() {
                ExprKind::Subquery(_) => Err(CompileError::SubselectColumns {
                    actual: n,
                    expected: 1,
                }),
                _ => Err(CompileError::RowValueMisused),
            },
            _ => Ok(()),
        }
    }

    /// Emit a membership test for `in_expr`. Control falls through when the
    /// result is TRUE, jumps to `if_false` when it is FALSE and to `if_null`
    /// when it is NULL. The two labels may be the same.
    pub fn code_in(&mut self, in_expr: &Expr, if_false: Label, if_null: Label) -> Result<()> {
        let ExprKind::In { operand, rhs } = in_expr.kind() else {
            return Err(CompileError::Internal(format!("not an IN operator: {}", in_expr)));
        };
        self.check_in(operand, rhs)?;
        if matches!(rhs, InRhs::List(list) if list.is_empty()) {
            self.builder.emit_goto(if_false);
            return Ok(());
        }

        let n = operand.vector_size();
        let distinct = if_false != if_null;
        let plan = self.plan_in_rhs(in_expr, InFlags::NOOP_OK | InFlags::MEMBERSHIP, distinct)?;

        let base_affinity = in_affinity(in_expr);
        let (lhs_orig, lhs_free) = self.code_vector(operand)?;
        let (lhs, affinity) = if plan.is_identity() {
            (lhs_orig, base_affinity)
        } else {
            let lhs = self.get_temp_range(n as i32);
            let mut codes = vec!['A'; n];
            let base: Vec<char> = base_affinity.chars().collect();
            for (i, &j) in plan.map.iter().enumerate() {
                self.builder
                    .emit_op3(Opcode::Copy, lhs_orig + i as i32, lhs + j as i32, 0);
                codes[j] = base.get(i).copied().unwrap_or('A');
            }
            (lhs, codes.into_iter().collect())
        };

        if plan.strategy == InStrategy::NoTable {
            self.code_in_list(operand, rhs, lhs, &affinity, if_false, if_null)?;
        } else {
            self.code_in_probe(operand, &plan, lhs, &affinity, if_false, if_null)?;
        }

        if lhs != lhs_orig {
            self.release_temp_range(lhs, n as i32);
        }
        self.release(lhs_free);
        Ok(())
    }

    /// `x IN (a, b, ...)` as a chain of comparisons.
    fn code_in_list(
        &mut self,
        operand: &Expr,
        rhs: &InRhs,
        lhs: i32,
        affinity: &str,
        if_false: Label,
        if_null: Label,
    ) -> Result<()> {
        let InRhs::List(list) = rhs else {
            return Err(CompileError::Internal(
                "comparison chain for a sub-select".to_string(),
            ));
        };
        let coll = collation_of(operand, self.catalog)?.map_or(P4::None, P4::Collation);
        let aff = affinity
            .chars()
            .next()
            .and_then(Affinity::from_code)
            .unwrap_or(Affinity::Blob);
        let ok = self.builder.emit_label();
        let distinct = if_false != if_null;

        // Becomes NULL as soon as the left side or a right item is NULL
        let check_null = if distinct {
            let reg = self.get_temp();
            self.builder.emit_op3(Opcode::BitAnd, lhs, lhs, reg);
            Some(reg)
        } else {
            None
        };
        let last = list.len() - 1;
        for (i, item) in list.iter().enumerate() {
            let (r2, free) = self.code_temp(item)?;
            if let Some(reg) = check_null {
                if item.can_be_null() {
                    self.builder.emit_op3(Opcode::BitAnd, reg, r2, reg);
                }
            }
            if i < last || distinct {
                let flags = CmpFlags::empty().with_affinity(aff);
                self.builder
                    .emit_jump_to_label(Opcode::Eq, lhs, r2, ok, coll.clone(), flags.bits());
            } else {
                let flags = CmpFlags::JUMPIFNULL.with_affinity(aff);
                self.builder
                    .emit_jump_to_label(Opcode::Ne, lhs, r2, if_false, coll.clone(), flags.bits());
            }
            self.release(free);
        }
        if let Some(reg) = check_null {
            self.builder
                .emit_jump_to_label(Opcode::IsNull, reg, 0, if_null, P4::None, 0);
            self.builder.emit_goto(if_false);
            self.release_temp(reg);
        }
        self.builder.resolve_label(ok);
        Ok(())
    }

    /// Membership through a rowid, index or ephemeral table probe.
    fn code_in_probe(
        &mut self,
        operand: &Expr,
        plan: &InPlan,
        lhs: i32,
        affinity: &str,
        if_false: Label,
        if_null: Label,
    ) -> Result<()> {
        let n = operand.vector_size();
        let cursor = plan.cursor;
        let distinct = if_false != if_null;

        // A NULL on the left makes the result FALSE or NULL without a probe
        let scan = self.builder.emit_label();
        let lhs_null_dest = if distinct { scan } else { if_false };
        for (i, &j) in plan.map.iter().enumerate() {
            if operand.vector_field(i).can_be_null() {
                self.builder.emit_jump_to_label(
                    Opcode::IsNull,
                    lhs + j as i32,
                    0,
                    lhs_null_dest,
                    P4::None,
                    0,
                );
            }
        }

        let truth = if plan.strategy == InStrategy::UseRowidTable {
            self.builder
                .emit_jump_to_label(Opcode::SeekRowid, cursor, lhs, if_false, P4::None, 0);
            self.builder.emit_op0(Opcode::Goto)
        } else {
            self.builder.emit_op4(
                Opcode::Affinity,
                lhs,
                n as i32,
                0,
                P4::Affinity(affinity.to_string()),
            );
            if !distinct {
                self.builder.emit_jump_to_label(
                    Opcode::NotFound,
                    cursor,
                    lhs,
                    if_false,
                    P4::Int(n as i32),
                    0,
                );
                self.builder.resolve_label(scan);
                return Ok(());
            }
            self.builder
                .emit_op4(Opcode::Found, cursor, 0, lhs, P4::Int(n as i32))
        };

        // Not found: FALSE unless the right side holds a NULL
        if let (Some(reg), 1) = (plan.rhs_has_null, n) {
            self.builder
                .emit_jump_to_label(Opcode::NotNull, reg, 0, if_false, P4::None, 0);
        }
        if !distinct || plan.rhs_not_null {
            self.builder.emit_goto(if_false);
        }

        // Scan for a row that matches every non-NULL field
        self.builder.resolve_label(scan);
        let top = self
            .builder
            .emit_jump_to_label(Opcode::Rewind, cursor, 0, if_false, P4::None, 0);
        let not_null = if n > 1 {
            Some(self.builder.emit_label())
        } else {
            None
        };
        for j in 0..n {
            let field = plan.map.iter().position(|&m| m == j).unwrap_or(j);
            let coll = collation_of(operand.vector_field(field), self.catalog)?
                .map_or(P4::None, P4::Collation);
            let r3 = self.get_temp();
            self.builder.emit_op3(Opcode::Column, cursor, j as i32, r3);
            self.builder.emit_jump_to_label(
                Opcode::Ne,
                lhs + j as i32,
                r3,
                not_null.unwrap_or(if_false),
                coll,
                0,
            );
            self.release_temp(r3);
        }
        self.builder.emit_goto(if_null);
        if let Some(label) = not_null {
            self.builder.resolve_label(label);
            self.builder.emit_op2(Opcode::Next, cursor, top + 1);
            self.builder.emit_goto(if_false);
        }

        self.builder.jump_here(truth);
        Ok(())
    }
}
