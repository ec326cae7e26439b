//! Value-producing code: every expression kind evaluated into a register.

use crate::catalog::TableInfo;
use crate::codegen::{CodeGen, ListFlags, SelfRow};
use crate::error::{CompileError, Result};
use crate::expression::typing::resolve_collation;
use crate::expression::{
    collation_of, BinaryOperator, ColumnRef, Expr, ExprKind, FunctionCall, IntLiteral,
    RaiseAction, UnaryOperator,
};
use crate::function::{FuncDef, FuncFlags};
use crate::types::{parse_numeric_prefix, Affinity};
use crate::vdbe::{CmpFlags, Opcode, P4};
use std::sync::Arc;

/// Result code of a failed RAISE() inside a trigger program.
pub const CONSTRAINT_TRIGGER: i32 = 1811;

/// Outcome of parsing the text of an integer literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntText {
    Value(i64),
    /// Exactly 9223372036854775808, representable only when negated
    Boundary,
    TooBig,
}

fn parse_int_text(text: &str) -> IntText {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        let digits = hex.trim_start_matches('0');
        if digits.len() > 16 {
            return IntText::TooBig;
        }
        let digits = if digits.is_empty() { "0" } else { digits };
        return match u64::from_str_radix(digits, 16) {
            Ok(v) => IntText::Value(v as i64),
            Err(_) => IntText::TooBig,
        };
    }
    match text.parse::<u64>() {
        Ok(v) if v <= i64::MAX as u64 => IntText::Value(v as i64),
        Ok(v) if v == i64::MAX as u64 + 1 => IntText::Boundary,
        _ => IntText::TooBig,
    }
}

fn is_hex(text: &str) -> bool {
    text.len() > 2 && (text.starts_with("0x") || text.starts_with("0X"))
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Opcode for a comparison operator. IS and IS NOT map to Eq and Ne.
pub(crate) fn comparison_opcode(op: BinaryOperator) -> Option<Opcode> {
    match op {
        BinaryOperator::Eq | BinaryOperator::Is => Some(Opcode::Eq),
        BinaryOperator::Ne | BinaryOperator::IsNot => Some(Opcode::Ne),
        BinaryOperator::Lt => Some(Opcode::Lt),
        BinaryOperator::Le => Some(Opcode::Le),
        BinaryOperator::Gt => Some(Opcode::Gt),
        BinaryOperator::Ge => Some(Opcode::Ge),
        _ => None,
    }
}

fn arithmetic_opcode(op: BinaryOperator) -> Option<Opcode> {
    match op {
        BinaryOperator::And => Some(Opcode::And),
        BinaryOperator::Or => Some(Opcode::Or),
        BinaryOperator::Add => Some(Opcode::Add),
        BinaryOperator::Sub => Some(Opcode::Subtract),
        BinaryOperator::Mul => Some(Opcode::Multiply),
        BinaryOperator::Div => Some(Opcode::Divide),
        BinaryOperator::Rem => Some(Opcode::Remainder),
        BinaryOperator::BitAnd => Some(Opcode::BitAnd),
        BinaryOperator::BitOr => Some(Opcode::BitOr),
        BinaryOperator::ShiftLeft => Some(Opcode::ShiftLeft),
        BinaryOperator::ShiftRight => Some(Opcode::ShiftRight),
        BinaryOperator::Concat => Some(Opcode::Concat),
        _ => None,
    }
}

impl<'a> CodeGen<'a> {
    /// Evaluate `expr`, preferably into `target`. Returns the register that
    /// holds the result, which may be a different one.
    pub fn code_target(&mut self, expr: &Expr, target: i32) -> Result<i32> {
        self.check_height(expr)?;
        match expr.kind() {
            ExprKind::Null => {
                self.builder.emit_op2(Opcode::Null, 0, target);
                Ok(target)
            }
            ExprKind::Integer(IntLiteral::Inline(v)) => {
                self.builder.emit_op2(Opcode::Integer, *v, target);
                Ok(target)
            }
            ExprKind::Integer(IntLiteral::Text(text)) => {
                self.code_integer(text, false, target);
                Ok(target)
            }
            ExprKind::Float(text) => {
                self.code_real(text, false, target);
                Ok(target)
            }
            ExprKind::String(s) => {
                self.builder
                    .emit_op4(Opcode::String8, 0, target, 0, P4::Text(s.clone()));
                Ok(target)
            }
            ExprKind::Blob(hex) => {
                let bytes = decode_hex(hex).ok_or_else(|| {
                    CompileError::Internal(format!("malformed blob literal x'{}'", hex))
                })?;
                self.builder
                    .emit_op4(Opcode::Blob, bytes.len() as i32, target, 0, P4::Blob(bytes));
                Ok(target)
            }
            ExprKind::Boolean(b) => {
                self.builder.emit_op2(Opcode::Integer, *b as i32, target);
                Ok(target)
            }
            ExprKind::Variable { index, name } => {
                let p4 = name.clone().map_or(P4::None, P4::Text);
                self.builder
                    .emit_op4(Opcode::Variable, *index, target, 0, p4);
                Ok(target)
            }
            ExprKind::Id(name) => match crate::expression::constant::true_false_id(expr) {
                Some(b) => {
                    self.builder.emit_op2(Opcode::Integer, b as i32, target);
                    Ok(target)
                }
                None => Err(CompileError::UnresolvedIdentifier(name.clone())),
            },
            ExprKind::Column(col) => self.code_column(col, target),
            ExprKind::AggColumn { index, column } => match self.agg_columns.get(*index) {
                Some(&reg) => Ok(reg),
                None => self.code_column(column, target),
            },
            ExprKind::AggFunction { index, call } => match self.agg_functions.get(*index) {
                Some(&reg) => Ok(reg),
                None => Err(CompileError::MisuseOfAggregate(call.name.clone())),
            },
            ExprKind::Register { reg, .. } => Ok(*reg),
            ExprKind::Unary { op, operand } => self.code_unary(*op, operand, target),
            ExprKind::Binary { op, left, right } => {
                if let Some(opcode) = comparison_opcode(*op) {
                    let flags = match op {
                        BinaryOperator::Is | BinaryOperator::IsNot => CmpFlags::NULLEQ,
                        _ => CmpFlags::empty(),
                    };
                    if left.is_vector() || right.is_vector() {
                        self.code_vector_compare(left, right, opcode, flags, target)?;
                    } else {
                        let (r1, free1) = self.code_temp(left)?;
                        let (r2, free2) = self.code_temp(right)?;
                        self.code_compare(
                            left,
                            right,
                            opcode,
                            r1,
                            r2,
                            target,
                            flags | CmpFlags::STOREP2,
                        )?;
                        self.release(free1);
                        self.release(free2);
                    }
                    return Ok(target);
                }
                let opcode = arithmetic_opcode(*op).ok_or_else(|| {
                    CompileError::Internal(format!("no opcode for operator {}", op.as_str()))
                })?;
                let (r1, free1) = self.code_temp(left)?;
                let (r2, free2) = self.code_temp(right)?;
                self.builder.emit_op3(opcode, r1, r2, target);
                self.release(free1);
                self.release(free2);
                Ok(target)
            }
            ExprKind::Collate { operand, .. } => self.code_target(operand, target),
            ExprKind::Cast { operand, type_name } => {
                let reg = self.code_target(operand, target)?;
                if reg != target {
                    self.builder.emit_op2(Opcode::SCopy, reg, target);
                }
                let affinity = Affinity::from_type_name(Some(type_name.as_str()));
                self.builder
                    .emit_op2(Opcode::Cast, target, affinity.code() as i32);
                Ok(target)
            }
            ExprKind::Function(call) => self.code_function(expr, call, target),
            ExprKind::Case {
                base,
                arms,
                otherwise,
            } => self.code_case(base.as_deref(), arms, otherwise.as_deref(), target),
            ExprKind::Between { .. } => {
                self.code_between_value(expr, target)?;
                Ok(target)
            }
            ExprKind::In { .. } => {
                let if_false = self.builder.emit_label();
                let if_null = self.builder.emit_label();
                self.builder.emit_op2(Opcode::Null, 0, target);
                self.code_in(expr, if_false, if_null)?;
                self.builder.emit_op2(Opcode::Integer, 1, target);
                self.builder.resolve_label(if_false);
                self.builder.emit_op2(Opcode::AddImm, target, 0);
                self.builder.resolve_label(if_null);
                Ok(target)
            }
            ExprKind::Exists(_) => self.code_subselect(expr),
            ExprKind::Subquery(select) => {
                let n = select.columns.len();
                if n != 1 {
                    return Err(CompileError::SubselectColumns {
                        actual: n,
                        expected: 1,
                    });
                }
                self.code_subselect(expr)
            }
            ExprKind::SelectColumn {
                subquery,
                column,
                expected,
            } => self.code_select_column(subquery, *column, *expected),
            ExprKind::Vector(_) => Err(CompileError::RowValueMisused),
            ExprKind::IfNullRow { cursor, operand } => {
                // IfNullRow overwrites the operand register, so it must not be
                // a shared hoisted constant.
                let addr = self.builder.emit_op1(Opcode::IfNullRow, *cursor);
                let saved = std::mem::replace(&mut self.const_factor, false);
                let reg = self.code_target(operand, target);
                self.const_factor = saved;
                let reg = reg?;
                self.builder.jump_here(addr);
                self.builder.change_p3(addr, reg);
                Ok(reg)
            }
            ExprKind::Raise { action, message } => {
                self.code_raise(*action, message.as_deref())?;
                Ok(target)
            }
        }
    }

    /// Evaluate `expr` into exactly `target`.
    pub fn code_expr(&mut self, expr: &Expr, target: i32) -> Result<()> {
        let reg = self.code_target(expr, target)?;
        if reg != target {
            let op = if matches!(expr.kind(), ExprKind::Collate { .. }) {
                Opcode::Copy
            } else {
                Opcode::SCopy
            };
            self.builder.emit_op2(op, reg, target);
        }
        Ok(())
    }

    /// Like [`CodeGen::code_expr`] but always makes a deep copy.
    pub fn code_copy(&mut self, expr: &Expr, target: i32) -> Result<()> {
        let reg = self.code_target(expr, target)?;
        if reg != target {
            self.builder.emit_op2(Opcode::Copy, reg, target);
        }
        Ok(())
    }

    /// Evaluate `expr` into `target`, hoisting it into the initialization
    /// section when it is constant.
    pub fn code_factorable(&mut self, expr: &Expr, target: i32) -> Result<()> {
        if self.const_factor && expr.is_constant_not_join() {
            self.code_at_init(expr, Some(target));
            Ok(())
        } else {
            self.code_expr(expr, target)
        }
    }

    /// Evaluate `expr` into whatever register is convenient. Returns the
    /// register and, if one was taken from the pool, the scratch register
    /// to hand back with [`CodeGen::release`].
    pub fn code_temp(&mut self, expr: &Expr) -> Result<(i32, Option<i32>)> {
        let expr = expr.skip_collate();
        if self.const_factor
            && !matches!(expr.kind(), ExprKind::Register { .. })
            && expr.is_constant_not_join()
        {
            return Ok((self.code_at_init(expr, None), None));
        }
        let temp = self.get_temp();
        let reg = self.code_target(expr, temp)?;
        if reg == temp {
            Ok((reg, Some(temp)))
        } else {
            self.release_temp(temp);
            Ok((reg, None))
        }
    }

    pub fn release(&mut self, temp: Option<i32>) {
        if let Some(reg) = temp {
            self.release_temp(reg);
        }
    }

    /// Emit a comparison of registers `r1` and `r2` holding `left` and
    /// `right`. With [`CmpFlags::STOREP2`] the outcome is stored into
    /// register `dest`, otherwise `dest` is a jump address.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn code_compare(
        &mut self,
        left: &Expr,
        right: &Expr,
        opcode: Opcode,
        r1: i32,
        r2: i32,
        dest: i32,
        flags: CmpFlags,
    ) -> Result<i32> {
        let (p4, p5) = self.compare_operands(left, right, flags)?;
        Ok(self.builder.emit_op(opcode, r1, dest, r2, p4, p5.bits()))
    }

    /// Collating sequence and P5 flags for comparing `left` with `right`.
    pub(crate) fn compare_operands(
        &self,
        left: &Expr,
        right: &Expr,
        flags: CmpFlags,
    ) -> Result<(P4, CmpFlags)> {
        let coll = crate::expression::binary_compare_collation(left, right, self.catalog)?;
        let affinity = left.compare_affinity(right.affinity());
        Ok((
            coll.map_or(P4::None, P4::Collation),
            flags.with_affinity(affinity),
        ))
    }

    fn code_integer(&mut self, text: &str, negate: bool, target: i32) {
        let value = match parse_int_text(text) {
            IntText::Value(v) if negate && v == i64::MIN => None,
            IntText::Value(v) => Some(if negate { -v } else { v }),
            IntText::Boundary if negate => Some(i64::MIN),
            IntText::Boundary | IntText::TooBig => None,
        };
        match value {
            Some(v) => {
                self.builder
                    .emit_op4(Opcode::Int64, 0, target, 0, P4::Int64(v));
            }
            None if is_hex(text) => {
                // Reported when the statement runs, not when it is prepared
                let message = format!("hex literal too big: {}{}", if negate { "-" } else { "" }, text);
                self.builder
                    .emit_op4(Opcode::Halt, 1, 0, 0, P4::Text(message));
            }
            None => self.code_real(text, negate, target),
        }
    }

    fn code_real(&mut self, text: &str, negate: bool, target: i32) {
        let value = parse_numeric_prefix(text).0.as_real();
        let value = if negate { -value } else { value };
        self.builder
            .emit_op4(Opcode::Real, 0, target, 0, P4::Real(value));
    }

    fn code_unary(&mut self, op: UnaryOperator, operand: &Expr, target: i32) -> Result<i32> {
        match op {
            UnaryOperator::Positive => self.code_target(operand, target),
            UnaryOperator::Negate => match operand.kind() {
                ExprKind::Integer(IntLiteral::Inline(v)) => {
                    self.builder.emit_op2(Opcode::Integer, -v, target);
                    Ok(target)
                }
                ExprKind::Integer(IntLiteral::Text(text)) => {
                    self.code_integer(text, true, target);
                    Ok(target)
                }
                ExprKind::Float(text) => {
                    self.code_real(text, true, target);
                    Ok(target)
                }
                _ => {
                    let zero = Expr::integer(0);
                    let (r1, free1) = self.code_temp(&zero)?;
                    let (r2, free2) = self.code_temp(operand)?;
                    self.builder.emit_op3(Opcode::Subtract, r1, r2, target);
                    self.release(free1);
                    self.release(free2);
                    Ok(target)
                }
            },
            UnaryOperator::Not | UnaryOperator::BitNot => {
                let opcode = if op == UnaryOperator::Not {
                    Opcode::Not
                } else {
                    Opcode::BitNot
                };
                let (r1, free1) = self.code_temp(operand)?;
                self.builder.emit_op2(opcode, r1, target);
                self.release(free1);
                Ok(target)
            }
            UnaryOperator::IsNull | UnaryOperator::NotNull => {
                let opcode = if op == UnaryOperator::IsNull {
                    Opcode::IsNull
                } else {
                    Opcode::NotNull
                };
                self.builder.emit_op2(Opcode::Integer, 1, target);
                let (r1, free1) = self.code_temp(operand)?;
                let addr = self.builder.emit_op1(opcode, r1);
                self.builder.emit_op2(Opcode::AddImm, target, -1);
                self.builder.jump_here(addr);
                self.release(free1);
                Ok(target)
            }
            UnaryOperator::IsTrue
            | UnaryOperator::IsNotTrue
            | UnaryOperator::IsFalse
            | UnaryOperator::IsNotFalse => {
                let (is_true, negated) = op.truth_test().unwrap_or((true, false));
                let (r1, free1) = self.code_temp(operand)?;
                let invert = is_true == negated;
                self.builder.emit_op4(
                    Opcode::IsTrue,
                    r1,
                    target,
                    !is_true as i32,
                    P4::Int(invert as i32),
                );
                self.release(free1);
                Ok(target)
            }
        }
    }

    fn code_column(&mut self, col: &ColumnRef, target: i32) -> Result<i32> {
        if let Some(fixed) = &col.fixed {
            let mut reg = self.code_target(fixed, target)?;
            let affinity = col
                .table
                .as_ref()
                .map_or(Affinity::Blob, |t| t.column_affinity(col.column));
            if !matches!(affinity, Affinity::Blob | Affinity::None) {
                if reg != target {
                    self.builder.emit_op2(Opcode::SCopy, reg, target);
                    reg = target;
                }
                self.builder.emit_op4(
                    Opcode::Affinity,
                    reg,
                    1,
                    0,
                    P4::Affinity(affinity.code().to_string()),
                );
            }
            return Ok(reg);
        }

        let mut cursor = col.cursor;
        if cursor < 0 {
            match self.self_row {
                Some(SelfRow::Registers(base)) => {
                    let is_rowid = col.column < 0
                        || col.table.as_ref().is_some_and(|t| t.is_rowid(col.column));
                    return Ok(if is_rowid {
                        base - 1
                    } else {
                        base + col.column as i32
                    });
                }
                Some(SelfRow::Cursor(c)) => cursor = c,
                None => {
                    return Err(CompileError::Internal(format!(
                        "column {} has no cursor",
                        col.name()
                    )))
                }
            }
        }
        self.code_get_column(col.table.as_deref(), cursor, col.column, target);
        Ok(target)
    }

    /// Read column `column` of the row under `cursor` into `target`.
    pub fn code_get_column(
        &mut self,
        table: Option<&TableInfo>,
        cursor: i32,
        column: i16,
        target: i32,
    ) {
        let Some(table) = table else {
            self.builder
                .emit_op3(Opcode::Column, cursor, column as i32, target);
            return;
        };
        if table.is_rowid(column) {
            self.builder.emit_op2(Opcode::Rowid, cursor, target);
            return;
        }
        let default = table.column(column).and_then(|c| c.default.clone());
        self.builder.emit_op4(
            Opcode::Column,
            cursor,
            column as i32,
            target,
            default.map_or(P4::None, P4::Value),
        );
        if table.column_affinity(column) == Affinity::Real {
            self.builder.emit_op1(Opcode::RealAffinity, target);
        }
    }

    /// Look up the definition a call resolves to.
    pub(crate) fn find_function(&self, name: &str, n_args: usize) -> Result<Arc<FuncDef>> {
        let functions = self.catalog.functions();
        match functions.find(name, n_args) {
            Some(def) if def.is_aggregate() => Err(CompileError::MisuseOfAggregate(name.to_string())),
            Some(def) => Ok(def),
            None if functions.contains(name) => {
                Err(CompileError::WrongArgumentCount(name.to_string()))
            }
            None => Err(CompileError::UnknownFunction(name.to_string())),
        }
    }

    fn code_function(&mut self, expr: &Expr, call: &FunctionCall, target: i32) -> Result<i32> {
        if call.window.is_some() {
            return self.window_results.get(&expr.id()).copied().ok_or_else(|| {
                CompileError::Internal(format!("window function {}() has no result register", call.name))
            });
        }
        if self.const_factor && expr.is_constant_not_join() {
            return Ok(self.code_at_init(expr, None));
        }

        let n = call.args.len();
        if n > self.config.max_function_args {
            return Err(CompileError::TooManyArguments {
                function: call.name.clone(),
                max: self.config.max_function_args,
            });
        }
        let def = self.find_function(&call.name, n)?;

        if def.flags.contains(FuncFlags::COALESCE) {
            if n < 2 {
                return Err(CompileError::WrongArgumentCount(call.name.clone()));
            }
            let end = self.builder.emit_label();
            self.code_expr(&call.args[0], target)?;
            for arg in call.args.iter().skip(1) {
                self.builder
                    .emit_jump_to_label(Opcode::NotNull, target, 0, end, P4::None, 0);
                self.code_expr(arg, target)?;
            }
            self.builder.resolve_label(end);
            return Ok(target);
        }
        if def.flags.contains(FuncFlags::UNLIKELY) && n > 0 {
            return self.code_target(&call.args[0], target);
        }

        let mut const_mask: u32 = 0;
        let mut coll = None;
        for (i, arg) in call.args.iter().enumerate() {
            if i < 32 && arg.is_constant() {
                const_mask |= 1 << i;
            }
            if def.needs_collation() && coll.is_none() {
                coll = collation_of(arg, self.catalog)?;
            }
        }

        let first = if n > 0 {
            let first = if const_mask != 0 {
                self.alloc_regs(n as i32)
            } else {
                self.get_temp_range(n as i32)
            };
            self.code_expr_list(&call.args, first, 0, ListFlags::DUP | ListFlags::FACTOR)?;
            first
        } else {
            0
        };
        if def.needs_collation() {
            let coll = match coll {
                Some(coll) => coll,
                None => resolve_collation(self.catalog, "BINARY")?,
            };
            self.builder
                .emit_op4(Opcode::CollSeq, 0, 0, 0, P4::Collation(coll));
        }
        self.builder.emit_op(
            Opcode::Function,
            const_mask as i32,
            first,
            target,
            P4::Function(def),
            n as u16,
        );
        if n > 0 && const_mask == 0 {
            self.release_temp_range(first, n as i32);
        }
        Ok(target)
    }

    fn code_case(
        &mut self,
        base: Option<&Expr>,
        arms: &[(Expr, Expr)],
        otherwise: Option<&Expr>,
        target: i32,
    ) -> Result<i32> {
        let end = self.builder.emit_label();
        // The base is evaluated once and compared against every arm
        let base_reg = match base {
            Some(base) => {
                let (reg, _) = self.code_vector(base)?;
                Some(Expr::register(reg, base.clone()))
            }
            None => None,
        };
        for (when, then) in arms {
            let next = self.builder.emit_label();
            match &base_reg {
                Some(reg) => {
                    let test = Expr::eq(reg.clone(), when.clone());
                    self.jump_if_false(&test, next, CmpFlags::JUMPIFNULL)?;
                }
                None => self.jump_if_false(when, next, CmpFlags::JUMPIFNULL)?,
            }
            self.code_expr(then, target)?;
            self.builder.emit_goto(end);
            self.builder.resolve_label(next);
        }
        match otherwise {
            Some(otherwise) => self.code_expr(otherwise, target)?,
            None => {
                self.builder.emit_op2(Opcode::Null, 0, target);
            }
        }
        self.builder.resolve_label(end);
        Ok(target)
    }

    /// Evaluate a possibly vector-valued expression into consecutive
    /// registers and return the first one.
    pub(crate) fn code_vector(&mut self, expr: &Expr) -> Result<(i32, Option<i32>)> {
        let n = expr.vector_size();
        if n == 1 {
            return self.code_temp(expr);
        }
        match expr.kind() {
            ExprKind::Register { reg, .. } => Ok((*reg, None)),
            ExprKind::Subquery(_) => Ok((self.code_subselect(expr)?, None)),
            ExprKind::Vector(list) => {
                let first = self.alloc_regs(n as i32);
                for (i, field) in list.iter().enumerate() {
                    self.code_factorable(field, first + i as i32)?;
                }
                Ok((first, None))
            }
            _ => Err(CompileError::RowValueMisused),
        }
    }

    fn code_raise(&mut self, action: RaiseAction, message: Option<&str>) -> Result<()> {
        if !self.in_trigger {
            return Err(CompileError::RaiseOutsideTrigger);
        }
        let (rc, code) = match action {
            RaiseAction::Ignore => (0, 4),
            RaiseAction::Rollback => (CONSTRAINT_TRIGGER, 1),
            RaiseAction::Abort => (CONSTRAINT_TRIGGER, 2),
            RaiseAction::Fail => (CONSTRAINT_TRIGGER, 3),
        };
        self.builder.emit_op4(
            Opcode::Halt,
            rc,
            code,
            0,
            P4::Text(message.unwrap_or_default().to_string()),
        );
        Ok(())
    }
}
