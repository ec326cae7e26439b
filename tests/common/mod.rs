//! Shared harness: compile an expression, run the program on the reference
//! machine and read back what it produced.

#![allow(dead_code)]

use exprgen::catalog::{ColumnInfo, TableInfo};
use exprgen::codegen::CodeGen;
use exprgen::vdbe::{Opcode, P4};
use exprgen::{Catalog, CompilerConfig, Expr, MemoryStore, Program, Value};
use std::sync::Arc;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Harness {
    pub catalog: Catalog,
    pub store: MemoryStore,
    pub config: CompilerConfig,
}

impl Harness {
    pub fn new() -> Self {
        init_logger();
        Self {
            catalog: Catalog::new(),
            store: MemoryStore::new(),
            config: CompilerConfig::default(),
        }
    }

    pub fn with_config(config: CompilerConfig) -> Self {
        Self {
            config,
            ..Self::new()
        }
    }

    pub fn table(&self, name: &str, columns: Vec<ColumnInfo>) -> Arc<TableInfo> {
        self.catalog.add_table(name, columns).unwrap()
    }

    /// Re-read a table after indexes were added to it.
    pub fn reload(&self, name: &str) -> Arc<TableInfo> {
        self.catalog.get_table(name).unwrap()
    }

    pub fn insert(&self, table: &TableInfo, values: Vec<Value>) {
        self.store.insert(table, values).unwrap();
    }

    pub fn codegen(&self) -> CodeGen<'_> {
        let mut cg = CodeGen::new(&self.catalog, self.config.clone());
        cg.begin();
        cg
    }

    pub fn run(&self, program: &Program, params: Vec<Value>) -> Vec<Vec<Value>> {
        exprgen::Machine::new(program, &self.catalog, &self.store)
            .bind(params)
            .run()
            .unwrap_or_else(|e| panic!("{}\n{}", e, program))
    }

    /// Value of a row-independent expression.
    pub fn eval(&self, expr: &Expr) -> Value {
        let mut cg = self.codegen();
        let out = cg.alloc_reg();
        cg.code_expr(expr, out).unwrap();
        cg.builder().emit_op2(Opcode::ResultRow, out, 1);
        let program = cg.finish().unwrap();
        self.run(&program, Vec::new()).remove(0).remove(0)
    }

    /// For every row of `table`, the value of `expr` and the truth value
    /// the branch code reaches for it: `Some(true)`, `Some(false)` or
    /// `None` for unknown.
    pub fn scan(
        &self,
        table: &Arc<TableInfo>,
        cursor: i32,
        expr: &Expr,
    ) -> Vec<(Value, Option<bool>)> {
        self.scan_with(table, cursor, expr, false)
    }

    /// Like [`Harness::scan`], with the branch code told to jump on NULL.
    pub fn scan_with(
        &self,
        table: &Arc<TableInfo>,
        cursor: i32,
        expr: &Expr,
        jump_if_null: bool,
    ) -> Vec<(Value, Option<bool>)> {
        let mut cg = self.codegen();
        cg.note_cursor(cursor);
        let out = cg.alloc_regs(2);
        cg.builder()
            .emit_op4(Opcode::OpenRead, cursor, 0, 0, P4::Table(table.clone()));
        let done = cg.builder().emit_label();
        cg.builder()
            .emit_jump_to_label(Opcode::Rewind, cursor, 0, done, P4::None, 0);
        let top = cg.builder().current_addr();
        cg.code_expr(expr, out).unwrap();
        code_branches(&mut cg, expr, out + 1, jump_if_null);
        cg.builder().emit_op2(Opcode::ResultRow, out, 2);
        cg.builder().emit_op2(Opcode::Next, cursor, top);
        cg.builder().resolve_label(done);
        let program = cg.finish().unwrap();
        self.run(&program, Vec::new())
            .into_iter()
            .map(|row| {
                let truth = match &row[1] {
                    Value::Integer(1) => Some(true),
                    Value::Integer(0) => Some(false),
                    _ => None,
                };
                (row[0].clone(), truth)
            })
            .collect()
    }
}

/// Store into `out` 1 when `if_true` jumps, 0 when `if_false` jumps and
/// NULL when neither does. With `jump_if_null` both jump on NULL, so NULL
/// is the case where both do.
pub fn code_branches(cg: &mut CodeGen<'_>, expr: &Expr, out: i32, jump_if_null: bool) {
    let end = cg.builder().emit_label();
    cg.builder().emit_op3(Opcode::Null, 0, out, out);
    if jump_if_null {
        let true_or_null = cg.builder().emit_label();
        cg.if_true(expr, true_or_null, true).unwrap();
        cg.builder().emit_op2(Opcode::Integer, 0, out);
        cg.builder().emit_goto(end);
        cg.builder().resolve_label(true_or_null);
        cg.if_false(expr, end, true).unwrap();
        cg.builder().emit_op2(Opcode::Integer, 1, out);
    } else {
        let when_true = cg.builder().emit_label();
        let when_false = cg.builder().emit_label();
        cg.if_true(expr, when_true, false).unwrap();
        cg.if_false(expr, when_false, false).unwrap();
        cg.builder().emit_goto(end);
        cg.builder().resolve_label(when_true);
        cg.builder().emit_op2(Opcode::Integer, 1, out);
        cg.builder().emit_goto(end);
        cg.builder().resolve_label(when_false);
        cg.builder().emit_op2(Opcode::Integer, 0, out);
    }
    cg.builder().resolve_label(end);
}

pub fn truth(value: &Value) -> Option<bool> {
    value.to_bool()
}

pub fn int(v: i64) -> Expr {
    Expr::integer(v)
}

pub fn ints(values: &[i64]) -> Vec<Expr> {
    values.iter().map(|&v| Expr::integer(v)).collect()
}
