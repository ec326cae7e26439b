//! Reference register machine. Executes generated programs against an
//! in-memory row store so that compiled expressions can be checked by
//! their observable results.

use crate::catalog::{Catalog, CollSeq, TableId, TableInfo};
use crate::types::{Affinity, Value};
use crate::vdbe::opcode::{CmpFlags, Opcode, P4};
use crate::vdbe::program::Program;
use anyhow::{anyhow, bail, Result};
use parking_lot::RwLock;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

const MAX_STEPS: usize = 10_000_000;

static NULL: Value = Value::Null;

/// Table rows keyed by table id, each row with its rowid.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<TableId, Vec<(i64, Vec<Value>)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row, applying column affinities. An INTEGER PRIMARY KEY
    /// value becomes the rowid; otherwise the next free rowid is used.
    pub fn insert(&self, table: &TableInfo, values: Vec<Value>) -> Result<i64> {
        if values.len() != table.columns.len() {
            bail!(
                "table {} has {} columns but {} values were supplied",
                table.table_name,
                table.columns.len(),
                values.len()
            );
        }
        let mut row: Vec<Value> = values
            .into_iter()
            .zip(&table.columns)
            .map(|(v, c)| v.apply_affinity(c.affinity))
            .collect();
        for (value, column) in row.iter().zip(&table.columns) {
            if value.is_null() && column.not_null && !column.is_rowid_alias() {
                bail!("NOT NULL constraint failed: {}.{}", table.table_name, column.column_name);
            }
        }

        let mut tables = self.tables.write();
        let rows = tables.entry(table.table_id).or_default();
        let rowid = match table.rowid_alias.map(|i| &row[i]) {
            Some(Value::Integer(i)) => *i,
            Some(Value::Null) | None => rows.iter().map(|(r, _)| *r).max().unwrap_or(0) + 1,
            Some(other) => bail!("datatype mismatch for rowid: {}", other),
        };
        if rows.iter().any(|(r, _)| *r == rowid) {
            bail!("UNIQUE constraint failed: {}.rowid", table.table_name);
        }
        if let Some(i) = table.rowid_alias {
            row[i] = Value::Integer(rowid);
        }
        let at = rows.partition_point(|(r, _)| *r < rowid);
        rows.insert(at, (rowid, row));
        Ok(rowid)
    }

    pub fn rows(&self, table_id: TableId) -> Vec<(i64, Vec<Value>)> {
        self.tables
            .read()
            .get(&table_id)
            .cloned()
            .unwrap_or_default()
    }
}

type SharedEntries = Rc<RefCell<Vec<Vec<Value>>>>;

enum CursorData {
    Table(Vec<(i64, Vec<Value>)>),
    /// Sorted keys; the last field of each key is the rowid
    Index(Vec<Vec<Value>>),
    Ephemeral(SharedEntries),
}

struct Cursor {
    data: CursorData,
    collations: Vec<Option<Arc<CollSeq>>>,
    pos: Option<usize>,
    null_row: bool,
}

impl Cursor {
    fn new(data: CursorData, collations: Vec<Option<Arc<CollSeq>>>) -> Self {
        Self {
            data,
            collations,
            pos: None,
            null_row: false,
        }
    }

    fn len(&self) -> usize {
        match &self.data {
            CursorData::Table(rows) => rows.len(),
            CursorData::Index(keys) => keys.len(),
            CursorData::Ephemeral(keys) => keys.borrow().len(),
        }
    }

    fn compare_keys(&self, a: &[Value], b: &[Value]) -> Ordering {
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            let ord = match self.collations.get(i).and_then(Option::as_ref) {
                Some(coll) => x.compare_with(y, |s, t| coll.compare(s, t)),
                None => x.compare(y),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Position on the first key whose leading fields equal `probe`.
    fn seek_prefix(&mut self, probe: &[Value]) -> bool {
        let found = match &self.data {
            CursorData::Table(_) => None,
            CursorData::Index(keys) => keys
                .iter()
                .position(|k| self.compare_keys(probe, k) == Ordering::Equal),
            CursorData::Ephemeral(keys) => keys
                .borrow()
                .iter()
                .position(|k| self.compare_keys(probe, k) == Ordering::Equal),
        };
        self.pos = found;
        found.is_some()
    }

    fn column(&self, column: i32) -> Option<Value> {
        if self.null_row {
            return Some(Value::Null);
        }
        let pos = self.pos?;
        match &self.data {
            CursorData::Table(rows) => rows
                .get(pos)
                .and_then(|(_, row)| row.get(column as usize).cloned()),
            CursorData::Index(keys) => keys.get(pos).and_then(|k| k.get(column as usize).cloned()),
            CursorData::Ephemeral(keys) => keys
                .borrow()
                .get(pos)
                .and_then(|k| k.get(column as usize).cloned()),
        }
    }

    fn rowid(&self) -> Option<i64> {
        if self.null_row {
            return None;
        }
        let pos = self.pos?;
        match &self.data {
            CursorData::Table(rows) => rows.get(pos).map(|(r, _)| *r),
            CursorData::Index(keys) => match keys.get(pos).and_then(|k| k.last()) {
                Some(Value::Integer(r)) => Some(*r),
                _ => None,
            },
            CursorData::Ephemeral(_) => None,
        }
    }
}

/// Executes one [`Program`].
pub struct Machine<'a> {
    program: &'a Program,
    catalog: &'a Catalog,
    store: &'a MemoryStore,
    params: Vec<Value>,
    registers: Vec<Value>,
    records: HashMap<i32, Vec<Value>>,
    cursors: HashMap<i32, Cursor>,
    once: HashSet<usize>,
    last_compare: Ordering,
    collation: Option<Arc<CollSeq>>,
}

impl<'a> Machine<'a> {
    pub fn new(program: &'a Program, catalog: &'a Catalog, store: &'a MemoryStore) -> Self {
        Self {
            program,
            catalog,
            store,
            params: Vec::new(),
            registers: vec![Value::Null; program.n_mem.max(0) as usize + 1],
            records: HashMap::new(),
            cursors: HashMap::new(),
            once: HashSet::new(),
            last_compare: Ordering::Equal,
            collation: None,
        }
    }

    /// Values for `?1`, `?2`, ...
    pub fn bind(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    pub fn register(&self, reg: i32) -> &Value {
        usize::try_from(reg)
            .ok()
            .and_then(|r| self.registers.get(r))
            .unwrap_or(&NULL)
    }

    fn set(&mut self, reg: i32, value: Value) -> Result<()> {
        let r = usize::try_from(reg).map_err(|_| anyhow!("invalid register {}", reg))?;
        if r >= self.registers.len() {
            self.registers.resize(r + 1, Value::Null);
        }
        self.registers[r] = value;
        Ok(())
    }

    fn cursor(&mut self, cursor: i32) -> Result<&mut Cursor> {
        self.cursors
            .get_mut(&cursor)
            .ok_or_else(|| anyhow!("cursor {} is not open", cursor))
    }

    /// Run to completion and return the rows produced by `ResultRow`.
    pub fn run(&mut self) -> Result<Vec<Vec<Value>>> {
        let program = self.program;
        let mut rows = Vec::new();
        let mut pc: usize = 0;
        let mut steps = 0;
        while pc < program.ops.len() {
            steps += 1;
            if steps > MAX_STEPS {
                bail!("program did not terminate");
            }
            let op = &program.ops[pc];
            log::trace!("{:>4} {} {} {} {}", pc, op.opcode, op.p1, op.p2, op.p3);
            let mut next = pc + 1;
            let jump = op.p2.max(0) as usize;
            match op.opcode {
                Opcode::Init | Opcode::Goto => next = jump,
                Opcode::Halt => {
                    if op.p1 != 0 {
                        let message = match &op.p4 {
                            P4::Text(m) => m.clone(),
                            _ => "constraint failed".to_string(),
                        };
                        bail!("{}", message);
                    }
                    break;
                }
                Opcode::Integer => self.set(op.p2, Value::Integer(op.p1 as i64))?,
                Opcode::Int64 => match &op.p4 {
                    P4::Int64(v) => self.set(op.p2, Value::Integer(*v))?,
                    _ => bail!("Int64 without an integer operand at {}", pc),
                },
                Opcode::Real => match &op.p4 {
                    P4::Real(v) => self.set(op.p2, Value::real(*v))?,
                    _ => bail!("Real without a real operand at {}", pc),
                },
                Opcode::String8 => match &op.p4 {
                    P4::Text(s) => self.set(op.p2, Value::Text(s.clone()))?,
                    _ => bail!("String8 without text at {}", pc),
                },
                Opcode::Blob => match &op.p4 {
                    P4::Blob(b) => self.set(op.p2, Value::Blob(b.clone()))?,
                    _ => bail!("Blob without bytes at {}", pc),
                },
                Opcode::Null => {
                    for reg in op.p2..=op.p3.max(op.p2) {
                        self.set(reg, Value::Null)?;
                    }
                }
                Opcode::Variable => {
                    let value = usize::try_from(op.p1 - 1)
                        .ok()
                        .and_then(|i| self.params.get(i))
                        .cloned()
                        .unwrap_or(Value::Null);
                    self.set(op.p2, value)?;
                }
                Opcode::Copy => {
                    for i in 0..=op.p3.max(0) {
                        let value = self.register(op.p1 + i).clone();
                        self.set(op.p2 + i, value)?;
                    }
                }
                Opcode::SCopy => {
                    let value = self.register(op.p1).clone();
                    self.set(op.p2, value)?;
                }
                Opcode::Add
                | Opcode::Subtract
                | Opcode::Multiply
                | Opcode::Divide
                | Opcode::Remainder => {
                    let value = arithmetic(op.opcode, self.register(op.p1), self.register(op.p2));
                    self.set(op.p3, value)?;
                }
                Opcode::BitAnd | Opcode::BitOr | Opcode::ShiftLeft | Opcode::ShiftRight => {
                    let value = bitwise(op.opcode, self.register(op.p1), self.register(op.p2));
                    self.set(op.p3, value)?;
                }
                Opcode::Concat => {
                    let value = match (self.register(op.p1).to_text(), self.register(op.p2).to_text()) {
                        (Some(a), Some(b)) => Value::Text(a + &b),
                        _ => Value::Null,
                    };
                    self.set(op.p3, value)?;
                }
                Opcode::And | Opcode::Or => {
                    let (a, b) = (self.register(op.p1).to_bool(), self.register(op.p2).to_bool());
                    let result = if op.opcode == Opcode::And {
                        match (a, b) {
                            (Some(false), _) | (_, Some(false)) => Some(false),
                            (Some(true), Some(true)) => Some(true),
                            _ => None,
                        }
                    } else {
                        match (a, b) {
                            (Some(true), _) | (_, Some(true)) => Some(true),
                            (Some(false), Some(false)) => Some(false),
                            _ => None,
                        }
                    };
                    self.set(op.p3, result.map_or(Value::Null, Value::boolean))?;
                }
                Opcode::Not => {
                    let value = match self.register(op.p1).to_bool() {
                        Some(b) => Value::boolean(!b),
                        None => Value::Null,
                    };
                    self.set(op.p2, value)?;
                }
                Opcode::BitNot => {
                    let value = match self.register(op.p1) {
                        Value::Null => Value::Null,
                        v => Value::Integer(!v.as_integer()),
                    };
                    self.set(op.p2, value)?;
                }
                Opcode::IsTrue => {
                    let invert = matches!(op.p4, P4::Int(1));
                    let truth = self.register(op.p1).to_bool().unwrap_or(op.p3 != 0);
                    self.set(op.p2, Value::boolean(truth != invert))?;
                }
                Opcode::Eq | Opcode::Ne | Opcode::Lt | Opcode::Le | Opcode::Gt | Opcode::Ge => {
                    if self.compare(pc)? {
                        next = jump;
                    }
                }
                Opcode::ElseNotEq => {
                    if self.last_compare != Ordering::Equal {
                        next = jump;
                    }
                }
                Opcode::If | Opcode::IfNot => {
                    let taken = match self.register(op.p1).to_bool() {
                        None => op.p3 != 0,
                        Some(b) => b == (op.opcode == Opcode::If),
                    };
                    if taken {
                        next = jump;
                    }
                }
                Opcode::IsNull => {
                    if self.register(op.p1).is_null() {
                        next = jump;
                    }
                }
                Opcode::NotNull => {
                    if !self.register(op.p1).is_null() {
                        next = jump;
                    }
                }
                Opcode::AddImm => {
                    let value = self.register(op.p1).as_integer().wrapping_add(op.p2 as i64);
                    self.set(op.p1, Value::Integer(value))?;
                }
                Opcode::Cast => {
                    let affinity = affinity_operand(op.p2)?;
                    let value = self.register(op.p1).clone().cast(affinity);
                    self.set(op.p1, value)?;
                }
                Opcode::Affinity => {
                    let P4::Affinity(codes) = &op.p4 else {
                        bail!("Affinity without an affinity string at {}", pc);
                    };
                    for (i, code) in codes.chars().take(op.p2.max(0) as usize).enumerate() {
                        let affinity = Affinity::from_code(code)
                            .ok_or_else(|| anyhow!("bad affinity code {}", code))?;
                        let reg = op.p1 + i as i32;
                        let value = self.register(reg).clone().apply_affinity(affinity);
                        self.set(reg, value)?;
                    }
                }
                Opcode::RealAffinity => {
                    if let Value::Integer(i) = self.register(op.p1) {
                        let value = Value::Real(*i as f64);
                        self.set(op.p1, value)?;
                    }
                }
                Opcode::CollSeq => {
                    if let P4::Collation(coll) = &op.p4 {
                        self.collation = Some(coll.clone());
                    }
                }
                Opcode::Function => {
                    let P4::Function(def) = &op.p4 else {
                        bail!("Function without a definition at {}", pc);
                    };
                    let args: Vec<Value> = (0..op.p5 as i32)
                        .map(|i| self.register(op.p2 + i).clone())
                        .collect();
                    let coll = self.collation.take();
                    let value = def.invoke(&args, coll.as_deref())?;
                    self.set(op.p3, value)?;
                }
                Opcode::Once => {
                    if !self.once.insert(pc) {
                        next = jump;
                    }
                }
                Opcode::Gosub => {
                    self.set(op.p1, Value::Integer(pc as i64))?;
                    next = jump;
                }
                Opcode::Return => {
                    next = (self.register(op.p1).as_integer() + 1).max(0) as usize;
                }
                Opcode::OpenRead => self.open_read(op.p1, &op.p4)?,
                Opcode::OpenEphemeral => {
                    let collations = match &op.p4 {
                        P4::KeyInfo(colls) => colls.iter().cloned().map(Some).collect(),
                        _ => Vec::new(),
                    };
                    let data = CursorData::Ephemeral(Rc::new(RefCell::new(Vec::new())));
                    self.cursors.insert(op.p1, Cursor::new(data, collations));
                }
                Opcode::OpenDup => {
                    let original = self
                        .cursors
                        .get(&op.p2)
                        .ok_or_else(|| anyhow!("cursor {} is not open", op.p2))?;
                    let CursorData::Ephemeral(entries) = &original.data else {
                        bail!("OpenDup of a non-ephemeral cursor");
                    };
                    let dup = Cursor::new(
                        CursorData::Ephemeral(entries.clone()),
                        original.collations.clone(),
                    );
                    self.cursors.insert(op.p1, dup);
                }
                Opcode::MakeRecord => {
                    let codes: Vec<char> = match &op.p4 {
                        P4::Affinity(s) => s.chars().collect(),
                        _ => Vec::new(),
                    };
                    let mut record = Vec::with_capacity(op.p2.max(0) as usize);
                    for i in 0..op.p2 {
                        let mut value = self.register(op.p1 + i).clone();
                        if let Some(aff) = codes.get(i as usize).and_then(|c| Affinity::from_code(*c)) {
                            value = value.apply_affinity(aff);
                        }
                        record.push(value);
                    }
                    self.records.insert(op.p3, record);
                    self.set(op.p3, Value::Null)?;
                }
                Opcode::IdxInsert => {
                    let record = self
                        .records
                        .get(&op.p2)
                        .cloned()
                        .ok_or_else(|| anyhow!("register {} holds no record", op.p2))?;
                    let cursor = self.cursor(op.p1)?;
                    let CursorData::Ephemeral(entries) = &cursor.data else {
                        bail!("IdxInsert into a read-only cursor");
                    };
                    let at = entries
                        .borrow()
                        .partition_point(|k| cursor.compare_keys(k, &record) == Ordering::Less);
                    entries.borrow_mut().insert(at, record);
                }
                Opcode::Found | Opcode::NotFound => {
                    let n = match op.p4 {
                        P4::Int(n) => n,
                        _ => 1,
                    };
                    let probe: Vec<Value> = (0..n).map(|i| self.register(op.p3 + i).clone()).collect();
                    let found = self.cursor(op.p1)?.seek_prefix(&probe);
                    if found == (op.opcode == Opcode::Found) {
                        next = jump;
                    }
                }
                Opcode::SeekRowid => {
                    let key = match self.register(op.p3).clone().apply_affinity(Affinity::Numeric) {
                        Value::Integer(i) => Some(i),
                        _ => None,
                    };
                    let cursor = self.cursor(op.p1)?;
                    let CursorData::Table(rows) = &cursor.data else {
                        bail!("SeekRowid on a non-table cursor");
                    };
                    let pos = key.and_then(|k| rows.iter().position(|(r, _)| *r == k));
                    cursor.pos = pos;
                    cursor.null_row = false;
                    if pos.is_none() {
                        next = jump;
                    }
                }
                Opcode::Column => {
                    let value = match self.cursor(op.p1)?.column(op.p2) {
                        Some(v) => v,
                        None => match &op.p4 {
                            P4::Value(default) => default.clone(),
                            _ => Value::Null,
                        },
                    };
                    self.set(op.p3, value)?;
                }
                Opcode::Rowid => {
                    let value = self
                        .cursor(op.p1)?
                        .rowid()
                        .map_or(Value::Null, Value::Integer);
                    self.set(op.p2, value)?;
                }
                Opcode::NullRow => {
                    let cursor = self.cursor(op.p1)?;
                    cursor.null_row = true;
                }
                Opcode::IfNullRow => {
                    if self.cursor(op.p1)?.null_row {
                        self.set(op.p3, Value::Null)?;
                        next = jump;
                    }
                }
                Opcode::Rewind => {
                    let cursor = self.cursor(op.p1)?;
                    cursor.null_row = false;
                    if cursor.len() == 0 {
                        cursor.pos = None;
                        next = jump;
                    } else {
                        cursor.pos = Some(0);
                    }
                }
                Opcode::Next => {
                    let cursor = self.cursor(op.p1)?;
                    let pos = cursor.pos.map_or(0, |p| p + 1);
                    if pos < cursor.len() {
                        cursor.pos = Some(pos);
                        next = jump;
                    } else {
                        cursor.pos = None;
                    }
                }
                Opcode::ResultRow => {
                    let row = (0..op.p2).map(|i| self.register(op.p1 + i).clone()).collect();
                    rows.push(row);
                }
                Opcode::Noop => {}
            }
            pc = next;
        }
        Ok(rows)
    }

    fn open_read(&mut self, cursor: i32, p4: &P4) -> Result<()> {
        let opened = match p4 {
            P4::Table(table) => Cursor::new(CursorData::Table(self.store.rows(table.table_id)), Vec::new()),
            P4::Index(index) => {
                let table = self
                    .catalog
                    .get_table_by_id(index.table_id)
                    .ok_or_else(|| anyhow!("index {} has no table", index.index_name))?;
                let collations: Vec<Option<Arc<CollSeq>>> = index
                    .key_columns
                    .iter()
                    .map(|k| self.catalog.collation(&k.collation))
                    .collect();
                let mut keys: Vec<Vec<Value>> = self
                    .store
                    .rows(table.table_id)
                    .into_iter()
                    .map(|(rowid, row)| {
                        let mut key: Vec<Value> = index
                            .key_columns
                            .iter()
                            .map(|k| {
                                if table.is_rowid(k.column) {
                                    Value::Integer(rowid)
                                } else {
                                    row.get(k.column as usize).cloned().unwrap_or(Value::Null)
                                }
                            })
                            .collect();
                        key.push(Value::Integer(rowid));
                        key
                    })
                    .collect();
                let sorter = Cursor::new(CursorData::Index(Vec::new()), collations.clone());
                keys.sort_by(|a, b| sorter.compare_keys(a, b));
                Cursor::new(CursorData::Index(keys), collations)
            }
            other => bail!("OpenRead needs a table or index, got {:?}", other),
        };
        self.cursors.insert(cursor, opened);
        Ok(())
    }

    /// Execute the comparison at `pc`. Returns true if the jump is taken.
    fn compare(&mut self, pc: usize) -> Result<bool> {
        let op = &self.program.ops[pc];
        let flags = CmpFlags::from_bits_retain(op.p5);
        let (left, right) = (self.register(op.p1).clone(), self.register(op.p3).clone());

        if left.is_null() || right.is_null() {
            if flags.contains(CmpFlags::NULLEQ) {
                let ord = if left.is_null() && right.is_null() {
                    Ordering::Equal
                } else {
                    Ordering::Less
                };
                return self.finish_compare(pc, ord);
            }
            self.last_compare = Ordering::Less;
            if flags.contains(CmpFlags::STOREP2) {
                self.set(op.p2, Value::Null)?;
                return Ok(false);
            }
            return Ok(flags.contains(CmpFlags::JUMPIFNULL));
        }

        let affinity = flags.affinity();
        let (left, right) = if affinity.is_numeric() {
            (numeric_if_text(left), numeric_if_text(right))
        } else if affinity == Affinity::Text {
            (left.apply_affinity(Affinity::Text), right.apply_affinity(Affinity::Text))
        } else {
            (left, right)
        };
        let ord = match &op.p4 {
            P4::Collation(coll) => left.compare_with(&right, |a, b| coll.compare(a, b)),
            _ => left.compare(&right),
        };
        self.finish_compare(pc, ord)
    }

    fn finish_compare(&mut self, pc: usize, ord: Ordering) -> Result<bool> {
        let op = &self.program.ops[pc];
        let flags = CmpFlags::from_bits_retain(op.p5);
        self.last_compare = ord;
        let result = match op.opcode {
            Opcode::Eq => ord == Ordering::Equal,
            Opcode::Ne => ord != Ordering::Equal,
            Opcode::Lt => ord == Ordering::Less,
            Opcode::Le => ord != Ordering::Greater,
            Opcode::Gt => ord == Ordering::Greater,
            Opcode::Ge => ord != Ordering::Less,
            other => bail!("{} is not a comparison", other),
        };
        if flags.contains(CmpFlags::STOREP2) {
            if flags.contains(CmpFlags::KEEPNULL) && (op.opcode == Opcode::Eq) == result {
                return Ok(false);
            }
            self.set(op.p2, Value::boolean(result))?;
            return Ok(false);
        }
        Ok(result)
    }
}

fn numeric_if_text(value: Value) -> Value {
    match value {
        Value::Text(_) => value.apply_affinity(Affinity::Numeric),
        other => other,
    }
}

/// Decode the affinity operand of `Cast`, given as an affinity code.
fn affinity_operand(p2: i32) -> Result<Affinity> {
    u8::try_from(p2)
        .ok()
        .and_then(|b| Affinity::from_code(char::from(b)))
        .ok_or_else(|| anyhow!("bad affinity operand {}", p2))
}

fn arithmetic(opcode: Opcode, a: &Value, b: &Value) -> Value {
    if a.is_null() || b.is_null() {
        return Value::Null;
    }
    match (a.to_numeric(), b.to_numeric()) {
        (Value::Integer(x), Value::Integer(y)) => {
            let exact = match opcode {
                Opcode::Add => x.checked_add(y),
                Opcode::Subtract => x.checked_sub(y),
                Opcode::Multiply => x.checked_mul(y),
                Opcode::Divide => {
                    if y == 0 {
                        return Value::Null;
                    }
                    x.checked_div(y)
                }
                _ => {
                    if y == 0 {
                        return Value::Null;
                    }
                    Some(x.checked_rem(y).unwrap_or(0))
                }
            };
            match exact {
                Some(v) => Value::Integer(v),
                None => real_arithmetic(opcode, x as f64, y as f64),
            }
        }
        (x, y) => real_arithmetic(opcode, x.as_real(), y.as_real()),
    }
}

fn real_arithmetic(opcode: Opcode, x: f64, y: f64) -> Value {
    match opcode {
        Opcode::Add => Value::real(x + y),
        Opcode::Subtract => Value::real(x - y),
        Opcode::Multiply => Value::real(x * y),
        Opcode::Divide => {
            if y == 0.0 {
                Value::Null
            } else {
                Value::real(x / y)
            }
        }
        _ => {
            let (xi, yi) = (x as i64, y as i64);
            if yi == 0 {
                Value::Null
            } else {
                Value::Real(xi.checked_rem(yi).unwrap_or(0) as f64)
            }
        }
    }
}

fn bitwise(opcode: Opcode, a: &Value, b: &Value) -> Value {
    if a.is_null() || b.is_null() {
        return Value::Null;
    }
    let (x, y) = (a.as_integer(), b.as_integer());
    let shift = |x: i64, n: i64| -> i64 {
        if n >= 64 {
            0
        } else if n >= 0 {
            x << n
        } else if n <= -64 {
            if x < 0 {
                -1
            } else {
                0
            }
        } else {
            x >> -n
        }
    };
    Value::Integer(match opcode {
        Opcode::BitAnd => x & y,
        Opcode::BitOr => x | y,
        Opcode::ShiftLeft => shift(x, y),
        _ => shift(x, y.saturating_neg()),
    })
}
