//! Instruction set of the register machine.

use crate::catalog::{CollSeq, IndexInfo, TableInfo};
use crate::function::FuncDef;
use crate::types::{Affinity, Value};
use bitflags::bitflags;
use std::fmt;
use std::sync::Arc;

/// Operation codes.
///
/// Operand conventions: arithmetic computes `r[P3] = r[P1] op r[P2]`;
/// comparisons test `r[P1] op r[P3]` and jump to `P2` (or store into
/// `r[P2]` with [`CmpFlags::STOREP2`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Jump to P2
    Init,
    Goto,
    /// Stop. A non-zero P1 is an error with message P4.
    Halt,
    Integer,
    Int64,
    Real,
    String8,
    Blob,
    /// Set r[P2] through r[P3] to NULL
    Null,
    Variable,
    /// Copy r[P1..=P1+P3] into r[P2..=P2+P3]
    Copy,
    SCopy,
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    BitAnd,
    BitOr,
    ShiftLeft,
    ShiftRight,
    Concat,
    And,
    Or,
    Not,
    BitNot,
    /// r[P2] = truth of r[P1], P3 if NULL, inverted when P4 is 1
    IsTrue,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Jump to P2 unless the previous comparison found equal operands
    ElseNotEq,
    If,
    IfNot,
    IsNull,
    NotNull,
    /// r[P1] = integer(r[P1]) + P2
    AddImm,
    /// r[P1] = CAST(r[P1] AS affinity P2)
    Cast,
    Affinity,
    RealAffinity,
    CollSeq,
    Function,
    /// Fall through the first time, jump to P2 afterwards
    Once,
    /// r[P1] = current address, then jump to P2
    Gosub,
    /// Jump to r[P1] + 1
    Return,
    OpenRead,
    OpenEphemeral,
    OpenDup,
    MakeRecord,
    IdxInsert,
    Found,
    NotFound,
    SeekRowid,
    Column,
    Rowid,
    NullRow,
    IfNullRow,
    Rewind,
    Next,
    ResultRow,
    Noop,
}

impl Opcode {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Opcode::Eq | Opcode::Ne | Opcode::Lt | Opcode::Le | Opcode::Gt | Opcode::Ge
        )
    }

    /// Opcodes whose P2 is a jump target.
    pub fn jumps(self) -> bool {
        self.is_comparison()
            || matches!(
                self,
                Opcode::Init
                    | Opcode::Goto
                    | Opcode::ElseNotEq
                    | Opcode::If
                    | Opcode::IfNot
                    | Opcode::IsNull
                    | Opcode::NotNull
                    | Opcode::Once
                    | Opcode::Gosub
                    | Opcode::Found
                    | Opcode::NotFound
                    | Opcode::SeekRowid
                    | Opcode::IfNullRow
                    | Opcode::Rewind
                    | Opcode::Next
            )
    }

    /// Comparison with the opposite outcome on non-NULL operands.
    pub fn negate_comparison(self) -> Option<Opcode> {
        match self {
            Opcode::Eq => Some(Opcode::Ne),
            Opcode::Ne => Some(Opcode::Eq),
            Opcode::Lt => Some(Opcode::Ge),
            Opcode::Le => Some(Opcode::Gt),
            Opcode::Gt => Some(Opcode::Le),
            Opcode::Ge => Some(Opcode::Lt),
            _ => None,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

bitflags! {
    /// P5 operand of a comparison.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CmpFlags: u16 {
        /// Affinity applied to the operands, see [`CmpFlags::affinity`]
        const AFF_MASK = 0x0007;
        /// With STOREP2, do not overwrite r[P2] when the outcome matches
        /// the opcode (Eq found equal, Ne found unequal)
        const KEEPNULL = 0x0008;
        /// Take the jump when either operand is NULL
        const JUMPIFNULL = 0x0010;
        /// Store 1, 0 or NULL into r[P2] instead of jumping
        const STOREP2 = 0x0020;
        /// NULL equals NULL (IS and IS NOT)
        const NULLEQ = 0x0080;
    }
}

impl CmpFlags {
    pub fn with_affinity(self, affinity: Affinity) -> Self {
        let code = match affinity {
            Affinity::None => 0,
            Affinity::Blob => 1,
            Affinity::Text => 2,
            Affinity::Numeric => 3,
            Affinity::Integer => 4,
            Affinity::Real => 5,
        };
        (self - CmpFlags::AFF_MASK) | CmpFlags::from_bits_retain(code)
    }

    pub fn affinity(self) -> Affinity {
        match (self & CmpFlags::AFF_MASK).bits() {
            1 => Affinity::Blob,
            2 => Affinity::Text,
            3 => Affinity::Numeric,
            4 => Affinity::Integer,
            5 => Affinity::Real,
            _ => Affinity::None,
        }
    }
}

/// Fourth operand.
#[derive(Debug, Clone, Default)]
pub enum P4 {
    #[default]
    None,
    Int(i32),
    Int64(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Collation(Arc<CollSeq>),
    Function(Arc<FuncDef>),
    /// One affinity code per register
    Affinity(String),
    /// Collating sequence of each key field of an ephemeral index
    KeyInfo(Vec<Arc<CollSeq>>),
    Table(Arc<TableInfo>),
    Index(Arc<IndexInfo>),
    /// Column default value
    Value(Value),
}

impl fmt::Display for P4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            P4::None => Ok(()),
            P4::Int(v) => write!(f, "{}", v),
            P4::Int64(v) => write!(f, "{}", v),
            P4::Real(v) => write!(f, "{}", crate::types::format_real(*v)),
            P4::Text(s) => write!(f, "{}", s),
            P4::Blob(b) => write!(f, "x'{}'", hex(b)),
            P4::Collation(c) => write!(f, "({})", c.name),
            P4::Function(def) => write!(f, "{}({})", def.name, def.n_arg),
            P4::Affinity(a) => write!(f, "{}", a),
            P4::KeyInfo(colls) => {
                let names: Vec<&str> = colls.iter().map(|c| c.name.as_str()).collect();
                write!(f, "k({},{})", colls.len(), names.join(","))
            }
            P4::Table(t) => write!(f, "{}", t.table_name),
            P4::Index(i) => write!(f, "{}", i.index_name),
            P4::Value(v) => write!(f, "{}", v),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: Opcode,
    pub p1: i32,
    pub p2: i32,
    pub p3: i32,
    pub p4: P4,
    pub p5: u16,
}

impl Instruction {
    pub fn new(opcode: Opcode, p1: i32, p2: i32, p3: i32) -> Self {
        Self {
            opcode,
            p1,
            p2,
            p3,
            p4: P4::None,
            p5: 0,
        }
    }

    pub fn cmp_flags(&self) -> CmpFlags {
        CmpFlags::from_bits_retain(self.p5)
    }
}
