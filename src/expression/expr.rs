//! Expression tree definitions.

use crate::catalog::{TableInfo, ROWID_COLUMN};
use crate::expression::operator::{BinaryOperator, UnaryOperator};
use crate::expression::{ExprList, Select};
use bitflags::bitflags;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

bitflags! {
    /// Properties attached to an expression node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ExprFlags: u32 {
        /// Originates in the ON or USING clause of an outer join
        const FROM_JOIN = 0x0001;
        /// DISTINCT aggregate
        const DISTINCT = 0x0002;
        /// The tree contains a COLLATE operator
        const COLLATE = 0x0004;
        /// The tree contains a sub-select
        const SUBQUERY = 0x0008;
        /// The tree contains a function call
        const HAS_FUNC = 0x0010;
        /// Correlated sub-select: must be re-evaluated on every use
        const VAR_SELECT = 0x0020;
        /// Column on the NULL side of a LEFT JOIN
        const CAN_BE_NULL = 0x0040;
        /// Deterministic function, set during name resolution
        const CONST_FUNC = 0x0080;
        /// UNLIKELY(), LIKELY() or LIKELIHOOD() call, set during name resolution
        const UNLIKELY = 0x0100;
        /// Identifier was double-quoted
        const QUOTED = 0x0200;
        /// Reduced copy made for the schema
        const REDUCED = 0x0400;
        /// Token-only copy: children were not copied
        const TOKEN_ONLY = 0x0800;
    }
}

/// Flags that a parent inherits from its children
const PROPAGATE: ExprFlags = ExprFlags::COLLATE
    .union(ExprFlags::SUBQUERY)
    .union(ExprFlags::HAS_FUNC);

/// Identity of a tree node, shared by its copies. Used to find code that was
/// already generated for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        NodeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Integer literal payload. Values that fit in 32 bits are stored inline,
/// others keep their source text and are parsed at code generation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntLiteral {
    Inline(i32),
    Text(String),
}

/// Reference to a table column. `column` is `ROWID_COLUMN` for the rowid.
#[derive(Debug, Clone)]
pub struct ColumnRef {
    pub cursor: i32,
    pub column: i16,
    pub table: Option<Arc<TableInfo>>,
    /// Constant the WHERE clause proved this column equal to
    pub fixed: Option<Box<Expr>>,
}

impl ColumnRef {
    pub fn name(&self) -> String {
        match self.table.as_ref().and_then(|t| t.column(self.column)) {
            Some(info) => info.column_name.clone(),
            None if self.column == ROWID_COLUMN => "rowid".to_string(),
            None => format!("c{}", self.column),
        }
    }
}

/// Window definition shared by every function call that uses it.
#[derive(Debug, Clone, Default)]
pub struct WindowDef {
    pub name: Option<String>,
    pub partition_by: ExprList,
    pub order_by: ExprList,
}

#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub name: String,
    pub args: ExprList,
    pub window: Option<Arc<WindowDef>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaiseAction {
    Ignore,
    Rollback,
    Abort,
    Fail,
}

/// Right-hand side of an IN operator
#[derive(Debug, Clone)]
pub enum InRhs {
    List(ExprList),
    Select(Box<Select>),
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Null,
    Integer(IntLiteral),
    /// Real literal, kept as source text
    Float(String),
    String(String),
    /// Blob literal as hex digits
    Blob(String),
    Boolean(bool),
    /// Bound parameter, numbered from 1
    Variable { index: i32, name: Option<String> },
    /// Identifier not yet resolved to a column
    Id(String),
    Column(ColumnRef),
    /// Column whose value is held by an aggregate accumulator
    AggColumn { index: usize, column: ColumnRef },
    /// Aggregate function whose result is held in an accumulator register
    AggFunction { index: usize, call: FunctionCall },
    /// A value already computed into register `reg`; `original` is the
    /// expression it came from and still drives affinity and collation.
    Register { reg: i32, original: Box<Expr> },
    Unary { op: UnaryOperator, operand: Box<Expr> },
    Binary { op: BinaryOperator, left: Box<Expr>, right: Box<Expr> },
    Collate { operand: Box<Expr>, collation: String },
    Cast { operand: Box<Expr>, type_name: String },
    Function(FunctionCall),
    Case {
        base: Option<Box<Expr>>,
        arms: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },
    Between { operand: Box<Expr>, low: Box<Expr>, high: Box<Expr> },
    In { operand: Box<Expr>, rhs: InRhs },
    Exists(Box<Select>),
    Subquery(Box<Select>),
    /// Column `column` of a multi-column sub-select shared by several
    /// nodes. `expected` is the number of columns the assignment expects.
    SelectColumn { subquery: Arc<Expr>, column: usize, expected: usize },
    Vector(ExprList),
    /// Yields NULL when `cursor` is on its null row, else `operand`
    IfNullRow { cursor: i32, operand: Box<Expr> },
    Raise { action: RaiseAction, message: Option<String> },
}

/// Expression tree node
#[derive(Debug, Clone)]
pub struct Expr {
    kind: ExprKind,
    flags: ExprFlags,
    height: u32,
    id: NodeId,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        let mut expr = Expr {
            kind,
            flags: ExprFlags::empty(),
            height: 1,
            id: NodeId::next(),
        };
        expr.set_height_and_flags();
        expr
    }

    fn set_height_and_flags(&mut self) {
        let mut height = 0;
        let mut flags = ExprFlags::empty();
        self.for_each_child(|child| {
            height = height.max(child.height);
            flags |= child.flags & PROPAGATE;
        });
        for select in self.selects() {
            height = height.max(select.height());
            flags |= ExprFlags::SUBQUERY;
        }
        match &self.kind {
            ExprKind::Collate { .. } => flags |= ExprFlags::COLLATE,
            ExprKind::Function(_) | ExprKind::AggFunction { .. } => flags |= ExprFlags::HAS_FUNC,
            ExprKind::SelectColumn { .. } => flags |= ExprFlags::SUBQUERY,
            _ => {}
        }
        self.height = height + 1;
        self.flags |= flags;
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn into_kind(self) -> ExprKind {
        self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut ExprKind {
        &mut self.kind
    }

    pub fn flags(&self) -> ExprFlags {
        self.flags
    }

    pub fn has_flag(&self, flag: ExprFlags) -> bool {
        self.flags.intersects(flag)
    }

    pub fn with_flags(mut self, flags: ExprFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub(crate) fn set_flags(&mut self, flags: ExprFlags) {
        self.flags |= flags;
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Visit the direct child expressions, not descending into sub-selects.
    pub fn for_each_child<'a>(&'a self, mut f: impl FnMut(&'a Expr)) {
        match &self.kind {
            ExprKind::Null
            | ExprKind::Integer(_)
            | ExprKind::Float(_)
            | ExprKind::String(_)
            | ExprKind::Blob(_)
            | ExprKind::Boolean(_)
            | ExprKind::Variable { .. }
            | ExprKind::Id(_)
            | ExprKind::AggColumn { .. }
            | ExprKind::Exists(_)
            | ExprKind::Subquery(_)
            | ExprKind::Raise { .. } => {}
            ExprKind::Column(col) => {
                if let Some(fixed) = &col.fixed {
                    f(fixed);
                }
            }
            ExprKind::AggFunction { call, .. } | ExprKind::Function(call) => {
                call.args.iter().for_each(|e| f(e));
            }
            ExprKind::Register { original, .. } => f(original),
            ExprKind::Unary { operand, .. }
            | ExprKind::Collate { operand, .. }
            | ExprKind::Cast { operand, .. }
            | ExprKind::IfNullRow { operand, .. } => f(operand),
            ExprKind::Binary { left, right, .. } => {
                f(left);
                f(right);
            }
            ExprKind::Case {
                base,
                arms,
                otherwise,
            } => {
                if let Some(base) = base {
                    f(base);
                }
                for (when, then) in arms {
                    f(when);
                    f(then);
                }
                if let Some(otherwise) = otherwise {
                    f(otherwise);
                }
            }
            ExprKind::Between {
                operand,
                low,
                high,
            } => {
                f(operand);
                f(low);
                f(high);
            }
            ExprKind::In { operand, rhs } => {
                f(operand);
                if let InRhs::List(list) = rhs {
                    list.iter().for_each(|e| f(e));
                }
            }
            ExprKind::SelectColumn { subquery, .. } => f(subquery),
            ExprKind::Vector(list) => list.iter().for_each(|e| f(e)),
        }
    }

    /// Mutable counterpart of [`Expr::for_each_child`].
    pub(crate) fn for_each_child_mut(&mut self, mut f: impl FnMut(&mut Expr)) {
        match &mut self.kind {
            ExprKind::Column(col) => {
                if let Some(fixed) = &mut col.fixed {
                    f(fixed);
                }
            }
            ExprKind::AggFunction { call, .. } | ExprKind::Function(call) => {
                call.args.iter_mut().for_each(f);
            }
            ExprKind::Register { original, .. } => f(original),
            ExprKind::Unary { operand, .. }
            | ExprKind::Collate { operand, .. }
            | ExprKind::Cast { operand, .. }
            | ExprKind::IfNullRow { operand, .. } => f(operand),
            ExprKind::Binary { left, right, .. } => {
                f(left);
                f(right);
            }
            ExprKind::Case {
                base,
                arms,
                otherwise,
            } => {
                if let Some(base) = base {
                    f(base);
                }
                for (when, then) in arms {
                    f(when);
                    f(then);
                }
                if let Some(otherwise) = otherwise {
                    f(otherwise);
                }
            }
            ExprKind::Between {
                operand,
                low,
                high,
            } => {
                f(operand);
                f(low);
                f(high);
            }
            ExprKind::In { operand, rhs } => {
                f(operand);
                if let InRhs::List(list) = rhs {
                    list.iter_mut().for_each(f);
                }
            }
            ExprKind::Vector(list) => list.iter_mut().for_each(f),
            _ => {}
        }
    }

    /// Sub-selects owned directly by this node.
    pub fn selects(&self) -> Vec<&Select> {
        match &self.kind {
            ExprKind::Exists(select) | ExprKind::Subquery(select) => vec![select.as_ref()],
            ExprKind::In {
                rhs: InRhs::Select(select),
                ..
            } => vec![select.as_ref()],
            _ => Vec::new(),
        }
    }

    /// True if this is a leaf node with no children and no sub-select.
    pub fn is_leaf(&self) -> bool {
        let mut leaf = true;
        self.for_each_child(|_| leaf = false);
        leaf && self.selects().is_empty()
    }

    /// Copy the node for the schema. The copy keeps only what code
    /// generation needs and is flagged as reduced.
    pub fn reduced_copy(&self) -> Expr {
        let mut copy = self.clone();
        copy.flags |= ExprFlags::REDUCED;
        if copy.is_leaf() {
            copy.flags |= ExprFlags::TOKEN_ONLY;
        }
        copy
    }

    // Literals

    pub fn null() -> Self {
        Expr::new(ExprKind::Null)
    }

    pub fn integer(value: i64) -> Self {
        match i32::try_from(value) {
            Ok(v) => Expr::new(ExprKind::Integer(IntLiteral::Inline(v))),
            Err(_) => Expr::new(ExprKind::Integer(IntLiteral::Text(value.to_string()))),
        }
    }

    /// Integer literal from source text; stored inline when it fits.
    pub fn integer_text(text: &str) -> Self {
        match text.parse::<i32>() {
            Ok(v) => Expr::new(ExprKind::Integer(IntLiteral::Inline(v))),
            Err(_) => Expr::new(ExprKind::Integer(IntLiteral::Text(text.to_string()))),
        }
    }

    pub fn float(text: &str) -> Self {
        Expr::new(ExprKind::Float(text.to_string()))
    }

    pub fn string(text: &str) -> Self {
        Expr::new(ExprKind::String(text.to_string()))
    }

    pub fn blob_hex(hex: &str) -> Self {
        Expr::new(ExprKind::Blob(hex.to_string()))
    }

    pub fn boolean(value: bool) -> Self {
        Expr::new(ExprKind::Boolean(value))
    }

    pub fn variable(index: i32) -> Self {
        Expr::new(ExprKind::Variable { index, name: None })
    }

    pub fn named_variable(index: i32, name: &str) -> Self {
        Expr::new(ExprKind::Variable {
            index,
            name: Some(name.to_string()),
        })
    }

    pub fn ident(name: &str) -> Self {
        Expr::new(ExprKind::Id(name.to_string()))
    }

    // References

    pub fn column(cursor: i32, column: i16, table: Option<Arc<TableInfo>>) -> Self {
        Expr::new(ExprKind::Column(ColumnRef {
            cursor,
            column,
            table,
            fixed: None,
        }))
    }

    pub fn rowid(cursor: i32, table: Option<Arc<TableInfo>>) -> Self {
        Expr::column(cursor, ROWID_COLUMN, table)
    }

    /// Column the WHERE clause proved equal to `value`.
    pub fn fixed_column(
        cursor: i32,
        column: i16,
        table: Option<Arc<TableInfo>>,
        value: Expr,
    ) -> Self {
        Expr::new(ExprKind::Column(ColumnRef {
            cursor,
            column,
            table,
            fixed: Some(Box::new(value)),
        }))
    }

    pub fn register(reg: i32, original: Expr) -> Self {
        Expr::new(ExprKind::Register {
            reg,
            original: Box::new(original),
        })
    }

    pub fn agg_column(index: usize, column: ColumnRef) -> Self {
        Expr::new(ExprKind::AggColumn { index, column })
    }

    pub fn agg_function(index: usize, name: &str, args: Vec<Expr>) -> Self {
        Expr::new(ExprKind::AggFunction {
            index,
            call: FunctionCall {
                name: name.to_string(),
                args: ExprList::from(args),
                window: None,
            },
        })
    }

    // Operators

    pub fn unary(op: UnaryOperator, operand: Expr) -> Self {
        Expr::new(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Self {
        Expr::new(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::And, left, right)
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::Or, left, right)
    }

    pub fn not(operand: Expr) -> Self {
        Self::unary(UnaryOperator::Not, operand)
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::Eq, left, right)
    }

    pub fn ne(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::Ne, left, right)
    }

    pub fn lt(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::Lt, left, right)
    }

    pub fn le(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::Le, left, right)
    }

    pub fn gt(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::Gt, left, right)
    }

    pub fn ge(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::Ge, left, right)
    }

    pub fn is(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::Is, left, right)
    }

    pub fn is_not(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::IsNot, left, right)
    }

    pub fn add(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::Add, left, right)
    }

    pub fn sub(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::Sub, left, right)
    }

    pub fn mul(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::Mul, left, right)
    }

    pub fn div(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::Div, left, right)
    }

    pub fn concat(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOperator::Concat, left, right)
    }

    pub fn negate(operand: Expr) -> Self {
        Self::unary(UnaryOperator::Negate, operand)
    }

    pub fn is_null(operand: Expr) -> Self {
        Self::unary(UnaryOperator::IsNull, operand)
    }

    pub fn not_null(operand: Expr) -> Self {
        Self::unary(UnaryOperator::NotNull, operand)
    }

    pub fn collate(operand: Expr, collation: &str) -> Self {
        Expr::new(ExprKind::Collate {
            operand: Box::new(operand),
            collation: collation.to_string(),
        })
    }

    pub fn cast(operand: Expr, type_name: &str) -> Self {
        Expr::new(ExprKind::Cast {
            operand: Box::new(operand),
            type_name: type_name.to_string(),
        })
    }

    pub fn function(name: &str, args: Vec<Expr>) -> Self {
        Expr::new(ExprKind::Function(FunctionCall {
            name: name.to_string(),
            args: ExprList::from(args),
            window: None,
        }))
    }

    pub fn window_function(name: &str, args: Vec<Expr>, window: Arc<WindowDef>) -> Self {
        Expr::new(ExprKind::Function(FunctionCall {
            name: name.to_string(),
            args: ExprList::from(args),
            window: Some(window),
        }))
    }

    pub fn case(base: Option<Expr>, arms: Vec<(Expr, Expr)>, otherwise: Option<Expr>) -> Self {
        Expr::new(ExprKind::Case {
            base: base.map(Box::new),
            arms,
            otherwise: otherwise.map(Box::new),
        })
    }

    pub fn between(operand: Expr, low: Expr, high: Expr) -> Self {
        Expr::new(ExprKind::Between {
            operand: Box::new(operand),
            low: Box::new(low),
            high: Box::new(high),
        })
    }

    pub fn not_between(operand: Expr, low: Expr, high: Expr) -> Self {
        Expr::not(Expr::between(operand, low, high))
    }

    pub fn in_list(operand: Expr, items: Vec<Expr>) -> Self {
        Expr::new(ExprKind::In {
            operand: Box::new(operand),
            rhs: InRhs::List(ExprList::from(items)),
        })
    }

    pub fn not_in_list(operand: Expr, items: Vec<Expr>) -> Self {
        Expr::not(Expr::in_list(operand, items))
    }

    pub fn in_select(operand: Expr, select: Select) -> Self {
        Expr::new(ExprKind::In {
            operand: Box::new(operand),
            rhs: InRhs::Select(Box::new(select)),
        })
    }

    pub fn exists(select: Select) -> Self {
        Expr::new(ExprKind::Exists(Box::new(select)))
    }

    pub fn subquery(select: Select) -> Self {
        Expr::new(ExprKind::Subquery(Box::new(select)))
    }

    /// One column of a sub-select shared between several nodes. All
    /// columns of `subquery` are computed once.
    pub fn select_column(subquery: Arc<Expr>, column: usize, expected: usize) -> Self {
        Expr::new(ExprKind::SelectColumn {
            subquery,
            column,
            expected,
        })
    }

    pub fn vector(items: Vec<Expr>) -> Self {
        Expr::new(ExprKind::Vector(ExprList::from(items)))
    }

    pub fn if_null_row(cursor: i32, operand: Expr) -> Self {
        Expr::new(ExprKind::IfNullRow {
            cursor,
            operand: Box::new(operand),
        })
    }

    pub fn raise(action: RaiseAction, message: Option<&str>) -> Self {
        Expr::new(ExprKind::Raise {
            action,
            message: message.map(str::to_string),
        })
    }

    // Vectors

    /// Number of fields: list length for a row value, column count for a
    /// sub-select, 1 for a scalar.
    pub fn vector_size(&self) -> usize {
        match &self.kind {
            ExprKind::Vector(list) => list.len(),
            ExprKind::Subquery(select) => select.columns.len(),
            ExprKind::Register { original, .. } => original.vector_size(),
            _ => 1,
        }
    }

    pub fn is_vector(&self) -> bool {
        self.vector_size() > 1
    }

    /// Field `i` of a row value, or the expression itself for a scalar.
    pub fn vector_field(&self, i: usize) -> &Expr {
        if self.is_vector() {
            match &self.kind {
                ExprKind::Vector(list) => return &list[i],
                ExprKind::Subquery(select) => return &select.columns[i],
                ExprKind::Register { original, .. } => return original.vector_field(i),
                _ => {}
            }
        }
        self
    }

    /// Strip COLLATE operators off the top of the tree.
    pub fn skip_collate(&self) -> &Expr {
        let mut e = self;
        while let ExprKind::Collate { operand, .. } = &e.kind {
            e = operand;
        }
        e
    }

    /// Strip COLLATE operators and likelihood hints off the top of the tree.
    pub fn skip_collate_and_likely(&self) -> &Expr {
        let mut e = self;
        loop {
            match &e.kind {
                ExprKind::Collate { operand, .. } => e = operand,
                ExprKind::Function(call)
                    if e.has_flag(ExprFlags::UNLIKELY) && !call.args.is_empty() =>
                {
                    e = &call.args[0]
                }
                _ => return e,
            }
        }
    }

    // Literal tests

    /// True for a literal whose value is known to be true, unless it comes
    /// from an outer join's ON clause.
    pub fn is_always_true(&self) -> bool {
        if self.has_flag(ExprFlags::FROM_JOIN) {
            return false;
        }
        match &self.kind {
            ExprKind::Boolean(value) => *value,
            ExprKind::Integer(IntLiteral::Inline(v)) => *v != 0,
            _ => false,
        }
    }

    pub fn is_always_false(&self) -> bool {
        !self.has_flag(ExprFlags::FROM_JOIN)
            && matches!(
                self.kind,
                ExprKind::Boolean(false) | ExprKind::Integer(IntLiteral::Inline(0))
            )
    }

    /// Value of a small integer literal, looking through unary plus and minus.
    pub fn as_integer(&self) -> Option<i32> {
        match &self.kind {
            ExprKind::Integer(IntLiteral::Inline(v)) => Some(*v),
            ExprKind::Unary {
                op: UnaryOperator::Positive,
                operand,
            } => operand.as_integer(),
            ExprKind::Unary {
                op: UnaryOperator::Negate,
                operand,
            } => operand.as_integer().and_then(i32::checked_neg),
            _ => None,
        }
    }

    /// False only when the expression provably cannot be NULL.
    pub fn can_be_null(&self) -> bool {
        let mut e = self;
        loop {
            match &e.kind {
                ExprKind::Unary {
                    op: UnaryOperator::Positive | UnaryOperator::Negate,
                    operand,
                } => e = operand,
                ExprKind::Register { original, .. } => e = original,
                _ => break,
            }
        }
        match &e.kind {
            ExprKind::Integer(_) | ExprKind::String(_) | ExprKind::Float(_) | ExprKind::Blob(_) => {
                false
            }
            ExprKind::Column(col) => {
                e.has_flag(ExprFlags::CAN_BE_NULL)
                    || match &col.table {
                        None => true,
                        Some(table) => col.column >= 0 && !table.column_not_null(col.column),
                    }
            }
            _ => true,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Null => write!(f, "NULL"),
            ExprKind::Integer(IntLiteral::Inline(v)) => write!(f, "{}", v),
            ExprKind::Integer(IntLiteral::Text(t)) | ExprKind::Float(t) => write!(f, "{}", t),
            ExprKind::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            ExprKind::Blob(hex) => write!(f, "x'{}'", hex),
            ExprKind::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            ExprKind::Variable { name: Some(n), .. } => write!(f, "{}", n),
            ExprKind::Variable { index, .. } => write!(f, "?{}", index),
            ExprKind::Id(name) => write!(f, "{}", name),
            ExprKind::Column(col) => write!(f, "{}", col.name()),
            ExprKind::AggColumn { column, .. } => write!(f, "{}", column.name()),
            ExprKind::AggFunction { call, .. } | ExprKind::Function(call) => {
                write!(f, "{}({})", call.name, call.args)
            }
            ExprKind::Register { reg, .. } => write!(f, "r[{}]", reg),
            ExprKind::Unary { op, operand } if op.is_postfix() => {
                write!(f, "{} {}", operand, op.as_str())
            }
            ExprKind::Unary {
                op: UnaryOperator::Not,
                operand,
            } => write!(f, "NOT {}", operand),
            ExprKind::Unary { op, operand } => write!(f, "{}{}", op.as_str(), operand),
            ExprKind::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.as_str(), right)
            }
            ExprKind::Collate { operand, collation } => {
                write!(f, "{} COLLATE {}", operand, collation)
            }
            ExprKind::Cast { operand, type_name } => {
                write!(f, "CAST({} AS {})", operand, type_name)
            }
            ExprKind::Case {
                base,
                arms,
                otherwise,
            } => {
                write!(f, "CASE")?;
                if let Some(base) = base {
                    write!(f, " {}", base)?;
                }
                for (when, then) in arms {
                    write!(f, " WHEN {} THEN {}", when, then)?;
                }
                if let Some(otherwise) = otherwise {
                    write!(f, " ELSE {}", otherwise)?;
                }
                write!(f, " END")
            }
            ExprKind::Between {
                operand,
                low,
                high,
            } => write!(f, "{} BETWEEN {} AND {}", operand, low, high),
            ExprKind::In {
                operand,
                rhs: InRhs::List(list),
            } => write!(f, "{} IN ({})", operand, list),
            ExprKind::In { operand, .. } => write!(f, "{} IN (SELECT ...)", operand),
            ExprKind::Exists(_) => write!(f, "EXISTS (SELECT ...)"),
            ExprKind::Subquery(_) => write!(f, "(SELECT ...)"),
            ExprKind::SelectColumn { column, .. } => write!(f, "(SELECT ...)[{}]", column),
            ExprKind::Vector(list) => write!(f, "({})", list),
            ExprKind::IfNullRow { operand, .. } => write!(f, "{}", operand),
            ExprKind::Raise { action, .. } => write!(f, "RAISE({:?})", action),
        }
    }
}
