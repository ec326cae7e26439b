//! Expression trees and the analyses the code generator runs over them:
//! affinity and collation inference, constant analysis, structural
//! comparison and name resolution.

pub mod compare;
pub mod constant;
pub mod expr;
pub mod expr_list;
pub mod operator;
pub mod resolve;
pub mod select;
pub mod typing;

pub use compare::{compare, compare_list, implies, ExprMatch};
pub use constant::{is_constant_or_group_by, rewrite_literals, ConstMode};
pub use expr::{
    ColumnRef, Expr, ExprFlags, ExprKind, FunctionCall, InRhs, IntLiteral, NodeId, RaiseAction,
    WindowDef,
};
pub use expr_list::{ExprList, ExprListItem, SortOrder};
pub use operator::{BinaryOperator, UnaryOperator};
pub use resolve::Resolver;
pub use select::{Select, SelectFlags, SrcItem};
pub use typing::{binary_compare_collation, collation_of, in_affinity};
