//! Operator definitions for expressions.

/// Binary operators supported in expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    // Logical
    And,
    Or,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Is,
    IsNot,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Rem,

    // Bitwise
    BitAnd,
    BitOr,
    ShiftLeft,
    ShiftRight,

    // String
    Concat,
}

impl BinaryOperator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::Ne
                | BinaryOperator::Lt
                | BinaryOperator::Le
                | BinaryOperator::Gt
                | BinaryOperator::Ge
                | BinaryOperator::Is
                | BinaryOperator::IsNot
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    /// The comparison that is true exactly when `self` is false, for
    /// non-NULL operands.
    pub fn negate_comparison(&self) -> Option<BinaryOperator> {
        Some(match self {
            BinaryOperator::Eq => BinaryOperator::Ne,
            BinaryOperator::Ne => BinaryOperator::Eq,
            BinaryOperator::Lt => BinaryOperator::Ge,
            BinaryOperator::Le => BinaryOperator::Gt,
            BinaryOperator::Gt => BinaryOperator::Le,
            BinaryOperator::Ge => BinaryOperator::Lt,
            BinaryOperator::Is => BinaryOperator::IsNot,
            BinaryOperator::IsNot => BinaryOperator::Is,
            _ => return None,
        })
    }

    /// Get the display string for this operator
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Eq => "=",
            BinaryOperator::Ne => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Is => "IS",
            BinaryOperator::IsNot => "IS NOT",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::ShiftLeft => "<<",
            BinaryOperator::ShiftRight => ">>",
            BinaryOperator::Concat => "||",
        }
    }
}

/// Unary operators supported in expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    // Arithmetic
    Negate,
    Positive,
    BitNot,

    // Logical
    Not,

    // NULL checks
    IsNull,
    NotNull,

    // Truth tests: x IS [NOT] TRUE, x IS [NOT] FALSE
    IsTrue,
    IsNotTrue,
    IsFalse,
    IsNotFalse,
}

impl UnaryOperator {
    /// For truth tests, `(tests_for_true, negated)`.
    pub fn truth_test(&self) -> Option<(bool, bool)> {
        match self {
            UnaryOperator::IsTrue => Some((true, false)),
            UnaryOperator::IsNotTrue => Some((true, true)),
            UnaryOperator::IsFalse => Some((false, false)),
            UnaryOperator::IsNotFalse => Some((false, true)),
            _ => None,
        }
    }

    /// Get the display string for this operator
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Positive => "+",
            UnaryOperator::BitNot => "~",
            UnaryOperator::Not => "NOT",
            UnaryOperator::IsNull => "IS NULL",
            UnaryOperator::NotNull => "IS NOT NULL",
            UnaryOperator::IsTrue => "IS TRUE",
            UnaryOperator::IsNotTrue => "IS NOT TRUE",
            UnaryOperator::IsFalse => "IS FALSE",
            UnaryOperator::IsNotFalse => "IS NOT FALSE",
        }
    }

    /// Postfix operators are rendered after their operand.
    pub fn is_postfix(&self) -> bool {
        matches!(
            self,
            UnaryOperator::IsNull
                | UnaryOperator::NotNull
                | UnaryOperator::IsTrue
                | UnaryOperator::IsNotTrue
                | UnaryOperator::IsFalse
                | UnaryOperator::IsNotFalse
        )
    }
}
