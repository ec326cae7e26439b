//! Type affinity: the preferred storage class of a column or expression.

use serde::Deserialize;

/// Type affinity.
///
/// `None` means the expression carries no affinity at all (literals,
/// arithmetic); `Blob` is the declared affinity of an untyped column. The
/// numeric affinities are ordered by strictness `Integer < Real < Numeric`
/// only in the sense of [`Affinity::is_numeric`]; the enum order itself
/// follows the affinity codes `A`..`E`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize)]
pub enum Affinity {
    #[default]
    None,
    Blob,
    Text,
    Numeric,
    Integer,
    Real,
}

impl Affinity {
    /// Derive the affinity of a declared column type or CAST target.
    ///
    /// The rules are applied in order: a name containing `INT` is INTEGER;
    /// `CHAR`, `CLOB` or `TEXT` is TEXT; `BLOB` or no type at all is BLOB;
    /// `REAL`, `FLOA` or `DOUB` is REAL; anything else is NUMERIC.
    pub fn from_type_name(type_name: Option<&str>) -> Self {
        let Some(name) = type_name else {
            return Affinity::Blob;
        };
        let upper = name.to_ascii_uppercase();
        if upper.contains("INT") {
            Affinity::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Affinity::Text
        } else if upper.contains("BLOB") || upper.trim().is_empty() {
            Affinity::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Affinity::Real
        } else {
            Affinity::Numeric
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Affinity::Numeric | Affinity::Integer | Affinity::Real)
    }

    pub fn is_none(self) -> bool {
        self == Affinity::None
    }

    /// Affinity used when a value of affinity `self` is compared against a
    /// value of affinity `other`.
    ///
    /// Numeric wins over text and blob when both sides carry an affinity;
    /// otherwise the side with an affinity wins over the side without.
    pub fn compare_with(self, other: Affinity) -> Affinity {
        match (self, other) {
            (Affinity::None, Affinity::None) => Affinity::Blob,
            (Affinity::None, aff) | (aff, Affinity::None) => aff,
            (a, b) if a.is_numeric() || b.is_numeric() => Affinity::Numeric,
            _ => Affinity::Blob,
        }
    }

    /// Single-character code used in instruction listings.
    pub fn code(self) -> char {
        match self {
            Affinity::None => '@',
            Affinity::Blob => 'A',
            Affinity::Text => 'B',
            Affinity::Numeric => 'C',
            Affinity::Integer => 'D',
            Affinity::Real => 'E',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            '@' => Some(Affinity::None),
            'A' => Some(Affinity::Blob),
            'B' => Some(Affinity::Text),
            'C' => Some(Affinity::Numeric),
            'D' => Some(Affinity::Integer),
            'E' => Some(Affinity::Real),
            _ => None,
        }
    }
}
