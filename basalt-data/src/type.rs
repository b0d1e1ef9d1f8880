use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic type of a plan symbol or scalar expression.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    /// Placeholder for when the type is not known.
    ///
    /// The post-rewrite validator treats an *actual* type of `Unknown` as a
    /// wildcard that matches any declared type; typed NULL literals and the
    /// return type of `fail()` are its main sources.
    Unknown,

    /// SQL boolean, with NULL as its third truth value.
    Boolean,

    /// [`i32`].
    Int,

    /// [`i64`].
    BigInt,

    /// [`f64`]: an IEEE 754 floating-point 64-bit real value.
    Double,

    /// Fixed-point `DECIMAL`/`NUMERIC`.
    Numeric {
        /// Maximum number of digits.
        prec: u16,
        /// Digits to the right of the decimal point.
        scale: u8,
    },

    /// `VARCHAR(n)`: max-length character string.
    VarChar(u16),

    /// Variable-length character string without a declared bound.
    Text,
}

impl DataType {
    /// Returns `true` if the type carries information.
    #[inline]
    pub fn is_known(&self) -> bool {
        !self.is_unknown()
    }

    /// Returns `true` if the type carries no information.
    #[inline]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns `true` if this is any integer type.
    #[inline]
    pub fn is_any_int(&self) -> bool {
        matches!(self, Self::Int | Self::BigInt)
    }

    /// Returns `true` if this is any character-string type.
    #[inline]
    pub fn is_any_text(&self) -> bool {
        matches!(self, Self::VarChar(_) | Self::Text)
    }

    /// Returns this type by value if not [`DataType::Unknown`], otherwise
    /// returns `other`.
    #[inline]
    pub fn or(self, other: Self) -> Self {
        if self.is_known() {
            self
        } else {
            other
        }
    }

    /// Returns `true` if a value of this type can be reinterpreted as
    /// `other` without changing its representation.
    ///
    /// This is the tolerance the post-rewrite validator extends to declared
    /// vs. actual type mismatches: widenings that keep the bits meaningful
    /// (`int` to `bigint`, `varchar(n)` to a longer `varchar` or to
    /// unbounded text, numeric precision growth at the same scale). Anything
    /// else is a genuine mismatch.
    pub fn type_only_coercible_to(&self, other: &Self) -> bool {
        match (self, other) {
            _ if self == other => true,
            (Self::Int, Self::BigInt) => true,
            (Self::VarChar(from), Self::VarChar(to)) => to >= from,
            (Self::VarChar(_), Self::Text) => true,
            (
                Self::Numeric {
                    prec: from_prec,
                    scale: from_scale,
                },
                Self::Numeric {
                    prec: to_prec,
                    scale: to_scale,
                },
            ) => from_scale == to_scale && to_prec >= from_prec,
            _ => false,
        }
    }
}

impl Default for DataType {
    #[inline]
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Unknown => f.write_str("unknown"),
            Self::Boolean => f.write_str("boolean"),
            Self::Int => f.write_str("int"),
            Self::BigInt => f.write_str("bigint"),
            Self::Double => f.write_str("double"),
            Self::Numeric { prec, scale } => write!(f, "numeric({prec}, {scale})"),
            Self::VarChar(n) => write!(f, "varchar({n})"),
            Self::Text => f.write_str("text"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_accepts_widening() {
        assert!(DataType::Int.type_only_coercible_to(&DataType::BigInt));
        assert!(DataType::VarChar(10).type_only_coercible_to(&DataType::VarChar(20)));
        assert!(DataType::VarChar(10).type_only_coercible_to(&DataType::Text));
        assert!(DataType::Numeric { prec: 10, scale: 2 }
            .type_only_coercible_to(&DataType::Numeric { prec: 12, scale: 2 }));
    }

    #[test]
    fn coercion_rejects_narrowing_and_cross_kind() {
        assert!(!DataType::BigInt.type_only_coercible_to(&DataType::Int));
        assert!(!DataType::VarChar(20).type_only_coercible_to(&DataType::VarChar(10)));
        assert!(!DataType::Text.type_only_coercible_to(&DataType::VarChar(20)));
        assert!(!DataType::VarChar(10).type_only_coercible_to(&DataType::BigInt));
        assert!(!DataType::Int.type_only_coercible_to(&DataType::Double));
        assert!(!DataType::Numeric { prec: 10, scale: 2 }
            .type_only_coercible_to(&DataType::Numeric { prec: 12, scale: 3 }));
    }

    #[test]
    fn coercion_is_reflexive() {
        for ty in [
            DataType::Unknown,
            DataType::Boolean,
            DataType::Int,
            DataType::BigInt,
            DataType::Double,
            DataType::Numeric { prec: 10, scale: 0 },
            DataType::VarChar(16),
            DataType::Text,
        ] {
            assert!(ty.type_only_coercible_to(&ty), "{ty} should coerce to itself");
        }
    }

    #[test]
    fn display_uses_sql_names() {
        assert_eq!(DataType::BigInt.to_string(), "bigint");
        assert_eq!(DataType::VarChar(32).to_string(), "varchar(32)");
        assert_eq!(
            DataType::Numeric { prec: 10, scale: 2 }.to_string(),
            "numeric(10, 2)"
        );
    }
}
