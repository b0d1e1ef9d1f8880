//! Error types for the basalt plan rewrite engine.
//!
//! Everything fallible in the workspace returns [`BasaltResult`]. The error
//! taxonomy is deliberately small:
//!
//! - [`BasaltError::Internal`] marks a violated invariant inside the
//!   optimizer itself. These are bugs, never user errors, and abort the
//!   compilation that hit them. Use the [`internal!`]/[`invariant!`] family
//!   of macros rather than constructing the variant by hand, so the message
//!   picks up source-location context in debug builds.
//! - [`BasaltError::Unsupported`] marks a plan construct the engine cannot
//!   express yet.
//! - [`BasaltError::InvalidQuery`] marks input that is wrong regardless of
//!   engine support.
//! - [`BasaltError::QueryFailed`] is the deferred runtime channel: it is
//!   never raised during planning, only when an embedded `fail()` call is
//!   actually evaluated against a row.

use thiserror::Error;

/// Error codes attached to runtime query failures.
///
/// These values are embedded into rewritten plans (as the first argument of
/// `fail()` calls) and surface to clients at execution time, so they are part
/// of the engine's external contract and must not be renumbered.
pub mod error_codes {
    /// A scalar subquery produced more than one row for some outer row.
    pub const SUBQUERY_MULTIPLE_ROWS: i64 = 28;

    /// Division by zero during expression evaluation.
    pub const DIVISION_BY_ZERO: i64 = 8;

    /// Arithmetic produced a value outside its type's range.
    pub const NUMERIC_VALUE_OUT_OF_RANGE: i64 = 19;
}

/// General error type to be used across the whole workspace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BasaltError {
    /// An engine invariant was violated. Always a bug in the optimizer, never
    /// a problem with the query being compiled.
    #[error("Internal invariant violated: {0}")]
    Internal(String),

    /// The plan uses a construct the engine does not support.
    #[error("SQL construct not supported: {0}")]
    Unsupported(String),

    /// The query being compiled is invalid.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A runtime failure produced by evaluating an embedded `fail()` call.
    /// Raised per violating row during execution, not during planning.
    #[error("Query failed (error code {code}): {message}")]
    QueryFailed {
        /// One of [`error_codes`].
        code: i64,
        /// Message surfaced verbatim to the client.
        message: String,
    },
}

impl BasaltError {
    /// Returns true if this error indicates an optimizer bug rather than a
    /// property of the query or its data.
    pub fn is_internal(&self) -> bool {
        matches!(self, BasaltError::Internal(_))
    }

    /// The error code for runtime failures, if this is one.
    pub fn error_code(&self) -> Option<i64> {
        match self {
            BasaltError::QueryFailed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// [`Result`] type alias using [`BasaltError`].
pub type BasaltResult<T> = Result<T, BasaltError>;

/// Renders ` (at file:line:col)` in debug builds and nothing in release
/// builds. Used by the error constructor macros below.
#[macro_export]
#[doc(hidden)]
macro_rules! __location_info {
    () => {
        if cfg!(debug_assertions) {
            format!(" (at {}:{}:{})", file!(), line!(), column!())
        } else {
            String::new()
        }
    };
}

/// Constructs a [`BasaltError::Internal`] from format arguments.
#[macro_export]
macro_rules! internal_err {
    ($($format_args:tt)*) => {
        $crate::BasaltError::Internal(
            format!("{}{}", format_args!($($format_args)*), $crate::__location_info!()),
        )
    };
}

/// Returns a [`BasaltError::Internal`] from the enclosing function.
#[macro_export]
macro_rules! internal {
    ($($format_args:tt)*) => {
        return Err($crate::internal_err!($($format_args)*).into())
    };
}

/// Constructs a [`BasaltError::Unsupported`] from format arguments.
#[macro_export]
macro_rules! unsupported_err {
    ($($format_args:tt)*) => {
        $crate::BasaltError::Unsupported(
            format!("{}{}", format_args!($($format_args)*), $crate::__location_info!()),
        )
    };
}

/// Returns a [`BasaltError::Unsupported`] from the enclosing function.
#[macro_export]
macro_rules! unsupported {
    ($($format_args:tt)*) => {
        return Err($crate::unsupported_err!($($format_args)*).into())
    };
}

/// Constructs a [`BasaltError::InvalidQuery`] from format arguments.
#[macro_export]
macro_rules! invalid_query_err {
    ($($format_args:tt)*) => {
        $crate::BasaltError::InvalidQuery(format!($($format_args)*))
    };
}

/// Returns a [`BasaltError::InvalidQuery`] from the enclosing function.
#[macro_export]
macro_rules! invalid_query {
    ($($format_args:tt)*) => {
        return Err($crate::invalid_query_err!($($format_args)*).into())
    };
}

/// Asserts a condition, returning a [`BasaltError::Internal`] instead of
/// panicking when it does not hold.
#[macro_export]
macro_rules! invariant {
    ($expr:expr, $($format_args:tt)*) => {
        if !$expr {
            $crate::internal!($($format_args)*)
        }
    };
    ($expr:expr) => {
        if !$expr {
            $crate::internal!("assertion failed: {}", stringify!($expr))
        }
    };
}

/// Asserts two expressions are equal, returning a [`BasaltError::Internal`]
/// instead of panicking when they are not.
#[macro_export]
macro_rules! invariant_eq {
    ($left:expr, $right:expr) => {{
        let (left, right) = (&$left, &$right);
        if *left != *right {
            $crate::internal!(
                "assertion failed: `(left == right)` (left: `{:?}`, right: `{:?}`)",
                left,
                right
            )
        }
    }};
    ($left:expr, $right:expr, $($format_args:tt)*) => {{
        let (left, right) = (&$left, &$right);
        if *left != *right {
            $crate::internal!(
                "assertion failed: `(left == right)` (left: `{:?}`, right: `{:?}`): {}",
                left,
                right,
                format_args!($($format_args)*)
            )
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checks_out(x: u32, y: u32) -> BasaltResult<u32> {
        invariant_eq!(x, y, "mismatched inputs");
        Ok(x + y)
    }

    #[test]
    fn invariant_eq_passes_through() {
        assert_eq!(checks_out(2, 2).unwrap(), 4);
    }

    #[test]
    fn invariant_eq_reports_both_sides() {
        let err = checks_out(2, 3).unwrap_err();
        assert!(err.is_internal());
        let msg = err.to_string();
        assert!(msg.contains("`2`"), "message was {msg:?}");
        assert!(msg.contains("`3`"), "message was {msg:?}");
        assert!(msg.contains("mismatched inputs"), "message was {msg:?}");
    }

    #[test]
    fn internal_err_is_internal() {
        assert!(internal_err!("broken {}", "badly").is_internal());
        assert!(!unsupported_err!("nope").is_internal());
    }

    #[test]
    fn query_failed_exposes_code() {
        let err = BasaltError::QueryFailed {
            code: error_codes::SUBQUERY_MULTIPLE_ROWS,
            message: "Scalar sub-query has returned multiple rows".into(),
        };
        assert_eq!(err.error_code(), Some(28));
        assert!(!err.is_internal());
    }
}
