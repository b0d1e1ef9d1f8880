//! Shared data model for the basalt planner: identifiers, semantic types,
//! and constant values.
//!
//! This crate is the "type manager" side of the engine: [`DataType`] answers
//! the type-only-coercion questions the post-rewrite validator asks, and
//! [`Value`] is the constant representation embedded in plans and consumed by
//! the expression evaluator.

mod identifier;
mod r#type;
mod value;

pub use identifier::SqlIdentifier;
pub use r#type::DataType;
pub use value::Value;
