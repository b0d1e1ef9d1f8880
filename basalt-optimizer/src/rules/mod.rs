//! The rewrite-rule library.
//!
//! Every rule here preserves its node's output symbol set, which is what
//! lets the driver install replacements into the memo without touching any
//! parent.

mod decorrelate_scalar_subquery;
mod merge_filters;
mod merge_projects;
mod remove_trivial_filter;

pub use decorrelate_scalar_subquery::{
    DecorrelateScalarSubquery, SUBQUERY_MULTIPLE_ROWS_MESSAGE,
};
pub use merge_filters::MergeFilters;
pub use merge_projects::MergeProjects;
pub use remove_trivial_filter::RemoveTrivialFilter;
