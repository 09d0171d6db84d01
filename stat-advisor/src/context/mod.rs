//! Context construction.
//!
//! [`ContextBuilder`] turns a protocol, its schema tree and the raw records
//! into an immutable [`AnalysisContext`](crate::model::AnalysisContext).
//! Field lookup lives in [`resolver`], per-variable summaries in
//! [`distribution`] and paper extraction in [`literature`].

pub mod builder;
pub mod distribution;
pub mod literature;
pub mod resolver;

pub use builder::{flatten_schema, BuiltContext, ContextBuilder};
pub use resolver::{
    to_snake_case, AmbiguousMatch, FieldKeys, FieldResolver, ResolutionDiagnostics,
    ResolvedVariable,
};
