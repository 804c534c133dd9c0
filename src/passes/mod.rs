//! Rewriting passes over the loaded IR
//!
//! Each pass takes a connection (or the store, for the worker-pool passes)
//! and returns what it changed plus any diagnostics. The compiler decides
//! the order; see [`crate::Compiler`].

pub mod component_fields;
pub mod fragment_arguments;
pub mod list_operations;
pub mod lists;
pub mod pagination;
pub mod runtime_scalars;

pub use component_fields::{discover_component_fields, rewrite_component_field_spreads};
pub use fragment_arguments::{inline_fragment_arguments, InlineOutput};
pub use list_operations::generate_list_operations;
pub use lists::{discover_lists, discovered_lists};
pub use pagination::prepare_pagination;
pub use runtime_scalars::rewrite_runtime_scalars;
