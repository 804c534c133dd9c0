//! CLI command implementations
//!
//! Handles all command-line interface operations:
//! - compile: Compile documents and print the result
//! - check: Compile documents and report diagnostics only

mod commands;
mod db_utils;

pub use commands::*;
pub use db_utils::*;
