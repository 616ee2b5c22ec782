//! Subcommands of the shapefuzz CLI.

pub mod infer;
pub mod validate;
