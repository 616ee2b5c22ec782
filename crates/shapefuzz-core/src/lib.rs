//! Schema derivation and call-plan execution.
//!
//! A [`Schema`](shapefuzz_types::Schema) comes from one of two places:
//!
//! - **Static derivation** ([`derive`]): parse a type-declaration file and convert every
//!   exported declaration into signature guesses.
//! - **Reflection** ([`reflect`]): walk a loaded module, classify its callables and bind
//!   each schema entry to a live endpoint.
//!
//! A long-lived worker ([`GraphExecutor`] or [`SequenceExecutor`]) then replays call plans
//! against the bound endpoints and turns each outcome into a [`Verdict`].
//!
//! The library under test is represented through the [`runtime`] object model.

#![allow(clippy::type_complexity)]

pub mod config;
pub mod derive;
pub mod exec;
pub mod projects;
pub mod reflect;
pub mod runtime;

pub use config::WorkerConfig;
pub use derive::{derive_from_file, derive_from_source};
pub use exec::{
    validate_graph, with_oracle, Abort, DefaultOracle, GraphExecutor, Oracle, SequenceExecutor,
    Verdict,
};
pub use projects::{project_schema, PROJECTS};
pub use reflect::{load_schema, reflect_module, LoadedSchema};
