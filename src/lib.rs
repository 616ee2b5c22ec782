//! shapefuzz
//!
//! Schema-driven fuzzing support for libraries written in a dynamically-typed runtime:
//!
//! - **Type guesses**: probabilistic descriptions of argument and return types
//! - **Schema derivation**: from type-declaration files or by reflecting over a loaded module
//! - **Plan execution**: dependency graphs and linear call sequences replayed against the
//!   library, with thrown exceptions classified by an oracle
//!
//! This crate re-exports the workspace members. See [`types`] for the data model and
//! [`exec`] for the interpreters.

pub use shapefuzz_core::{config, derive, exec, projects, reflect, runtime};
pub use shapefuzz_types as types;

pub use shapefuzz_core::{
    derive_from_file, derive_from_source, load_schema, project_schema, reflect_module,
    DefaultOracle, GraphExecutor, LoadedSchema, Oracle, SequenceExecutor, Verdict, WorkerConfig,
};
pub use shapefuzz_types::{validate_schema, ApiSeq, Graph, Schema, SignatureGuess, TypeGuess};
