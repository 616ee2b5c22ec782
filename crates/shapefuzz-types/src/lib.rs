//! Shared data model for the shapefuzz workspace.
//!
//! This crate has no runtime dependencies on the target library. It defines:
//!
//! - [`schema`]: concrete [`Type`]s, probabilistic [`TypeGuess`]es, signatures and the
//!   [`Schema`] file format
//! - [`guess`]: the type-guess algebra (`union`, `intersect`, `optional`, ...)
//! - [`validate`]: invariant checks run before a schema is handed to a worker
//! - [`plan`]: the call plans (dependency [`Graph`]s and linear [`ApiSeq`]s) replayed by
//!   the interpreters

pub mod guess;
pub mod plan;
pub mod schema;
pub mod validate;

pub use plan::{
    ApiCall, ApiCallArg, ApiSeq, CallId, ConstantValue, Graph, IncomingEdge, Node, NodeId,
    NodePayload, OutgoingEdge, Signature,
};
pub use schema::{
    CallConvention, Distribution, EndpointName, KnownGuess, Schema, SignatureGuess, Type,
    TypeGuess, TypeKind,
};
pub use validate::{validate_schema, SchemaViolation};
