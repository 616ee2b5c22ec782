//! Call-plan execution.
//!
//! Both interpreters share one dispatch path ([`invoke`]) and one exception boundary
//! ([`with_oracle`]). Anything the library throws unwinds the whole plan as
//! [`Abort::Thrown`] and is classified once at the top. Plan/schema mismatches unwind as
//! [`Abort::Violation`] and are returned to the caller as errors.
//!
//! - [`graph`]: dependency-graph interpreter and [`GraphExecutor`]
//! - [`sequence`]: linear-trace interpreter and [`SequenceExecutor`]
//! - [`data`]: byte-stream value synthesis
//! - [`oracle`]: exception classification

pub mod data;
pub mod graph;
pub mod invoke;
pub mod oracle;
pub mod sequence;

use std::fmt;

use crate::runtime::Thrown;

pub use data::ByteProvider;
pub use graph::{validate_graph, GraphExecutor};
pub use invoke::invoke;
pub use oracle::{with_oracle, DefaultOracle, Oracle, Verdict, IGNORE_ALL};
pub use sequence::SequenceExecutor;

/// Why a plan stopped before completing.
#[derive(Debug)]
pub enum Abort {
    /// The library threw.
    Thrown(Thrown),
    /// The plan does not fit the schema or is malformed.
    Violation(anyhow::Error),
}

impl Abort {
    pub fn violation(message: impl fmt::Display) -> Self {
        Abort::Violation(anyhow::anyhow!("{}", message))
    }
}

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Abort::Thrown(thrown) => write!(f, "uncaught {}", thrown),
            Abort::Violation(err) => write!(f, "{:#}", err),
        }
    }
}

impl From<Thrown> for Abort {
    fn from(thrown: Thrown) -> Self {
        Abort::Thrown(thrown)
    }
}

impl From<anyhow::Error> for Abort {
    fn from(err: anyhow::Error) -> Self {
        Abort::Violation(err)
    }
}
