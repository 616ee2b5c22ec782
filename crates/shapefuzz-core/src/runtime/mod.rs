//! Object model of the target runtime.
//!
//! Libraries under test are exposed as [`Value`]s: plain data, objects with
//! prototype chains, callables with call/construct semantics and pending results. The
//! derivation and execution layers only ever talk to the library through this model.
//!
//! - [`value`]: values, objects and property descriptors
//! - [`function`]: callables, invocation flavors and [`ClassBuilder`]
//! - [`error`]: thrown exceptions
//! - [`builtins`]: host builtin classes and their schema entries
//! - [`module`]: module loading

pub mod builtins;
pub mod error;
pub mod function;
pub mod module;
pub mod value;

pub use builtins::{is_builtin_method, seed_schema, Builtins, BUILTIN_METHOD_NAMES, STD_CLASSES};
pub use error::{ErrorName, Thrown};
pub use function::{new_function, noop_function, ClassBuilder, FunctionFlavor, Invocation};
pub use module::{ModuleLoader, ModuleRegistry};
pub use value::{ObjectKind, ObjectRef, Property, Slot, Value};
