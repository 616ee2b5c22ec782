//! Callable classification by probing.
//!
//! Whether a live function is a constructor cannot be read off its value. It is
//! invoked with and without constructor semantics and the thrown messages are
//! matched against the host's wording. Probing runs library code, so it only happens
//! for functions that are about to be admitted as endpoints.

use crate::runtime::{is_builtin_method, ErrorName, ObjectRef, Thrown, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Constructor,
    Function,
    /// No evidence either way. Callers treat it as a function.
    Ambiguous,
}

impl CallableKind {
    pub fn is_constructor(self) -> bool {
        self == CallableKind::Constructor
    }
}

/// Fragments of the `TypeError` thrown when a constructor is called without `new`.
const REQUIRES_NEW: [&str; 3] = [
    "requires 'new'",
    "cannot be invoked without 'new'",
    "cannot call a class constructor without |new|",
];

const NOT_A_CONSTRUCTOR: &str = "is not a constructor";

pub fn classify_callable(f: &Value) -> CallableKind {
    if let Err(thrown) = f.call(Value::Undefined, Vec::new()) {
        if is_type_error_containing(&thrown, &REQUIRES_NEW) {
            return CallableKind::Constructor;
        }
    }

    if let Err(thrown) = f.construct(Vec::new()) {
        if is_type_error_containing(&thrown, &[NOT_A_CONSTRUCTOR]) {
            return CallableKind::Function;
        }
    }

    let Some(obj) = f.as_object() else {
        return CallableKind::Function;
    };
    if !obj.has_own("prototype") {
        return CallableKind::Function;
    }

    if let Some(prototype) = obj.get("prototype").as_object() {
        if !own_methods(prototype).is_empty() {
            return CallableKind::Constructor;
        }
    }

    // A function that initializes `this` is used as a constructor.
    let receiver = ObjectRef::ordinary();
    let _ = f.call(Value::Object(receiver.clone()), Vec::new());
    if !receiver.entries().is_empty() {
        return CallableKind::Constructor;
    }

    CallableKind::Ambiguous
}

/// Own function-valued properties of `obj`, excluding members every object inherits.
pub fn own_methods(obj: &ObjectRef) -> Vec<(String, Value)> {
    obj.own_keys()
        .into_iter()
        .filter(|key| !is_builtin_method(key))
        .filter_map(|key| {
            let value = obj.own_property(&key)?.value()?.clone();
            value.is_callable().then_some((key, value))
        })
        .collect()
}

fn is_type_error_containing(thrown: &Thrown, fragments: &[&str]) -> bool {
    if thrown.error_name() != Some(ErrorName::TypeError) {
        return false;
    }
    let message = thrown.message();
    fragments.iter().any(|fragment| message.contains(fragment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{new_function, ClassBuilder, FunctionFlavor, Invocation};

    #[test]
    fn test_class_is_constructor() {
        let class = ClassBuilder::new("Widget", 0, |_| Ok(Value::Undefined)).build();
        assert_eq!(classify_callable(&class), CallableKind::Constructor);
    }

    #[test]
    fn test_arrow_is_function() {
        let f = new_function("add", 2, FunctionFlavor::Arrow, |inv: Invocation| {
            Ok(Value::Number(inv.arg(0).as_number().unwrap_or(0.0)))
        });
        assert_eq!(classify_callable(&f), CallableKind::Function);
    }

    #[test]
    fn test_prototype_methods_make_constructor() {
        let class = ClassBuilder::with_flavor("Legacy", 0, FunctionFlavor::Ordinary, |_| {
            Ok(Value::Undefined)
        })
        .method("run", 0, |_| Ok(Value::Undefined))
        .build();
        assert_eq!(classify_callable(&class), CallableKind::Constructor);
    }

    #[test]
    fn test_this_initializer_is_constructor() {
        let f = new_function("Point", 0, FunctionFlavor::Ordinary, |inv: Invocation| {
            if let Some(this) = inv.this.as_object() {
                this.set("x", Value::Number(0.0));
            }
            Ok(Value::Undefined)
        });
        assert_eq!(classify_callable(&f), CallableKind::Constructor);
    }

    #[test]
    fn test_plain_function_is_ambiguous() {
        let f = new_function("compress", 1, FunctionFlavor::Ordinary, |_| {
            Ok(Value::string("ok"))
        });
        let kind = classify_callable(&f);
        assert_eq!(kind, CallableKind::Ambiguous);
        assert!(!kind.is_constructor());
    }
}
