//! Exceptions thrown by target code.

use std::fmt;

use super::value::{ObjectKind, ObjectRef, Value};

/// Constructor name of a host error object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorName {
    Error,
    TypeError,
    RangeError,
    SyntaxError,
    ReferenceError,
}

impl fmt::Display for ErrorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorName::Error => "Error",
            ErrorName::TypeError => "TypeError",
            ErrorName::RangeError => "RangeError",
            ErrorName::SyntaxError => "SyntaxError",
            ErrorName::ReferenceError => "ReferenceError",
        };
        f.write_str(name)
    }
}

/// A thrown value. Anything may be thrown, not only error objects.
#[derive(Clone)]
pub struct Thrown {
    pub value: Value,
}

impl Thrown {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Throw a fresh error object.
    pub fn error(name: ErrorName, message: impl Into<String>) -> Self {
        Self::new(error_object(name, message.into()))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::error(ErrorName::TypeError, message)
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::error(ErrorName::RangeError, message)
    }

    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self::error(ErrorName::SyntaxError, message)
    }

    /// Name of the thrown error object, `None` for non-error throws.
    pub fn error_name(&self) -> Option<ErrorName> {
        let obj = self.value.as_object()?;
        let data = obj.data();
        match &data.kind {
            ObjectKind::Error { name, .. } => Some(*name),
            _ => None,
        }
    }

    /// Message of an error object; the string itself for a thrown string.
    pub fn message(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            Value::Object(obj) => match &obj.data().kind {
                ObjectKind::Error { message, .. } => message.clone(),
                _ => String::new(),
            },
            other => format!("{:?}", other),
        }
    }
}

/// Build an error object carrying `name` and `message`.
pub fn error_object(name: ErrorName, message: String) -> Value {
    let obj = ObjectRef::new(
        ObjectKind::Error {
            name,
            message: message.clone(),
        },
        None,
    );
    obj.define("message", super::value::Property::hidden(Value::String(message)));
    obj.define(
        "name",
        super::value::Property::hidden(Value::String(name.to_string())),
    );
    Value::Object(obj)
}

impl fmt::Display for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error_name() {
            Some(name) => write!(f, "{}: {}", name, self.message()),
            None => write!(f, "Uncaught {:?}", self.value),
        }
    }
}

impl fmt::Debug for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thrown({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let thrown = Thrown::range_error("Invalid typed array length: -1");
        assert_eq!(thrown.to_string(), "RangeError: Invalid typed array length: -1");
        assert_eq!(thrown.error_name(), Some(ErrorName::RangeError));
    }

    #[test]
    fn test_thrown_string() {
        let thrown = Thrown::new(Value::string("boom"));
        assert_eq!(thrown.message(), "boom");
        assert!(thrown.error_name().is_none());
    }
}
