//! Host builtin classes.
//!
//! Both derivation pipelines register these under fixed endpoint names with the
//! `builtin` flag so that declared parameter types such as `Uint8Array` resolve to a
//! constructible class. Their methods are never mapped.

use shapefuzz_types::{CallConvention, EndpointName, Schema, SignatureGuess, Type, TypeGuess};

use super::error::{error_object, ErrorName, Thrown};
use super::function::{new_function, ClassBuilder, FunctionFlavor, Invocation};
use super::value::{ObjectKind, ObjectRef, Value};

/// Class names mapped to builtin constructors.
pub const STD_CLASSES: [&str; 7] = [
    "Uint8Array",
    "ArrayBuffer",
    "RegExp",
    "Buffer",
    "SharedArrayBuffer",
    "Error",
    "Duplex",
];

/// Members every object inherits; never treated as library methods.
pub const BUILTIN_METHOD_NAMES: [&str; 11] = [
    "constructor",
    "__defineGetter__",
    "__defineSetter__",
    "hasOwnProperty",
    "__lookupGetter__",
    "__lookupSetter__",
    "isPrototypeOf",
    "propertyIsEnumerable",
    "valueOf",
    "toLocaleString",
    "toString",
];

pub fn is_builtin_method(name: &str) -> bool {
    BUILTIN_METHOD_NAMES.contains(&name)
}

pub fn is_std_class(name: &str) -> bool {
    STD_CLASSES.contains(&name)
}

/// Largest byte length the builtin constructors allocate. Longer requests throw the
/// host's `RangeError` for an unallocatable length.
pub const MAX_BUFFER_LENGTH: usize = 1 << 24;

/// `n` as a byte length, if it is a non-negative integer within [`MAX_BUFFER_LENGTH`].
fn byte_length(n: f64) -> Option<usize> {
    (n.fract() == 0.0 && (0.0..=MAX_BUFFER_LENGTH as f64).contains(&n)).then_some(n as usize)
}

/// Signatures of the builtin endpoints.
pub fn builtin_signatures() -> Vec<(EndpointName, SignatureGuess)> {
    let constructor = |name: &str, args: Vec<TypeGuess>| {
        let mut sig =
            SignatureGuess::new(args, TypeGuess::class(name), CallConvention::Constructor);
        sig.builtin = true;
        (name.to_string(), sig)
    };
    let mut buffer_from = SignatureGuess::new(
        vec![TypeGuess::string()],
        TypeGuess::class("Buffer"),
        CallConvention::Free,
    );
    buffer_from.builtin = true;

    vec![
        constructor("Uint8Array", vec![]),
        constructor("ArrayBuffer", vec![TypeGuess::number()]),
        constructor("RegExp", vec![]),
        constructor("Buffer", vec![TypeGuess::number()]),
        constructor("SharedArrayBuffer", vec![TypeGuess::number()]),
        constructor("Error", vec![TypeGuess::optional(&Type::String)]),
        constructor("Duplex", vec![]),
        ("Buffer.from".to_string(), buffer_from),
    ]
}

/// Add every builtin entry missing from `schema`.
pub fn seed_schema(schema: &mut Schema) {
    for (name, sig) in builtin_signatures() {
        if !schema.contains(&name) {
            schema.insert(name, sig);
        }
    }
}

/// Live builtin callables keyed by endpoint name.
pub struct Builtins {
    entries: Vec<(EndpointName, Value)>,
}

impl Builtins {
    pub fn new() -> Self {
        let buffer = buffer_class();
        let buffer_from = buffer.get("from");
        let entries = vec![
            ("Uint8Array".to_string(), bytes_class("Uint8Array", 0, typed_array_length)),
            ("ArrayBuffer".to_string(), bytes_class("ArrayBuffer", 1, buffer_length)),
            ("RegExp".to_string(), regexp_class()),
            ("Buffer".to_string(), buffer),
            (
                "SharedArrayBuffer".to_string(),
                bytes_class("SharedArrayBuffer", 1, buffer_length),
            ),
            ("Error".to_string(), error_class()),
            ("Duplex".to_string(), duplex_class()),
            ("Buffer.from".to_string(), buffer_from),
        ];
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EndpointName, &Value)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }
}

impl Default for Builtins {
    fn default() -> Self {
        Self::new()
    }
}

fn instance_prototype(inv: &Invocation) -> Option<ObjectRef> {
    inv.this.as_object().and_then(ObjectRef::prototype)
}

fn typed_array_length(arg: &Value) -> Result<Vec<u8>, Thrown> {
    match arg {
        Value::Undefined => Ok(Vec::new()),
        Value::Number(n) => match byte_length(*n) {
            Some(len) => Ok(vec![0; len]),
            None => Err(Thrown::range_error(format!(
                "Invalid typed array length: {}",
                n
            ))),
        },
        Value::Object(obj) => match (obj.array_items(), obj.bytes()) {
            (Some(items), _) => Ok(items
                .iter()
                .map(|v| v.as_number().unwrap_or(0.0) as u8)
                .collect()),
            (_, Some(bytes)) => Ok(bytes),
            _ => Ok(Vec::new()),
        },
        _ => Ok(Vec::new()),
    }
}

fn buffer_length(arg: &Value) -> Result<Vec<u8>, Thrown> {
    match arg {
        Value::Undefined => Ok(Vec::new()),
        Value::Number(n) => byte_length(*n)
            .map(|len| vec![0; len])
            .ok_or_else(|| Thrown::range_error("Invalid array buffer length")),
        _ => Err(Thrown::range_error("Invalid array buffer length")),
    }
}

fn bytes_class(
    name: &str,
    length: usize,
    alloc: fn(&Value) -> Result<Vec<u8>, Thrown>,
) -> Value {
    new_function(name, length, FunctionFlavor::Builtin, move |inv| {
        let bytes = alloc(&inv.arg(0))?;
        Ok(ObjectRef::new(ObjectKind::Bytes(bytes), instance_prototype(&inv)).into())
    })
}

fn buffer_class() -> Value {
    let builder = ClassBuilder::with_flavor("Buffer", 1, FunctionFlavor::Ordinary, |inv| {
        let bytes = buffer_length(&inv.arg(0))?;
        Ok(ObjectRef::new(ObjectKind::Bytes(bytes), instance_prototype(&inv)).into())
    });
    let prototype = builder.prototype();
    builder
        .static_method("from", 1, move |inv| {
            let source = inv.arg(0);
            let bytes = match &source {
                Value::String(s) => s.as_bytes().to_vec(),
                Value::Object(obj) => match (obj.bytes(), obj.array_items()) {
                    (Some(bytes), _) => bytes,
                    (_, Some(items)) => items
                        .iter()
                        .map(|v| v.as_number().unwrap_or(0.0) as u8)
                        .collect(),
                    _ => return Err(buffer_from_type_error(&source)),
                },
                _ => return Err(buffer_from_type_error(&source)),
            };
            Ok(ObjectRef::new(ObjectKind::Bytes(bytes), Some(prototype.clone())).into())
        })
        .build()
}

fn buffer_from_type_error(received: &Value) -> Thrown {
    Thrown::type_error(format!(
        "The first argument must be of type string or an instance of Buffer, ArrayBuffer, \
         or Array or an Array-like Object. Received type {}",
        received.type_of()
    ))
}

const REGEXP_FLAGS: &str = "dgimsuvy";

fn regexp_class() -> Value {
    new_function("RegExp", 2, FunctionFlavor::Ordinary, |inv| {
        let source = match inv.arg(0) {
            Value::Undefined => "(?:)".to_string(),
            Value::String(s) => s,
            other => format!("{:?}", other),
        };
        let flags = match inv.arg(1) {
            Value::Undefined => String::new(),
            Value::String(s) => s,
            other => format!("{:?}", other),
        };

        let mut seen = String::new();
        for flag in flags.chars() {
            if !REGEXP_FLAGS.contains(flag) || seen.contains(flag) {
                return Err(Thrown::syntax_error(format!(
                    "Invalid flags supplied to RegExp constructor '{}'",
                    flags
                )));
            }
            seen.push(flag);
        }
        if let Some(reason) = regexp_syntax_error(&source) {
            return Err(Thrown::syntax_error(format!(
                "Invalid regular expression: /{}/{}: {}",
                source, flags, reason
            )));
        }

        let prototype = instance_prototype(&inv);
        Ok(ObjectRef::new(ObjectKind::RegExp { source, flags }, prototype).into())
    })
}

/// Structural check of a pattern: balanced groups and classes, no dangling escape.
fn regexp_syntax_error(source: &str) -> Option<&'static str> {
    let mut depth = 0usize;
    let mut in_class = false;
    let mut chars = source.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if chars.next().is_none() {
                    return Some("\\ at end of pattern");
                }
            }
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '(' if !in_class => depth += 1,
            ')' if !in_class => {
                if depth == 0 {
                    return Some("Unmatched ')'");
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    if in_class {
        Some("Unterminated character class")
    } else if depth > 0 {
        Some("Unterminated group")
    } else {
        None
    }
}

fn error_class() -> Value {
    new_function("Error", 1, FunctionFlavor::Ordinary, |inv| {
        let message = match inv.arg(0) {
            Value::Undefined => String::new(),
            Value::String(s) => s,
            other => format!("{:?}", other),
        };
        let error = error_object(ErrorName::Error, message);
        if let (Some(obj), Some(proto)) = (error.as_object(), instance_prototype(&inv)) {
            obj.set_prototype(Some(proto));
        }
        Ok(error)
    })
}

fn duplex_class() -> Value {
    new_function("Duplex", 1, FunctionFlavor::Ordinary, |inv| {
        let this = match inv.this.as_object() {
            Some(obj) if inv.is_construct => obj.clone(),
            _ => ObjectRef::ordinary(),
        };
        this.set("readable", Value::Boolean(true));
        this.set("writable", Value::Boolean(true));
        Ok(this.into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapefuzz_types::validate_schema;

    #[test]
    fn test_seeded_schema_is_valid() {
        let mut schema = Schema::new();
        seed_schema(&mut schema);
        assert_eq!(schema.len(), 8);
        assert!(schema.iter().all(|(_, sig)| sig.builtin));
        validate_schema(&schema).unwrap();
    }

    #[test]
    fn test_seed_keeps_existing_entries() {
        let mut schema = Schema::new();
        let custom = SignatureGuess::new(
            vec![TypeGuess::number()],
            TypeGuess::class("RegExp"),
            CallConvention::Constructor,
        );
        schema.insert("RegExp", custom.clone());
        seed_schema(&mut schema);
        assert_eq!(schema.get("RegExp"), Some(&custom));
    }

    #[test]
    fn test_typed_array_length_validation() {
        let builtins = Builtins::new();
        let ctor = builtins.get("Uint8Array").unwrap();
        let ok = ctor.construct(vec![Value::Number(4.0)]).unwrap();
        assert_eq!(ok.as_object().unwrap().bytes().unwrap().len(), 4);

        let err = ctor.construct(vec![Value::Number(-1.0)]).unwrap_err();
        assert_eq!(err.error_name(), Some(ErrorName::RangeError));
        assert!(err.message().starts_with("Invalid typed array length"));

        let err = ctor.call(Value::Undefined, vec![]).unwrap_err();
        assert!(err.message().contains("requires 'new'"));
    }

    #[test]
    fn test_oversized_lengths_throw_range_errors() {
        let builtins = Builtins::new();
        let huge = Value::Number(4.0e9);

        let err = builtins
            .get("Uint8Array")
            .unwrap()
            .construct(vec![huge.clone()])
            .unwrap_err();
        assert_eq!(err.error_name(), Some(ErrorName::RangeError));
        assert!(err.message().starts_with("Invalid typed array length"));

        for name in ["Buffer", "ArrayBuffer", "SharedArrayBuffer"] {
            let err = builtins
                .get(name)
                .unwrap()
                .construct(vec![huge.clone()])
                .unwrap_err();
            assert_eq!(err.error_name(), Some(ErrorName::RangeError), "{}", name);
            assert_eq!(err.message(), "Invalid array buffer length");
        }

        let over_limit = builtins
            .get("ArrayBuffer")
            .unwrap()
            .construct(vec![Value::Number(MAX_BUFFER_LENGTH as f64 + 1.0)]);
        assert!(over_limit.is_err());
    }

    #[test]
    fn test_regexp_flags() {
        let builtins = Builtins::new();
        let ctor = builtins.get("RegExp").unwrap();
        assert!(ctor
            .construct(vec![Value::string("a+"), Value::string("gi")])
            .is_ok());
        let err = ctor
            .construct(vec![Value::string("a"), Value::string("gg")])
            .unwrap_err();
        assert!(err
            .message()
            .contains("Invalid flags supplied to RegExp constructor"));
        let err = ctor.construct(vec![Value::string("(a")]).unwrap_err();
        assert!(err.message().starts_with("Invalid regular expression"));
    }

    #[test]
    fn test_buffer_from() {
        let builtins = Builtins::new();
        let from = builtins.get("Buffer.from").unwrap();
        let buf = from.call(Value::Undefined, vec![Value::string("hi")]).unwrap();
        assert_eq!(buf.as_object().unwrap().bytes(), Some(b"hi".to_vec()));
        assert!(buf.instance_of(builtins.get("Buffer").unwrap()));
        assert!(from.call(Value::Undefined, vec![Value::Number(1.0)]).is_err());
    }
}
