//! Schema invariant checks.
//!
//! A schema handed to a worker must be internally consistent:
//!
//! - every guess with `Object` mass carries an object shape, every guess with `Array`
//!   mass carries a value type and every guess with `Class` mass carries a class
//!   distribution
//! - every class named anywhere has a `Constructor` entry
//! - `Method` receivers are certainly instances of the owning class
//! - `Constructor` entries certainly return their own class

use std::fmt;

use anyhow::{bail, Result};

use crate::schema::{CallConvention, Schema, TypeGuess, TypeKind};

/// A single invariant violation, located by endpoint and guess path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub endpoint: String,
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}: {}", self.endpoint, self.path, self.message)
    }
}

/// Collect every invariant violation in `schema`.
pub fn check_schema(schema: &Schema) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();
    for (name, sig) in schema {
        let mut report = |path: String, message: String| {
            violations.push(SchemaViolation {
                endpoint: name.clone(),
                path,
                message,
            })
        };

        for (i, arg) in sig.args.iter().enumerate() {
            check_guess(schema, arg, format!(".args[{}]", i), &mut report);
        }
        check_guess(schema, &sig.ret, ".ret".to_string(), &mut report);

        match sig.callconv {
            CallConvention::Method => {
                let owner = match name.rsplit_once('.') {
                    Some((owner, _)) => owner,
                    None => {
                        report(String::new(), "method name has no owning class".into());
                        continue;
                    }
                };
                if !is_certainly_class(sig.args.first(), owner) {
                    report(
                        ".args[0]".into(),
                        format!("method receiver is not certainly an instance of {}", owner),
                    );
                }
            }
            CallConvention::Constructor => {
                if !is_certainly_class(Some(&sig.ret), name) {
                    report(
                        ".ret".into(),
                        format!("constructor does not certainly return {}", name),
                    );
                }
            }
            CallConvention::Free => {}
        }
    }
    violations
}

/// Fail with every violation listed when `schema` breaks an invariant.
pub fn validate_schema(schema: &Schema) -> Result<()> {
    let violations = check_schema(schema);
    if violations.is_empty() {
        return Ok(());
    }
    let listing: Vec<String> = violations.iter().map(|v| format!("  {}", v)).collect();
    bail!(
        "schema has {} invariant violation(s):\n{}",
        violations.len(),
        listing.join("\n")
    )
}

fn is_certainly_class(guess: Option<&TypeGuess>, class: &str) -> bool {
    let Some(known) = guess.and_then(TypeGuess::as_known) else {
        return false;
    };
    known.mass(TypeKind::Class) == 1.0
        && known
            .class_type
            .as_ref()
            .and_then(|dist| dist.get(class))
            .is_some_and(|mass| *mass == 1.0)
}

fn check_guess(
    schema: &Schema,
    guess: &TypeGuess,
    path: String,
    report: &mut impl FnMut(String, String),
) {
    let TypeGuess::Known(known) = guess else {
        return;
    };

    if known.mass(TypeKind::Object) > 0.0 {
        match &known.object_shape {
            Some(shape) => {
                for (key, member) in shape {
                    check_guess(schema, member, format!("{}.{}", path, key), report);
                }
            }
            None => report(path.clone(), "Object kind without objectShape".into()),
        }
    }

    if known.mass(TypeKind::Array) > 0.0 {
        match &known.array_value_type {
            Some(value) => check_guess(schema, value, format!("{}[]", path), report),
            None => report(path.clone(), "Array kind without arrayValueType".into()),
        }
    }

    if known.mass(TypeKind::Class) > 0.0 {
        match &known.class_type {
            Some(classes) => {
                for class in classes.keys() {
                    let has_constructor = schema
                        .get(class)
                        .is_some_and(|sig| sig.callconv == CallConvention::Constructor);
                    if !has_constructor {
                        report(
                            path.clone(),
                            format!("class {} has no Constructor entry", class),
                        );
                    }
                }
            }
            None => report(path.clone(), "Class kind without classType".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{KnownGuess, SignatureGuess};

    fn constructor(name: &str) -> SignatureGuess {
        SignatureGuess::new(vec![], TypeGuess::class(name), CallConvention::Constructor)
    }

    #[test]
    fn test_valid_class_schema() {
        let mut schema = Schema::new();
        schema.insert("Deflate", constructor("Deflate"));
        schema.insert(
            "Deflate.push",
            SignatureGuess::new(
                vec![TypeGuess::class("Deflate"), TypeGuess::string()],
                TypeGuess::boolean(),
                CallConvention::Method,
            ),
        );
        assert!(validate_schema(&schema).is_ok());
    }

    #[test]
    fn test_missing_constructor_is_reported() {
        let mut schema = Schema::new();
        schema.insert(
            "make",
            SignatureGuess::new(vec![], TypeGuess::class("Widget"), CallConvention::Free),
        );
        let violations = check_schema(&schema);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("Widget"));
        assert_eq!(violations[0].path, ".ret");
    }

    #[test]
    fn test_method_receiver_must_be_owner() {
        let mut schema = Schema::new();
        schema.insert("A", constructor("A"));
        schema.insert("B", constructor("B"));
        schema.insert(
            "A.run",
            SignatureGuess::new(
                vec![TypeGuess::class("B")],
                TypeGuess::any(),
                CallConvention::Method,
            ),
        );
        let err = validate_schema(&schema).unwrap_err().to_string();
        assert!(err.contains("A.run.args[0]"));
        assert!(err.contains("instance of A"));
    }

    #[test]
    fn test_shape_fields_required() {
        let mut kind = crate::schema::Distribution::new();
        kind.insert(TypeKind::Object, 0.5);
        kind.insert(TypeKind::Array, 0.5);
        let broken = TypeGuess::Known(KnownGuess {
            kind,
            ..KnownGuess::default()
        });
        let mut schema = Schema::new();
        schema.insert(
            "f",
            SignatureGuess::new(vec![broken], TypeGuess::any(), CallConvention::Free),
        );
        let messages: Vec<String> = check_schema(&schema)
            .into_iter()
            .map(|v| v.message)
            .collect();
        assert_eq!(
            messages,
            vec![
                "Object kind without objectShape".to_string(),
                "Array kind without arrayValueType".to_string()
            ]
        );
    }

    #[test]
    fn test_constructor_must_return_own_class() {
        let mut schema = Schema::new();
        schema.insert(
            "Widget",
            SignatureGuess::all_any(0, CallConvention::Constructor),
        );
        assert!(validate_schema(&schema).is_err());
    }
}
