//! Hand-written schemas for named benchmark projects.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use shapefuzz_types::{CallConvention, Schema, SignatureGuess, Type, TypeGuess};

use crate::runtime::seed_schema;

/// Names accepted by [`project_schema`].
pub const PROJECTS: [&str; 2] = ["example", "pako"];

pub fn project_schema(name: &str) -> Result<Schema> {
    let mut schema = match name {
        "example" => example(),
        "pako" => pako(),
        other => bail!(
            "unknown project {:?}; expected one of {}",
            other,
            PROJECTS.join(", ")
        ),
    };
    seed_schema(&mut schema);
    Ok(schema)
}

fn free(args: Vec<TypeGuess>, ret: TypeGuess) -> SignatureGuess {
    SignatureGuess::new(args, ret, CallConvention::Free)
}

fn class(schema: &mut Schema, name: &str, args: Vec<TypeGuess>) {
    schema.insert(
        name,
        SignatureGuess::new(args, TypeGuess::class(name), CallConvention::Constructor),
    );
}

fn method(
    schema: &mut Schema,
    class: &str,
    name: &str,
    args: Vec<TypeGuess>,
    ret: TypeGuess,
) {
    let mut full = vec![TypeGuess::class(class)];
    full.extend(args);
    schema.insert(
        format!("{}.{}", class, name),
        SignatureGuess::new(full, ret, CallConvention::Method),
    );
}

fn shape<const N: usize>(fields: [(&str, TypeGuess); N]) -> TypeGuess {
    TypeGuess::object(
        fields
            .into_iter()
            .map(|(key, guess)| (key.to_string(), guess))
            .collect::<BTreeMap<_, _>>(),
    )
}

fn example() -> Schema {
    let mut schema = Schema::new();
    schema.insert(
        "compress",
        free(
            vec![TypeGuess::string(), TypeGuess::number()],
            TypeGuess::string(),
        ),
    );
    schema.insert(
        "decompress",
        free(vec![TypeGuess::string()], TypeGuess::string()),
    );
    schema
}

fn pako() -> Schema {
    let mut schema = Schema::new();
    let opt_number = || TypeGuess::optional(&Type::Number);
    let opt_boolean = || TypeGuess::optional(&Type::Boolean);
    let opt_string = || TypeGuess::optional(&Type::String);
    let bytes = || TypeGuess::class("Uint8Array");
    let buffer = || TypeGuess::class("ArrayBuffer");

    let header = shape([
        ("text", opt_boolean()),
        ("time", opt_number()),
        ("os", opt_number()),
        ("extra", TypeGuess::optional(&Type::array(Type::Number))),
        ("name", opt_string()),
        ("comment", opt_string()),
        ("hcrc", opt_boolean()),
    ]);
    let deflate_options = shape([
        ("level", opt_number()),
        ("windowBits", opt_number()),
        ("memLevel", opt_number()),
        ("strategy", opt_number()),
        ("dictionary", TypeGuess::any()),
        ("raw", opt_boolean()),
        ("chunkSize", opt_number()),
        ("gzip", opt_boolean()),
        ("header", TypeGuess::union(&[TypeGuess::undefined(), header])),
    ]);
    let deflate_fn_options = shape([
        ("level", opt_number()),
        ("windowBits", opt_number()),
        ("memLevel", opt_number()),
        ("strategy", opt_number()),
        ("dictionary", TypeGuess::any()),
        ("raw", opt_boolean()),
    ]);
    let inflate_options = shape([
        ("windowBits", opt_number()),
        ("dictionary", TypeGuess::any()),
        ("raw", opt_boolean()),
        ("to", opt_string()),
        ("chunkSize", opt_number()),
    ]);
    let inflate_fn_options = shape([
        ("windowBits", opt_number()),
        ("raw", opt_boolean()),
        ("to", opt_string()),
    ]);
    let data = TypeGuess::union(&[bytes(), buffer()]);
    let input = TypeGuess::union(&[bytes(), buffer(), TypeGuess::string()]);
    let flush = TypeGuess::union(&[
        TypeGuess::undefined(),
        TypeGuess::union(&[TypeGuess::number(), TypeGuess::boolean()]),
    ]);

    let deflate = free(
        vec![
            input.clone(),
            TypeGuess::union(&[TypeGuess::undefined(), deflate_fn_options]),
        ],
        bytes(),
    );
    for name in ["deflate", "deflateRaw", "gzip"] {
        schema.insert(name, deflate.clone());
    }

    // Union of the required and optional overloads of the options parameter.
    let inflate_arg = TypeGuess::union(&[
        TypeGuess::undefined(),
        inflate_fn_options.clone(),
        inflate_fn_options.clone(),
        inflate_fn_options,
    ]);
    let inflate = free(
        vec![data.clone(), inflate_arg],
        TypeGuess::union(&[bytes(), TypeGuess::string()]),
    );
    for name in ["inflate", "inflateRaw", "ungzip"] {
        schema.insert(name, inflate.clone());
    }

    class(
        &mut schema,
        "Inflate",
        vec![TypeGuess::union(&[TypeGuess::undefined(), inflate_options])],
    );
    method(
        &mut schema,
        "Inflate",
        "onData",
        vec![data.clone()],
        TypeGuess::undefined(),
    );
    method(
        &mut schema,
        "Inflate",
        "onEnd",
        vec![TypeGuess::number()],
        TypeGuess::undefined(),
    );
    method(
        &mut schema,
        "Inflate",
        "push",
        vec![data.clone(), flush.clone()],
        TypeGuess::boolean(),
    );

    class(
        &mut schema,
        "Deflate",
        vec![TypeGuess::union(&[TypeGuess::undefined(), deflate_options])],
    );
    method(
        &mut schema,
        "Deflate",
        "onData",
        vec![data],
        TypeGuess::undefined(),
    );
    method(
        &mut schema,
        "Deflate",
        "onEnd",
        vec![TypeGuess::number()],
        TypeGuess::undefined(),
    );
    method(
        &mut schema,
        "Deflate",
        "push",
        vec![input, flush],
        TypeGuess::boolean(),
    );

    schema
}

#[cfg(test)]
mod tests {
    use shapefuzz_types::{validate_schema, TypeKind};

    use super::*;

    #[test]
    fn test_projects_are_valid() {
        for name in PROJECTS {
            let schema = project_schema(name).unwrap();
            validate_schema(&schema).unwrap();
            assert!(schema.get("Uint8Array").unwrap().builtin);
        }
    }

    #[test]
    fn test_pako_inflate_options() {
        let schema = project_schema("pako").unwrap();
        let options = schema.get("inflate").unwrap().args[1].as_known().unwrap();
        assert_eq!(options.mass(TypeKind::Undefined), 0.25);
        assert_eq!(options.mass(TypeKind::Object), 0.75);
        assert!(options.object_shape.as_ref().unwrap().contains_key("to"));

        let push = schema.get("Deflate.push").unwrap();
        assert_eq!(push.args[0], TypeGuess::class("Deflate"));
        assert_eq!(schema.get("gzip"), schema.get("deflate"));
    }

    #[test]
    fn test_unknown_project() {
        let err = project_schema("left-pad").unwrap_err();
        assert!(err.to_string().contains("pako"));
    }
}
