//! Static derivation: a schema from a type-declaration source.
//!
//! The pipeline is `lexer` → `parser` → `scope` (symbol tables) → `resolve` (type
//! conversion and entry assembly). Any construct the parser cannot handle is a fatal
//! error; no partial schema is ever returned.

pub mod ast;
mod lexer;
pub mod parser;
mod resolve;
pub mod scope;

use std::path::Path;

use anyhow::{Context, Result};
use shapefuzz_types::Schema;
use tracing::info;

/// Derive a schema from declaration source text.
pub fn derive_from_source(src: &str) -> Result<Schema> {
    let stmts = parser::parse(src)?;
    let schema = resolve::Deriver::derive(&stmts)?;
    info!(endpoints = schema.len(), "derived schema from declarations");
    Ok(schema)
}

/// Derive a schema from a declaration file on disk.
pub fn derive_from_file(path: &Path) -> Result<Schema> {
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read declaration file {}", path.display()))?;
    derive_from_source(&src).with_context(|| format!("in declaration file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use shapefuzz_types::{validate_schema, CallConvention, Type, TypeGuess, TypeKind};

    use super::*;

    fn derive(src: &str) -> Schema {
        let schema = derive_from_source(src).unwrap();
        validate_schema(&schema).unwrap();
        schema
    }

    fn mass(guess: &TypeGuess, kind: TypeKind) -> f64 {
        guess.as_known().map(|k| k.mass(kind)).unwrap_or(0.0)
    }

    #[test]
    fn test_promise_is_unwrapped() {
        let schema = derive("export function sleep(ms: number): Promise<boolean>;");
        let sleep = schema.get("sleep").unwrap();
        assert_eq!(sleep.args, vec![TypeGuess::number()]);
        assert_eq!(sleep.ret, TypeGuess::boolean());
        assert_eq!(sleep.callconv, CallConvention::Free);
        assert!(!sleep.builtin);
        assert!(schema.get("Uint8Array").unwrap().builtin);
    }

    #[test]
    fn test_overloads_union_per_position() {
        let schema = derive(
            r#"
export declare function f(): void;
export declare function f(x: number): number;
"#,
        );
        let f = schema.get("f").unwrap();
        assert_eq!(f.args.len(), 1);
        assert_eq!(f.args[0], TypeGuess::optional(&Type::Number));
        assert_eq!(f.ret, TypeGuess::optional(&Type::Number));
    }

    #[test]
    fn test_literal_union_pools_kinds() {
        let schema = derive(
            r#"
export declare function mode(m: "fast" | "slow" | 1 | true): void;
export declare function raw(flag?: boolean | undefined): void;
"#,
        );
        let m = &schema.get("mode").unwrap().args[0];
        assert_eq!(mass(m, TypeKind::String), 0.333);
        assert_eq!(mass(m, TypeKind::Number), 0.333);
        assert_eq!(mass(m, TypeKind::Boolean), 0.333);

        let flag = &schema.get("raw").unwrap().args[0];
        assert_eq!(*flag, TypeGuess::optional(&Type::Boolean));
    }

    #[test]
    fn test_inherited_methods_rewrite_receiver() {
        let schema = derive(
            r#"
export declare class Base {
    constructor();
    base(x: number): void;
}
export declare class Derived extends Base {
    constructor();
    derived(): void;
}
"#,
        );
        let base = schema.get("Base.base").unwrap();
        let inherited = schema.get("Derived.base").unwrap();
        assert_eq!(inherited.callconv, CallConvention::Method);
        assert_eq!(inherited.args[0], TypeGuess::class("Derived"));
        assert_eq!(inherited.args[1], base.args[1]);
        assert_eq!(base.args[0], TypeGuess::class("Base"));
        assert!(schema.get("Base.derived").is_none());
    }

    #[test]
    fn test_static_sharing_method_name_keeps_method() {
        let schema = derive(
            r#"
export declare class A {
    constructor();
    foo(x: number): void;
    static foo(): number;
    static bar(): string;
}
"#,
        );
        let foo = schema.get("A.foo").unwrap();
        assert_eq!(foo.callconv, CallConvention::Method);
        assert_eq!(foo.args, vec![TypeGuess::class("A"), TypeGuess::number()]);
        assert_eq!(schema.get("A.bar").unwrap().callconv, CallConvention::Free);
    }

    #[test]
    fn test_subclass_without_constructor_inherits_parameters() {
        let schema = derive(
            r#"
export declare class Base {
    constructor(level: number, name?: string);
}
export declare class Derived extends Base {
    run(): void;
}
export declare class Plain {
    run(): void;
}
"#,
        );
        let base = schema.get("Base").unwrap();
        let derived = schema.get("Derived").unwrap();
        assert_eq!(derived.callconv, CallConvention::Constructor);
        assert_eq!(derived.args, base.args);
        assert_eq!(derived.args.len(), 2);
        assert_eq!(derived.ret, TypeGuess::class("Derived"));
        assert!(schema.get("Plain").unwrap().args.is_empty());
    }

    #[test]
    fn test_class_entries() {
        let schema = derive(
            r#"
export declare class Stream {
    static create(size: number): Stream;
    private secret(): void;
    toString(): string;
    write(chunk: string | Uint8Array): this;
    onData: (chunk: string) => void;
}
"#,
        );
        let ctor = schema.get("Stream").unwrap();
        assert_eq!(ctor.callconv, CallConvention::Constructor);
        assert!(ctor.args.is_empty());
        assert_eq!(ctor.ret, TypeGuess::class("Stream"));

        let create = schema.get("Stream.create").unwrap();
        assert_eq!(create.callconv, CallConvention::Free);
        assert_eq!(create.ret, TypeGuess::class("Stream"));

        let write = schema.get("Stream.write").unwrap();
        assert_eq!(write.ret, TypeGuess::class("Stream"));
        assert_eq!(mass(&write.args[1], TypeKind::Class), 0.5);

        assert!(schema.get("Stream.onData").is_some());
        assert!(schema.get("Stream.secret").is_none());
        assert!(schema.get("Stream.toString").is_none());
    }

    #[test]
    fn test_interface_parameters() {
        let schema = derive(
            r#"
interface Options {
    level?: number;
    name: string;
    onEnd(): void;
}
export declare function init(options: Options): void;
"#,
        );
        let options = &schema.get("init").unwrap().args[0];
        let expected = TypeGuess::object(BTreeMap::from([
            ("level".to_string(), TypeGuess::optional(&Type::Number)),
            ("name".to_string(), TypeGuess::string()),
            ("onEnd".to_string(), TypeGuess::undefined()),
        ]));
        assert_eq!(*options, expected);
    }

    #[test]
    fn test_implements_adds_interface_methods() {
        let schema = derive(
            r#"
interface Closable { close(force?: boolean): void }
export declare class Conn implements Closable {
    constructor(url: string);
}
"#,
        );
        let close = schema.get("Conn.close").unwrap();
        assert_eq!(close.callconv, CallConvention::Method);
        assert_eq!(close.args[0], TypeGuess::class("Conn"));
        assert_eq!(schema.get("Conn").unwrap().args, vec![TypeGuess::string()]);
    }

    #[test]
    fn test_export_assignment_with_namespace() {
        let schema = derive(
            r#"
declare class Parser {
    constructor(ua?: string);
    parse(): Parser.Result;
}
declare namespace Parser {
    interface Result { name: string }
    function version(): string;
}
export = Parser;
"#,
        );
        assert!(schema.contains("Parser"));
        assert!(schema.contains("version"));
        let parse = schema.get("Parser.parse").unwrap();
        let expected =
            TypeGuess::object(BTreeMap::from([("name".to_string(), TypeGuess::string())]));
        assert_eq!(parse.ret, expected);
    }

    #[test]
    fn test_export_assignment_of_interface_typed_const() {
        let schema = derive(
            r#"
interface Lib {
    hash(input: string): number;
    seed: number;
}
declare const lib: Lib;
export = lib;
"#,
        );
        let hash = schema.get("hash").unwrap();
        assert_eq!(hash.args, vec![TypeGuess::string()]);
        assert!(schema.get("seed").is_none());
    }

    #[test]
    fn test_export_assignment_missing_target() {
        let err = derive_from_source("export = nothing;").unwrap_err();
        assert!(err.to_string().contains("nothing"));
    }

    #[test]
    fn test_namespaces_prefix_entries() {
        let schema = derive(
            r#"
export declare namespace util {
    function hash(s: string): number;
    namespace inner { class Tool { run(): void; } }
}
"#,
        );
        assert!(schema.contains("util.hash"));
        assert!(schema.contains("util.inner.Tool"));
        let run = schema.get("util.inner.Tool.run").unwrap();
        assert_eq!(run.args[0], TypeGuess::class("util.inner.Tool"));
    }

    #[test]
    fn test_referenced_class_is_emitted() {
        let schema = derive(
            r#"
declare class Handle { close(): void; }
export declare function open(path: string): Handle;
"#,
        );
        assert_eq!(schema.get("open").unwrap().ret, TypeGuess::class("Handle"));
        assert_eq!(schema.get("Handle").unwrap().callconv, CallConvention::Constructor);
        assert!(schema.contains("Handle.close"));
    }

    #[test]
    fn test_recursive_declarations_terminate() {
        let schema = derive(
            r#"
interface ListNode { value: number; next?: ListNode }
type Json = string | number | Json[] | { [key: string]: Json };
export declare function walk(node: ListNode): Json;
"#,
        );
        let walk = schema.get("walk").unwrap();
        let node = walk.args[0].as_known().unwrap();
        let next = &node.object_shape.as_ref().unwrap()["next"];
        assert_eq!(mass(next, TypeKind::Object), 0.5);
        assert_eq!(mass(next, TypeKind::Undefined), 0.5);
        assert!(walk.ret.can_be(TypeKind::Array));
        assert!(walk.ret.can_be(TypeKind::String));
    }

    #[test]
    fn test_misc_type_mappings() {
        let schema = derive(
            r#"
export declare enum Level { Low = 1, High = 2 }
export declare function level(l: Level): void;
export declare function id<T extends string>(x: T): T;
export declare function rest(...xs: number[]): [string, number];
export declare function cb(done: (err: Error) => void): void;
export declare function rec(r: Record<string, number>): object;
export declare function buf(b: Uint8Array | ArrayBuffer): Buffer;
"#,
        );
        assert_eq!(schema.get("level").unwrap().args[0], TypeGuess::number());
        let id = schema.get("id").unwrap();
        assert_eq!(id.args[0], TypeGuess::string());
        assert_eq!(id.ret, TypeGuess::string());

        let rest = schema.get("rest").unwrap();
        assert_eq!(rest.args, vec![TypeGuess::number()]);
        assert_eq!(
            rest.ret,
            TypeGuess::array(TypeGuess::union(&[TypeGuess::string(), TypeGuess::number()]))
        );

        assert_eq!(schema.get("cb").unwrap().args[0], TypeGuess::undefined());
        assert_eq!(
            schema.get("rec").unwrap().args[0],
            TypeGuess::object(BTreeMap::new())
        );
        let buf = schema.get("buf").unwrap();
        assert_eq!(buf.ret, TypeGuess::class("Buffer"));
        let classes = buf.args[0].as_known().unwrap().class_type.as_ref().unwrap();
        assert_eq!(classes["Uint8Array"], 0.5);
    }

    #[test]
    fn test_large_objects_are_any() {
        let props: String = (0..40).map(|i| format!("p{}: number; ", i)).collect();
        let src = format!(
            "interface Big {{ {} }}\nexport declare function f(b: Big): void;",
            props
        );
        let schema = derive(&src);
        assert!(schema.get("f").unwrap().args[0].is_any());
    }

    #[test]
    fn test_derive_from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.d.ts");
        std::fs::write(&path, "export declare function f(: void;").unwrap();
        let err = derive_from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("index.d.ts"));
    }
}
