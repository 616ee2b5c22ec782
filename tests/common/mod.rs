#![allow(dead_code)]
//! Shared fixtures for integration tests.
//!
//! `rle` is a small run-length codec library exposed through the runtime object model:
//!
//! - `compress(input, level)` / `decompress(input)`
//! - class `Deflate` with `push(chunk)`, `result()` and a static `version()`
//! - namespace object `util` with `crc32(input)`
//!
//! Every endpoint appends its name to a shared [`CallLog`] when invoked, so tests can
//! assert invocation counts and order.

use std::cell::RefCell;
use std::rc::Rc;

use shapefuzz::runtime::{
    new_function, ClassBuilder, ErrorName, FunctionFlavor, Invocation, ModuleRegistry, Thrown,
    Value,
};

pub const LIBRARY: &str = "rle";

/// Declarations matching the `rle` module.
pub const RLE_DECLARATIONS: &str = r#"
export interface DeflateOptions {
    level?: number;
}

export declare function compress(input: string, level: number): string;
export declare function decompress(input: string): string;

export declare class Deflate {
    constructor(options?: DeflateOptions);
    static version(): string;
    push(chunk: string): boolean;
    result(): string;
}

export declare namespace util {
    function crc32(input: string): number;
}
"#;

/// Names of invoked endpoints, in call order.
pub type CallLog = Rc<RefCell<Vec<String>>>;

pub fn call_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn logged(log: &CallLog) -> Vec<String> {
    log.borrow().clone()
}

fn record(log: &CallLog, entry: impl Into<String>) {
    log.borrow_mut().push(entry.into());
}

/// `"aab"` becomes `"a2;b1;"`.
pub fn encode(input: &str) -> String {
    let mut out = String::new();
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        let mut run = 1;
        while chars.peek() == Some(&c) {
            chars.next();
            run += 1;
        }
        out.push(c);
        out.push_str(&run.to_string());
        out.push(';');
    }
    out
}

pub fn decode(input: &str) -> Result<String, Thrown> {
    let header = || Thrown::error(ErrorName::Error, "incorrect header check");
    let mut out = String::new();
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        let mut digits = String::new();
        loop {
            match chars.next() {
                Some(';') => break,
                Some(d) if d.is_ascii_digit() => digits.push(d),
                _ => return Err(header()),
            }
        }
        let run: usize = digits.parse().map_err(|_| header())?;
        if run == 0 {
            return Err(Thrown::error(ErrorName::Error, "invalid run length"));
        }
        if run > 4096 {
            return Err(Thrown::range_error("run too long"));
        }
        out.extend(std::iter::repeat(c).take(run));
    }
    Ok(out)
}

fn string_arg(inv: &Invocation, index: usize, what: &str) -> Result<String, Thrown> {
    inv.arg(index)
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Thrown::type_error(format!("{} must be a string", what)))
}

pub fn rle_module(log: &CallLog) -> Value {
    let compress = {
        let log = log.clone();
        new_function("compress", 2, FunctionFlavor::Arrow, move |inv: Invocation| {
            record(&log, "compress");
            let input = string_arg(&inv, 0, "input")?;
            let level = inv.arg(1).as_number().unwrap_or(6.0);
            if !(0.0..=9.0).contains(&level) {
                return Err(Thrown::range_error("invalid compression level"));
            }
            Ok(Value::String(encode(&input)))
        })
    };

    let decompress = {
        let log = log.clone();
        new_function("decompress", 1, FunctionFlavor::Arrow, move |inv: Invocation| {
            record(&log, "decompress");
            let input = string_arg(&inv, 0, "input")?;
            Ok(Value::String(decode(&input)?))
        })
    };

    let deflate = {
        let (ctor_log, push_log, result_log, version_log) =
            (log.clone(), log.clone(), log.clone(), log.clone());
        ClassBuilder::new("Deflate", 1, move |inv: Invocation| {
            record(&ctor_log, "Deflate");
            let this = inv.this_object()?;
            let level = inv.arg(0).get("level").as_number().unwrap_or(6.0);
            this.set("level", Value::Number(level));
            this.set("buffer", Value::string(""));
            Ok(Value::Undefined)
        })
        .method("push", 1, move |inv: Invocation| {
            record(&push_log, "Deflate.push");
            let this = inv.this_object()?;
            let chunk = string_arg(&inv, 0, "chunk")?;
            let buffer = this.get("buffer").as_str().unwrap_or_default().to_string();
            this.set("buffer", Value::String(buffer + &chunk));
            Ok(Value::Boolean(true))
        })
        .method("result", 0, move |inv: Invocation| {
            let this = inv.this_object()?;
            let buffer = this.get("buffer").as_str().unwrap_or_default().to_string();
            let out = encode(&buffer);
            record(&result_log, format!("Deflate.result={}", out));
            Ok(Value::String(out))
        })
        .static_method("version", 0, move |_| {
            record(&version_log, "Deflate.version");
            Ok(Value::string("1.0.0"))
        })
        .build()
    };

    let crc32 = {
        let log = log.clone();
        new_function("crc32", 1, FunctionFlavor::Arrow, move |inv: Invocation| {
            record(&log, "util.crc32");
            let input = string_arg(&inv, 0, "input")?;
            let hash = input
                .bytes()
                .fold(0u32, |acc, b| acc.rotate_left(5) ^ u32::from(b));
            Ok(Value::Number(f64::from(hash)))
        })
    };

    Value::object([
        ("compress".to_string(), compress),
        ("decompress".to_string(), decompress),
        ("Deflate".to_string(), deflate),
        (
            "util".to_string(),
            Value::object([("crc32".to_string(), crc32)]),
        ),
    ])
}

pub fn registry(log: &CallLog) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register(LIBRARY, rle_module(log));
    registry
}
