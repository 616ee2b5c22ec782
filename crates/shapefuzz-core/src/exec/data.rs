//! Value synthesis for plan arguments.
//!
//! Sequence plans carry their constants as a fuzz byte stream. [`ByteProvider`] reads
//! primitives from it in call order, so replaying the same plan always produces the
//! same values. An exhausted stream yields zero values instead of failing.

use anyhow::{bail, Result};
use arbitrary::{Arbitrary, Unstructured};
use shapefuzz_types::{ConstantValue, Type};

use crate::config::WorkerConfig;
use crate::runtime::{noop_function, Value};

pub struct ByteProvider<'a> {
    data: Unstructured<'a>,
    string_max_length: usize,
    max_array_length: usize,
}

impl<'a> ByteProvider<'a> {
    pub fn new(bytes: &'a [u8], config: &WorkerConfig) -> Self {
        Self {
            data: Unstructured::new(bytes),
            string_max_length: config.string_max_length,
            max_array_length: config.max_array_length,
        }
    }

    pub fn number(&mut self) -> f64 {
        f64::arbitrary(&mut self.data).unwrap_or(0.0)
    }

    pub fn boolean(&mut self) -> bool {
        bool::arbitrary(&mut self.data).unwrap_or(false)
    }

    /// A string of at most `string_max_length` bytes.
    pub fn string(&mut self) -> String {
        let len = self
            .data
            .int_in_range(0..=self.string_max_length)
            .unwrap_or(0)
            .min(self.data.len());
        let raw = self.data.bytes(len).unwrap_or(&[]);

        let mut out = String::with_capacity(len);
        for ch in String::from_utf8_lossy(raw).chars() {
            if out.len() + ch.len_utf8() > self.string_max_length {
                break;
            }
            out.push(ch);
        }
        out
    }

    /// An array length in `0..=max_array_length`.
    pub fn length(&mut self) -> usize {
        self.data
            .int_in_range(0..=self.max_array_length)
            .unwrap_or(0)
    }

    pub fn is_exhausted(&self) -> bool {
        self.data.is_empty()
    }

    /// A fresh value of type `typ`.
    pub fn value(&mut self, typ: &Type) -> Result<Value> {
        Ok(match typ {
            Type::Number => Value::Number(self.number()),
            Type::String => Value::String(self.string()),
            Type::Boolean => Value::Boolean(self.boolean()),
            Type::Undefined => Value::Undefined,
            Type::Null => Value::Null,
            Type::Function => noop_function(),
            Type::Object(shape) => {
                let mut props = Vec::with_capacity(shape.len());
                for (key, field) in shape {
                    props.push((key.clone(), self.value(field)?));
                }
                Value::object(props)
            }
            Type::Array(item) => {
                let len = self.length();
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.value(item)?);
                }
                Value::array(items)
            }
            Type::Class(name) => bail!(
                "cannot synthesize an instance of {}; class arguments must reference a call output",
                name
            ),
        })
    }
}

/// Build the runtime value of a graph constant.
pub fn materialize(constant: &ConstantValue) -> Value {
    match constant {
        ConstantValue::Number(n) => Value::Number(*n),
        ConstantValue::String(s) => Value::String(s.clone()),
        ConstantValue::Boolean(b) => Value::Boolean(*b),
        ConstantValue::Undefined => Value::Undefined,
        ConstantValue::Null => Value::Null,
        ConstantValue::Function => noop_function(),
        ConstantValue::Object(fields) => Value::object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), materialize(value))),
        ),
        ConstantValue::Array(items) => Value::array(items.iter().map(materialize).collect()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_same_bytes_same_values() {
        let bytes: Vec<u8> = (0..=255).collect();
        let config = WorkerConfig::default();
        let typ = Type::Object(BTreeMap::from([
            ("level".to_string(), Type::Number),
            ("name".to_string(), Type::String),
            ("flags".to_string(), Type::Array(Box::new(Type::Boolean))),
        ]));

        let mut a = ByteProvider::new(&bytes, &config);
        let mut b = ByteProvider::new(&bytes, &config);
        let first = a.value(&typ).unwrap();
        let second = b.value(&typ).unwrap();

        let first = first.as_object().unwrap();
        let second = second.as_object().unwrap();
        assert_eq!(first.get("name").as_str(), second.get("name").as_str());
        assert!(first.get("level").same_value(&second.get("level")));
        let flags = first.get("flags");
        let flags = flags.as_object().unwrap().array_items().unwrap();
        assert!(flags.len() <= config.max_array_length);
    }

    #[test]
    fn test_strings_respect_max_length() {
        let bytes = vec![0xffu8; 4096];
        let config = WorkerConfig {
            string_max_length: 8,
            ..WorkerConfig::default()
        };
        let mut provider = ByteProvider::new(&bytes, &config);
        for _ in 0..16 {
            assert!(provider.string().len() <= 8);
        }
    }

    #[test]
    fn test_exhausted_stream_yields_defaults() {
        let config = WorkerConfig::default();
        let mut provider = ByteProvider::new(&[], &config);
        assert!(provider.is_exhausted());
        assert_eq!(provider.number(), 0.0);
        assert!(!provider.boolean());
        assert_eq!(provider.string(), "");
        assert_eq!(provider.length(), 0);
        assert!(provider.value(&Type::Null).unwrap().same_value(&Value::Null));
    }

    #[test]
    fn test_class_cannot_be_synthesized() {
        let config = WorkerConfig::default();
        let mut provider = ByteProvider::new(&[1, 2, 3], &config);
        let err = provider.value(&Type::Class("Deflate".into())).unwrap_err();
        assert!(err.to_string().contains("Deflate"));
    }

    #[test]
    fn test_materialize_constants() {
        let constant = ConstantValue::Object(BTreeMap::from([
            ("level".to_string(), ConstantValue::Number(6.0)),
            (
                "dict".to_string(),
                ConstantValue::Array(vec![ConstantValue::String("a".into())]),
            ),
            ("onEnd".to_string(), ConstantValue::Function),
        ]));
        let value = materialize(&constant);
        assert_eq!(value.get("level").as_number(), Some(6.0));
        let dict = value.get("dict");
        assert_eq!(dict.as_object().unwrap().array_items().unwrap().len(), 1);
        assert!(value.get("onEnd").is_callable());
    }
}
