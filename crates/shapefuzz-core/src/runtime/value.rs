//! Dynamic values of the target runtime.

use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture, Shared};

use super::error::{ErrorName, Thrown};
use super::function::Callable;

/// A value in the target runtime.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Object(ObjectRef),
    /// Pending result of an asynchronous endpoint.
    Promise(Promise),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Fresh ordinary object with the given enumerable data properties.
    pub fn object(props: impl IntoIterator<Item = (String, Value)>) -> Self {
        let obj = ObjectRef::new(ObjectKind::Ordinary, None);
        for (key, value) in props {
            obj.set(&key, value);
        }
        Value::Object(obj)
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Object(ObjectRef::new(ObjectKind::Array(items), None))
    }

    /// Wrap a future as a pending value. Rejections surface as [`Thrown`].
    pub fn promise(fut: impl Future<Output = Result<Value, Thrown>> + 'static) -> Self {
        Value::Promise(Promise(fut.boxed_local().shared()))
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn callable(&self) -> Option<Rc<Callable>> {
        self.as_object().and_then(ObjectRef::callable)
    }

    pub fn is_callable(&self) -> bool {
        self.callable().is_some()
    }

    /// Result of the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(obj) if obj.callable().is_some() => "function",
            Value::Object(_) | Value::Promise(_) => "object",
        }
    }

    /// Property lookup along the prototype chain. Primitives have no properties.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(obj) => obj.get(key),
            _ => Value::Undefined,
        }
    }

    /// Same object, or same primitive value.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Promise(a), Value::Promise(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Await `self` until it is no longer pending.
    pub async fn settle(self) -> Result<Value, Thrown> {
        let mut value = self;
        while let Value::Promise(promise) = value {
            value = promise.0.clone().await?;
        }
        Ok(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Object(obj) => write!(f, "{:?}", obj),
            Value::Promise(_) => write!(f, "Promise {{ <pending> }}"),
        }
    }
}

/// Shared handle to a pending result.
#[derive(Clone)]
pub struct Promise(Shared<LocalBoxFuture<'static, Result<Value, Thrown>>>);

impl Promise {
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

/// What a property slot holds.
#[derive(Clone, Debug)]
pub enum Slot {
    Data(Value),
    /// Accessor pair. Reflection never invokes getters.
    Accessor { getter: Option<Value> },
}

#[derive(Clone, Debug)]
pub struct Property {
    pub slot: Slot,
    pub enumerable: bool,
}

impl Property {
    pub fn data(value: Value) -> Self {
        Self {
            slot: Slot::Data(value),
            enumerable: true,
        }
    }

    pub fn hidden(value: Value) -> Self {
        Self {
            slot: Slot::Data(value),
            enumerable: false,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.slot {
            Slot::Data(value) => Some(value),
            Slot::Accessor { .. } => None,
        }
    }
}

/// Internal payload distinguishing exotic objects.
pub enum ObjectKind {
    Ordinary,
    Array(Vec<Value>),
    Function(Rc<Callable>),
    Error { name: ErrorName, message: String },
    /// Byte buffers: typed arrays, array buffers and `Buffer`.
    Bytes(Vec<u8>),
    RegExp { source: String, flags: String },
}

pub struct ObjectData {
    pub kind: ObjectKind,
    properties: BTreeMap<String, Property>,
    prototype: Option<ObjectRef>,
}

/// Reference-counted, interior-mutable object handle.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<ObjectData>>);

impl ObjectRef {
    pub fn new(kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        ObjectRef(Rc::new(RefCell::new(ObjectData {
            kind,
            properties: BTreeMap::new(),
            prototype,
        })))
    }

    pub fn ordinary() -> Self {
        Self::new(ObjectKind::Ordinary, None)
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn data(&self) -> Ref<'_, ObjectData> {
        self.0.borrow()
    }

    pub fn callable(&self) -> Option<Rc<Callable>> {
        match &self.0.borrow().kind {
            ObjectKind::Function(callable) => Some(callable.clone()),
            _ => None,
        }
    }

    pub fn prototype(&self) -> Option<ObjectRef> {
        self.0.borrow().prototype.clone()
    }

    pub fn set_prototype(&self, prototype: Option<ObjectRef>) {
        self.0.borrow_mut().prototype = prototype;
    }

    /// Define or overwrite an enumerable data property.
    pub fn set(&self, key: &str, value: Value) {
        self.define(key, Property::data(value));
    }

    pub fn define(&self, key: &str, property: Property) {
        self.0
            .borrow_mut()
            .properties
            .insert(key.to_string(), property);
    }

    pub fn own_property(&self, key: &str) -> Option<Property> {
        self.0.borrow().properties.get(key).cloned()
    }

    /// Own property names, enumerable or not.
    pub fn own_keys(&self) -> Vec<String> {
        self.0.borrow().properties.keys().cloned().collect()
    }

    /// Own enumerable data properties, in key order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .properties
            .iter()
            .filter(|(_, prop)| prop.enumerable)
            .filter_map(|(key, prop)| prop.value().map(|v| (key.clone(), v.clone())))
            .collect()
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.0.borrow().properties.contains_key(key)
    }

    /// Data property lookup along the prototype chain.
    pub fn get(&self, key: &str) -> Value {
        let mut current = Some(self.clone());
        while let Some(obj) = current {
            if let Some(prop) = obj.own_property(key) {
                return prop.value().cloned().unwrap_or_default();
            }
            current = obj.prototype();
        }
        Value::Undefined
    }

    /// Whether `prototype` appears on this object's prototype chain.
    pub fn inherits_from(&self, prototype: &ObjectRef) -> bool {
        let mut current = self.prototype();
        while let Some(obj) = current {
            if obj.ptr_eq(prototype) {
                return true;
            }
            current = obj.prototype();
        }
        false
    }

    pub fn array_items(&self) -> Option<Vec<Value>> {
        match &self.0.borrow().kind {
            ObjectKind::Array(items) => Some(items.clone()),
            _ => None,
        }
    }

    pub fn bytes(&self) -> Option<Vec<u8>> {
        match &self.0.borrow().kind {
            ObjectKind::Bytes(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        match &data.kind {
            ObjectKind::Ordinary => {
                let keys: Vec<&String> = data.properties.keys().collect();
                write!(f, "Object {:?}", keys)
            }
            ObjectKind::Array(items) => write!(f, "Array({})", items.len()),
            ObjectKind::Function(callable) => write!(f, "[Function: {}]", callable.name),
            ObjectKind::Error { name, message } => write!(f, "{}: {}", name, message),
            ObjectKind::Bytes(bytes) => write!(f, "Bytes({})", bytes.len()),
            ObjectKind::RegExp { source, flags } => write!(f, "/{}/{}", source, flags),
        }
    }
}
