//! Callables and the call/construct protocol.
//!
//! Every function object carries a [`Callable`]. Its [`FunctionFlavor`] decides which
//! invocation styles succeed, and failures use the same `TypeError` messages as the
//! host runtime so probing code can classify them.

use std::fmt;
use std::rc::Rc;

use super::error::Thrown;
use super::value::{ObjectKind, ObjectRef, Property, Value};

pub type NativeFn = Rc<dyn Fn(Invocation) -> Result<Value, Thrown>>;

/// Which invocation styles a function supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionFlavor {
    /// Plain function: callable and constructible.
    Ordinary,
    /// Class constructor: construct only.
    Class,
    /// Arrow function or method: call only, no prototype.
    Arrow,
    /// Host constructor that refuses plain calls.
    Builtin,
}

pub struct Callable {
    pub name: String,
    /// Declared parameter count.
    pub length: usize,
    pub flavor: FunctionFlavor,
    body: NativeFn,
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("length", &self.length)
            .field("flavor", &self.flavor)
            .finish()
    }
}

/// Receiver and arguments of one invocation.
pub struct Invocation {
    pub this: Value,
    pub args: Vec<Value>,
    /// Set when invoked with constructor semantics.
    pub is_construct: bool,
}

impl Invocation {
    /// Argument `index`, undefined when not supplied.
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }

    /// The receiver as an object, or a `TypeError`.
    pub fn this_object(&self) -> Result<ObjectRef, Thrown> {
        self.this
            .as_object()
            .cloned()
            .ok_or_else(|| Thrown::type_error("Cannot read properties of undefined"))
    }
}

/// Create a function object. Constructible flavors get a fresh `prototype` object.
pub fn new_function(
    name: &str,
    length: usize,
    flavor: FunctionFlavor,
    body: impl Fn(Invocation) -> Result<Value, Thrown> + 'static,
) -> Value {
    let callable = Callable {
        name: name.to_string(),
        length,
        flavor,
        body: Rc::new(body),
    };
    let obj = ObjectRef::new(ObjectKind::Function(Rc::new(callable)), None);
    if flavor != FunctionFlavor::Arrow {
        obj.define("prototype", Property::hidden(ObjectRef::ordinary().into()));
    }
    Value::Object(obj)
}

/// Callable that ignores its arguments and returns undefined.
pub fn noop_function() -> Value {
    new_function("", 0, FunctionFlavor::Arrow, |_| Ok(Value::Undefined))
}

impl Value {
    /// Invoke as a plain call with the given receiver.
    pub fn call(&self, this: Value, args: Vec<Value>) -> Result<Value, Thrown> {
        let callable = self
            .callable()
            .ok_or_else(|| Thrown::type_error(format!("{:?} is not a function", self)))?;
        match callable.flavor {
            FunctionFlavor::Class => Err(Thrown::type_error(format!(
                "Class constructor {} cannot be invoked without 'new'",
                callable.name
            ))),
            FunctionFlavor::Builtin => Err(Thrown::type_error(format!(
                "Constructor {} requires 'new'",
                callable.name
            ))),
            FunctionFlavor::Ordinary | FunctionFlavor::Arrow => (callable.body)(Invocation {
                this,
                args,
                is_construct: false,
            }),
        }
    }

    /// Invoke with constructor semantics.
    ///
    /// The receiver is a fresh object inheriting from the function's `prototype`. An
    /// object returned by the body replaces it.
    pub fn construct(&self, args: Vec<Value>) -> Result<Value, Thrown> {
        let callable = match self.callable() {
            Some(callable) if callable.flavor != FunctionFlavor::Arrow => callable,
            Some(callable) => {
                let name = if callable.name.is_empty() {
                    "anonymous"
                } else {
                    callable.name.as_str()
                };
                return Err(Thrown::type_error(format!("{} is not a constructor", name)));
            }
            None => {
                return Err(Thrown::type_error(format!(
                    "{:?} is not a constructor",
                    self
                )))
            }
        };
        let prototype = self.get("prototype").as_object().cloned();
        let instance = ObjectRef::new(ObjectKind::Ordinary, prototype);
        let returned = (callable.body)(Invocation {
            this: Value::Object(instance.clone()),
            args,
            is_construct: true,
        })?;
        match returned {
            Value::Object(obj) => Ok(Value::Object(obj)),
            _ => Ok(Value::Object(instance)),
        }
    }

    /// Whether this object was constructed by `constructor`.
    pub fn instance_of(&self, constructor: &Value) -> bool {
        match (self.as_object(), constructor.get("prototype").as_object()) {
            (Some(obj), Some(proto)) => obj.inherits_from(proto),
            _ => false,
        }
    }
}

/// Fluent builder for class constructors with prototype methods and statics.
pub struct ClassBuilder {
    class: Value,
    prototype: ObjectRef,
}

impl ClassBuilder {
    pub fn new(
        name: &str,
        length: usize,
        body: impl Fn(Invocation) -> Result<Value, Thrown> + 'static,
    ) -> Self {
        Self::with_flavor(name, length, FunctionFlavor::Class, body)
    }

    pub fn with_flavor(
        name: &str,
        length: usize,
        flavor: FunctionFlavor,
        body: impl Fn(Invocation) -> Result<Value, Thrown> + 'static,
    ) -> Self {
        let class = new_function(name, length, flavor, body);
        let prototype = match class.get("prototype") {
            Value::Object(proto) => proto,
            _ => {
                let proto = ObjectRef::ordinary();
                if let Some(obj) = class.as_object() {
                    obj.define("prototype", Property::hidden(proto.clone().into()));
                }
                proto
            }
        };
        Self { class, prototype }
    }

    /// Prototype object shared by every instance.
    pub fn prototype(&self) -> ObjectRef {
        self.prototype.clone()
    }

    /// Inherit prototype methods from `parent`.
    pub fn extends(self, parent: &Value) -> Self {
        if let Some(parent_proto) = parent.get("prototype").as_object() {
            self.prototype.set_prototype(Some(parent_proto.clone()));
        }
        if let (Some(obj), Some(parent)) = (self.class.as_object(), parent.as_object()) {
            obj.set_prototype(Some(parent.clone()));
        }
        self
    }

    /// Non-enumerable prototype method.
    pub fn method(
        self,
        name: &str,
        length: usize,
        body: impl Fn(Invocation) -> Result<Value, Thrown> + 'static,
    ) -> Self {
        let method = new_function(name, length, FunctionFlavor::Arrow, body);
        self.prototype.define(name, Property::hidden(method));
        self
    }

    /// Function-valued static member.
    pub fn static_method(
        self,
        name: &str,
        length: usize,
        body: impl Fn(Invocation) -> Result<Value, Thrown> + 'static,
    ) -> Self {
        let method = new_function(name, length, FunctionFlavor::Arrow, body);
        if let Some(obj) = self.class.as_object() {
            obj.define(name, Property::hidden(method));
        }
        self
    }

    pub fn build(self) -> Value {
        self.class
    }
}
