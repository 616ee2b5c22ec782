//! Schema data model.
//!
//! A [`Schema`] maps every endpoint of the target library to a [`SignatureGuess`].
//! Argument and return types are [`TypeGuess`]es: probability mass over the kinds a
//! value may take, with conditional shape information for objects, arrays and classes.
//!
//! The JSON layout matches what the host fuzz engine reads:
//!
//! ```json
//! {
//!   "compress": {
//!     "args": [{ "isAny": false, "kind": { "String": 1.0 } }],
//!     "ret": { "isAny": true, "kind": {} },
//!     "callconv": "Free"
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Identifier of a function, method or constructor. Members use `<Class>.<member>`.
pub type EndpointName = String;

/// Probability mass keyed by `K`. Masses are rounded to three decimals.
pub type Distribution<K> = BTreeMap<K, f64>;

/// Exact description of a concrete value's shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Number,
    String,
    Boolean,
    Object(BTreeMap<String, Type>),
    /// Instance of the class whose constructor endpoint has this name.
    Class(EndpointName),
    Array(Box<Type>),
    Undefined,
    Null,
    /// A callable value. Only ever materialized as a no-op.
    Function,
}

impl Type {
    pub fn kind(&self) -> TypeKind {
        match self {
            Type::Number => TypeKind::Number,
            Type::String => TypeKind::String,
            Type::Boolean => TypeKind::Boolean,
            Type::Object(_) => TypeKind::Object,
            Type::Class(_) => TypeKind::Class,
            Type::Array(_) => TypeKind::Array,
            Type::Undefined => TypeKind::Undefined,
            Type::Null => TypeKind::Null,
            Type::Function => TypeKind::Function,
        }
    }

    pub fn array(elem: Type) -> Self {
        Type::Array(Box::new(elem))
    }
}

/// Discriminant of [`Type`], used as the key of a kind distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Number,
    String,
    Boolean,
    Object,
    Class,
    Array,
    Undefined,
    Null,
    Function,
}

impl TypeKind {
    pub const ALL: [TypeKind; 9] = [
        TypeKind::Number,
        TypeKind::String,
        TypeKind::Boolean,
        TypeKind::Object,
        TypeKind::Class,
        TypeKind::Array,
        TypeKind::Undefined,
        TypeKind::Null,
        TypeKind::Function,
    ];
}

/// Partial knowledge about a value's type.
///
/// `Any` is the absorbing unknown element. A `Known` guess spreads probability mass
/// over [`TypeKind`]s; see [`KnownGuess`] for the conditional shape fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TypeGuessRepr", into = "TypeGuessRepr")]
pub enum TypeGuess {
    Any,
    Known(KnownGuess),
}

/// Probability mass over kinds plus the information conditioned on them.
///
/// `object_shape` is meaningful when `kind` has `Object` mass, `array_value_type` when
/// it has `Array` mass and `class_type` when it has `Class` mass. `class_type` is a
/// distribution conditioned on the value being a class instance, so it sums to 1
/// independently of the `Class` mass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KnownGuess {
    pub kind: Distribution<TypeKind>,
    pub object_shape: Option<BTreeMap<String, TypeGuess>>,
    pub array_value_type: Option<Box<TypeGuess>>,
    pub class_type: Option<Distribution<EndpointName>>,
}

impl KnownGuess {
    /// Mass of `kind`, zero when absent.
    pub fn mass(&self, kind: TypeKind) -> f64 {
        self.kind.get(&kind).copied().unwrap_or(0.0)
    }

    /// Kinds carrying non-zero mass.
    pub fn kinds(&self) -> impl Iterator<Item = TypeKind> + '_ {
        self.kind
            .iter()
            .filter(|(_, mass)| **mass > 0.0)
            .map(|(kind, _)| *kind)
    }
}

/// Wire form of [`TypeGuess`]: an `isAny` flag plus optional conditional fields.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeGuessRepr {
    is_any: bool,
    #[serde(default)]
    kind: Distribution<TypeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    object_shape: Option<BTreeMap<String, TypeGuess>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    array_value_type: Option<Box<TypeGuess>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    class_type: Option<Distribution<EndpointName>>,
}

impl From<TypeGuessRepr> for TypeGuess {
    fn from(repr: TypeGuessRepr) -> Self {
        if repr.is_any {
            return TypeGuess::Any;
        }
        TypeGuess::Known(KnownGuess {
            kind: repr.kind,
            object_shape: repr.object_shape,
            array_value_type: repr.array_value_type,
            class_type: repr.class_type,
        })
    }
}

impl From<TypeGuess> for TypeGuessRepr {
    fn from(guess: TypeGuess) -> Self {
        match guess {
            TypeGuess::Any => TypeGuessRepr {
                is_any: true,
                kind: Distribution::new(),
                object_shape: None,
                array_value_type: None,
                class_type: None,
            },
            TypeGuess::Known(known) => TypeGuessRepr {
                is_any: false,
                kind: known.kind,
                object_shape: known.object_shape,
                array_value_type: known.array_value_type,
                class_type: known.class_type,
            },
        }
    }
}

/// How an endpoint is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallConvention {
    /// Positional call with an undefined receiver.
    Free,
    /// `args[0]` is the receiver; the rest are positional.
    Method,
    /// Invoked with constructor semantics using all args.
    Constructor,
}

/// Inferred signature of one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureGuess {
    pub args: Vec<TypeGuess>,
    pub ret: TypeGuess,
    pub callconv: CallConvention,
    /// Set for host builtins seeded into every schema.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub builtin: bool,
}

impl SignatureGuess {
    pub fn new(args: Vec<TypeGuess>, ret: TypeGuess, callconv: CallConvention) -> Self {
        Self {
            args,
            ret,
            callconv,
            builtin: false,
        }
    }

    /// Signature with every argument and the return value unknown.
    pub fn all_any(arity: usize, callconv: CallConvention) -> Self {
        Self::new(vec![TypeGuess::Any; arity], TypeGuess::Any, callconv)
    }
}

/// Map from endpoint name to inferred signature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    entries: BTreeMap<EndpointName, SignatureGuess>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&SignatureGuess> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SignatureGuess> {
        self.entries.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn insert(
        &mut self,
        name: impl Into<EndpointName>,
        sig: SignatureGuess,
    ) -> Option<SignatureGuess> {
        self.entries.insert(name.into(), sig)
    }

    pub fn remove(&mut self, name: &str) -> Option<SignatureGuess> {
        self.entries.remove(name)
    }

    pub fn retain(&mut self, f: impl FnMut(&EndpointName, &mut SignatureGuess) -> bool) {
        self.entries.retain(f)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &EndpointName> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EndpointName, &SignatureGuess)> {
        self.entries.iter()
    }

    /// Parse a schema from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse schema JSON")
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize schema")
    }

    /// Load a schema file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read schema file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("in schema file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json_pretty()?)
            .with_context(|| format!("failed to write schema file {}", path.display()))
    }
}

impl FromIterator<(EndpointName, SignatureGuess)> for Schema {
    fn from_iter<I: IntoIterator<Item = (EndpointName, SignatureGuess)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = (&'a EndpointName, &'a SignatureGuess);
    type IntoIter = std::collections::btree_map::Iter<'a, EndpointName, SignatureGuess>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
