//! Type-guess algebra.
//!
//! Constructors lift concrete [`Type`]s into guesses; [`TypeGuess::union`] averages
//! probability mass across guesses and [`TypeGuess::intersect`] merges object shapes.
//! All masses are rounded to three decimals and kinds that round to zero are dropped.

use std::collections::{BTreeMap, BTreeSet};

use crate::schema::{Distribution, EndpointName, KnownGuess, Type, TypeGuess, TypeKind};

/// Round to the three-decimal precision used for every stored mass.
pub fn round_mass(mass: f64) -> f64 {
    (mass * 1e3).round() / 1e3
}

impl TypeGuess {
    pub fn any() -> Self {
        TypeGuess::Any
    }

    /// Lift a concrete type to a single-kind guess.
    pub fn exact(typ: &Type) -> Self {
        let mut known = KnownGuess::default();
        known.kind.insert(typ.kind(), 1.0);
        match typ {
            Type::Object(shape) => {
                known.object_shape = Some(
                    shape
                        .iter()
                        .map(|(key, t)| (key.clone(), TypeGuess::exact(t)))
                        .collect(),
                );
            }
            Type::Class(name) => {
                known.class_type = Some(Distribution::from([(name.clone(), 1.0)]));
            }
            Type::Array(elem) => {
                known.array_value_type = Some(Box::new(TypeGuess::exact(elem)));
            }
            Type::Number
            | Type::String
            | Type::Boolean
            | Type::Undefined
            | Type::Null
            | Type::Function => {}
        }
        TypeGuess::Known(known)
    }

    pub fn number() -> Self {
        Self::exact(&Type::Number)
    }

    pub fn string() -> Self {
        Self::exact(&Type::String)
    }

    pub fn boolean() -> Self {
        Self::exact(&Type::Boolean)
    }

    pub fn undefined() -> Self {
        Self::exact(&Type::Undefined)
    }

    pub fn null() -> Self {
        Self::exact(&Type::Null)
    }

    pub fn function() -> Self {
        Self::exact(&Type::Function)
    }

    pub fn class(name: impl Into<EndpointName>) -> Self {
        Self::exact(&Type::Class(name.into()))
    }

    /// Object guess with the given per-property guesses.
    pub fn object(shape: BTreeMap<String, TypeGuess>) -> Self {
        TypeGuess::Known(KnownGuess {
            kind: Distribution::from([(TypeKind::Object, 1.0)]),
            object_shape: Some(shape),
            ..KnownGuess::default()
        })
    }

    pub fn array(value_type: TypeGuess) -> Self {
        TypeGuess::Known(KnownGuess {
            kind: Distribution::from([(TypeKind::Array, 1.0)]),
            array_value_type: Some(Box::new(value_type)),
            ..KnownGuess::default()
        })
    }

    /// `union(exact(typ), exact(Undefined))`.
    pub fn optional(typ: &Type) -> Self {
        Self::union(&[Self::exact(typ), Self::undefined()])
    }

    pub fn is_any(&self) -> bool {
        matches!(self, TypeGuess::Any)
    }

    /// Whether a value of `kind` is possible under this guess.
    pub fn can_be(&self, kind: TypeKind) -> bool {
        match self {
            TypeGuess::Any => true,
            TypeGuess::Known(known) => known.mass(kind) > 0.0,
        }
    }

    pub fn as_known(&self) -> Option<&KnownGuess> {
        match self {
            TypeGuess::Any => None,
            TypeGuess::Known(known) => Some(known),
        }
    }

    /// Average the guesses kind by kind.
    ///
    /// Any `Any` operand makes the result `Any`, as does an empty input. Object shapes
    /// are merged per key with a missing key counting as `Undefined` in that operand;
    /// array value types are unioned; class distributions are averaged over the
    /// operands that carry one.
    pub fn union(guesses: &[TypeGuess]) -> Self {
        let mut known = Vec::with_capacity(guesses.len());
        for guess in guesses {
            match guess {
                TypeGuess::Any => return TypeGuess::Any,
                TypeGuess::Known(k) => known.push(k),
            }
        }
        if known.is_empty() {
            return TypeGuess::Any;
        }

        let n = known.len() as f64;
        let mut kind = Distribution::new();
        for k in TypeKind::ALL {
            let mass = round_mass(known.iter().map(|g| g.mass(k)).sum::<f64>() / n);
            if mass != 0.0 {
                kind.insert(k, mass);
            }
        }

        // Payloads only accompany kinds that kept a non-zero mass.
        let carries = |k: TypeKind| kind.contains_key(&k);

        let shapes: Vec<&BTreeMap<String, TypeGuess>> =
            known.iter().filter_map(|g| g.object_shape.as_ref()).collect();
        let object_shape = if shapes.is_empty() || !carries(TypeKind::Object) {
            None
        } else {
            let keys: BTreeSet<&String> = shapes.iter().flat_map(|s| s.keys()).collect();
            let merged = keys
                .into_iter()
                .map(|key| {
                    let members: Vec<TypeGuess> = shapes
                        .iter()
                        .map(|s| s.get(key).cloned().unwrap_or_else(TypeGuess::undefined))
                        .collect();
                    (key.clone(), TypeGuess::union(&members))
                })
                .collect();
            Some(merged)
        };

        let values: Vec<TypeGuess> = known
            .iter()
            .filter_map(|g| g.array_value_type.as_deref().cloned())
            .collect();
        let array_value_type = if values.is_empty() || !carries(TypeKind::Array) {
            None
        } else {
            Some(Box::new(TypeGuess::union(&values)))
        };

        let classes: Vec<&Distribution<EndpointName>> =
            known.iter().filter_map(|g| g.class_type.as_ref()).collect();
        let class_type = if classes.is_empty() || !carries(TypeKind::Class) {
            None
        } else {
            let m = classes.len() as f64;
            let names: BTreeSet<&EndpointName> = classes.iter().flat_map(|c| c.keys()).collect();
            let dist: Distribution<EndpointName> = names
                .into_iter()
                .filter_map(|name| {
                    let total: f64 = classes.iter().filter_map(|c| c.get(name)).sum();
                    let mass = round_mass(total / m);
                    (mass != 0.0).then(|| (name.clone(), mass))
                })
                .collect();
            Some(dist)
        };

        TypeGuess::Known(KnownGuess {
            kind,
            object_shape,
            array_value_type,
            class_type,
        })
    }

    /// Merge object guesses into one object.
    ///
    /// Only non-any operands that are certainly objects take part. When a key appears in
    /// several of them the bigger guess wins (see [`pick_bigger_guess`]). Without any
    /// object operand the result degrades to the union of the non-any operands.
    pub fn intersect(guesses: &[TypeGuess]) -> Self {
        let known: Vec<&TypeGuess> = guesses.iter().filter(|g| !g.is_any()).collect();
        if known.is_empty() {
            return TypeGuess::Any;
        }

        let objects: Vec<&BTreeMap<String, TypeGuess>> = known
            .iter()
            .filter_map(|g| g.as_known())
            .filter(|k| k.mass(TypeKind::Object) == 1.0)
            .filter_map(|k| k.object_shape.as_ref())
            .collect();
        if objects.is_empty() {
            let owned: Vec<TypeGuess> = known.into_iter().cloned().collect();
            return TypeGuess::union(&owned);
        }

        let mut shape: BTreeMap<String, TypeGuess> = BTreeMap::new();
        for object in objects {
            for (key, guess) in object {
                let merged = match shape.remove(key) {
                    Some(existing) => pick_bigger_guess(existing, guess.clone()),
                    None => guess.clone(),
                };
                shape.insert(key.clone(), merged);
            }
        }
        TypeGuess::object(shape)
    }
}

/// Keep the guess whose non-zero kind set strictly contains the other's, else `a`.
/// An `Any` operand always wins.
pub fn pick_bigger_guess(a: TypeGuess, b: TypeGuess) -> TypeGuess {
    let (ka, kb) = match (&a, &b) {
        (TypeGuess::Any, _) => return a,
        (_, TypeGuess::Any) => return b,
        (TypeGuess::Known(ka), TypeGuess::Known(kb)) => (ka, kb),
    };
    let a_kinds: BTreeSet<TypeKind> = ka.kinds().collect();
    let b_kinds: BTreeSet<TypeKind> = kb.kinds().collect();
    if a_kinds.is_subset(&b_kinds) && a_kinds != b_kinds {
        b
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mass(guess: &TypeGuess, kind: TypeKind) -> f64 {
        guess.as_known().expect("known guess").mass(kind)
    }

    #[test]
    fn test_exact_class_has_full_mass() {
        let guess = TypeGuess::class("Deflate");
        let known = guess.as_known().unwrap();
        assert_eq!(known.mass(TypeKind::Class), 1.0);
        assert_eq!(known.class_type.as_ref().unwrap()["Deflate"], 1.0);
    }

    #[test]
    fn test_union_of_identical_is_identity() {
        let t = Type::Object(BTreeMap::from([("a".to_string(), Type::String)]));
        let exact = TypeGuess::exact(&t);
        assert_eq!(TypeGuess::union(&[exact.clone(), exact.clone()]), exact);
    }

    #[test]
    fn test_union_with_any_is_any() {
        let guesses = [TypeGuess::number(), TypeGuess::any(), TypeGuess::string()];
        assert!(TypeGuess::union(&guesses).is_any());
        assert!(TypeGuess::union(&[]).is_any());
    }

    #[test]
    fn test_union_averages_and_rounds() {
        let guess = TypeGuess::union(&[
            TypeGuess::string(),
            TypeGuess::number(),
            TypeGuess::boolean(),
        ]);
        assert_eq!(mass(&guess, TypeKind::String), 0.333);
        assert_eq!(mass(&guess, TypeKind::Number), 0.333);
        assert_eq!(mass(&guess, TypeKind::Boolean), 0.333);
        assert!(!guess.can_be(TypeKind::Null));
    }

    #[test]
    fn test_union_is_commutative() {
        let a = TypeGuess::optional(&Type::Number);
        let b = TypeGuess::class("Foo");
        let c = TypeGuess::array(TypeGuess::string());
        assert_eq!(
            TypeGuess::union(&[a.clone(), b.clone(), c.clone()]),
            TypeGuess::union(&[c, a, b])
        );
    }

    #[test]
    fn test_union_regrouping_keeps_masses() {
        let (a, b, c, d) = (
            TypeGuess::optional(&Type::Number),
            TypeGuess::string(),
            TypeGuess::class("Foo"),
            TypeGuess::null(),
        );
        let flat = TypeGuess::union(&[a.clone(), b.clone(), c.clone(), d.clone()]);
        let left = TypeGuess::union(&[
            TypeGuess::union(&[a.clone(), b.clone()]),
            TypeGuess::union(&[c.clone(), d.clone()]),
        ]);
        let right = TypeGuess::union(&[
            TypeGuess::union(&[a.clone(), c.clone()]),
            TypeGuess::union(&[b.clone(), d.clone()]),
        ]);
        for kind in TypeKind::ALL {
            let expected = mass(&flat, kind);
            assert!((mass(&left, kind) - expected).abs() <= 1e-3, "{:?}", kind);
            assert!((mass(&right, kind) - expected).abs() <= 1e-3, "{:?}", kind);
        }

        // Same-kind operands associate exactly.
        let n = TypeGuess::number();
        assert_eq!(
            TypeGuess::union(&[TypeGuess::union(&[n.clone(), n.clone()]), n.clone()]),
            TypeGuess::union(&[n.clone(), TypeGuess::union(&[n.clone(), n])])
        );
    }

    #[test]
    fn test_union_drops_payloads_of_vanished_kinds() {
        let mut guesses = vec![TypeGuess::class("Foo")];
        guesses.extend(std::iter::repeat(TypeGuess::number()).take(2000));
        let guess = TypeGuess::union(&guesses);
        let known = guess.as_known().unwrap();
        assert_eq!(known.mass(TypeKind::Class), 0.0);
        assert!(known.class_type.is_none());

        let mut guesses = vec![
            TypeGuess::object(BTreeMap::from([("a".to_string(), TypeGuess::string())])),
            TypeGuess::array(TypeGuess::string()),
        ];
        guesses.extend(std::iter::repeat(TypeGuess::string()).take(2000));
        let known = TypeGuess::union(&guesses).as_known().cloned().unwrap();
        assert!(known.object_shape.is_none());
        assert!(known.array_value_type.is_none());
        assert_eq!(known.mass(TypeKind::String), 0.999);
    }

    #[test]
    fn test_union_object_missing_keys_are_undefined() {
        let a = TypeGuess::object(BTreeMap::from([("a".to_string(), TypeGuess::string())]));
        let b = TypeGuess::object(BTreeMap::from([("b".to_string(), TypeGuess::number())]));
        let guess = TypeGuess::union(&[a, b]);

        let shape = guess.as_known().unwrap().object_shape.as_ref().unwrap();
        assert_eq!(shape["a"], TypeGuess::optional(&Type::String));
        assert_eq!(shape["b"], TypeGuess::optional(&Type::Number));
        assert_eq!(mass(&guess, TypeKind::Object), 1.0);
    }

    #[test]
    fn test_union_class_type_is_conditional() {
        let guess = TypeGuess::union(&[
            TypeGuess::class("Uint8Array"),
            TypeGuess::class("ArrayBuffer"),
            TypeGuess::string(),
        ]);
        let known = guess.as_known().unwrap();
        assert_eq!(known.mass(TypeKind::Class), 0.667);
        assert_eq!(known.mass(TypeKind::String), 0.333);
        let classes = known.class_type.as_ref().unwrap();
        assert_eq!(classes["Uint8Array"], 0.5);
        assert_eq!(classes["ArrayBuffer"], 0.5);
    }

    #[test]
    fn test_union_array_value_types() {
        let guess = TypeGuess::union(&[
            TypeGuess::array(TypeGuess::number()),
            TypeGuess::array(TypeGuess::string()),
        ]);
        let value = guess.as_known().unwrap().array_value_type.as_deref().unwrap();
        assert_eq!(mass(value, TypeKind::Number), 0.5);
        assert_eq!(mass(value, TypeKind::String), 0.5);
    }

    #[test]
    fn test_optional() {
        let guess = TypeGuess::optional(&Type::String);
        assert_eq!(mass(&guess, TypeKind::String), 0.5);
        assert_eq!(mass(&guess, TypeKind::Undefined), 0.5);
    }

    #[test]
    fn test_intersect_merges_shapes() {
        let a = TypeGuess::object(BTreeMap::from([("a".to_string(), TypeGuess::string())]));
        let b = TypeGuess::object(BTreeMap::from([("b".to_string(), TypeGuess::number())]));
        let guess = TypeGuess::intersect(&[a, TypeGuess::any(), b]);
        let expected = TypeGuess::object(BTreeMap::from([
            ("a".to_string(), TypeGuess::string()),
            ("b".to_string(), TypeGuess::number()),
        ]));
        assert_eq!(guess, expected);
    }

    #[test]
    fn test_intersect_keeps_bigger_guess() {
        let a = TypeGuess::object(BTreeMap::from([("x".to_string(), TypeGuess::string())]));
        let wider = TypeGuess::optional(&Type::String);
        let b = TypeGuess::object(BTreeMap::from([("x".to_string(), wider.clone())]));
        let guess = TypeGuess::intersect(&[a, b]);
        let shape = guess.as_known().unwrap().object_shape.as_ref().unwrap();
        assert_eq!(shape["x"], wider);
    }

    #[test]
    fn test_intersect_without_objects_falls_back_to_union() {
        let guess = TypeGuess::intersect(&[TypeGuess::string(), TypeGuess::number()]);
        assert_eq!(guess, TypeGuess::union(&[TypeGuess::string(), TypeGuess::number()]));
        assert!(TypeGuess::intersect(&[TypeGuess::any()]).is_any());
    }

    #[test]
    fn test_pick_bigger_guess_keeps_left_on_disjoint() {
        let picked = pick_bigger_guess(TypeGuess::string(), TypeGuess::number());
        assert_eq!(picked, TypeGuess::string());
        let picked = pick_bigger_guess(TypeGuess::string(), TypeGuess::string());
        assert_eq!(picked, TypeGuess::string());
        assert!(pick_bigger_guess(TypeGuess::string(), TypeGuess::any()).is_any());
    }
}
