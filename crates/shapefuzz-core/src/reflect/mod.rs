//! Dynamic derivation: endpoints and schema entries from a loaded module.
//!
//! The module's exports are walked to a bounded depth. Every reachable function
//! becomes an endpoint; functions classified as constructors also contribute their
//! prototype methods and function-valued statics. Host builtins are always seeded.
//!
//! With `skip_endpoints_not_in_schema` set, only names the schema already knows are
//! bound, so reflection supplies live callables for a statically derived schema
//! without inventing untyped entries. Otherwise unknown functions are admitted with
//! all-`any` signatures sized by their declared parameter count.
//!
//! Schema entries left without an endpoint are dropped so that the schema and the
//! endpoint table stay key-aligned.

pub mod probe;

use std::collections::{BTreeMap, HashSet};

use anyhow::{ensure, Result};
use shapefuzz_types::{CallConvention, EndpointName, Schema, SignatureGuess, TypeGuess};
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::runtime::builtins::builtin_signatures;
use crate::runtime::{Builtins, ModuleLoader, ObjectRef, Value};

pub use probe::{classify_callable, CallableKind};

/// Live callables keyed like the schema.
pub type Endpoints = BTreeMap<EndpointName, Value>;

/// A schema together with the endpoints that back it.
#[derive(Debug)]
pub struct LoadedSchema {
    pub schema: Schema,
    pub endpoints: Endpoints,
    /// Endpoints admitted without a prior schema entry.
    pub unbacked: usize,
    /// Schema entries dropped for lack of a live endpoint.
    pub dropped: Vec<EndpointName>,
}

/// Load `specifier` and reflect over its exports.
pub async fn load_schema(
    loader: &dyn ModuleLoader,
    specifier: &str,
    schema: Option<Schema>,
    config: &WorkerConfig,
) -> Result<LoadedSchema> {
    let exports = loader.load(specifier).await?;
    let loaded = reflect_module(&exports, schema, config)?;
    info!(
        module = %specifier,
        endpoints = loaded.endpoints.len(),
        unbacked = loaded.unbacked,
        dropped = loaded.dropped.len(),
        "loaded schema"
    );
    Ok(loaded)
}

/// Reflect over an already loaded module value.
pub fn reflect_module(
    exports: &Value,
    schema: Option<Schema>,
    config: &WorkerConfig,
) -> Result<LoadedSchema> {
    let mut mapper = Mapper {
        schema: schema.unwrap_or_default(),
        endpoints: Endpoints::new(),
        unbacked: 0,
        config,
    };

    mapper.map_builtins();
    mapper.map_exports(exports)?;

    let Mapper {
        mut schema,
        endpoints,
        unbacked,
        ..
    } = mapper;

    let dropped: Vec<EndpointName> = schema
        .names()
        .filter(|name| !endpoints.contains_key(*name))
        .cloned()
        .collect();
    for name in &dropped {
        warn!(endpoint = %name, "missing endpoint for schema entry, skipping");
    }
    schema.retain(|name, _| endpoints.contains_key(name));

    if unbacked > 0 {
        warn!(count = unbacked, "found endpoints that were not in the schema");
    }

    Ok(LoadedSchema {
        schema,
        endpoints,
        unbacked,
        dropped,
    })
}

struct Mapper<'c> {
    schema: Schema,
    endpoints: Endpoints,
    unbacked: usize,
    config: &'c WorkerConfig,
}

impl Mapper<'_> {
    fn skipped(&self, name: &str) -> bool {
        self.config.methods_to_skip.contains(name)
    }

    fn skip_unknown(&self) -> bool {
        self.config.skip_endpoints_not_in_schema
    }

    fn admit(&mut self, name: String, sig: SignatureGuess) {
        self.unbacked += 1;
        debug!(endpoint = %name, callconv = ?sig.callconv, "admitted endpoint without schema entry");
        self.schema.insert(name, sig);
    }

    /// Builtin constructors are bound regardless of mode; their methods never are.
    fn map_builtins(&mut self) {
        let builtins = Builtins::new();
        let signatures: BTreeMap<EndpointName, SignatureGuess> =
            builtin_signatures().into_iter().collect();
        for (name, value) in builtins.iter() {
            if self.skipped(name) {
                continue;
            }
            self.endpoints.insert(name.clone(), value.clone());
            if !self.schema.contains(name) {
                if let Some(sig) = signatures.get(name) {
                    self.schema.insert(name.clone(), sig.clone());
                }
            }
        }
    }

    /// A function export (or function default export) is mapped under its own name,
    /// then the export object's members are walked.
    fn map_exports(&mut self, main: &Value) -> Result<()> {
        let default = match main.as_object() {
            Some(obj) if !main.is_callable() && obj.has_own("default") => Some(obj.get("default")),
            _ => None,
        };

        if main.is_callable() {
            self.map_function("", main, None)?;
        } else if let Some(default) = default.as_ref().filter(|d| d.is_callable()) {
            self.map_function("", default, None)?;
        }

        let exports = default.as_ref().unwrap_or(main);
        if let Some(obj) = exports.as_object() {
            self.map_object(0, "", obj)?;
        }
        Ok(())
    }

    fn map_object(&mut self, depth: usize, prefix: &str, obj: &ObjectRef) -> Result<()> {
        if depth >= self.config.max_object_mapping_depth {
            return Ok(());
        }
        for (key, value) in obj.entries() {
            if value.is_callable() {
                self.map_function(prefix, &value, Some(&key))?;
            } else if let Some(nested) = value.as_object() {
                self.map_object(depth + 1, &format!("{}{}.", prefix, key), nested)?;
            }
        }
        Ok(())
    }

    fn map_function(&mut self, prefix: &str, f: &Value, key: Option<&str>) -> Result<()> {
        let Some(callable) = f.callable() else {
            return Ok(());
        };
        let name = format!("{}{}", prefix, key.unwrap_or(&callable.name));
        if self.skipped(&name) {
            return Ok(());
        }

        let known = self.schema.get(&name).map(|sig| sig.callconv);
        if known.is_none() && self.skip_unknown() {
            return Ok(());
        }

        let is_constructor = known == Some(CallConvention::Constructor)
            || classify_callable(f).is_constructor();

        self.endpoints.insert(name.clone(), f.clone());
        if known.is_none() {
            let sig = if is_constructor {
                SignatureGuess::new(
                    vec![TypeGuess::Any; callable.length],
                    TypeGuess::class(name.clone()),
                    CallConvention::Constructor,
                )
            } else {
                SignatureGuess::all_any(callable.length, CallConvention::Free)
            };
            self.admit(name.clone(), sig);
        }

        if is_constructor {
            self.map_methods(&name, f)?;
            self.map_statics(&name, f)?;
        }
        Ok(())
    }

    /// Prototype methods along the whole chain; the most derived definition wins.
    fn map_methods(&mut self, class: &str, constructor: &Value) -> Result<()> {
        let mut seen = HashSet::new();
        let mut current = constructor.get("prototype").as_object().cloned();
        while let Some(prototype) = current {
            for (method, f) in probe::own_methods(&prototype) {
                if method.starts_with('_') || !seen.insert(method.clone()) {
                    continue;
                }
                let id = format!("{}.{}", class, method);
                if self.skipped(&id) {
                    continue;
                }
                match self.schema.get(&id).map(|sig| sig.callconv) {
                    Some(callconv) => {
                        ensure!(
                            callconv == CallConvention::Method,
                            "schema entry {} is {:?} but the live value is a prototype method",
                            id,
                            callconv
                        );
                    }
                    None if self.skip_unknown() => continue,
                    None => {
                        let arity = f.callable().map(|c| c.length).unwrap_or(0);
                        let mut args = vec![TypeGuess::class(class)];
                        args.extend(vec![TypeGuess::Any; arity]);
                        self.admit(
                            id.clone(),
                            SignatureGuess::new(args, TypeGuess::Any, CallConvention::Method),
                        );
                    }
                }
                self.endpoints.insert(id, f);
            }
            current = prototype.prototype();
        }
        Ok(())
    }

    /// Function-valued own properties of the constructor. A static sharing its name
    /// with a method keeps the method; one the schema knows as a class is mapped as a
    /// nested constructor.
    fn map_statics(&mut self, class: &str, constructor: &Value) -> Result<()> {
        let Some(obj) = constructor.as_object() else {
            return Ok(());
        };
        for (key, f) in probe::own_methods(obj) {
            if key == "prototype" {
                continue;
            }
            let id = format!("{}.{}", class, key);
            if self.skipped(&id) {
                continue;
            }
            match self.schema.get(&id).map(|sig| sig.callconv) {
                Some(CallConvention::Method) => {
                    debug!(endpoint = %id, "static shares its name with a method, keeping the method");
                }
                Some(CallConvention::Constructor) => {
                    self.map_function(&format!("{}.", class), &f, Some(&key))?;
                }
                Some(CallConvention::Free) => {
                    self.endpoints.insert(id, f);
                }
                None if self.skip_unknown() => {}
                None => {
                    let arity = f.callable().map(|c| c.length).unwrap_or(0);
                    self.admit(id.clone(), SignatureGuess::all_any(arity, CallConvention::Free));
                    self.endpoints.insert(id, f);
                }
            }
        }
        Ok(())
    }
}
