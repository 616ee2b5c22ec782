//! Conversion of declared types to type guesses and assembly of the schema.
//!
//! The exported surface is walked twice. The first walk only assigns endpoint names to
//! exported classes so that references resolve to the right name regardless of
//! declaration order; the second walk emits entries. Classes that are referenced but
//! never exported are emitted afterwards under their bare name.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use anyhow::{anyhow, Result};
use shapefuzz_types::{CallConvention, EndpointName, Schema, SignatureGuess, Type, TypeGuess, TypeKind};
use tracing::debug;

use super::ast::*;
use super::scope::{ScopeId, Scopes, TypeSymbol, ValueSymbol, ROOT};
use crate::config::MAX_OBJECT_PROPERTIES;
use crate::runtime::builtins::{is_builtin_method, is_std_class, seed_schema};

/// Alias chains followed when pooling union members.
const MAX_ALIAS_FLATTEN_DEPTH: usize = 8;

/// Resolution context of a type expression.
#[derive(Clone, Default)]
struct Env {
    scope: ScopeId,
    bindings: HashMap<String, TypeGuess>,
    this_class: Option<EndpointName>,
}

impl Env {
    fn at(scope: ScopeId) -> Self {
        Env {
            scope,
            ..Env::default()
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pass {
    Name,
    Emit,
}

type Overloads<'a> = Vec<(&'a FnSig, Env)>;

pub struct Deriver<'a> {
    scopes: Scopes<'a>,
    schema: Schema,
    pass: Pass,
    class_names: HashMap<(ScopeId, &'a str), EndpointName>,
    emitted: HashSet<EndpointName>,
    pending: Vec<(ScopeId, &'a ClassDecl)>,
    /// Interfaces, aliases and queries currently being expanded.
    active: HashSet<(ScopeId, &'a str)>,
}

impl<'a> Deriver<'a> {
    pub fn derive(stmts: &'a [Statement]) -> Result<Schema> {
        let mut deriver = Deriver {
            scopes: Scopes::build(stmts),
            schema: Schema::new(),
            pass: Pass::Name,
            class_names: HashMap::new(),
            emitted: HashSet::new(),
            pending: Vec::new(),
            active: HashSet::new(),
        };

        deriver.walk_surface()?;
        deriver.pass = Pass::Emit;
        deriver.walk_surface()?;
        while let Some((scope, decl)) = deriver.pending.pop() {
            deriver.emit_class(scope, decl)?;
        }

        seed_schema(&mut deriver.schema);
        Ok(deriver.schema)
    }

    fn walk_surface(&mut self) -> Result<()> {
        self.module_surface(ROOT)?;
        let modules = self.scopes.get(ROOT).ambient_modules.clone();
        for module in modules {
            self.module_surface(module)?;
        }
        Ok(())
    }

    fn module_surface(&mut self, scope: ScopeId) -> Result<()> {
        let assignment = self.scopes.get(scope).export_assignment;
        match assignment {
            Some(path) => self.export_assignment(scope, path),
            None => self.scope_exports(scope, ""),
        }
    }

    fn scope_exports(&mut self, scope: ScopeId, prefix: &str) -> Result<()> {
        let exports = self.scopes.get(scope).exports.clone();
        for (exported, local) in exports {
            let name = if exported == "default" {
                local.rsplit('.').next().unwrap_or(&local).to_string()
            } else {
                exported
            };
            let path: Vec<String> = local.split('.').map(String::from).collect();
            // Type-only exports have no value.
            if let Some(symbol) = self.scopes.resolve_value(scope, &path) {
                self.value_entries(symbol, &format!("{}{}", prefix, name))?;
            }
        }
        Ok(())
    }

    /// `export = target`: the target's members are the module's members.
    fn export_assignment(&mut self, scope: ScopeId, path: &'a [String]) -> Result<()> {
        let symbol = self
            .scopes
            .resolve_value(scope, path)
            .ok_or_else(|| anyhow!("export = {}: no such declaration", path.join(".")))?;
        let name = path.last().cloned().unwrap_or_default();

        if let Some(class) = symbol.class {
            self.class_entries(symbol.scope, class, &name)?;
        } else if !symbol.functions.is_empty() {
            self.function_entry(&symbol, &name)?;
        } else if let Some(Some(ty)) = symbol.variable {
            self.variable_entries(symbol.scope, ty, &name, "")?;
        }
        if let Some(ns) = symbol.namespace {
            self.scope_exports(ns, "")?;
        }
        Ok(())
    }

    fn value_entries(&mut self, symbol: ValueSymbol<'a>, name: &str) -> Result<()> {
        if let Some(class) = symbol.class {
            self.class_entries(symbol.scope, class, name)?;
        } else if !symbol.functions.is_empty() {
            self.function_entry(&symbol, name)?;
        } else if let Some(Some(ty)) = symbol.variable {
            self.variable_entries(symbol.scope, ty, name, &format!("{}.", name))?;
        }
        if let Some(ns) = symbol.namespace {
            self.scope_exports(ns, &format!("{}.", name))?;
        }
        Ok(())
    }

    fn function_entry(&mut self, symbol: &ValueSymbol<'a>, name: &str) -> Result<()> {
        if self.pass == Pass::Name {
            return Ok(());
        }
        let overloads: Overloads<'a> = symbol
            .functions
            .iter()
            .map(|sig| (*sig, Env::at(symbol.scope)))
            .collect();
        let sig = self.signature(&overloads, None, CallConvention::Free, None)?;
        self.schema.insert(name, sig);
        Ok(())
    }

    /// Entries for a const whose declared type is callable or carries methods.
    fn variable_entries(
        &mut self,
        scope: ScopeId,
        ty: &'a TypeExpr,
        name: &str,
        prefix: &str,
    ) -> Result<()> {
        if self.pass == Pass::Name {
            return Ok(());
        }
        let env = Env::at(scope);
        match ty {
            TypeExpr::Function(sig) => {
                let sig = self.signature(&[(&**sig, env)], None, CallConvention::Free, None)?;
                self.schema.insert(name, sig);
            }
            TypeExpr::Query(path) => {
                if let Some(symbol) = self.scopes.resolve_value(scope, path) {
                    if symbol.class.is_none() && !symbol.functions.is_empty() {
                        self.function_entry(&symbol, name)?;
                    }
                }
            }
            _ => {
                let Some(members) = self.members_of_type(ty, &env)? else {
                    return Ok(());
                };
                let mut calls: Overloads<'a> = Vec::new();
                for (member_name, overloads) in group_methods(&members, false) {
                    let sig = self.signature(&overloads, None, CallConvention::Free, None)?;
                    self.schema.insert(format!("{}{}", prefix, member_name), sig);
                }
                for (member, env) in &members {
                    if let Member::Call(sig) = *member {
                        calls.push((sig, env.clone()));
                    }
                }
                if !calls.is_empty() {
                    let sig = self.signature(&calls, None, CallConvention::Free, None)?;
                    self.schema.insert(name, sig);
                }
            }
        }
        Ok(())
    }

    fn class_entries(&mut self, scope: ScopeId, decl: &'a ClassDecl, name: &str) -> Result<()> {
        match self.pass {
            Pass::Name => {
                self.class_names
                    .entry((scope, decl.name.as_str()))
                    .or_insert_with(|| name.to_string());
                Ok(())
            }
            Pass::Emit => self.emit_class(scope, decl),
        }
    }

    fn class_name(&self, scope: ScopeId, decl: &ClassDecl) -> EndpointName {
        self.class_names
            .get(&(scope, decl.name.as_str()))
            .cloned()
            .unwrap_or_else(|| decl.name.clone())
    }

    /// Reference to a class in type position; schedules its entries.
    fn class_ref(&mut self, scope: ScopeId, decl: &'a ClassDecl) -> TypeGuess {
        let name = self.class_name(scope, decl);
        if self.pass == Pass::Emit && !self.emitted.contains(&name) {
            self.pending.push((scope, decl));
        }
        TypeGuess::class(name)
    }

    /// Constructor, methods and statics of a class. The parent class is emitted first
    /// and its methods not overridden here are copied with the receiver rewritten.
    fn emit_class(&mut self, scope: ScopeId, decl: &'a ClassDecl) -> Result<()> {
        let name = self.class_name(scope, decl);
        if !self.emitted.insert(name.clone()) {
            return Ok(());
        }

        let parent = match &decl.extends {
            Some(TypeExpr::Ref { name: path, .. }) => match self.scopes.resolve_type(scope, path) {
                Some(TypeSymbol::Class(parent_scope, parent_decl)) => {
                    self.emit_class(parent_scope, parent_decl)?;
                    Some(self.class_name(parent_scope, parent_decl))
                }
                _ => None,
            },
            _ => None,
        };

        let mut env = Env::at(scope);
        env.bindings = self.bind_params(&decl.type_params, &[], &Env::at(scope), scope)?;
        env.this_class = Some(name.clone());
        let receiver = TypeGuess::class(name.clone());

        let members: Vec<(&'a Member, Env)> =
            decl.members.iter().map(|m| (m, env.clone())).collect();

        let constructors: Overloads<'a> = members
            .iter()
            .filter_map(|(m, env)| match *m {
                Member::Constructor(sig) => Some((sig, env.clone())),
                _ => None,
            })
            .collect();
        let constructor = if constructors.is_empty() {
            // Without its own constructor a class constructs like its parent.
            let inherited = parent
                .as_ref()
                .and_then(|parent| self.schema.get(parent))
                .filter(|sig| sig.callconv == CallConvention::Constructor)
                .map(|sig| sig.args.clone())
                .unwrap_or_default();
            SignatureGuess::new(inherited, receiver.clone(), CallConvention::Constructor)
        } else {
            self.signature(
                &constructors,
                None,
                CallConvention::Constructor,
                Some(receiver.clone()),
            )?
        };
        self.schema.insert(name.clone(), constructor);

        let mut instance = group_methods(&members, false);
        let mut defined: HashSet<&'a str> = instance.iter().map(|(m, _)| *m).collect();

        for implemented in &decl.implements {
            let Some(iface_members) = self.members_of_type(implemented, &env)? else {
                continue;
            };
            for (member_name, overloads) in group_methods(&iface_members, false) {
                if defined.insert(member_name) {
                    instance.push((member_name, overloads));
                }
            }
        }

        for (member_name, overloads) in instance {
            if is_builtin_method(member_name) {
                continue;
            }
            let sig = self.signature(
                &overloads,
                Some(receiver.clone()),
                CallConvention::Method,
                None,
            )?;
            self.schema.insert(format!("{}.{}", name, member_name), sig);
        }

        for (member_name, overloads) in group_methods(&members, true) {
            // A static sharing its name with an instance method keeps the method.
            if member_name == "prototype" || defined.contains(member_name) {
                continue;
            }
            let sig = self.signature(&overloads, None, CallConvention::Free, None)?;
            self.schema.insert(format!("{}.{}", name, member_name), sig);
        }

        if let Some(parent) = parent {
            let inherited: Vec<(String, SignatureGuess)> = self
                .schema
                .iter()
                .filter(|(_, sig)| sig.callconv == CallConvention::Method)
                .filter_map(|(entry, sig)| {
                    let member = entry.strip_prefix(parent.as_str())?.strip_prefix('.')?;
                    (!member.contains('.') && !defined.contains(member))
                        .then(|| (member.to_string(), sig.clone()))
                })
                .collect();
            for (member, mut sig) in inherited {
                let entry = format!("{}.{}", name, member);
                let own_method = self
                    .schema
                    .get(&entry)
                    .is_some_and(|sig| sig.callconv == CallConvention::Method);
                if own_method {
                    continue;
                }
                if let Some(first) = sig.args.first_mut() {
                    *first = receiver.clone();
                }
                self.schema.insert(entry, sig);
            }
        }

        debug!(class = %name, "derived class entries");
        Ok(())
    }

    /// Combine overloads: argument `i` is the union over overloads (Undefined where an
    /// overload is shorter), the return is the union of returns.
    fn signature(
        &mut self,
        overloads: &[(&'a FnSig, Env)],
        receiver: Option<TypeGuess>,
        callconv: CallConvention,
        ret_override: Option<TypeGuess>,
    ) -> Result<SignatureGuess> {
        let mut all_args = Vec::with_capacity(overloads.len());
        let mut rets = Vec::with_capacity(overloads.len());

        for (sig, env) in overloads {
            let mut env = env.clone();
            for param in &sig.type_params {
                let guess = match &param.constraint {
                    Some(constraint) => self.convert(constraint, &env)?,
                    None => TypeGuess::Any,
                };
                env.bindings.insert(param.name.clone(), guess);
            }

            let mut args = Vec::with_capacity(sig.params.len());
            for param in &sig.params {
                args.push(self.param_guess(param, &env)?);
            }
            all_args.push(args);

            rets.push(match (&ret_override, &sig.ret) {
                (Some(ret), _) => ret.clone(),
                (None, Some(ret)) => self.convert(ret, &env)?,
                (None, None) => TypeGuess::Any,
            });
        }

        let (mut args, ret) = if all_args.len() == 1 {
            (all_args.remove(0), rets.remove(0))
        } else {
            let arity = all_args.iter().map(Vec::len).max().unwrap_or(0);
            let args = (0..arity)
                .map(|i| {
                    let at_i: Vec<TypeGuess> = all_args
                        .iter()
                        .map(|args| args.get(i).cloned().unwrap_or_else(TypeGuess::undefined))
                        .collect();
                    TypeGuess::union(&at_i)
                })
                .collect();
            (args, TypeGuess::union(&rets))
        };

        if let Some(receiver) = receiver {
            args.insert(0, receiver);
        }
        Ok(SignatureGuess::new(args, ret, callconv))
    }

    fn param_guess(&mut self, param: &'a Param, env: &Env) -> Result<TypeGuess> {
        let Some(ty) = &param.ty else {
            return Ok(TypeGuess::Any);
        };
        if param.rest {
            return match element_type(ty) {
                Some(elem) => self.convert(elem, env),
                None => Ok(TypeGuess::Any),
            };
        }
        if param.optional {
            return self.convert_union(ty, env, true);
        }
        self.convert(ty, env)
    }

    fn bind_params(
        &mut self,
        params: &'a [TypeParam],
        args: &'a [TypeExpr],
        caller: &Env,
        decl_scope: ScopeId,
    ) -> Result<HashMap<String, TypeGuess>> {
        let mut bindings = HashMap::new();
        for (i, param) in params.iter().enumerate() {
            let guess = match (args.get(i), &param.constraint) {
                (Some(arg), _) => self.convert(arg, caller)?,
                (None, Some(constraint)) => self.convert(constraint, &Env::at(decl_scope))?,
                (None, None) => TypeGuess::Any,
            };
            bindings.insert(param.name.clone(), guess);
        }
        Ok(bindings)
    }

    fn convert(&mut self, ty: &'a TypeExpr, env: &Env) -> Result<TypeGuess> {
        Ok(match ty {
            TypeExpr::Keyword(keyword) => match keyword {
                Keyword::Number => TypeGuess::number(),
                Keyword::String => TypeGuess::string(),
                Keyword::Boolean => TypeGuess::boolean(),
                Keyword::Void | Keyword::Undefined => TypeGuess::undefined(),
                Keyword::Null => TypeGuess::null(),
                Keyword::Object => TypeGuess::object(BTreeMap::new()),
                Keyword::This => env
                    .this_class
                    .clone()
                    .map(TypeGuess::class)
                    .unwrap_or(TypeGuess::Any),
                Keyword::Any
                | Keyword::Unknown
                | Keyword::Never
                | Keyword::Symbol
                | Keyword::BigInt => TypeGuess::Any,
            },
            TypeExpr::StringLit(_) | TypeExpr::TemplateLit | TypeExpr::Keyof(_) => {
                TypeGuess::string()
            }
            TypeExpr::NumberLit(_) => TypeGuess::number(),
            TypeExpr::BoolLit(_) | TypeExpr::Predicate => TypeGuess::boolean(),
            TypeExpr::Ref { name, args } => self.convert_ref(name, args, env)?,
            TypeExpr::Array(elem) => TypeGuess::array(self.convert(elem, env)?),
            TypeExpr::Tuple(elems) => {
                let mut guesses = Vec::with_capacity(elems.len());
                for elem in elems {
                    let ty = if elem.rest {
                        element_type(&elem.ty)
                    } else {
                        Some(&elem.ty)
                    };
                    guesses.push(match ty {
                        Some(ty) => self.convert(ty, env)?,
                        None => TypeGuess::Any,
                    });
                }
                TypeGuess::array(TypeGuess::union(&guesses))
            }
            TypeExpr::Union(_) => self.convert_union(ty, env, false)?,
            TypeExpr::Intersection(parts) => {
                let mut guesses = Vec::with_capacity(parts.len());
                for part in parts {
                    guesses.push(self.convert(part, env)?);
                }
                TypeGuess::intersect(&guesses)
            }
            // Callback shapes carry no useful argument information.
            TypeExpr::Function(_) => TypeGuess::undefined(),
            TypeExpr::Object(members) => {
                let members: Vec<(&'a Member, Env)> =
                    members.iter().map(|m| (m, env.clone())).collect();
                self.object_from_members(&members)?
            }
            TypeExpr::Query(path) => self.convert_query(path, env)?,
            TypeExpr::Opaque => TypeGuess::Any,
        })
    }

    /// Literal and primitive members pool into one deduplicated set of kinds; the rest
    /// convert recursively. `extra_undefined` adds Undefined to the pool.
    fn convert_union(&mut self, ty: &'a TypeExpr, env: &Env, extra_undefined: bool) -> Result<TypeGuess> {
        let mut flat = Vec::new();
        self.flatten_union(ty, env, &mut flat, 0)?;

        let mut primitives: BTreeSet<TypeKind> = BTreeSet::new();
        let mut others = Vec::new();
        for (member, member_env) in flat {
            if matches!(member, TypeExpr::Keyword(Keyword::Never)) {
                continue;
            }
            match self.primitive_kind(member, &member_env) {
                Some(kind) => {
                    primitives.insert(kind);
                }
                None => others.push(self.convert(member, &member_env)?),
            }
        }
        if extra_undefined {
            primitives.insert(TypeKind::Undefined);
        }

        let mut guesses: Vec<TypeGuess> = primitives.into_iter().filter_map(primitive_guess).collect();
        guesses.extend(others);
        Ok(match guesses.len() {
            1 => guesses.remove(0),
            _ => TypeGuess::union(&guesses),
        })
    }

    fn flatten_union(
        &mut self,
        ty: &'a TypeExpr,
        env: &Env,
        out: &mut Vec<(&'a TypeExpr, Env)>,
        depth: usize,
    ) -> Result<()> {
        match ty {
            TypeExpr::Union(members) => {
                for member in members {
                    self.flatten_union(member, env, out, depth)?;
                }
            }
            TypeExpr::Ref { name, args }
                if depth < MAX_ALIAS_FLATTEN_DEPTH && !is_bound(name, env) =>
            {
                match self.scopes.resolve_type(env.scope, name) {
                    Some(TypeSymbol::Alias(scope, alias)) if matches!(alias.ty, TypeExpr::Union(_)) => {
                        let alias_env = Env {
                            scope,
                            bindings: self.bind_params(&alias.type_params, args, env, scope)?,
                            this_class: None,
                        };
                        self.flatten_union(&alias.ty, &alias_env, out, depth + 1)?;
                    }
                    _ => out.push((ty, env.clone())),
                }
            }
            _ => out.push((ty, env.clone())),
        }
        Ok(())
    }

    fn primitive_kind(&self, ty: &TypeExpr, env: &Env) -> Option<TypeKind> {
        match ty {
            TypeExpr::Keyword(Keyword::Number) | TypeExpr::NumberLit(_) => Some(TypeKind::Number),
            TypeExpr::Keyword(Keyword::String) | TypeExpr::StringLit(_) | TypeExpr::TemplateLit => {
                Some(TypeKind::String)
            }
            TypeExpr::Keyword(Keyword::Boolean) | TypeExpr::BoolLit(_) => Some(TypeKind::Boolean),
            TypeExpr::Keyword(Keyword::Void) | TypeExpr::Keyword(Keyword::Undefined) => {
                Some(TypeKind::Undefined)
            }
            TypeExpr::Keyword(Keyword::Null) => Some(TypeKind::Null),
            TypeExpr::Ref { name, .. } if !is_bound(name, env) => {
                match self.scopes.resolve_type(env.scope, name)? {
                    TypeSymbol::EnumMember(value) => Some(enum_kind(value)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn convert_ref(&mut self, name: &'a [String], args: &'a [TypeExpr], env: &Env) -> Result<TypeGuess> {
        if let [single] = name {
            if let Some(bound) = env.bindings.get(single) {
                return Ok(bound.clone());
            }
        }

        match self.scopes.resolve_type(env.scope, name) {
            Some(TypeSymbol::Class(scope, decl)) => Ok(self.class_ref(scope, decl)),
            Some(TypeSymbol::Interface(scope, decls)) => self.convert_interface(scope, decls, args, env),
            Some(TypeSymbol::Alias(scope, alias)) => {
                let key = (scope, alias.name.as_str());
                if !self.active.insert(key) {
                    return Ok(TypeGuess::Any);
                }
                let alias_env = Env {
                    scope,
                    bindings: self.bind_params(&alias.type_params, args, env, scope)?,
                    this_class: None,
                };
                let guess = self.convert(&alias.ty, &alias_env);
                self.active.remove(&key);
                guess
            }
            Some(TypeSymbol::Enum(decl)) => {
                let kinds: BTreeSet<TypeKind> =
                    decl.members.iter().map(|(_, value)| enum_kind(*value)).collect();
                let mut guesses: Vec<TypeGuess> = kinds.into_iter().filter_map(primitive_guess).collect();
                Ok(match guesses.len() {
                    0 => TypeGuess::number(),
                    1 => guesses.remove(0),
                    _ => TypeGuess::union(&guesses),
                })
            }
            Some(TypeSymbol::EnumMember(value)) => {
                Ok(primitive_guess(enum_kind(value)).unwrap_or(TypeGuess::Any))
            }
            None => self.convert_global(name, args, env),
        }
    }

    fn convert_interface(
        &mut self,
        scope: ScopeId,
        decls: Vec<&'a InterfaceDecl>,
        args: &'a [TypeExpr],
        env: &Env,
    ) -> Result<TypeGuess> {
        let Some(&first) = decls.first() else {
            return Ok(TypeGuess::Any);
        };
        let key = (scope, first.name.as_str());
        if !self.active.insert(key) {
            // Self-reference.
            return Ok(TypeGuess::object(BTreeMap::new()));
        }
        let mut members = Vec::new();
        let mut visited = HashSet::from([key]);
        let result = self
            .interface_members(scope, &decls, args, env, &mut members, &mut visited)
            .and_then(|_| self.object_from_members(&members));
        self.active.remove(&key);
        result
    }

    /// Members of every merged declaration plus those of extended interfaces.
    fn interface_members(
        &mut self,
        scope: ScopeId,
        decls: &[&'a InterfaceDecl],
        args: &'a [TypeExpr],
        caller: &Env,
        out: &mut Vec<(&'a Member, Env)>,
        visited: &mut HashSet<(ScopeId, &'a str)>,
    ) -> Result<()> {
        let Some(&first) = decls.first() else {
            return Ok(());
        };
        let env = Env {
            scope,
            bindings: self.bind_params(&first.type_params, args, caller, scope)?,
            this_class: None,
        };
        for decl in decls {
            out.extend(decl.members.iter().map(|m| (m, env.clone())));
        }
        for decl in decls {
            for parent in &decl.extends {
                let TypeExpr::Ref { name, args } = parent else {
                    continue;
                };
                if let Some(TypeSymbol::Interface(parent_scope, parents)) =
                    self.scopes.resolve_type(scope, name)
                {
                    let Some(&parent_first) = parents.first() else {
                        continue;
                    };
                    if visited.insert((parent_scope, parent_first.name.as_str())) {
                        self.interface_members(parent_scope, &parents, args, &env, out, visited)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Members of an object literal type or a (possibly aliased) interface.
    fn members_of_type(&mut self, ty: &'a TypeExpr, env: &Env) -> Result<Option<Vec<(&'a Member, Env)>>> {
        match ty {
            TypeExpr::Object(members) => Ok(Some(members.iter().map(|m| (m, env.clone())).collect())),
            TypeExpr::Ref { name, args } => match self.scopes.resolve_type(env.scope, name) {
                Some(TypeSymbol::Interface(scope, decls)) => {
                    let mut members = Vec::new();
                    let mut visited = HashSet::new();
                    if let Some(&first) = decls.first() {
                        visited.insert((scope, first.name.as_str()));
                    }
                    self.interface_members(scope, &decls, args, env, &mut members, &mut visited)?;
                    Ok(Some(members))
                }
                Some(TypeSymbol::Alias(scope, alias)) => {
                    let key = (scope, alias.name.as_str());
                    if !self.active.insert(key) {
                        return Ok(None);
                    }
                    let alias_env = Env {
                        scope,
                        bindings: self.bind_params(&alias.type_params, args, env, scope)?,
                        this_class: None,
                    };
                    let members = self.members_of_type(&alias.ty, &alias_env);
                    self.active.remove(&key);
                    members
                }
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn object_from_members(&mut self, members: &[(&'a Member, Env)]) -> Result<TypeGuess> {
        let mut shape = BTreeMap::new();
        let mut callable = false;

        for (member, env) in members {
            match *member {
                Member::Property {
                    name,
                    optional,
                    ty,
                    modifiers,
                } if !modifiers.is_static && !modifiers.hidden => {
                    if shape.contains_key(name) {
                        continue;
                    }
                    let guess = match ty {
                        Some(ty) if *optional => self.convert_union(ty, env, true)?,
                        Some(ty) => self.convert(ty, env)?,
                        None => TypeGuess::Any,
                    };
                    shape.insert(name.clone(), guess);
                }
                Member::Method { name, modifiers, .. } if !modifiers.is_static && !modifiers.hidden => {
                    shape
                        .entry(name.clone())
                        .or_insert_with(TypeGuess::undefined);
                }
                Member::Call(_) | Member::Constructor(_) => callable = true,
                _ => {}
            }
        }

        if callable && shape.is_empty() {
            return Ok(TypeGuess::undefined());
        }
        if shape.len() > MAX_OBJECT_PROPERTIES {
            return Ok(TypeGuess::Any);
        }
        Ok(TypeGuess::object(shape))
    }

    /// `typeof x`: the declared type of a variable; functions and classes are callables.
    fn convert_query(&mut self, path: &'a [String], env: &Env) -> Result<TypeGuess> {
        let Some(symbol) = self.scopes.resolve_value(env.scope, path) else {
            return Ok(TypeGuess::Any);
        };
        if symbol.class.is_some() || !symbol.functions.is_empty() {
            return Ok(TypeGuess::undefined());
        }
        let (Some(Some(ty)), Some(last)) = (symbol.variable, path.last()) else {
            return Ok(TypeGuess::Any);
        };
        let key = (symbol.scope, last.as_str());
        if !self.active.insert(key) {
            return Ok(TypeGuess::Any);
        }
        let guess = self.convert(ty, &Env::at(symbol.scope));
        self.active.remove(&key);
        guess
    }

    /// Names the declaration source does not define.
    fn convert_global(&mut self, name: &'a [String], args: &'a [TypeExpr], env: &Env) -> Result<TypeGuess> {
        let joined = name.join(".");
        let first_arg = |this: &mut Self| -> Result<TypeGuess> {
            match args.first() {
                Some(arg) => this.convert(arg, env),
                None => Ok(TypeGuess::Any),
            }
        };

        Ok(match joined.as_str() {
            // Call sites are always awaited.
            "Promise" | "PromiseLike" | "Awaited" => first_arg(self)?,
            "Readonly" | "Required" | "Partial" | "NonNullable" => first_arg(self)?,
            "Array" | "ReadonlyArray" | "ArrayLike" | "Iterable" => TypeGuess::array(first_arg(self)?),
            "Record" | "Object" => TypeGuess::object(BTreeMap::new()),
            "Function" | "CallableFunction" | "NewableFunction" => TypeGuess::undefined(),
            "String" => TypeGuess::string(),
            "Number" => TypeGuess::number(),
            "Boolean" => TypeGuess::boolean(),
            "InstanceType" => match args.first() {
                Some(TypeExpr::Query(path)) => self.instance_type(path, env),
                _ => TypeGuess::Any,
            },
            class if is_std_class(class) => TypeGuess::class(class),
            _ => {
                debug!(name = %joined, "unresolved type reference");
                TypeGuess::Any
            }
        })
    }

    fn instance_type(&mut self, path: &'a [String], env: &Env) -> TypeGuess {
        if let Some(symbol) = self.scopes.resolve_value(env.scope, path) {
            if let Some(class) = symbol.class {
                return self.class_ref(symbol.scope, class);
            }
        }
        match path {
            [single] if is_std_class(single) => TypeGuess::class(single.as_str()),
            _ => TypeGuess::Any,
        }
    }
}

/// Callable members grouped by name in declaration order. Function-typed properties
/// count as methods.
fn group_methods<'a>(members: &[(&'a Member, Env)], statics: bool) -> Vec<(&'a str, Overloads<'a>)> {
    let mut groups: Vec<(&'a str, Overloads<'a>)> = Vec::new();
    for (member, env) in members {
        let (name, sig) = match *member {
            Member::Method {
                name,
                sig,
                modifiers,
                ..
            } if modifiers.is_static == statics && !modifiers.hidden => (name.as_str(), sig),
            Member::Property {
                name,
                ty: Some(TypeExpr::Function(sig)),
                modifiers,
                ..
            } if modifiers.is_static == statics && !modifiers.hidden => (name.as_str(), &**sig),
            _ => continue,
        };
        match groups.iter_mut().find(|(n, _)| *n == name) {
            Some((_, overloads)) => overloads.push((sig, env.clone())),
            None => groups.push((name, vec![(sig, env.clone())])),
        }
    }
    groups
}

fn element_type(ty: &TypeExpr) -> Option<&TypeExpr> {
    match ty {
        TypeExpr::Array(elem) => Some(elem),
        TypeExpr::Ref { name, args } => match (name.as_slice(), args.first()) {
            ([n], Some(arg)) if n == "Array" || n == "ReadonlyArray" => Some(arg),
            _ => None,
        },
        _ => None,
    }
}

fn is_bound(name: &[String], env: &Env) -> bool {
    matches!(name, [single] if env.bindings.contains_key(single))
}

fn enum_kind(value: EnumValue) -> TypeKind {
    match value {
        EnumValue::Number => TypeKind::Number,
        EnumValue::String => TypeKind::String,
    }
}

fn primitive_guess(kind: TypeKind) -> Option<TypeGuess> {
    let typ = match kind {
        TypeKind::Number => Type::Number,
        TypeKind::String => Type::String,
        TypeKind::Boolean => Type::Boolean,
        TypeKind::Undefined => Type::Undefined,
        TypeKind::Null => Type::Null,
        TypeKind::Object | TypeKind::Class | TypeKind::Array | TypeKind::Function => return None,
    };
    Some(TypeGuess::exact(&typ))
}
