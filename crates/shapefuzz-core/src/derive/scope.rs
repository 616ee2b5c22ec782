//! Symbol tables for a parsed declaration source.
//!
//! Every namespace and ambient module body gets its own scope. Declarations with the
//! same name merge: function overloads accumulate, interfaces merge and a namespace
//! can share its name with a class or function.

use std::collections::HashMap;

use tracing::warn;

use super::ast::*;

pub type ScopeId = usize;

pub const ROOT: ScopeId = 0;

#[derive(Default)]
pub struct ScopeData<'a> {
    pub parent: Option<ScopeId>,
    pub classes: HashMap<&'a str, &'a ClassDecl>,
    pub interfaces: HashMap<&'a str, Vec<&'a InterfaceDecl>>,
    pub aliases: HashMap<&'a str, &'a TypeAliasDecl>,
    pub enums: HashMap<&'a str, &'a EnumDecl>,
    pub functions: HashMap<&'a str, Vec<&'a FnSig>>,
    pub variables: HashMap<&'a str, Option<&'a TypeExpr>>,
    pub namespaces: HashMap<&'a str, ScopeId>,
    /// `(exported name, local name)` in declaration order.
    pub exports: Vec<(String, String)>,
    pub export_assignment: Option<&'a [String]>,
    pub ambient_modules: Vec<ScopeId>,
}

/// Result of resolving a name in type position.
#[derive(Clone)]
pub enum TypeSymbol<'a> {
    Class(ScopeId, &'a ClassDecl),
    Interface(ScopeId, Vec<&'a InterfaceDecl>),
    Alias(ScopeId, &'a TypeAliasDecl),
    Enum(&'a EnumDecl),
    EnumMember(EnumValue),
}

/// Everything a name denotes in value position.
#[derive(Default)]
pub struct ValueSymbol<'a> {
    pub scope: ScopeId,
    pub class: Option<&'a ClassDecl>,
    pub functions: Vec<&'a FnSig>,
    pub variable: Option<Option<&'a TypeExpr>>,
    pub namespace: Option<ScopeId>,
}

impl ValueSymbol<'_> {
    pub fn is_empty(&self) -> bool {
        self.class.is_none()
            && self.functions.is_empty()
            && self.variable.is_none()
            && self.namespace.is_none()
    }
}

pub struct Scopes<'a> {
    scopes: Vec<ScopeData<'a>>,
}

impl<'a> Scopes<'a> {
    pub fn build(stmts: &'a [Statement]) -> Self {
        let mut scopes = Scopes {
            scopes: vec![ScopeData::default()],
        };
        scopes.populate(ROOT, stmts);
        scopes
    }

    pub fn get(&self, id: ScopeId) -> &ScopeData<'a> {
        &self.scopes[id]
    }

    fn child(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.push(ScopeData {
            parent: Some(parent),
            ..ScopeData::default()
        });
        self.scopes.len() - 1
    }

    /// Register `stmts` in scope `id`. Without explicit export syntax every
    /// declaration in the body is exported.
    fn populate(&mut self, id: ScopeId, stmts: &'a [Statement]) {
        let export_all = !stmts.iter().any(Statement::is_export);

        for stmt in stmts {
            match stmt {
                Statement::Decl { decl, exported } => {
                    self.register(id, decl);
                    let is_value_or_type = !matches!(decl, Decl::AmbientModule { .. });
                    if is_value_or_type && (*exported || export_all) {
                        self.add_export(id, decl.name(), decl.name());
                    }
                }
                Statement::ExportAssignment(path) => {
                    self.scopes[id].export_assignment = Some(path);
                }
                Statement::ExportList { specifiers, from } => match from {
                    Some(module) => warn!(
                        module = %module,
                        "re-exports from other files are not followed"
                    ),
                    None => {
                        for spec in specifiers {
                            self.add_export(id, &spec.exported, &spec.local);
                        }
                    }
                },
                Statement::Other => {}
            }
        }
    }

    fn add_export(&mut self, id: ScopeId, exported: &str, local: &str) {
        let exports = &mut self.scopes[id].exports;
        if !exports.iter().any(|(e, _)| e == exported) {
            exports.push((exported.to_string(), local.to_string()));
        }
    }

    fn register(&mut self, id: ScopeId, decl: &'a Decl) {
        match decl {
            Decl::Function { name, sig } => {
                self.scopes[id]
                    .functions
                    .entry(name.as_str())
                    .or_default()
                    .push(sig);
            }
            Decl::Class(class) => {
                self.scopes[id].classes.insert(class.name.as_str(), class);
            }
            Decl::Interface(iface) => {
                self.scopes[id]
                    .interfaces
                    .entry(iface.name.as_str())
                    .or_default()
                    .push(iface);
            }
            Decl::TypeAlias(alias) => {
                self.scopes[id].aliases.insert(alias.name.as_str(), alias);
            }
            Decl::Enum(e) => {
                self.scopes[id].enums.insert(e.name.as_str(), e);
            }
            Decl::Variable { name, ty } => {
                self.scopes[id]
                    .variables
                    .insert(name.as_str(), ty.as_ref());
            }
            Decl::Namespace { name, body } => {
                let ns = match self.scopes[id].namespaces.get(name.as_str()) {
                    Some(existing) => *existing,
                    None => {
                        let ns = self.child(id);
                        self.scopes[id].namespaces.insert(name.as_str(), ns);
                        ns
                    }
                };
                self.populate(ns, body);
            }
            Decl::AmbientModule { body, .. } => {
                let module = self.child(id);
                self.scopes[id].ambient_modules.push(module);
                self.populate(module, body);
            }
        }
    }

    /// Scope in which the leading segments of `path` name a namespace, searching
    /// outward from `from`. Returns the scope holding the last segment.
    fn qualifier_scope(&self, from: ScopeId, path: &[String]) -> Option<ScopeId> {
        let (first, middle) = match path.split_first() {
            Some((first, rest)) if !rest.is_empty() => (first, &rest[..rest.len() - 1]),
            _ => return Some(from),
        };
        let mut scope = self.find_outward(from, |s| s.namespaces.get(first.as_str()).copied())?;
        for segment in middle {
            scope = *self.scopes[scope].namespaces.get(segment.as_str())?;
        }
        Some(scope)
    }

    fn find_outward<T>(&self, from: ScopeId, f: impl Fn(&ScopeData<'a>) -> Option<T>) -> Option<T> {
        let mut current = Some(from);
        while let Some(id) = current {
            if let Some(found) = f(&self.scopes[id]) {
                return Some(found);
            }
            current = self.scopes[id].parent;
        }
        None
    }

    /// Resolve a possibly qualified name in type position.
    pub fn resolve_type(&self, from: ScopeId, path: &[String]) -> Option<TypeSymbol<'a>> {
        let last = path.last()?.as_str();

        if path.len() >= 2 {
            // `Enum.Member`
            let owner = &path[..path.len() - 1];
            if let Some(TypeSymbol::Enum(e)) = self.resolve_type(from, owner) {
                return e
                    .members
                    .iter()
                    .find(|(name, _)| name == last)
                    .map(|(_, value)| TypeSymbol::EnumMember(*value));
            }
        }

        let lookup = |id: ScopeId, s: &ScopeData<'a>| -> Option<TypeSymbol<'a>> {
            if let Some(class) = s.classes.get(last) {
                return Some(TypeSymbol::Class(id, class));
            }
            if let Some(ifaces) = s.interfaces.get(last) {
                return Some(TypeSymbol::Interface(id, ifaces.clone()));
            }
            if let Some(alias) = s.aliases.get(last) {
                return Some(TypeSymbol::Alias(id, alias));
            }
            s.enums.get(last).map(|e| TypeSymbol::Enum(e))
        };

        if path.len() == 1 {
            let mut current = Some(from);
            while let Some(id) = current {
                if let Some(found) = lookup(id, &self.scopes[id]) {
                    return Some(found);
                }
                current = self.scopes[id].parent;
            }
            return None;
        }
        let scope = self.qualifier_scope(from, path)?;
        lookup(scope, &self.scopes[scope])
    }

    /// Resolve a possibly qualified name in value position.
    pub fn resolve_value(&self, from: ScopeId, path: &[String]) -> Option<ValueSymbol<'a>> {
        let last = path.last()?.as_str();
        let collect = |id: ScopeId| {
            let s = &self.scopes[id];
            ValueSymbol {
                scope: id,
                class: s.classes.get(last).copied(),
                functions: s.functions.get(last).cloned().unwrap_or_default(),
                variable: s.variables.get(last).copied(),
                namespace: s.namespaces.get(last).copied(),
            }
        };

        if path.len() == 1 {
            let mut current = Some(from);
            while let Some(id) = current {
                let symbol = collect(id);
                if !symbol.is_empty() {
                    return Some(symbol);
                }
                current = self.scopes[id].parent;
            }
            return None;
        }
        let scope = self.qualifier_scope(from, path)?;
        let symbol = collect(scope);
        (!symbol.is_empty()).then_some(symbol)
    }
}
