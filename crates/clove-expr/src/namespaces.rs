use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::ast::Symbol;
use crate::error::CloveError;
use crate::var::Var;

/// Namespace and var resolution as seen by the analyzer and evaluator.
pub trait BindingRegistry: Send + Sync {
    /// Creates the namespace if needed.
    fn ensure_ns(&self, name: &str);
    fn find_ns(&self, name: &str) -> bool;
    /// Resolves `name` as an alias in `from` or as a namespace name.
    fn resolve_ns(&self, from: &str, name: &str) -> Option<String>;
    /// The var `name` maps to in `ns`, whether interned there or referred.
    fn lookup(&self, ns: &str, name: &str) -> Option<Arc<Var>>;
    /// Returns the var owned by `ns` for `sym`, creating it (and replacing any
    /// referral of the same name) when needed.
    fn intern(&self, ns: &str, sym: &Symbol) -> Arc<Var>;
    fn refer(&self, ns: &str, name: &str, var: Arc<Var>);
    fn alias(&self, ns: &str, alias: &str, target: &str);
}

#[derive(Default)]
pub struct NamespaceStore {
    namespaces: RwLock<HashMap<String, NamespaceData>>,
}

#[derive(Default)]
pub struct NamespaceData {
    mappings: HashMap<String, Arc<Var>>,
    aliases: HashMap<String, String>,
}

impl NamespaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vars interned in `ns` itself, excluding referrals.
    pub fn interned(&self, ns: &str) -> Vec<Arc<Var>> {
        let guard = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .get(ns)
            .map(|data| {
                data.mappings
                    .values()
                    .filter(|var| var.ns() == ns)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl BindingRegistry for NamespaceStore {
    fn ensure_ns(&self, name: &str) {
        let mut guard = self
            .namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.entry(name.to_string()).or_default();
    }

    fn find_ns(&self, name: &str) -> bool {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    fn resolve_ns(&self, from: &str, name: &str) -> Option<String> {
        let guard = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(target) = guard.get(from).and_then(|data| data.aliases.get(name)) {
            return Some(target.clone());
        }
        guard.contains_key(name).then(|| name.to_string())
    }

    fn lookup(&self, ns: &str, name: &str) -> Option<Arc<Var>> {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ns)
            .and_then(|data| data.mappings.get(name).cloned())
    }

    fn intern(&self, ns: &str, sym: &Symbol) -> Arc<Var> {
        let mut guard = self
            .namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let data = guard.entry(ns.to_string()).or_default();
        if let Some(existing) = data.mappings.get(sym.name()) {
            if existing.ns() == ns {
                return existing.clone();
            }
            log::debug!(
                "{} already refers to {} in namespace {}, being replaced",
                sym.name(),
                existing,
                ns
            );
        }
        let var = Var::new(ns, sym);
        log::debug!("interned {}", var);
        data.mappings.insert(sym.name().to_string(), var.clone());
        var
    }

    fn refer(&self, ns: &str, name: &str, var: Arc<Var>) {
        let mut guard = self
            .namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard
            .entry(ns.to_string())
            .or_default()
            .mappings
            .insert(name.to_string(), var);
    }

    fn alias(&self, ns: &str, alias: &str, target: &str) {
        let mut guard = self
            .namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard
            .entry(ns.to_string())
            .or_default()
            .aliases
            .insert(alias.to_string(), target.to_string());
    }
}

/// Resolves `sym` from `current_ns`.
///
/// Qualified symbols need a known namespace; `Ok(None)` means the namespace
/// exists but has no such var. With `intern_new`, unqualified names and names
/// qualified to `current_ns` are interned on first reference.
pub fn lookup_var(
    registry: &dyn BindingRegistry,
    current_ns: &str,
    sym: &Symbol,
    intern_new: bool,
) -> Result<Option<Arc<Var>>, CloveError> {
    match sym.ns() {
        Some(qualifier) => {
            let target = registry
                .resolve_ns(current_ns, qualifier)
                .ok_or_else(|| CloveError::lookup(format!("No such namespace: {}", qualifier)))?;
            if target == current_ns && intern_new {
                return Ok(Some(registry.intern(current_ns, sym)));
            }
            Ok(registry.lookup(&target, sym.name()))
        }
        None => match registry.lookup(current_ns, sym.name()) {
            Some(var) => Ok(Some(var)),
            None if intern_new => Ok(Some(registry.intern(current_ns, sym))),
            None => Ok(None),
        },
    }
}
