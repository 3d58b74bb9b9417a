use std::cell::RefCell;
use std::collections::HashMap as StdHashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::ast::{Key, Meta, Symbol, Value};
use crate::error::CloveError;

static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static DYNAMIC_STACK: RefCell<StdHashMap<u64, Vec<Value>>> = RefCell::new(StdHashMap::new());
}

/// Global, namespace-owned binding cell.
///
/// Root value and metadata are each swapped whole under a lock, so readers
/// see either the old or the new value. The dynamic flag only ever goes from
/// false to true.
pub struct Var {
    id: u64,
    ns: String,
    sym: Symbol,
    root: RwLock<Option<Value>>,
    meta: RwLock<Meta>,
    dynamic: AtomicBool,
}

impl Var {
    pub fn new(ns: &str, sym: &Symbol) -> Arc<Var> {
        Arc::new(Var {
            id: NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed),
            ns: ns.to_string(),
            sym: sym.without_ns(),
            root: RwLock::new(None),
            meta: RwLock::new(Meta::new()),
            dynamic: AtomicBool::new(false),
        })
    }

    pub fn ns(&self) -> &str {
        &self.ns
    }

    pub fn sym(&self) -> &Symbol {
        &self.sym
    }

    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.ns, self.sym.name())
    }

    pub fn bind_root(&self, value: Value) {
        log::trace!("bind root of {}", self);
        *self.root.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    pub fn root(&self) -> Option<Value> {
        self.root
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_root(&self) -> bool {
        self.root
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Current value: the innermost thread binding of a dynamic var, else the
    /// root.
    pub fn deref(&self) -> Result<Value, CloveError> {
        if self.is_dynamic() {
            if let Some(value) = self.thread_binding() {
                return Ok(value);
            }
        }
        self.root()
            .ok_or_else(|| CloveError::runtime(format!("Unbound var: {}", self)))
    }

    pub fn thread_binding(&self) -> Option<Value> {
        DYNAMIC_STACK.with(|cell| {
            cell.borrow()
                .get(&self.id)
                .and_then(|stack| stack.last())
                .cloned()
        })
    }

    pub fn meta(&self) -> Meta {
        self.meta
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_meta(&self, meta: Meta) {
        *self.meta.write().unwrap_or_else(PoisonError::into_inner) = meta;
    }

    /// Replaces the metadata with `f(old)` under the write lock and returns
    /// the new map. `old` itself is never mutated.
    pub fn alter_meta(&self, f: impl FnOnce(&Meta) -> Meta) -> Meta {
        let mut guard = self.meta.write().unwrap_or_else(PoisonError::into_inner);
        let next = f(&guard);
        *guard = next.clone();
        next
    }

    pub fn meta_value(&self, key: &str) -> Option<Value> {
        self.meta
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&Key::keyword(key))
            .cloned()
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic.load(Ordering::Acquire)
    }

    pub fn set_dynamic(&self) -> &Self {
        self.dynamic.store(true, Ordering::Release);
        self
    }

    /// Marks the var dynamic when `dynamic` holds; never clears the flag.
    pub fn mark_dynamic(&self, dynamic: bool) -> &Self {
        if dynamic {
            self.set_dynamic();
        }
        self
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#'{}/{}", self.ns, self.sym.name())
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("name", &self.qualified_name())
            .field("dynamic", &self.is_dynamic())
            .field("bound", &self.has_root())
            .finish()
    }
}

/// Installs thread-local overrides for dynamic vars until the guard drops.
pub fn push_thread_bindings(bindings: &[(Arc<Var>, Value)]) -> Result<BindingGuard, CloveError> {
    if let Some((var, _)) = bindings.iter().find(|(var, _)| !var.is_dynamic()) {
        return Err(CloveError::runtime(format!(
            "Can't dynamically bind non-dynamic var: {}",
            var
        )));
    }
    DYNAMIC_STACK.with(|cell| {
        let mut map = cell.borrow_mut();
        for (var, value) in bindings {
            map.entry(var.id).or_default().push(value.clone());
        }
    });
    Ok(BindingGuard {
        ids: bindings.iter().map(|(var, _)| var.id).collect(),
    })
}

#[derive(Debug)]
pub struct BindingGuard {
    ids: Vec<u64>,
}

impl Drop for BindingGuard {
    fn drop(&mut self) {
        DYNAMIC_STACK.with(|cell| {
            let mut map = cell.borrow_mut();
            for id in &self.ids {
                if let Some(stack) = map.get_mut(id) {
                    stack.pop();
                    if stack.is_empty() {
                        map.remove(id);
                    }
                }
            }
        });
    }
}
