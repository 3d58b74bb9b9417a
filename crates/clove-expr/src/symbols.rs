use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::ast::{Form, Key, SymbolMeta};

pub const NS_SEPARATOR: char = '/';

/// A possibly namespace-qualified name. Reader metadata rides along but never
/// takes part in equality or hashing.
#[derive(Clone, Debug)]
pub struct Symbol {
    ns: Option<Arc<str>>,
    name: Arc<str>,
    meta: Option<SymbolMeta>,
}

impl Symbol {
    pub fn new(ns: Option<&str>, name: &str) -> Self {
        Self {
            ns: ns.map(Arc::from),
            name: Arc::from(name),
            meta: None,
        }
    }

    pub fn unqualified(name: &str) -> Self {
        Self::new(None, name)
    }

    /// Splits `ns/name` at the first separator. A lone `/` is the division
    /// symbol, not a qualifier.
    pub fn parse(text: &str) -> Self {
        if text.len() > 1 {
            if let Some(idx) = text.find(NS_SEPARATOR) {
                let (ns, rest) = text.split_at(idx);
                let name = &rest[1..];
                if !ns.is_empty() && !name.is_empty() {
                    return Self::new(Some(ns), name);
                }
            }
        }
        Self::unqualified(text)
    }

    pub fn with_meta(mut self, meta: SymbolMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn ns(&self) -> Option<&str> {
        self.ns.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_qualified(&self) -> bool {
        self.ns.is_some()
    }

    pub fn meta(&self) -> Option<&SymbolMeta> {
        self.meta.as_ref()
    }

    pub fn meta_entry(&self, key: &str) -> Option<&Form> {
        self.meta
            .as_ref()
            .and_then(|meta| meta.get(&Key::keyword(key)))
    }

    /// Same name, no namespace and no metadata.
    pub fn without_ns(&self) -> Self {
        Self {
            ns: None,
            name: self.name.clone(),
            meta: None,
        }
    }

    /// `*name*`: the naming convention for dynamically rebindable vars.
    pub fn is_earmuffed(&self) -> bool {
        is_earmuffed(&self.name)
    }
}

pub fn is_earmuffed(name: &str) -> bool {
    name.len() > 1 && name.starts_with('*') && name.ends_with('*')
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.ns == other.ns && self.name == other.name
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ns.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns {
            Some(ns) => write!(f, "{}{}{}", ns, NS_SEPARATOR, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
