use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub use im::{HashMap, HashSet, Vector};

use crate::error::CloveError;
pub use crate::symbols::Symbol;
use crate::var::Var;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub line: usize,
    pub col: usize,
    pub index: usize,
}

impl Span {
    pub fn new(line: usize, col: usize, index: usize) -> Self {
        Self { line, col, index }
    }

    pub fn at_line(line: usize) -> Self {
        Self {
            line,
            col: 1,
            index: 0,
        }
    }
}

/// Reader metadata attached to a symbol. Values are unevaluated forms.
pub type SymbolMeta = HashMap<Key, Form>;

/// Metadata carried by a Var at runtime.
pub type Meta = HashMap<Key, Value>;

#[derive(Clone, Debug, PartialEq)]
pub struct Form {
    pub kind: FormKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FormKind {
    Symbol(Symbol),
    Keyword(String),
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Nil,
    List(Vec<Form>),
    Vector(Vec<Form>),
    Map(Vec<(Form, Form)>),
    Set(Vec<Form>),
}

impl Form {
    pub fn new(kind: FormKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn symbol(name: &str) -> Self {
        Self::new(FormKind::Symbol(Symbol::parse(name)), Span::default())
    }

    pub fn symbol_with_meta(name: &str, meta: SymbolMeta) -> Self {
        Self::new(
            FormKind::Symbol(Symbol::parse(name).with_meta(meta)),
            Span::default(),
        )
    }

    pub fn keyword(name: &str) -> Self {
        Self::new(FormKind::Keyword(name.to_string()), Span::default())
    }

    pub fn int(n: i64) -> Self {
        Self::new(FormKind::Int(n), Span::default())
    }

    pub fn float(n: f64) -> Self {
        Self::new(FormKind::Float(n), Span::default())
    }

    pub fn string(s: &str) -> Self {
        Self::new(FormKind::String(s.to_string()), Span::default())
    }

    pub fn bool(b: bool) -> Self {
        Self::new(FormKind::Bool(b), Span::default())
    }

    pub fn nil() -> Self {
        Self::new(FormKind::Nil, Span::default())
    }

    pub fn list(items: Vec<Form>) -> Self {
        Self::new(FormKind::List(items), Span::default())
    }

    pub fn vector(items: Vec<Form>) -> Self {
        Self::new(FormKind::Vector(items), Span::default())
    }

    pub fn map(entries: Vec<(Form, Form)>) -> Self {
        Self::new(FormKind::Map(entries), Span::default())
    }

    pub fn set(items: Vec<Form>) -> Self {
        Self::new(FormKind::Set(items), Span::default())
    }

    pub fn quote(form: Form) -> Self {
        Self::list(vec![Form::symbol("quote"), form])
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match &self.kind {
            FormKind::Symbol(sym) => Some(sym),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Form]> {
        match &self.kind {
            FormKind::List(items) => Some(items),
            _ => None,
        }
    }

    /// Reader truthiness of a literal form: only `nil` and `false` are falsey.
    pub fn is_truthy_literal(&self) -> bool {
        !matches!(self.kind, FormKind::Nil | FormKind::Bool(false))
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            FormKind::Symbol(_) => "symbol",
            FormKind::Keyword(_) => "keyword",
            FormKind::Int(_) | FormKind::Float(_) => "number",
            FormKind::String(_) => "string",
            FormKind::Bool(_) => "bool",
            FormKind::Nil => "nil",
            FormKind::List(_) => "list",
            FormKind::Vector(_) => "vector",
            FormKind::Map(_) => "map",
            FormKind::Set(_) => "set",
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Key {
    Keyword(String),
    Symbol(Symbol),
    String(String),
    Number(i64),
    Bool(bool),
}

impl Key {
    pub fn keyword(name: &str) -> Self {
        Key::Keyword(name.to_string())
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Keyword(k) => Value::Keyword(k.clone()),
            Key::Symbol(s) => Value::Symbol(s.clone()),
            Key::String(s) => Value::String(s.clone()),
            Key::Number(n) => Value::Int(*n),
            Key::Bool(b) => Value::Bool(*b),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, CloveError> {
        match value {
            Value::Keyword(k) => Ok(Key::Keyword(k.clone())),
            Value::Symbol(s) => Ok(Key::Symbol(s.clone())),
            Value::String(s) => Ok(Key::String(s.clone())),
            Value::Int(n) => Ok(Key::Number(*n)),
            Value::Bool(b) => Ok(Key::Bool(*b)),
            other => Err(CloveError::type_mismatch("map key", other.type_name())),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Keyword(k) => write!(f, ":{}", k),
            Key::Symbol(s) => write!(f, "{}", s),
            Key::String(s) => write!(f, "{:?}", s),
            Key::Number(n) => write!(f, "{}", n),
            Key::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CollKind {
    List,
    Vector,
    Map,
    Set,
}

impl CollKind {
    pub fn name(self) -> &'static str {
        match self {
            CollKind::List => "list",
            CollKind::Vector => "vector",
            CollKind::Map => "map",
            CollKind::Set => "set",
        }
    }
}

/// Statically known host type of a node's result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostType {
    Nil,
    Bool,
    Int,
    Float,
    String,
    Keyword,
    Symbol,
    List,
    Vector,
    Map,
    Set,
    Var,
    Func,
    Object,
}

impl From<CollKind> for HostType {
    fn from(kind: CollKind) -> Self {
        match kind {
            CollKind::List => HostType::List,
            CollKind::Vector => HostType::Vector,
            CollKind::Map => HostType::Map,
            CollKind::Set => HostType::Set,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FnArity {
    min: usize,
    max: Option<usize>,
}

impl FnArity {
    pub fn new(min: usize, max: Option<usize>) -> Self {
        if let Some(max_val) = max {
            assert!(min <= max_val, "min arity cannot exceed max arity");
        }
        Self { min, max }
    }

    pub fn exact(count: usize) -> Self {
        Self::new(count, Some(count))
    }

    pub fn at_least(min: usize) -> Self {
        Self::new(min, None)
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

impl fmt::Display for FnArity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", max),
            Some(max) => write!(f, "{}..{}", self.min, max),
            None => write!(f, "{}+", self.min),
        }
    }
}

pub struct NativeFn {
    func: Box<dyn Fn(&[Value]) -> Result<Value, CloveError> + Send + Sync>,
    arity: FnArity,
    name: Arc<str>,
}

impl NativeFn {
    pub fn new(
        name: impl Into<String>,
        arity: FnArity,
        func: impl Fn(&[Value]) -> Result<Value, CloveError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            func: Box::new(func),
            arity,
            name: name.into().into(),
        }
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, CloveError> {
        if !self.arity.accepts(args.len()) {
            return Err(CloveError::arity(format!(
                "{} expects {} args, got {}",
                self.name,
                self.arity,
                args.len()
            )));
        }
        (self.func)(args)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Opaque host reference with identity semantics, e.g. a lock target.
#[derive(Clone)]
pub struct HostObject {
    inner: Arc<HostObjectInner>,
}

struct HostObjectInner {
    label: String,
}

impl HostObject {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(HostObjectInner {
                label: label.into(),
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn ptr_eq(&self, other: &HostObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Keyword(String),
    Symbol(Symbol),
    List(Vector<Value>),
    Vector(Vector<Value>),
    Map(HashMap<Key, Value>),
    Set(HashSet<Value>),
    Var(Arc<Var>),
    Func(Arc<NativeFn>),
    Object(HostObject),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::Float(_) => "number",
            Value::String(_) => "str",
            Value::Keyword(_) => "keyword",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Vector(_) => "vector",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Var(_) => "var",
            Value::Func(_) => "function",
            Value::Object(_) => "object",
        }
    }

    pub fn host_type(&self) -> HostType {
        match self {
            Value::Nil => HostType::Nil,
            Value::Bool(_) => HostType::Bool,
            Value::Int(_) => HostType::Int,
            Value::Float(_) => HostType::Float,
            Value::String(_) => HostType::String,
            Value::Keyword(_) => HostType::Keyword,
            Value::Symbol(_) => HostType::Symbol,
            Value::List(_) => HostType::List,
            Value::Vector(_) => HostType::Vector,
            Value::Map(_) => HostType::Map,
            Value::Set(_) => HostType::Set,
            Value::Var(_) => HostType::Var,
            Value::Func(_) => HostType::Func,
            Value::Object(_) => HostType::Object,
        }
    }

    pub fn coll_kind(&self) -> Option<CollKind> {
        match self {
            Value::List(_) => Some(CollKind::List),
            Value::Vector(_) => Some(CollKind::Vector),
            Value::Map(_) => Some(CollKind::Map),
            Value::Set(_) => Some(CollKind::Set),
            _ => None,
        }
    }

    pub fn count(&self) -> Option<usize> {
        match self {
            Value::List(items) | Value::Vector(items) => Some(items.len()),
            Value::Map(map) => Some(map.len()),
            Value::Set(set) => Some(set.len()),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn native_fn(
        name: impl Into<String>,
        arity: FnArity,
        func: impl Fn(&[Value]) -> Result<Value, CloveError> + Send + Sync + 'static,
    ) -> Self {
        Value::Func(Arc::new(NativeFn::new(name, arity, func)))
    }

    pub fn keyword(name: &str) -> Self {
        Value::Keyword(name.to_string())
    }

    pub fn as_var(&self) -> Option<&Arc<Var>> {
        match self {
            Value::Var(var) => Some(var),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::List(a), Value::List(b))
            | (Value::List(a), Value::Vector(b))
            | (Value::Vector(a), Value::List(b))
            | (Value::Vector(a), Value::Vector(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Var(a), Value::Var(b)) => Arc::ptr_eq(a, b),
            (Value::Func(a), Value::Func(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Nil => 0u8.hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) | Value::Keyword(s) => s.hash(state),
            Value::Symbol(sym) => sym.hash(state),
            // lists and vectors with equal items are equal, so they hash alike
            Value::List(items) | Value::Vector(items) => {
                items.len().hash(state);
                for item in items {
                    item.hash(state);
                }
            }
            Value::Map(map) => {
                let combined = hash_unordered(map.iter().map(|(k, v)| {
                    let mut hasher = DefaultHasher::new();
                    k.hash(&mut hasher);
                    v.hash(&mut hasher);
                    hasher.finish()
                }));
                combined.hash(state);
            }
            Value::Set(set) => {
                let combined = hash_unordered(set.iter().map(|item| {
                    let mut hasher = DefaultHasher::new();
                    item.hash(&mut hasher);
                    hasher.finish()
                }));
                combined.hash(state);
            }
            Value::Var(var) => (Arc::as_ptr(var) as usize).hash(state),
            Value::Func(func) => (Arc::as_ptr(func) as *const () as usize).hash(state),
            Value::Object(obj) => obj.addr().hash(state),
        }
    }
}

fn hash_unordered(values: impl Iterator<Item = u64>) -> u64 {
    values.fold(0u64, |acc, h| acc.wrapping_add(h))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{:?}", s),
            Value::Keyword(k) => write!(f, ":{}", k),
            Value::Symbol(sym) => write!(f, "{}", sym),
            Value::List(items) => write_seq(f, "(", ")", items.iter()),
            Value::Vector(items) => write_seq(f, "[", "]", items.iter()),
            Value::Set(items) => write_seq(f, "#{", "}", items.iter()),
            Value::Map(map) => {
                write!(f, "{{")?;
                for (idx, (k, v)) in map.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Var(var) => write!(f, "{}", var),
            Value::Func(func) => write!(f, "#<fn {}>", func.name()),
            Value::Object(obj) => write!(f, "#<object {}>", obj.label()),
        }
    }
}

fn write_seq<'a>(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    close: &str,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    write!(f, "{}", open)?;
    for (idx, item) in items.enumerate() {
        if idx > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "{}", close)
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
