//! Encoder tree nodes.
//!
//! Containers are shared handles: cloning a [`Map`], [`Seq`] or [`LazySeq`]
//! clones the handle, not the contents. That gives every container an
//! identity, which the encoder uses to detect a container nested inside
//! itself.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::iter::Peekable;
use std::rc::Rc;

/// A value in the tree handed to the streaming encoder.
#[derive(Debug, Clone)]
pub enum Node {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A finite, fully built sequence.
    Seq(Seq),
    /// A single-pass sequence produced while it is encoded.
    Lazy(LazySeq),
    /// An insertion-ordered mapping with unique keys.
    Map(Map),
    /// A domain value the encoder must reduce before it can be written.
    Opaque(Opaque),
}

impl Node {
    /// Wrap an iterator as a lazily produced sequence.
    pub fn lazy<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Node>,
        I::IntoIter: 'static,
    {
        Node::Lazy(LazySeq::new(items))
    }

    /// Wrap a domain value that needs reduction at encode time.
    pub fn opaque<T: Any>(value: T) -> Self {
        Node::Opaque(Opaque::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    /// Returns the mapping handle if this node is a mapping.
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the sequence handle if this node is a finite sequence.
    pub fn as_seq(&self) -> Option<&Seq> {
        match self {
            Node::Seq(seq) => Some(seq),
            _ => None,
        }
    }

    /// Whether a mapping entry holding this value is dropped by `skip_empty`.
    ///
    /// Numbers and booleans are never empty, whatever their value.
    pub(crate) fn is_empty_value(&self) -> bool {
        match self {
            Node::Null => true,
            Node::Str(s) => s.is_empty(),
            Node::Seq(seq) => seq.is_empty(),
            Node::Map(map) => map.is_empty(),
            Node::Lazy(seq) => seq.is_exhausted(),
            Node::Bool(_) | Node::Int(_) | Node::Float(_) | Node::Opaque(_) => false,
        }
    }
}

/// Identity of a shared container, stable while the container is alive.
pub(crate) type NodeId = usize;

/// Insertion-ordered mapping handle.
#[derive(Clone, Default)]
pub struct Map(Rc<RefCell<Vec<(String, Node)>>>);

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. Re-inserting an existing key replaces its value in place.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Node>) {
        let key = key.into();
        let value = value.into();
        let mut entries = self.0.borrow_mut();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }

    /// Builder-style insert.
    pub fn with(self, key: impl Into<String>, value: impl Into<Node>) -> Self {
        self.insert(key, value);
        self
    }

    /// Copy every entry of `other` into this mapping, overriding existing keys.
    pub fn update(&self, other: &Map) {
        if Rc::ptr_eq(&self.0, &other.0) {
            return;
        }
        for (key, value) in other.0.borrow().iter() {
            self.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<Node> {
        self.0
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().iter().any(|(k, _)| k == key)
    }

    pub fn remove(&self, key: &str) -> Option<Node> {
        let mut entries = self.0.borrow_mut();
        let index = entries.iter().position(|(k, _)| k == key)?;
        Some(entries.remove(index).1)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub(crate) fn entry_at(&self, index: usize) -> Option<(String, Node)> {
        self.0.borrow().get(index).cloned()
    }

    /// Entry positions in ascending key order.
    pub(crate) fn sorted_order(&self) -> Vec<usize> {
        let entries = self.0.borrow();
        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by(|&a, &b| entries[a].0.cmp(&entries[b].0));
        order
    }

    pub(crate) fn id(&self) -> NodeId {
        Rc::as_ptr(&self.0) as *const () as NodeId
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keys only: values may refer back to this mapping.
        f.debug_tuple("Map").field(&self.keys()).finish()
    }
}

impl<K: Into<String>, V: Into<Node>> FromIterator<(K, V)> for Map {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let map = Map::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

/// Finite sequence handle.
#[derive(Clone, Default)]
pub struct Seq(Rc<RefCell<Vec<Node>>>);

impl Seq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: impl Into<Node>) {
        self.0.borrow_mut().push(value.into());
    }

    pub fn get(&self, index: usize) -> Option<Node> {
        self.0.borrow().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub(crate) fn id(&self) -> NodeId {
        Rc::as_ptr(&self.0) as *const () as NodeId
    }
}

impl fmt::Debug for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq(len = {})", self.len())
    }
}

impl<V: Into<Node>> FromIterator<V> for Seq {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        Seq(Rc::new(RefCell::new(iter.into_iter().map(Into::into).collect())))
    }
}

type NodeIter = Peekable<Box<dyn Iterator<Item = Node>>>;

/// Single-pass sequence handle.
///
/// Items are pulled one at a time while the sequence is encoded; once
/// drained, the sequence stays empty.
#[derive(Clone)]
pub struct LazySeq(Rc<RefCell<NodeIter>>);

impl LazySeq {
    pub fn new<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Node>,
        I::IntoIter: 'static,
    {
        let iter: Box<dyn Iterator<Item = Node>> = Box::new(items.into_iter());
        LazySeq(Rc::new(RefCell::new(iter.peekable())))
    }

    /// True when no further item will be produced. Peeks at most one item.
    pub fn is_exhausted(&self) -> bool {
        self.0.borrow_mut().peek().is_none()
    }

    pub(crate) fn next_item(&self) -> Option<Node> {
        self.0.borrow_mut().next()
    }

    pub(crate) fn id(&self) -> NodeId {
        Rc::as_ptr(&self.0) as *const () as NodeId
    }
}

impl fmt::Debug for LazySeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazySeq(..)")
    }
}

/// A domain value carried through the tree untouched until it is encoded.
#[derive(Clone)]
pub struct Opaque {
    value: Rc<dyn Any>,
    type_name: &'static str,
}

impl Opaque {
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            value: Rc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn id(&self) -> NodeId {
        Rc::as_ptr(&self.value) as *const () as NodeId
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.type_name)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::Bool(value)
    }
}

macro_rules! int_into_node {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Node {
            fn from(value: $ty) -> Self {
                Node::Int(value as i64)
            }
        })*
    };
}

int_into_node!(i32, i64, u8, u16, u32, usize);

impl From<f64> for Node {
    fn from(value: f64) -> Self {
        Node::Float(value)
    }
}

impl From<f32> for Node {
    fn from(value: f32) -> Self {
        Node::Float(value as f64)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Str(value.to_string())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Str(value)
    }
}

impl From<Map> for Node {
    fn from(value: Map) -> Self {
        Node::Map(value)
    }
}

impl From<Seq> for Node {
    fn from(value: Seq) -> Self {
        Node::Seq(value)
    }
}

impl From<LazySeq> for Node {
    fn from(value: LazySeq) -> Self {
        Node::Lazy(value)
    }
}

impl From<Opaque> for Node {
    fn from(value: Opaque) -> Self {
        Node::Opaque(value)
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(value: Option<T>) -> Self {
        value.map_or(Node::Null, Into::into)
    }
}

impl<T: Into<Node>> From<Vec<T>> for Node {
    fn from(value: Vec<T>) -> Self {
        Node::Seq(value.into_iter().collect())
    }
}

impl<T: Into<Node>, const N: usize> From<[T; N]> for Node {
    fn from(value: [T; N]) -> Self {
        Node::Seq(value.into_iter().collect())
    }
}

impl From<serde_json::Value> for Node {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Node::Int(i),
                None => Node::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Node::Str(s),
            Value::Array(items) => Node::Seq(items.into_iter().collect()),
            Value::Object(entries) => Node::Map(entries.into_iter().collect()),
        }
    }
}
