//! The configuration tree.
//!
//! A [`Node`] is one level of configuration: an insertion-ordered mapping of
//! string keys to [`Value`]s. Mappings never appear as raw maps inside the
//! tree. Every way of putting a mapping into a node (assignment through the
//! `From` conversions, merging, deserialization) produces a fresh child
//! `Node`, so each node is owned by exactly one parent.

use crate::error::{ConfigError, Result};
use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, Serializer};
use serde_json::Number;
use std::fmt;

/// A configuration value.
///
/// Numbers compare by value, so `1` equals `1.0`.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<Value>),
    Node(Node),
}

impl Value {
    /// Short type name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Node(_) => "mapping",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Convert to a plain JSON value, unwrapping nested nodes into objects.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Node(node) => node.to_json(),
        }
    }
}

impl fmt::Display for Value {
    /// Strings print bare; everything else prints as compact JSON.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// One level of the configuration tree.
///
/// Equality ignores key order: two nodes are equal when they hold the same
/// keys with equal values, recursively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    entries: IndexMap<String, Value>,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key, failing with [`ConfigError::KeyNotFound`] if absent.
    pub fn get(&self, key: &str) -> Result<&Value> {
        self.entries
            .get(key)
            .ok_or_else(|| ConfigError::key_not_found(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Result<&mut Value> {
        self.entries
            .get_mut(key)
            .ok_or_else(|| ConfigError::key_not_found(key))
    }

    /// Store a value, returning the one it replaced.
    ///
    /// A key that already exists keeps its position; new keys go last.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    /// Remove a key, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Result<Value> {
        self.entries
            .shift_remove(key)
            .ok_or_else(|| ConfigError::key_not_found(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in insertion order. Each call starts a fresh enumeration.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The child node stored under `key`, if that value is a mapping.
    pub fn node(&self, key: &str) -> Option<&Node> {
        self.entries.get(key).and_then(Value::as_node)
    }

    pub fn node_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries.get_mut(key).and_then(Value::as_node_mut)
    }

    /// The child node under `key`, creating an empty one if the key is
    /// absent or holds something other than a mapping.
    pub fn child_mut(&mut self, key: &str) -> &mut Node {
        let slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Node(Node::new()));
        if !matches!(slot, Value::Node(_)) {
            *slot = Value::Node(Node::new());
        }
        match slot {
            Value::Node(node) => node,
            _ => unreachable!("slot was just set to a node"),
        }
    }

    /// Read a value by dotted path, e.g. `"server.port"`.
    pub fn get_path(&self, path: &str) -> Result<&Value> {
        let (parents, last) = split_path(path)?;
        let mut node = self;
        for (depth, segment) in parents.iter().enumerate() {
            node = match node.get(segment) {
                Ok(Value::Node(child)) => child,
                Ok(_) => return Err(ConfigError::NotANode(parents[..=depth].join("."))),
                Err(_) => return Err(ConfigError::key_not_found(parents[..=depth].join("."))),
            };
        }
        node.get(last)
            .map_err(|_| ConfigError::key_not_found(path))
    }

    /// Write a value by dotted path, creating intermediate nodes as needed.
    ///
    /// Fails with [`ConfigError::NotANode`] if an intermediate segment
    /// already holds a non-mapping value.
    pub fn set_path(&mut self, path: &str, value: impl Into<Value>) -> Result<Option<Value>> {
        let (parents, last) = split_path(path)?;
        let mut node = self;
        for (depth, segment) in parents.iter().enumerate() {
            let slot = node
                .entries
                .entry(segment.to_string())
                .or_insert_with(|| Value::Node(Node::new()));
            node = match slot {
                Value::Node(child) => child,
                _ => return Err(ConfigError::NotANode(parents[..=depth].join("."))),
            };
        }
        Ok(node.set(last, value))
    }

    /// Remove a value by dotted path.
    pub fn remove_path(&mut self, path: &str) -> Result<Value> {
        let (parents, last) = split_path(path)?;
        let mut node = self;
        for (depth, segment) in parents.iter().enumerate() {
            node = match node.entries.get_mut(*segment) {
                Some(Value::Node(child)) => child,
                Some(_) => return Err(ConfigError::NotANode(parents[..=depth].join("."))),
                None => return Err(ConfigError::key_not_found(parents[..=depth].join("."))),
            };
        }
        node.remove(last)
            .map_err(|_| ConfigError::key_not_found(path))
    }

    /// Convert to a plain JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

fn split_path(path: &str) -> Result<(Vec<&str>, &str)> {
    let mut segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ConfigError::key_not_found(path));
    }
    // split always yields at least one segment
    let last = segments.pop().unwrap_or_default();
    Ok((segments, last))
}

impl IntoIterator for Node {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Node {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            _ => false,
        }
    }
}

/// Integers compare exactly; once either side is a float both are compared
/// as floats.
fn numbers_equal(a: &Number, b: &Number) -> bool {
    if a.is_f64() || b.is_f64() {
        a.as_f64() == b.as_f64()
    } else {
        a == b
    }
}

// Equality against plain JSON, so trees can be checked with `json!`.

impl PartialEq<serde_json::Value> for Value {
    fn eq(&self, other: &serde_json::Value) -> bool {
        use serde_json::Value as Json;
        match (self, other) {
            (Value::Null, Json::Null) => true,
            (Value::Bool(a), Json::Bool(b)) => a == b,
            (Value::Number(a), Json::Number(b)) => numbers_equal(a, b),
            (Value::String(a), Json::String(b)) => a == b,
            (Value::Sequence(a), Json::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
            }
            (Value::Node(node), other) => node == other,
            _ => false,
        }
    }
}

impl PartialEq<serde_json::Value> for Node {
    fn eq(&self, other: &serde_json::Value) -> bool {
        match other {
            serde_json::Value::Object(map) => {
                self.len() == map.len()
                    && self
                        .entries
                        .iter()
                        .all(|(k, v)| map.get(k).is_some_and(|o| v == o))
            }
            _ => false,
        }
    }
}

// Conversions. Mappings always become nodes.

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match value {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Sequence(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => Value::Node(map.into_iter().collect()),
        }
    }
}

impl TryFrom<serde_json::Value> for Node {
    type Error = ConfigError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        match Value::from(value) {
            Value::Node(node) => Ok(node),
            other => Err(ConfigError::NotANode(other.kind().to_string())),
        }
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(node)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! from_integer {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(n: $ty) -> Self {
                Value::Number(Number::from(n))
            }
        })*
    };
}

from_integer!(i32, i64, u32, u64, usize);

impl From<f64> for Value {
    /// Non-finite floats have no JSON representation and become null.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

// Serialization unwraps nodes into plain mappings.

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Sequence(items) => serializer.collect_seq(items),
            Value::Node(node) => node.serialize(serializer),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(&self.entries)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Node(node) => Ok(node),
            other => Err(de::Error::invalid_type(
                de::Unexpected::Other(other.kind()),
                &"a mapping",
            )),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a configuration value")
    }

    fn visit_unit<E>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<Value, D::Error> {
        Value::deserialize(d)
    }

    fn visit_bool<E>(self, b: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E>(self, n: i64) -> std::result::Result<Value, E> {
        Ok(Value::Number(n.into()))
    }

    fn visit_u64<E>(self, n: u64) -> std::result::Result<Value, E> {
        Ok(Value::Number(n.into()))
    }

    // JSON has no representation for inf/nan, so they load as null the
    // same way `From<f64>` converts them.
    fn visit_f64<E>(self, n: f64) -> std::result::Result<Value, E> {
        Ok(Value::from(n))
    }

    fn visit_str<E>(self, s: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(s.to_string()))
    }

    fn visit_string<E>(self, s: String) -> std::result::Result<Value, E> {
        Ok(Value::String(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let mut node = Node::new();
        while let Some(MapKey(key)) = map.next_key()? {
            let value: Value = map.next_value()?;
            node.entries.insert(key, value);
        }
        Ok(Value::Node(node))
    }
}

/// A mapping key. YAML allows scalar keys of any type; they are stored as
/// their string form.
struct MapKey(String);

impl<'de> Deserialize<'de> for MapKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct KeyVisitor;

        impl Visitor<'_> for KeyVisitor {
            type Value = MapKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a scalar mapping key")
            }

            fn visit_str<E>(self, s: &str) -> std::result::Result<MapKey, E> {
                Ok(MapKey(s.to_string()))
            }

            fn visit_string<E>(self, s: String) -> std::result::Result<MapKey, E> {
                Ok(MapKey(s))
            }

            fn visit_i64<E>(self, n: i64) -> std::result::Result<MapKey, E> {
                Ok(MapKey(n.to_string()))
            }

            fn visit_u64<E>(self, n: u64) -> std::result::Result<MapKey, E> {
                Ok(MapKey(n.to_string()))
            }

            fn visit_f64<E>(self, n: f64) -> std::result::Result<MapKey, E> {
                Ok(MapKey(n.to_string()))
            }

            fn visit_bool<E>(self, b: bool) -> std::result::Result<MapKey, E> {
                Ok(MapKey(b.to_string()))
            }

            fn visit_unit<E>(self) -> std::result::Result<MapKey, E> {
                Ok(MapKey("null".to_string()))
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}
