//! Deep merge with list patch directives.
//!
//! Merging folds an update mapping into a target node key by key:
//! - Nested mappings are merged recursively
//! - Scalars, sequences and nulls replace the target value entirely
//! - A single-entry mapping whose key is a directive token patches the
//!   sequence already stored at that key instead of replacing it
//!
//! ```
//! use serde_json::json;
//! use tweak::{merge, Node};
//!
//! let mut target = Node::try_from(json!({"plugins": ["core"], "port": 80})).unwrap();
//! let updates = Node::try_from(json!({
//!     "plugins": {"$append": "extra"},
//!     "port": 8080
//! })).unwrap();
//! let report = merge(&mut target, updates);
//! assert!(report.is_clean());
//! assert_eq!(target, json!({"plugins": ["core", "extra"], "port": 8080}));
//! ```
//!
//! Directives are recognised by shape alone, so a one-key data mapping such
//! as `{"$append": "text"}` can never be stored through a merge.

use crate::error::ConfigError;
use crate::value::{Node, Value};
use tracing::warn;

/// A list patch requested by an update mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// `$append`: push one item.
    Append(Value),
    /// `$extend`: push every item of a sequence.
    Extend(Value),
    /// `$insert`: insert items at positions, in the mapping's order.
    Insert(Value),
    /// `$extendleft`: splice a sequence in at the front, order kept.
    ExtendLeft(Value),
    /// `$remove`: drop the first equal item.
    Remove(Value),
}

impl Directive {
    pub const TOKENS: [&'static str; 5] = ["$append", "$extend", "$insert", "$extendleft", "$remove"];

    /// Detect a directive by shape: exactly one entry with a known token.
    pub fn detect(node: &Node) -> Option<Directive> {
        if node.len() != 1 {
            return None;
        }
        let (token, operand) = node.iter().next()?;
        Self::from_token(token, operand.clone())
    }

    fn from_token(token: &str, operand: Value) -> Option<Directive> {
        match token {
            "$append" => Some(Directive::Append(operand)),
            "$extend" => Some(Directive::Extend(operand)),
            "$insert" => Some(Directive::Insert(operand)),
            "$extendleft" => Some(Directive::ExtendLeft(operand)),
            "$remove" => Some(Directive::Remove(operand)),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Directive::Append(_) => "$append",
            Directive::Extend(_) => "$extend",
            Directive::Insert(_) => "$insert",
            Directive::ExtendLeft(_) => "$extendleft",
            Directive::Remove(_) => "$remove",
        }
    }

    /// Apply to a target value. On error the target is left untouched.
    pub fn apply(self, target: &mut Value) -> Result<(), String> {
        let kind = target.kind();
        let items = target
            .as_sequence_mut()
            .ok_or_else(|| format!("target is a {kind}, not a sequence"))?;

        match self {
            Directive::Append(item) => items.push(item),
            Directive::Extend(operand) => items.extend(into_sequence(operand)?),
            Directive::ExtendLeft(operand) => {
                let head = into_sequence(operand)?;
                items.splice(0..0, head);
            }
            Directive::Insert(operand) => {
                let positions = insert_positions(operand)?;
                // Positions are not adjusted for earlier inserts in the same
                // directive.
                for (position, item) in positions {
                    let index = clamp_index(position, items.len());
                    items.insert(index, item);
                }
            }
            Directive::Remove(item) => {
                let index = items
                    .iter()
                    .position(|existing| *existing == item)
                    .ok_or_else(|| format!("{item} is not present"))?;
                items.remove(index);
            }
        }
        Ok(())
    }
}

fn into_sequence(operand: Value) -> Result<Vec<Value>, String> {
    match operand {
        Value::Sequence(items) => Ok(items),
        other => Err(format!("operand must be a sequence, got a {}", other.kind())),
    }
}

/// Parse an `$insert` operand into (position, item) pairs, validating all
/// of them before anything is inserted.
fn insert_positions(operand: Value) -> Result<Vec<(i64, Value)>, String> {
    let positions = match operand {
        Value::Node(positions) => positions,
        other => {
            return Err(format!(
                "operand must be a mapping of positions to items, got a {}",
                other.kind()
            ));
        }
    };
    positions
        .into_iter()
        .map(|(key, item)| {
            key.trim()
                .parse::<i64>()
                .map(|position| (position, item))
                .map_err(|_| format!("'{key}' is not an integer position"))
        })
        .collect()
}

/// List insert semantics: negative positions count from the end and
/// out-of-range positions clamp to either end.
fn clamp_index(position: i64, len: usize) -> usize {
    let len = len as i64;
    let index = if position < 0 { len + position } else { position };
    index.clamp(0, len) as usize
}

/// Errors collected while merging. Merging never stops on the first one.
#[derive(Debug, Default)]
pub struct MergeReport {
    pub errors: Vec<ConfigError>,
}

impl MergeReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Merge `updates` into `target`, returning the errors that were skipped.
pub fn merge(target: &mut Node, updates: Node) -> MergeReport {
    let mut report = MergeReport::default();
    merge_into(target, updates, "", &mut report.errors);
    report
}

/// Merge several update sources in one pass.
///
/// The sources are first combined at the top level only, later sources
/// overriding earlier ones key by key (a repeated key keeps its first
/// position). The combined mapping is then merged as a single update.
pub fn merge_all(target: &mut Node, sources: impl IntoIterator<Item = Node>) -> MergeReport {
    let mut combined = Node::new();
    for source in sources {
        for (key, value) in source {
            combined.set(key, value);
        }
    }
    merge(target, combined)
}

/// Recursive worker. `prefix` is the dotted path of `target` for messages.
fn merge_into(
    target: &mut Node,
    updates: Node,
    prefix: &str,
    errors: &mut Vec<ConfigError>,
) {
    for (key, value) in updates {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match value {
            Value::Node(update) => match Directive::detect(&update) {
                Some(directive) => {
                    let token = directive.token();
                    let outcome = match target.get_mut(&key) {
                        Ok(existing) => directive.apply(existing),
                        Err(_) => Err("key does not exist".to_string()),
                    };
                    if let Err(reason) = outcome {
                        let err = ConfigError::directive(&path, token, reason);
                        warn!("Skipping merge directive: {}", err);
                        errors.push(err);
                    }
                }
                None => merge_into(target.child_mut(&key), update, &path, errors),
            },
            other => {
                target.set(key, other);
            }
        }
    }
}
