//! # Record Flattener
//!
//! Walks an arbitrarily nested record into a sequence of
//! `(dotted.path, scalar)` pairs. Mappings recurse, lists contribute only
//! their mapping elements, and the reserved `_id` key (document databases)
//! is skipped at every level.

use crate::value::{Record, Value};

/// A flattened scalar leaf: dotted column path plus a borrowed value.
pub type Leaf<'a> = (String, &'a Value);

/// Lazily flatten one record into `(path, scalar)` pairs.
///
/// Output order follows the record's own key order, depth first, which is
/// what makes column ordering in a report mirror the first record that
/// introduced each path.
pub fn flatten(record: &Record) -> Flatten<'_> {
    let mut stack = Vec::with_capacity(record.len());
    push_map(&mut stack, record, None);
    Flatten { stack }
}

/// Iterator over the scalar leaves of one record.
pub struct Flatten<'a> {
    // Reverse-ordered work stack of (path, value) pairs still to visit.
    stack: Vec<(String, &'a Value)>,
}

impl<'a> Iterator for Flatten<'a> {
    type Item = Leaf<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((path, value)) = self.stack.pop() {
            match value {
                Value::Map(map) => push_map(&mut self.stack, map, Some(&path)),
                Value::List(items) => {
                    // Mapping elements recurse under the same key; scalar
                    // elements of a list do not form a column of their own.
                    for item in items.iter().rev() {
                        if let Value::Map(map) = item {
                            push_map(&mut self.stack, map, Some(&path));
                        }
                    }
                }
                scalar => return Some((path, scalar)),
            }
        }
        None
    }
}

fn push_map<'a>(
    stack: &mut Vec<(String, &'a Value)>,
    map: &'a indexmap::IndexMap<String, Value>,
    prefix: Option<&str>,
) {
    for (key, value) in map.iter().rev() {
        if key == "_id" {
            continue;
        }
        let path = match prefix {
            Some(p) => format!("{}.{}", p, key),
            None => key.clone(),
        };
        stack.push((path, value));
    }
}
