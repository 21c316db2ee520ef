//! Storage adapters behind the uniform `ServiceBackend` surface.

mod kv;
mod memory;

pub use kv::{KvBackend, StaticKvStore};
pub use memory::{MemoryBackend, MemoryOptions, MemoryRecord};

use strata_dns_domain::name;

/// Only these two literals carry wildcard semantics.
pub(crate) fn is_wildcard(label: &str) -> bool {
    label == "*" || label == "any"
}

/// Root-first label sequence of a normalized name; the shape stored keys
/// use, so query and key align element-wise.
pub(crate) fn path_labels(qname: &str) -> Vec<String> {
    let mut labels: Vec<String> = name::labels(qname).iter().map(|l| l.to_string()).collect();
    labels.reverse();
    labels
}

/// Element-wise wildcard match of a query path against a stored key path.
/// `*`/`any` match anything at their position; other labels must match
/// after case folding. A query deeper than the key never matches; a
/// shallower query matches only when its deepest label is a wildcard
/// (subtree glob).
pub(crate) fn wildcard_match(query: &[String], key: &[String]) -> bool {
    if query.len() > key.len() {
        return false;
    }
    for (q, k) in query.iter().zip(key) {
        if is_wildcard(q) {
            continue;
        }
        if !q.eq_ignore_ascii_case(k) {
            return false;
        }
    }
    if query.len() < key.len() {
        return query.last().map(|l| is_wildcard(l)).unwrap_or(false);
    }
    true
}
