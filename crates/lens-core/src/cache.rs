//! # Element Cache
//!
//! Append-only caches that amortize indexed access into linked structures.
//!
//! Reaching element `i` of a linked list costs `i` pointer hops. Debugger
//! UIs ask for children one index at a time, so without a cache a full
//! expansion is quadratic. [`ElementCache`] remembers every node it has
//! visited and always resumes from the last one, never from the head.
//! [`KeyIndex`] does the same for key summaries of map-like containers.
//!
//! Both caches only grow during a provider's lifetime and are discarded
//! wholesale on the next `update()`: memory may have moved in between.

use std::collections::HashMap;

use tracing::trace;

use crate::types::RemoteValue;

/// Cached node handles of a linked structure
///
/// ## Bounds
///
/// Growth happens in steps of `window` elements and stops at `ceiling`.
/// Indices past the ceiling are never cached; providers fall back to an
/// uncached walk from the head for those.
#[derive(Debug, Clone)]
pub struct ElementCache
{
    nodes: Vec<RemoteValue>,
    window: usize,
    ceiling: usize,
    exhausted: bool,
}

impl ElementCache
{
    /// Create an empty cache
    #[must_use]
    pub fn new(window: usize, ceiling: usize) -> Self
    {
        ElementCache { nodes: Vec::new(), window: window.max(1), ceiling, exhausted: false }
    }

    /// Forget every cached node
    pub fn clear(&mut self)
    {
        self.nodes.clear();
        self.exhausted = false;
    }

    /// Number of cached nodes
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.nodes.len()
    }

    /// Whether nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.nodes.is_empty()
    }

    /// Highest number of nodes this cache will ever hold
    #[must_use]
    pub const fn ceiling(&self) -> usize
    {
        self.ceiling
    }

    /// Cached node at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&RemoteValue>
    {
        self.nodes.get(index)
    }

    /// Cached nodes in traversal order
    #[must_use]
    pub fn nodes(&self) -> &[RemoteValue]
    {
        &self.nodes
    }

    /// Grow until `upto` nodes are cached
    ///
    /// `upto` is clamped to `total` (the container's validated length) and to
    /// the ceiling. The walk starts at the last cached node; `first` is only
    /// called when the cache is empty. A failing `next` marks the structure as
    /// exhausted and stops further growth until [`ElementCache::clear`].
    ///
    /// Returns the number of cached nodes afterwards.
    pub fn ensure_cached<F, N>(&mut self, upto: usize, total: usize, first: F, mut next: N) -> usize
    where
        F: FnOnce() -> Option<RemoteValue>,
        N: FnMut(&RemoteValue) -> Option<RemoteValue>,
    {
        let target = upto.min(total).min(self.ceiling);
        if self.exhausted || self.nodes.len() >= target {
            return self.nodes.len();
        }

        let before = self.nodes.len();
        if self.nodes.is_empty() {
            let Some(head) = first() else {
                self.exhausted = true;
                return 0;
            };
            self.nodes.push(head);
        }
        while self.nodes.len() < target {
            let Some(last) = self.nodes.last() else {
                break;
            };
            match next(last) {
                Some(node) => self.nodes.push(node),
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }
        trace!(from = before, to = self.nodes.len(), target, "element cache grown");
        self.nodes.len()
    }

    /// Node at `index`, growing by at least one fetch window when needed
    ///
    /// Returns `None` past the ceiling, past `total`, or when the traversal
    /// breaks before reaching `index`.
    pub fn fetch<F, N>(&mut self, index: usize, total: usize, first: F, next: N) -> Option<&RemoteValue>
    where
        F: FnOnce() -> Option<RemoteValue>,
        N: FnMut(&RemoteValue) -> Option<RemoteValue>,
    {
        if index >= self.nodes.len() {
            let upto = (index + 1).max(self.nodes.len() + self.window);
            self.ensure_cached(upto, total, first, next);
        }
        self.nodes.get(index)
    }
}

/// Bidirectional index between element positions and key summaries
///
/// Keys are compared in their unquoted form, so a string key rendered as
/// `"k3"` is found by both `k3` and `"k3"`. When two elements share a key
/// summary the first one wins.
#[derive(Debug, Clone, Default)]
pub struct KeyIndex
{
    keys: Vec<Option<String>>,
    by_key: HashMap<String, usize>,
}

impl KeyIndex
{
    /// Create an empty index
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Forget every key
    pub fn clear(&mut self)
    {
        self.keys.clear();
        self.by_key.clear();
    }

    /// Number of indexed positions
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.keys.len()
    }

    /// Whether nothing is indexed
    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.keys.is_empty()
    }

    /// Key summary at `index`, if that element's key could be read
    #[must_use]
    pub fn key_at(&self, index: usize) -> Option<&str>
    {
        self.keys.get(index).and_then(|key| key.as_deref())
    }

    /// Position of an already indexed key
    #[must_use]
    pub fn index_of(&self, key: &str) -> Option<usize>
    {
        self.by_key.get(lookup_form(key)).copied()
    }

    /// Record the key summary of the next position
    ///
    /// `None` keeps positions aligned for elements whose key is unreadable.
    pub fn push(&mut self, key: Option<String>)
    {
        let index = self.keys.len();
        if let Some(summary) = &key {
            self.by_key.entry(lookup_form(summary).to_string()).or_insert(index);
        }
        self.keys.push(key);
    }

    /// Index positions until `upto` are covered (clamped to `total`)
    pub fn extend_to<P>(&mut self, upto: usize, total: usize, mut project: P)
    where
        P: FnMut(usize) -> Option<String>,
    {
        let target = upto.min(total);
        let before = self.keys.len();
        while self.keys.len() < target {
            let index = self.keys.len();
            self.push(project(index));
        }
        if self.keys.len() > before {
            trace!(from = before, to = self.keys.len(), "key index grown");
        }
    }

    /// Find `key`, indexing further positions one window at a time
    ///
    /// Returns `None` once all `total` positions are indexed without a match.
    pub fn lookup<P>(&mut self, key: &str, total: usize, window: usize, mut project: P) -> Option<usize>
    where
        P: FnMut(usize) -> Option<String>,
    {
        let window = window.max(1);
        loop {
            if let Some(index) = self.index_of(key) {
                return Some(index);
            }
            if self.keys.len() >= total {
                return None;
            }
            let upto = self.keys.len() + window;
            self.extend_to(upto, total, &mut project);
        }
    }
}

/// Key text without one level of surrounding double quotes
fn lookup_form(key: &str) -> &str
{
    key.strip_prefix('"').and_then(|k| k.strip_suffix('"')).unwrap_or(key)
}

#[cfg(test)]
mod tests
{
    use std::cell::Cell;

    use super::*;
    use crate::types::{Address, TypeHandle};

    fn node(i: u64) -> RemoteValue
    {
        RemoteValue::new(format!("[{i}]"), Address::new(0x1000 + i * 0x10), TypeHandle(1))
    }

    fn successor(value: &RemoteValue) -> Option<RemoteValue>
    {
        let i = (value.address().value() - 0x1000) / 0x10;
        Some(node(i + 1))
    }

    #[test]
    fn test_grows_from_last_cached_node()
    {
        let hops = Cell::new(0);
        let mut cache = ElementCache::new(2, 100);
        let next = |v: &RemoteValue| {
            hops.set(hops.get() + 1);
            successor(v)
        };
        cache.ensure_cached(3, 10, || Some(node(0)), next);
        assert_eq!(cache.len(), 3);
        assert_eq!(hops.get(), 2);

        // Growing to 5 only visits the two new nodes
        cache.ensure_cached(5, 10, || panic!("head must not be revisited"), |v: &RemoteValue| {
            hops.set(hops.get() + 1);
            successor(v)
        });
        assert_eq!(cache.len(), 5);
        assert_eq!(hops.get(), 4);
        assert_eq!(cache.get(4), Some(&node(4)));
    }

    #[test]
    fn test_respects_total_and_ceiling()
    {
        let mut cache = ElementCache::new(8, 4);
        cache.ensure_cached(100, 10, || Some(node(0)), successor);
        assert_eq!(cache.len(), 4);
        assert!(cache.fetch(6, 10, || Some(node(0)), successor).is_none());

        let mut short = ElementCache::new(8, 100);
        short.ensure_cached(100, 3, || Some(node(0)), successor);
        assert_eq!(short.len(), 3);
    }

    #[test]
    fn test_broken_chain_stops_growth()
    {
        let mut cache = ElementCache::new(4, 100);
        let next = |v: &RemoteValue| if v.address().value() >= 0x1010 { None } else { successor(v) };
        cache.ensure_cached(5, 5, || Some(node(0)), next);
        assert_eq!(cache.len(), 2);
        assert!(cache.fetch(3, 5, || Some(node(0)), successor).is_none());

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.ensure_cached(5, 5, || Some(node(0)), successor), 5);
    }

    #[test]
    fn test_fetch_grows_by_window()
    {
        let mut cache = ElementCache::new(4, 100);
        assert_eq!(cache.fetch(0, 50, || Some(node(0)), successor), Some(&node(0)));
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_key_lookup_grows_incrementally()
    {
        let keys = ["\"k0\"", "\"k1\"", "\"k2\"", "\"k3\"", "\"k4\""];
        let mut index = KeyIndex::new();
        index.extend_to(2, keys.len(), |i| Some(keys[i].to_string()));
        assert_eq!(index.len(), 2);

        assert_eq!(index.lookup("k3", keys.len(), 1, |i| Some(keys[i].to_string())), Some(3));
        assert_eq!(index.len(), 4);
        assert_eq!(index.lookup("\"k1\"", keys.len(), 1, |_| None), Some(1));

        assert_eq!(index.lookup("missing", keys.len(), 1, |i| Some(keys[i].to_string())), None);
        assert_eq!(index.len(), keys.len());
    }

    #[test]
    fn test_unreadable_keys_keep_positions_aligned()
    {
        let mut index = KeyIndex::new();
        index.extend_to(3, 3, |i| if i == 1 { None } else { Some(format!("{i}")) });
        assert_eq!(index.key_at(1), None);
        assert_eq!(index.index_of("2"), Some(2));
    }

    #[test]
    fn test_duplicate_key_first_wins()
    {
        let mut index = KeyIndex::new();
        index.push(Some("a".to_string()));
        index.push(Some("a".to_string()));
        assert_eq!(index.index_of("a"), Some(0));
    }
}
