// LRU cache engine: a strict-capacity map with recency-ordered eviction.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;

use super::CacheEngine;

// Sentinel slots for the recency list; real nodes start after them.
const HEAD: usize = 0;
const TAIL: usize = 1;

/// Least-recently-used cache with a hard entry capacity. The recency
/// order is a doubly linked list kept in an arena: nodes refer to their
/// neighbours by stable slot index, with sentinel head and tail, and a
/// key-to-slot map on the side. All mutation happens under one lock.
pub struct LruCache {
    capacity: usize,
    inner: Mutex<LruInner>,
}

struct LruInner {
    map: HashMap<String, usize>,
    arena: Vec<LruNode>,
    free: Vec<usize>,
}

struct LruNode {
    key: String,
    value: Value,
    prev: usize,
    next: usize,
}

impl LruCache {
    pub fn new(capacity: usize) -> Self {
        let arena = vec![
            // HEAD sentinel
            LruNode {
                key: String::new(),
                value: Value::Null,
                prev: HEAD,
                next: TAIL,
            },
            // TAIL sentinel
            LruNode {
                key: String::new(),
                value: Value::Null,
                prev: HEAD,
                next: TAIL,
            },
        ];
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(LruInner {
                map: HashMap::new(),
                arena,
                free: Vec::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl LruInner {
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.arena[idx].prev, self.arena[idx].next);
        self.arena[prev].next = next;
        self.arena[next].prev = prev;
    }

    fn push_front(&mut self, idx: usize) {
        let first = self.arena[HEAD].next;
        self.arena[idx].prev = HEAD;
        self.arena[idx].next = first;
        self.arena[first].prev = idx;
        self.arena[HEAD].next = idx;
    }

    fn promote(&mut self, idx: usize) {
        self.unlink(idx);
        self.push_front(idx);
    }

    fn alloc(&mut self, key: String, value: Value) -> usize {
        match self.free.pop() {
            Some(idx) => {
                let node = &mut self.arena[idx];
                node.key = key;
                node.value = value;
                idx
            }
            None => {
                self.arena.push(LruNode {
                    key,
                    value,
                    prev: HEAD,
                    next: TAIL,
                });
                self.arena.len() - 1
            }
        }
    }

    /// Drops the least recently used entry (the node before TAIL).
    fn evict_tail(&mut self) {
        let victim = self.arena[TAIL].prev;
        if victim == HEAD {
            return;
        }
        self.unlink(victim);
        let key = std::mem::take(&mut self.arena[victim].key);
        self.arena[victim].value = Value::Null;
        self.map.remove(&key);
        self.free.push(victim);
    }
}

impl CacheEngine for LruCache {
    fn get(&self, key: &str) -> (Option<Value>, bool) {
        let mut inner = self.inner.lock();
        match inner.map.get(key).copied() {
            None => (None, false),
            Some(idx) => {
                inner.promote(idx);
                (Some(inner.arena[idx].value.clone()), true)
            }
        }
    }

    fn set(&self, key: &str, value: Value) {
        let mut inner = self.inner.lock();
        if let Some(idx) = inner.map.get(key).copied() {
            inner.arena[idx].value = value;
            inner.promote(idx);
            return;
        }

        let idx = inner.alloc(key.to_string(), value);
        inner.map.insert(key.to_string(), idx);
        inner.push_front(idx);

        // Strict capacity: evict before the insert becomes observable.
        if inner.map.len() > self.capacity {
            inner.evict_tail();
        }
    }

    fn size(&self) -> usize {
        self.inner.lock().map.len()
    }
}
