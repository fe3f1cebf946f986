//! Open-addressed hash tables with linear probing.
//!
//! Two specialized containers are needed — a string-keyed table (keys
//! are interned strings, compared by pointer after a hash fast-reject) and
//! a raw/pointer-keyed hash (keys are `u64` bit patterns, compared by
//! equality). Both share the same probing and growth behavior, so the
//! probe loop and 0.75-load-factor doubling policy live once in
//! [`OaTable`], a generic engine that takes the key's hash and equality
//! test as closures rather than requiring a trait. `StringTable` and
//! `RawTable` are thin, differently-typed wrappers around it.

use std::rc::Rc;

use crate::value::Object;

const INITIAL_CAPACITY: usize = 8;
const MAX_LOAD: f64 = 0.75;

#[derive(Clone)]
enum Slot<K, V> {
    Empty,
    Tombstone,
    Occupied(K, V),
}

/// A generic open-addressed table. Not exposed directly; callers use
/// [`StringTable`] or [`RawTable`], which supply the hash/equality
/// functions appropriate to their key type.
#[derive(Clone)]
pub(crate) struct OaTable<K, V> {
    slots: Vec<Slot<K, V>>,
    /// Occupied + tombstone count; drives the growth decision so that
    /// tombstones don't let a table silently degrade into a full linear
    /// scan before it's resized.
    used: usize,
    /// Occupied-only count, i.e. `len()`.
    live: usize,
}

impl<K: Clone, V: Clone> OaTable<K, V> {
    pub(crate) fn new() -> Self {
        OaTable {
            slots: Vec::new(),
            used: 0,
            live: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Finds the slot a key occupies, or the first tombstone/empty slot a
    /// new entry for that key should land in. Returns `(index, is_match)`.
    fn find_slot(slots: &[Slot<K, V>], hash: u64, eq: &dyn Fn(&K) -> bool) -> (usize, bool) {
        let cap = slots.len();
        debug_assert!(cap > 0);
        let mut index = (hash as usize) % cap;
        let mut first_tombstone: Option<usize> = None;
        loop {
            match &slots[index] {
                Slot::Empty => {
                    return (first_tombstone.unwrap_or(index), false);
                }
                Slot::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(index);
                    }
                }
                Slot::Occupied(k, _) if eq(k) => return (index, true),
                Slot::Occupied(_, _) => {}
            }
            index = (index + 1) % cap;
        }
    }

    /// Rebuilds the table at (possibly) larger capacity, rehashing every
    /// live entry with `hash_fn`. Tombstones are dropped, matching the
    /// Tombstones are dropped on rehash.
    fn rehash_with(&mut self, hash_fn: &dyn Fn(&K) -> u64) {
        let new_cap = if self.slots.is_empty() {
            INITIAL_CAPACITY
        } else {
            self.slots.len() * 2
        };
        let mut new_slots: Vec<Slot<K, V>> = Vec::with_capacity(new_cap);
        new_slots.resize_with(new_cap, || Slot::Empty);

        let old = std::mem::replace(&mut self.slots, new_slots);
        self.used = 0;
        self.live = 0;
        for slot in old {
            if let Slot::Occupied(k, v) = slot {
                let h = hash_fn(&k);
                let (idx, _) = Self::find_slot(&self.slots, h, &|other| {
                    // During rehash every key is distinct from every other
                    // live key (it came from a valid table), so a plain
                    // "never equal" probe just finds the first empty slot.
                    let _ = other;
                    false
                });
                self.slots[idx] = Slot::Occupied(k, v);
                self.used += 1;
                self.live += 1;
            }
        }
    }

    /// Inserts or overwrites `key => value`. Returns `true` if this was a
    /// fresh insert.
    pub(crate) fn set(
        &mut self,
        hash: u64,
        key: K,
        value: V,
        eq: impl Fn(&K) -> bool,
        hash_fn: &dyn Fn(&K) -> u64,
    ) -> bool {
        if self.slots.is_empty() || (self.used + 1) as f64 > self.capacity() as f64 * MAX_LOAD {
            self.rehash_with(hash_fn);
        }
        let (index, existed) = Self::find_slot(&self.slots, hash, &eq);
        let was_tombstone = matches!(self.slots[index], Slot::Tombstone);
        self.slots[index] = Slot::Occupied(key, value);
        if !existed {
            self.live += 1;
            if !was_tombstone {
                self.used += 1;
            }
        }
        !existed
    }

    pub(crate) fn get(&self, hash: u64, eq: impl Fn(&K) -> bool) -> Option<&V> {
        if self.slots.is_empty() {
            return None;
        }
        let (index, found) = Self::find_slot(&self.slots, hash, &eq);
        if found {
            match &self.slots[index] {
                Slot::Occupied(_, v) => Some(v),
                _ => None,
            }
        } else {
            None
        }
    }

    pub(crate) fn contains(&self, hash: u64, eq: impl Fn(&K) -> bool) -> bool {
        self.get(hash, eq).is_some()
    }

    /// Installs a tombstone in place of the entry, so later probe chains
    /// through this slot still reach entries that were inserted after it.
    pub(crate) fn remove(&mut self, hash: u64, eq: impl Fn(&K) -> bool) -> bool {
        if self.slots.is_empty() {
            return false;
        }
        let (index, found) = Self::find_slot(&self.slots, hash, &eq);
        if found {
            self.slots[index] = Slot::Tombstone;
            self.live -= 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots.iter().filter_map(|s| match s {
            Slot::Occupied(k, v) => Some((k, v)),
            _ => None,
        })
    }
}

/// FNV-1a, used for string content hashing (interning) and reused as the
/// mixing step for raw `u64` keys.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

fn mix_u64(raw: u64) -> u64 {
    // splitmix64 finalizer: cheap, well-distributed avalanche for the
    // small integer/float bit patterns used as map keys.
    let mut z = raw.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

fn str_hash_and_bytes(obj: &Rc<Object>) -> (u64, &[u8]) {
    match obj.as_ref() {
        Object::Str(s) => (s.hash, s.as_bytes()),
        _ => panic!("string-keyed table used with a non-string key"),
    }
}

/// The string-keyed table: keys are interned strings, compared
/// by pointer identity after a hash fast-reject. Used for the VM's
/// globals table and for a map's string/field-keyed entries.
#[derive(Clone, Default)]
pub struct StringTable {
    inner: OaTable<Rc<Object>, crate::value::Value>,
}

impl StringTable {
    pub fn new() -> Self {
        StringTable {
            inner: OaTable::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn set(&mut self, key: Rc<Object>, value: crate::value::Value) -> bool {
        let (hash, _) = str_hash_and_bytes(&key);
        self.inner.set(
            hash,
            key.clone(),
            value,
            |k| Rc::ptr_eq(k, &key),
            &|k| str_hash_and_bytes(k).0,
        )
    }

    pub fn get(&self, key: &Rc<Object>) -> Option<&crate::value::Value> {
        let (hash, _) = str_hash_and_bytes(key);
        self.inner.get(hash, |k| Rc::ptr_eq(k, key))
    }

    pub fn contains(&self, key: &Rc<Object>) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &Rc<Object>) -> bool {
        let (hash, _) = str_hash_and_bytes(key);
        self.inner.remove(hash, |k| Rc::ptr_eq(k, key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<Object>, &crate::value::Value)> {
        self.inner.iter()
    }
}

/// The pointer/raw-keyed hash: keys are 64-bit raw bit patterns
/// (a number's IEEE bits, or a positional index for map literals).
#[derive(Clone, Default)]
pub struct RawTable {
    inner: OaTable<u64, crate::value::Value>,
}

impl RawTable {
    pub fn new() -> Self {
        RawTable {
            inner: OaTable::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn set(&mut self, key: u64, value: crate::value::Value) -> bool {
        let hash = mix_u64(key);
        self.inner
            .set(hash, key, value, |k| *k == key, &|k| mix_u64(*k))
    }

    pub fn get(&self, key: u64) -> Option<&crate::value::Value> {
        self.inner.get(mix_u64(key), |k| *k == key)
    }

    pub fn remove(&mut self, key: u64) -> bool {
        self.inner.remove(mix_u64(key), |k| *k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u64, &crate::value::Value)> {
        self.inner.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_is_deterministic() {
        assert_eq!(fnv1a(b"hello"), fnv1a(b"hello"));
        assert_ne!(fnv1a(b"hello"), fnv1a(b"world"));
    }

    #[test]
    fn raw_table_set_reports_first_insert() {
        let mut t = RawTable::new();
        assert!(t.set(1, crate::value::Value::Number(1.0)));
        assert!(!t.set(1, crate::value::Value::Number(2.0)));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn raw_table_remove_leaves_tombstone_but_shrinks_len() {
        let mut t = RawTable::new();
        t.set(1, crate::value::Value::Nil);
        t.set(2, crate::value::Value::Nil);
        assert!(t.remove(1));
        assert_eq!(t.len(), 1);
        assert!(t.get(2).is_some());
    }

    #[test]
    fn raw_table_survives_growth_across_many_keys() {
        let mut t = RawTable::new();
        for i in 0..200u64 {
            t.set(i, crate::value::Value::Number(i as f64));
        }
        assert_eq!(t.len(), 200);
        for i in 0..200u64 {
            match t.get(i) {
                Some(crate::value::Value::Number(n)) => assert_eq!(*n, i as f64),
                other => panic!("missing or wrong entry for {i}: {other:?}"),
            }
        }
    }
}
