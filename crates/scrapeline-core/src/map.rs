//! String-keyed hash map backing the registry, collectors and metrics.
//!
//! Layout:
//! - an array of [`OrderedList`] buckets (chaining on collision)
//! - one extra key-order list for deterministic iteration
//! - a single `RwLock` around everything
//!
//! Every operation, `get` included, takes the write half of the lock, so no
//! two operations on one map ever overlap. The table doubles once
//! `size > capacity / 2` at the start of a `set`. A resize rebuilds the
//! key-order list by scanning the old buckets in array order, so iteration
//! follows insertion order only until the first resize.
//!
//! Values are handed out by clone; store `Arc<_>` for shared objects.

use std::sync::{Arc, RwLock, RwLockWriteGuard};

use tracing::debug;

use crate::error::{MetricsError, Result};
use crate::list::{OrderedList, ReleaseFn};

/// Bucket count of a fresh map.
pub const INITIAL_CAPACITY: usize = 32;

const HASH_SEED_A: usize = 31415;
const HASH_SEED_B: usize = 27183;

/// Horner-style string hash with a per-character coefficient.
///
/// `index = (a * index + c) mod capacity`, then `a = a * b mod (capacity - 1)`.
pub fn bucket_index(key: &str, capacity: usize) -> usize {
    debug_assert!(capacity >= 2);
    let mut a = HASH_SEED_A;
    let mut index = 0usize;
    for &c in key.as_bytes() {
        index = a.wrapping_mul(index).wrapping_add(c as usize) % capacity;
        a = a.wrapping_mul(HASH_SEED_B) % (capacity - 1);
    }
    index
}

struct Entry<V> {
    key: Arc<str>,
    value: V,
}

fn same_key<V>(a: &Entry<V>, b: &Entry<V>) -> bool {
    a.key == b.key
}

struct Table<V> {
    buckets: Vec<OrderedList<Entry<V>>>,
    order: OrderedList<Arc<str>>,
    size: usize,
}

impl<V> Table<V> {
    fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            buckets: new_buckets(capacity)?,
            order: OrderedList::new(),
            size: 0,
        })
    }

    fn lookup(&self, key: &str) -> Option<&Entry<V>> {
        let bucket = &self.buckets[bucket_index(key, self.buckets.len())];
        let id = bucket.position(|e| &*e.key == key)?;
        bucket.get(id)
    }

    /// Insert or overwrite; returns the displaced value.
    fn place(&mut self, key: &str, value: V) -> Option<V> {
        let idx = bucket_index(key, self.buckets.len());
        let bucket = &mut self.buckets[idx];
        if let Some(id) = bucket.position(|e| &*e.key == key) {
            return bucket
                .get_mut(id)
                .map(|entry| std::mem::replace(&mut entry.value, value));
        }

        let key: Arc<str> = Arc::from(key);
        self.order.append(Arc::clone(&key));
        bucket.append(Entry { key, value });
        self.size += 1;
        None
    }

    fn remove(&mut self, key: &str) -> Option<V> {
        let idx = bucket_index(key, self.buckets.len());
        let bucket = &mut self.buckets[idx];
        let id = bucket.position(|e| &*e.key == key)?;
        let entry = bucket.take(id)?;
        self.order.remove(&entry.key);
        self.size -= 1;
        Some(entry.value)
    }

    /// Double the bucket array if over the load factor.
    ///
    /// The only fallible step is allocating the new array, which happens
    /// before anything is moved, so a failure leaves the table untouched.
    fn ensure_capacity(&mut self) -> Result<()> {
        if self.size <= self.buckets.len() / 2 {
            return Ok(());
        }
        let capacity = self
            .buckets
            .len()
            .checked_mul(2)
            .ok_or_else(|| MetricsError::Alloc("map capacity overflow".into()))?;
        let mut buckets = new_buckets(capacity)?;
        let mut order = OrderedList::new();

        for bucket in self.buckets.iter_mut() {
            while let Some(entry) = bucket.pop_front() {
                order.append(Arc::clone(&entry.key));
                buckets[bucket_index(&entry.key, capacity)].append(entry);
            }
        }

        self.buckets = buckets;
        self.order = order;
        debug!(capacity, size = self.size, "map resized");
        Ok(())
    }
}

fn new_buckets<V>(capacity: usize) -> Result<Vec<OrderedList<Entry<V>>>> {
    let mut buckets = Vec::new();
    buckets
        .try_reserve_exact(capacity)
        .map_err(|e| MetricsError::Alloc(format!("map bucket array of {capacity}: {e}")))?;
    buckets.extend((0..capacity).map(|_| OrderedList::with_eq(same_key::<V>)));
    Ok(buckets)
}

/// Thread-safe string-keyed map with deterministic iteration order.
pub struct ConcurrentMap<V> {
    table: RwLock<Table<V>>,
    release: Option<ReleaseFn<V>>,
}

impl<V: Clone> Default for ConcurrentMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> ConcurrentMap<V> {
    pub fn new() -> Self {
        let table = Table {
            buckets: (0..INITIAL_CAPACITY)
                .map(|_| OrderedList::with_eq(same_key::<V>))
                .collect(),
            order: OrderedList::new(),
            size: 0,
        };
        Self {
            table: RwLock::new(table),
            release: None,
        }
    }

    /// Map with an explicit starting bucket count (minimum 2).
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity < 2 {
            return Err(MetricsError::InvalidArgument(
                "map capacity must be at least 2".into(),
            ));
        }
        Ok(Self {
            table: RwLock::new(Table::with_capacity(capacity)?),
            release: None,
        })
    }

    /// Install a hook run on values displaced by `set` or removed by `delete`.
    pub fn with_release(mut self, release: ReleaseFn<V>) -> Self {
        self.release = Some(release);
        self
    }

    fn lock(&self) -> Result<RwLockWriteGuard<'_, Table<V>>> {
        self.table.write().map_err(|_| MetricsError::poisoned("map"))
    }

    fn discard(&self, value: V) {
        if let Some(release) = self.release {
            release(value);
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<V>> {
        let table = self.lock()?;
        Ok(table.lookup(key).map(|e| e.value.clone()))
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        let table = self.lock()?;
        Ok(table.lookup(key).is_some())
    }

    /// Insert or overwrite. An overwritten value goes through the release hook
    /// and the key keeps its place in iteration order.
    pub fn set(&self, key: &str, value: V) -> Result<()> {
        let displaced = {
            let mut table = self.lock()?;
            table.ensure_capacity()?;
            table.place(key, value)
        };
        if let Some(old) = displaced {
            self.discard(old);
        }
        Ok(())
    }

    /// Insert only if absent; returns the value now stored under `key`.
    pub fn get_or_insert_with<F>(&self, key: &str, make: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        let mut table = self.lock()?;
        if let Some(entry) = table.lookup(key) {
            return Ok(entry.value.clone());
        }
        let value = make()?;
        table.ensure_capacity()?;
        table.place(key, value.clone());
        Ok(value)
    }

    /// Remove a key. A missing key is a no-op returning `false`.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let removed = {
            let mut table = self.lock()?;
            table.remove(key)
        };
        match removed {
            Some(value) => {
                self.discard(value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn size(&self) -> Result<usize> {
        Ok(self.lock()?.size)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.size()? == 0)
    }

    /// Current bucket count.
    pub fn capacity(&self) -> Result<usize> {
        Ok(self.lock()?.buckets.len())
    }

    /// Keys in iteration order.
    pub fn keys(&self) -> Result<Vec<Arc<str>>> {
        let table = self.lock()?;
        Ok(table.order.iter().cloned().collect())
    }

    /// `(key, value)` pairs in iteration order, taken under one lock hold.
    pub fn entries(&self) -> Result<Vec<(Arc<str>, V)>> {
        let table = self.lock()?;
        let mut out = Vec::with_capacity(table.size);
        for key in table.order.iter() {
            let entry = table
                .lookup(key)
                .ok_or_else(|| MetricsError::NotFound(format!("indexed key {key} has no entry")))?;
            out.push((Arc::clone(key), entry.value.clone()));
        }
        Ok(out)
    }
}

impl<V> Drop for ConcurrentMap<V> {
    fn drop(&mut self) {
        let Some(release) = self.release else { return };
        let Ok(table) = self.table.get_mut() else { return };
        for bucket in table.buckets.iter_mut() {
            while let Some(entry) = bucket.pop_front() {
                release(entry.value);
            }
        }
    }
}

impl<V> std::fmt::Debug for ConcurrentMap<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut d = f.debug_struct("ConcurrentMap");
        if let Ok(table) = self.table.read() {
            d.field("size", &table.size)
                .field("capacity", &table.buckets.len());
        }
        d.finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn hash_stays_in_range() {
        for cap in [2usize, 32, 64, 1024] {
            for key in ["", "a", "requests_total{method=\"GET\"}", "ünïcødé"] {
                assert!(bucket_index(key, cap) < cap);
            }
        }
        assert_eq!(bucket_index("", 32), 0);
    }

    #[test]
    fn set_get_overwrite_delete() {
        let m = ConcurrentMap::new();
        m.set("a", 1).unwrap();
        m.set("b", 2).unwrap();
        assert_eq!(m.get("a").unwrap(), Some(1));
        m.set("a", 10).unwrap();
        assert_eq!(m.get("a").unwrap(), Some(10));
        assert_eq!(m.size().unwrap(), 2);

        assert!(m.delete("a").unwrap());
        assert_eq!(m.get("a").unwrap(), None);
        assert!(!m.delete("a").unwrap());
        assert_eq!(m.size().unwrap(), 1);
        assert_eq!(m.keys().unwrap().len(), 1);
    }

    #[test]
    fn overwrite_keeps_order_slot() {
        let m = ConcurrentMap::new();
        m.set("x", 1).unwrap();
        m.set("y", 2).unwrap();
        m.set("x", 3).unwrap();
        let keys: Vec<String> = m.keys().unwrap().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["x", "y"]);
    }

    #[test]
    fn resize_doubles_after_half_full() {
        let m = ConcurrentMap::new();
        for i in 0..=16 {
            m.set(&format!("k{i}"), i).unwrap();
        }
        // 17 entries: the 17th set saw size == 16, not over the threshold yet
        assert_eq!(m.capacity().unwrap(), 32);
        m.set("k17", 17).unwrap();
        assert_eq!(m.capacity().unwrap(), 64);
        for i in 0..=17 {
            assert_eq!(m.get(&format!("k{i}")).unwrap(), Some(i));
        }
    }

    #[test]
    fn insertion_order_until_first_resize() {
        let m = ConcurrentMap::new();
        let names: Vec<String> = (0..10).map(|i| format!("metric_{i}")).collect();
        for (i, n) in names.iter().enumerate() {
            m.set(n, i).unwrap();
        }
        let keys: Vec<String> = m.keys().unwrap().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, names);
    }

    static RELEASED: AtomicUsize = AtomicUsize::new(0);

    fn count_release(_: u64) {
        RELEASED.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn release_hook_on_overwrite_delete_and_drop() {
        RELEASED.store(0, Ordering::SeqCst);
        {
            let m = ConcurrentMap::new().with_release(count_release);
            m.set("a", 1).unwrap();
            m.set("a", 2).unwrap();
            assert_eq!(RELEASED.load(Ordering::SeqCst), 1);
            m.set("b", 3).unwrap();
            m.delete("b").unwrap();
            assert_eq!(RELEASED.load(Ordering::SeqCst), 2);
            m.set("c", 4).unwrap();
        }
        assert_eq!(RELEASED.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn get_or_insert_only_builds_once() {
        let m: ConcurrentMap<Arc<String>> = ConcurrentMap::new();
        let first = m
            .get_or_insert_with("k", || Ok(Arc::new("one".to_string())))
            .unwrap();
        let second = m
            .get_or_insert_with("k", || Ok(Arc::new("two".to_string())))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn tiny_capacity_rejected() {
        assert!(ConcurrentMap::<u8>::with_capacity(1).is_err());
        let m = ConcurrentMap::<u8>::with_capacity(2).unwrap();
        for i in 0..20u8 {
            m.set(&i.to_string(), i).unwrap();
        }
        assert_eq!(m.size().unwrap(), 20);
        assert!(m.capacity().unwrap() >= 32);
    }
}
