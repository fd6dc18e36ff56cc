use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_postgres::Statement;

/// A statement remembered under a caller-chosen key.
#[derive(Debug, Clone)]
pub(super) struct CachedStatement {
    /// Final SQL (placeholders already rewritten).
    pub sql: String,
    /// Number of parameters the SQL expects.
    pub param_count: usize,
    /// Server-side prepared statement, when the client supports them.
    pub prepared: Option<Statement>,
}

/// Keyed LRU of statements for one connection.
///
/// A key may also carry the column list used for column checking. Both share
/// one LRU slot, so evicting a key drops its statement and its columns.
#[derive(Debug)]
pub(super) struct StatementCache {
    inner: Mutex<StatementCacheInner>,
}

#[derive(Debug)]
struct StatementCacheInner {
    capacity: usize,
    map: HashMap<String, CachedStatement>,
    columns: HashMap<String, Vec<String>>,
    order: VecDeque<String>,
}

impl StatementCache {
    pub(super) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(StatementCacheInner {
                capacity,
                map: HashMap::new(),
                columns: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatementCacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn is_enabled(&self) -> bool {
        self.lock().capacity > 0
    }

    pub(super) fn get(&self, key: &str) -> Option<CachedStatement> {
        let mut inner = self.lock();
        let entry = inner.map.get(key).cloned()?;
        inner.touch(key);
        Some(entry)
    }

    /// Store `entry` unless another task stored one first; returns whichever is cached.
    pub(super) fn insert_if_absent(&self, key: &str, entry: CachedStatement) -> CachedStatement {
        let mut inner = self.lock();

        if let Some(existing) = inner.map.get(key).cloned() {
            inner.touch(key);
            return existing;
        }

        inner.map.insert(key.to_string(), entry.clone());
        inner.track(key);
        entry
    }

    pub(super) fn replace(&self, key: &str, entry: CachedStatement) {
        let mut inner = self.lock();
        inner.map.insert(key.to_string(), entry);
        inner.track(key);
    }

    /// Drop the statement under `key`. Its column list, if any, stays.
    pub(super) fn remove(&self, key: &str) -> Option<CachedStatement> {
        let mut inner = self.lock();
        let removed = inner.map.remove(key);
        if removed.is_some() && !inner.columns.contains_key(key) {
            inner.remove_from_order(key);
        }
        removed
    }

    pub(super) fn columns(&self, key: &str) -> Option<Vec<String>> {
        let mut inner = self.lock();
        let columns = inner.columns.get(key).cloned()?;
        inner.touch(key);
        Some(columns)
    }

    pub(super) fn insert_columns(&self, key: &str, columns: Vec<String>) {
        let mut inner = self.lock();
        inner.columns.insert(key.to_string(), columns);
        inner.track(key);
    }

    pub(super) fn clear(&self) {
        let mut inner = self.lock();
        inner.map.clear();
        inner.columns.clear();
        inner.order.clear();
    }

    pub(super) fn len(&self) -> usize {
        self.lock().map.len()
    }
}

impl StatementCacheInner {
    fn track(&mut self, key: &str) {
        if self.order.iter().any(|k| k == key) {
            self.touch(key);
        } else {
            self.order.push_back(key.to_string());
            self.evict_if_needed();
        }
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn remove_from_order(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let _ = self.order.remove(pos);
        }
    }

    fn evict_if_needed(&mut self) {
        while self.order.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            let _ = self.map.remove(&oldest);
            let _ = self.columns.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sql: &str) -> CachedStatement {
        CachedStatement {
            sql: sql.to_string(),
            param_count: 0,
            prepared: None,
        }
    }

    #[test]
    fn first_insert_wins() {
        let cache = StatementCache::new(4);
        cache.insert_if_absent("k", entry("a"));
        let got = cache.insert_if_absent("k", entry("b"));
        assert_eq!(got.sql, "a");
        assert_eq!(cache.get("k").unwrap().sql, "a");
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = StatementCache::new(2);
        cache.insert_if_absent("a", entry("1"));
        cache.insert_if_absent("b", entry("2"));
        let _ = cache.get("a");
        cache.insert_if_absent("c", entry("3"));
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_capacity_is_disabled() {
        let cache = StatementCache::new(0);
        assert!(!cache.is_enabled());
        cache.insert_if_absent("a", entry("1"));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn column_lists_share_the_lru_bound() {
        let cache = StatementCache::new(2);
        cache.insert_columns("a", vec!["id".to_string()]);
        cache.insert_if_absent("a", entry("1"));
        cache.insert_columns("b", vec!["name".to_string()]);
        cache.insert_columns("c", vec!["age".to_string()]);
        assert!(cache.columns("a").is_none());
        assert!(cache.get("a").is_none());
        assert_eq!(cache.columns("c").unwrap(), vec!["age"]);

        let disabled = StatementCache::new(0);
        disabled.insert_columns("a", vec!["id".to_string()]);
        assert!(disabled.columns("a").is_none());
    }

    #[test]
    fn remove_keeps_column_list() {
        let cache = StatementCache::new(4);
        cache.insert_columns("a", vec!["id".to_string()]);
        cache.insert_if_absent("a", entry("1"));
        assert!(cache.remove("a").is_some());
        assert_eq!(cache.columns("a").unwrap(), vec!["id"]);
        cache.clear();
        assert!(cache.columns("a").is_none());
    }

    #[test]
    fn remove_and_clear() {
        let cache = StatementCache::new(4);
        cache.insert_if_absent("a", entry("1"));
        cache.replace("b", entry("2"));
        assert!(cache.remove("a").is_some());
        assert!(cache.remove("a").is_none());
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
