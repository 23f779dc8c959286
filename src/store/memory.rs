//! In-process store with the same semantics as the Redis backend.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{FieldMap, InventoryStore};
use crate::error::{StoreError, StoreResult};

/// Hash-per-key store held in memory.
///
/// Can be switched offline to make every command fail as an unreachable
/// store would, and can add latency to each command so concurrent callers
/// get a chance to interleave. Every command is recorded in a journal.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<BTreeMap<String, FieldMap>>,
    journal: Mutex<Vec<String>>,
    offline: AtomicBool,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `latency` before every command.
    pub fn with_latency(latency: Duration) -> Self {
        MemoryStore {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Commands issued so far, oldest first, as `"<command> <key>"`.
    pub fn journal(&self) -> Vec<String> {
        lock(&self.journal).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.data).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn command(
        &self,
        name: &str,
        key: &str,
    ) -> StoreResult<MutexGuard<'_, BTreeMap<String, FieldMap>>> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("connection refused"));
        }
        lock(&self.journal).push(format!("{name} {key}"));
        Ok(lock(&self.data))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Glob match supporting `*` wildcards only.
fn matches(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return key.is_empty();
    };
    let Some(mut rest) = key.strip_prefix(first) else {
        return false;
    };
    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let data = self.command("exists", key).await?;
        Ok(data.contains_key(key))
    }

    async fn write_fields(&self, key: &str, fields: &FieldMap) -> StoreResult<()> {
        let mut data = self.command("hset", key).await?;
        let record = data.entry(key.to_string()).or_default();
        for (field, value) in fields {
            record.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn read_fields(&self, key: &str) -> StoreResult<FieldMap> {
        let data = self.command("hgetall", key).await?;
        Ok(data.get(key).cloned().unwrap_or_default())
    }

    async fn update_field(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut data = self.command("hset", key).await?;
        data.entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut data = self.command("del", key).await?;
        Ok(data.remove(key).is_some())
    }

    async fn list_keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let data = self.command("keys", pattern).await?;
        Ok(data.keys().filter(|k| matches(pattern, k)).cloned().collect())
    }
}
