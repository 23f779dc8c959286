//! Lazy listing of every stored product.

use std::sync::Arc;
use std::vec;

use clap::ValueEnum;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::StoreError;
use crate::shared_types::Product;
use crate::store::{decode_product, InventoryStore, ALL_KEYS};

/// How long a listing holds the inventory lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ScanLockPolicy {
    /// Hold the lock from key enumeration until the last record is fetched.
    /// No mutation can land while a listing is in progress.
    #[default]
    HoldForScan,
    /// Release the lock as soon as the key list is captured. Records deleted
    /// afterwards are skipped and quantity updates may show through.
    SnapshotKeys,
}

enum ScanState {
    Start,
    Streaming {
        keys: vec::IntoIter<String>,
        guard: Option<OwnedMutexGuard<()>>,
    },
    Done,
}

/// Streams one record per stored key.
///
/// An empty store yields the not-found sentinel alone. A store failure ends
/// the stream with the store-unavailable sentinel, so a cut-short listing is
/// never mistaken for a complete one.
pub fn scan_products<S: InventoryStore>(
    store: Arc<S>,
    lock: Arc<Mutex<()>>,
    policy: ScanLockPolicy,
) -> BoxStream<'static, Product> {
    stream::unfold(ScanState::Start, move |state| {
        let store = store.clone();
        let lock = lock.clone();
        async move {
            match state {
                ScanState::Start => {
                    let guard = lock.lock_owned().await;
                    let keys = match store.list_keys(ALL_KEYS).await {
                        Ok(keys) => keys,
                        Err(e) => return Some(failed(e)),
                    };
                    if keys.is_empty() {
                        tracing::info!("store holds no products");
                        return Some((Product::not_found(), ScanState::Done));
                    }

                    tracing::info!(count = keys.len(), "streaming out all products");
                    let guard = match policy {
                        ScanLockPolicy::HoldForScan => Some(guard),
                        ScanLockPolicy::SnapshotKeys => {
                            drop(guard);
                            None
                        }
                    };
                    first_record(store.as_ref(), keys.into_iter(), guard).await
                }
                ScanState::Streaming { keys, guard } => {
                    next_record(store.as_ref(), keys, guard).await
                }
                ScanState::Done => None,
            }
        }
    })
    .boxed()
}

/// Like [`next_record`], but a snapshot whose keys all vanished before
/// they could be fetched still answers with the empty-store sentinel.
async fn first_record<S: InventoryStore>(
    store: &S,
    keys: vec::IntoIter<String>,
    guard: Option<OwnedMutexGuard<()>>,
) -> Option<(Product, ScanState)> {
    match next_record(store, keys, guard).await {
        Some(item) => Some(item),
        None => {
            tracing::info!("every listed product vanished before it was fetched");
            Some((Product::not_found(), ScanState::Done))
        }
    }
}

async fn next_record<S: InventoryStore>(
    store: &S,
    mut keys: vec::IntoIter<String>,
    guard: Option<OwnedMutexGuard<()>>,
) -> Option<(Product, ScanState)> {
    while let Some(key) = keys.next() {
        let fields = match store.read_fields(&key).await {
            Ok(fields) => fields,
            Err(e) => return Some(failed(e)),
        };
        // Deleted since the key list was captured.
        if fields.is_empty() {
            tracing::debug!(key = %key, "product vanished during scan");
            continue;
        }
        return match decode_product(&key, &fields) {
            Ok(product) => Some((product, ScanState::Streaming { keys, guard })),
            Err(e) => Some(failed(e)),
        };
    }
    None
}

fn failed(e: StoreError) -> (Product, ScanState) {
    match &e {
        StoreError::Unavailable(_) => tracing::error!(error = %e, "listing aborted"),
        StoreError::Malformed { .. } => tracing::error!(error = %e, "listing hit a corrupt record"),
    }
    (Product::store_unavailable(), ScanState::Done)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::store::{encode_fields, product_key, MemoryStore};

    async fn seeded(ids: &[i64]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for &id in ids {
            let product = Product::new(id, format!("item-{id}"), id * 2, 1.25);
            store
                .write_fields(&product_key(id), &encode_fields(&product))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn empty_store_yields_one_sentinel() {
        let store = seeded(&[]).await;
        let lock = Arc::new(Mutex::new(()));
        let items: Vec<Product> = scan_products(store, lock, ScanLockPolicy::HoldForScan)
            .collect()
            .await;
        assert_eq!(items, vec![Product::not_found()]);
    }

    #[tokio::test]
    async fn yields_each_record_once() {
        let store = seeded(&[3, 1, 2]).await;
        let lock = Arc::new(Mutex::new(()));
        let mut ids: Vec<i64> = scan_products(store, lock, ScanLockPolicy::HoldForScan)
            .map(|p| p.product_identifier)
            .collect()
            .await;
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn hold_for_scan_keeps_the_lock_until_the_end() {
        let store = seeded(&[1, 2]).await;
        let lock = Arc::new(Mutex::new(()));
        let mut scan = scan_products(store, lock.clone(), ScanLockPolicy::HoldForScan);

        assert!(scan.next().await.is_some());
        assert!(lock.try_lock().is_err());
        assert!(scan.next().await.is_some());
        assert!(scan.next().await.is_none());
        assert!(lock.try_lock().is_ok());
    }

    #[tokio::test]
    async fn snapshot_releases_the_lock_after_enumeration() {
        let store = seeded(&[1, 2]).await;
        let lock = Arc::new(Mutex::new(()));
        let mut scan = scan_products(store.clone(), lock.clone(), ScanLockPolicy::SnapshotKeys);

        assert!(scan.next().await.is_some());
        assert!(lock.try_lock().is_ok());

        // Whatever is left of the snapshot may be gone by now.
        store.delete("2").await.unwrap();
        assert!(scan.next().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn snapshot_does_not_hold_the_lock_while_fetching() {
        let store = Arc::new(MemoryStore::with_latency(Duration::from_millis(200)));
        for id in [1, 2] {
            let product = Product::new(id, "Bolt", 1, 0.1);
            store
                .write_fields(&product_key(id), &encode_fields(&product))
                .await
                .unwrap();
        }
        let lock = Arc::new(Mutex::new(()));
        let mut scan = scan_products(store, lock.clone(), ScanLockPolicy::SnapshotKeys);
        let first = tokio::spawn(async move { scan.next().await });

        // KEYS has answered by now and the first HGETALL is still sleeping.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!first.is_finished());
        assert!(lock.try_lock().is_ok());

        assert!(first.await.unwrap().is_some());
    }

    #[tokio::test]
    async fn vanished_snapshot_answers_with_empty_sentinel() {
        let store = seeded(&[]).await;
        let keys = vec!["1".to_string(), "2".to_string()].into_iter();

        let (product, state) = first_record(store.as_ref(), keys, None).await.unwrap();
        assert_eq!(product, Product::not_found());
        assert!(matches!(state, ScanState::Done));
    }

    #[tokio::test]
    async fn unreachable_store_ends_with_failure_sentinel() {
        let store = seeded(&[1]).await;
        store.set_offline(true);
        let lock = Arc::new(Mutex::new(()));
        let items: Vec<Product> = scan_products(store, lock.clone(), ScanLockPolicy::HoldForScan)
            .collect()
            .await;
        assert_eq!(items, vec![Product::store_unavailable()]);
        assert!(lock.try_lock().is_ok());
    }

    #[tokio::test]
    async fn failure_mid_scan_is_trailed_by_sentinel() {
        let store = seeded(&[1, 2]).await;
        let lock = Arc::new(Mutex::new(()));
        let mut scan = scan_products(store.clone(), lock, ScanLockPolicy::HoldForScan);

        let first = scan.next().await.unwrap();
        assert_eq!(first.product_identifier, 1);

        store.set_offline(true);
        assert_eq!(scan.next().await, Some(Product::store_unavailable()));
        assert_eq!(scan.next().await, None);
    }

    #[tokio::test]
    async fn corrupt_record_aborts_the_listing() {
        let store = seeded(&[1]).await;
        store
            .update_field("1", crate::store::FIELD_PRICE, "cheap")
            .await
            .unwrap();
        let lock = Arc::new(Mutex::new(()));
        let items: Vec<Product> = scan_products(store, lock, ScanLockPolicy::HoldForScan)
            .collect()
            .await;
        assert_eq!(items, vec![Product::store_unavailable()]);
    }
}
