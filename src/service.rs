//! Inventory operations against an [`InventoryStore`].
//!
//! Every operation logs one audit line before it touches the store and always
//! answers with a well-formed value: failures become sentinel records or
//! status strings.

use std::sync::Arc;

use futures::stream::BoxStream;
use tokio::sync::Mutex;

use crate::error::{InventoryError, InventoryResult};
use crate::scan::{scan_products, ScanLockPolicy};
use crate::shared_types::{Product, Quantity, Status};
use crate::store::{decode_product, encode_fields, product_key, InventoryStore, FIELD_QUANTITY};

/// Log target for the one-line-per-request audit trail.
pub const AUDIT_TARGET: &str = "inventory::audit";

pub struct InventoryHandler<S> {
    store: Arc<S>,
    // Serializes check-then-act sequences across all requests.
    lock: Arc<Mutex<()>>,
    scan_policy: ScanLockPolicy,
}

impl<S> Clone for InventoryHandler<S> {
    fn clone(&self) -> Self {
        InventoryHandler {
            store: self.store.clone(),
            lock: self.lock.clone(),
            scan_policy: self.scan_policy,
        }
    }
}

impl<S: InventoryStore> InventoryHandler<S> {
    pub fn new(store: Arc<S>, scan_policy: ScanLockPolicy) -> Self {
        InventoryHandler {
            store,
            lock: Arc::new(Mutex::new(())),
            scan_policy,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn add_product(&self, product: Product) -> Status {
        tracing::info!(
            target: AUDIT_TARGET,
            op = "add_product",
            id = product.product_identifier,
            name = %product.product_name,
            quantity = product.product_quantity,
            price = product.product_price,
            "request"
        );
        match self.try_add(&product).await {
            Ok(()) => {
                tracing::info!(id = product.product_identifier, "product added");
                Status::new(Status::ADDED)
            }
            Err(InventoryError::InvalidInput(id)) => {
                tracing::info!(id, "rejected negative product id");
                Status::new(Status::INVALID_IDENTIFIER)
            }
            Err(InventoryError::AlreadyExists(id)) => {
                tracing::info!(id, "product exists, not added");
                Status::new(Status::ALREADY_EXISTS)
            }
            Err(e) => {
                report(&e);
                Status::new(Status::ADD_FAILED)
            }
        }
    }

    // Not serialized with the other operations: two concurrent adds of the
    // same id can both pass the existence check.
    async fn try_add(&self, product: &Product) -> InventoryResult<()> {
        if product.product_identifier < 0 {
            return Err(InventoryError::InvalidInput(product.product_identifier));
        }
        let key = product_key(product.product_identifier);
        if self.store.exists(&key).await? {
            return Err(InventoryError::AlreadyExists(product.product_identifier));
        }
        self.store.write_fields(&key, &encode_fields(product)).await?;
        Ok(())
    }

    pub async fn get_product_by_id(&self, identifier: i64) -> Product {
        tracing::info!(target: AUDIT_TARGET, op = "get_product_by_id", id = identifier, "request");
        let found = {
            let _guard = self.lock.lock().await;
            self.try_get(identifier).await
        };
        self.product_response(identifier, found, "product found")
    }

    async fn try_get(&self, identifier: i64) -> InventoryResult<Product> {
        let key = product_key(identifier);
        if !self.store.exists(&key).await? {
            return Err(InventoryError::NotFound(identifier));
        }
        let fields = self.store.read_fields(&key).await?;
        Ok(decode_product(&key, &fields)?)
    }

    pub async fn update_product_quantity(&self, update: Quantity) -> Product {
        let identifier = update.product_identifier;
        tracing::info!(
            target: AUDIT_TARGET,
            op = "update_product_quantity",
            id = identifier,
            quantity = update.product_quantity,
            "request"
        );
        let updated = {
            let _guard = self.lock.lock().await;
            self.try_update(update).await
        };
        self.product_response(identifier, updated, "product found, quantity updated")
    }

    async fn try_update(&self, update: Quantity) -> InventoryResult<Product> {
        let key = product_key(update.product_identifier);
        if !self.store.exists(&key).await? {
            return Err(InventoryError::NotFound(update.product_identifier));
        }
        self.store
            .update_field(&key, FIELD_QUANTITY, &update.product_quantity.to_string())
            .await?;
        let fields = self.store.read_fields(&key).await?;
        Ok(decode_product(&key, &fields)?)
    }

    pub async fn delete_product(&self, identifier: i64) -> Status {
        tracing::info!(target: AUDIT_TARGET, op = "delete_product", id = identifier, "request");
        let deleted = {
            let _guard = self.lock.lock().await;
            self.try_delete(identifier).await
        };
        match deleted {
            Ok(()) => {
                tracing::info!(id = identifier, "product deleted");
                Status::new(Status::DELETED)
            }
            Err(InventoryError::NotFound(id)) => {
                tracing::info!(id, "product does not exist, not deleted");
                Status::new(Status::NOT_FOUND)
            }
            Err(e) => {
                report(&e);
                Status::new(Status::DELETE_FAILED)
            }
        }
    }

    async fn try_delete(&self, identifier: i64) -> InventoryResult<()> {
        let key = product_key(identifier);
        if !self.store.exists(&key).await? {
            return Err(InventoryError::NotFound(identifier));
        }
        self.store.delete(&key).await?;
        Ok(())
    }

    /// Lazily lists every product; see [`scan_products`] for the sentinel rules.
    pub fn get_all_products(&self) -> BoxStream<'static, Product> {
        tracing::info!(target: AUDIT_TARGET, op = "get_all_products", "request");
        scan_products(self.store.clone(), self.lock.clone(), self.scan_policy)
    }

    fn product_response(
        &self,
        identifier: i64,
        result: InventoryResult<Product>,
        found: &str,
    ) -> Product {
        match result {
            Ok(product) => {
                tracing::info!(id = identifier, "{found}");
                product
            }
            Err(InventoryError::NotFound(id)) => {
                tracing::info!(id, "product does not exist");
                Product::not_found()
            }
            Err(e) => {
                report(&e);
                Product::store_unavailable()
            }
        }
    }
}

fn report(e: &InventoryError) {
    match e {
        InventoryError::StoreUnavailable(_) => {
            tracing::error!(error = %e, "error connecting to the store, is it running?")
        }
        _ => tracing::error!(error = %e, "request failed"),
    }
}
