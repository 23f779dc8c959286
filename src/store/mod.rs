//! Key-value adapters backing the inventory.
//!
//! A product lives under its identifier as a hash of three text fields. The
//! store has no index of its own: enumerating keys is the product listing.

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::shared_types::Product;

pub const FIELD_NAME: &str = "product_name";
pub const FIELD_QUANTITY: &str = "product_quantity";
pub const FIELD_PRICE: &str = "product_price";

/// Pattern matching every key in the store.
pub const ALL_KEYS: &str = "*";

/// Named scalar fields of one record, all stored as text.
pub type FieldMap = HashMap<String, String>;

/// Primitive operations the inventory needs from its backing store.
///
/// None of these are atomic with each other; callers that need a
/// check-then-act sequence must serialize it themselves.
#[async_trait]
pub trait InventoryStore: Send + Sync + 'static {
    /// Whether `key` holds a record.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Writes every field in `fields` under `key`, creating the record if needed.
    async fn write_fields(&self, key: &str, fields: &FieldMap) -> StoreResult<()>;

    /// All fields stored under `key`; empty when the key is absent.
    async fn read_fields(&self, key: &str) -> StoreResult<FieldMap>;

    /// Overwrites a single field, leaving the others untouched.
    async fn update_field(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    /// Removes `key`, returning whether anything was deleted.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Keys matching a glob `pattern`, in store enumeration order.
    async fn list_keys(&self, pattern: &str) -> StoreResult<Vec<String>>;
}

pub fn product_key(identifier: i64) -> String {
    identifier.to_string()
}

/// Field-map representation of `product`; the identifier is the key, not a field.
pub fn encode_fields(product: &Product) -> FieldMap {
    FieldMap::from([
        (FIELD_NAME.to_string(), product.product_name.clone()),
        (FIELD_QUANTITY.to_string(), product.product_quantity.to_string()),
        (FIELD_PRICE.to_string(), product.product_price.to_string()),
    ])
}

/// Rebuilds a product from its key and stored fields.
///
/// A missing or unparsable field is an error, never a default.
pub fn decode_product(key: &str, fields: &FieldMap) -> StoreResult<Product> {
    let identifier = key
        .parse::<i64>()
        .map_err(|e| StoreError::malformed(key, format!("key is not an integer: {e}")))?;
    let name = field(key, fields, FIELD_NAME)?;
    let quantity = field(key, fields, FIELD_QUANTITY)?
        .parse::<i64>()
        .map_err(|e| StoreError::malformed(key, format!("{FIELD_QUANTITY}: {e}")))?;
    let price = field(key, fields, FIELD_PRICE)?
        .parse::<f64>()
        .map_err(|e| StoreError::malformed(key, format!("{FIELD_PRICE}: {e}")))?;

    Ok(Product::new(identifier, name, quantity, price))
}

fn field<'a>(key: &str, fields: &'a FieldMap, name: &str) -> StoreResult<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| StoreError::malformed(key, format!("missing field {name}")))
}
