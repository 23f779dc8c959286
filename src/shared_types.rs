use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier carried by the "does not exist" sentinel record.
pub const NOT_FOUND_ID: i64 = -1;
/// Identifier carried by the "store unreachable" sentinel record.
pub const STORE_UNAVAILABLE_ID: i64 = -2;
/// Name carried by both sentinel records.
pub const SENTINEL_NAME: &str = "NULL";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_identifier: i64,
    pub product_name: String,
    pub product_quantity: i64,
    pub product_price: f64,
}

impl Product {
    pub fn new(identifier: i64, name: impl Into<String>, quantity: i64, price: f64) -> Self {
        Product {
            product_identifier: identifier,
            product_name: name.into(),
            product_quantity: quantity,
            product_price: price,
        }
    }

    /// Sentinel returned when the requested identifier is absent.
    pub fn not_found() -> Self {
        Self::sentinel(NOT_FOUND_ID)
    }

    /// Sentinel returned when the backing store could not be reached.
    pub fn store_unavailable() -> Self {
        Self::sentinel(STORE_UNAVAILABLE_ID)
    }

    fn sentinel(identifier: i64) -> Self {
        Product::new(identifier, SENTINEL_NAME, -1, -1.0)
    }

    pub fn is_not_found(&self) -> bool {
        self.product_identifier == NOT_FOUND_ID
    }

    pub fn is_store_unavailable(&self) -> bool {
        self.product_identifier == STORE_UNAVAILABLE_ID
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\tProduct ID: {}\n\tProduct Name: {}\n\tProduct Quantity: x{}\n\tProduct Price: ${:.2}",
            self.product_identifier, self.product_name, self.product_quantity, self.product_price
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductIdentifier {
    pub product_identifier: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity {
    pub product_identifier: i64,
    pub product_quantity: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub status: String,
}

impl Status {
    pub const INVALID_IDENTIFIER: &'static str = "Cannot have a Product ID less than 0.";
    pub const ALREADY_EXISTS: &'static str = "Product already exists and was NOT added. \nTry deleting the product first, or change the Product ID.";
    pub const ADDED: &'static str = "Product successfully added.";
    pub const ADD_FAILED: &'static str = "Server failure. Product was NOT added.";
    pub const NOT_FOUND: &'static str = "Product does not exist and was NOT deleted.";
    pub const DELETED: &'static str = "Product successfully deleted.";
    pub const DELETE_FAILED: &'static str = "Server failure. Product was NOT deleted.";

    pub fn new(status: impl Into<String>) -> Self {
        Status { status: status.into() }
    }
}

#[tarpc::service]
pub trait InventoryService {
    /// Add a product unless its identifier is taken
    async fn add_product(product: Product) -> Status;
    /// Look a product up by identifier
    async fn get_product_by_id(id: ProductIdentifier) -> Product;
    /// Overwrite the quantity of an existing product
    async fn update_product_quantity(quantity: Quantity) -> Product;
    /// Delete a product by identifier
    async fn delete_product(id: ProductIdentifier) -> Status;
    /// Every stored product, or a single not-found sentinel when empty
    async fn get_all_products() -> Vec<Product>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_use_reserved_values() {
        let missing = Product::not_found();
        assert_eq!(missing, Product::new(-1, "NULL", -1, -1.0));
        assert!(missing.is_not_found());
        assert!(!missing.is_store_unavailable());

        let down = Product::store_unavailable();
        assert_eq!(down, Product::new(-2, "NULL", -1, -1.0));
        assert!(down.is_store_unavailable());
    }

    #[test]
    fn price_renders_with_two_decimals() {
        let rendered = Product::new(1, "Widget", 10, 2.5).to_string();
        assert!(rendered.contains("Product Price: $2.50"));
        assert!(rendered.contains("Product Quantity: x10"));
    }
}
