//! Inventory service: five product operations over tarpc, backed by a
//! hash-per-record key-value store.

pub mod error;
pub mod limits;
pub mod menu;
pub mod rpc;
pub mod scan;
pub mod service;
pub mod shared_types;
pub mod store;
pub mod telemetry;

pub use error::{InventoryError, InventoryResult, StoreError, StoreResult};
pub use rpc::InventoryServer;
pub use scan::ScanLockPolicy;
pub use service::InventoryHandler;
pub use shared_types::*;
