//! tarpc front end for [`InventoryHandler`].

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use tarpc::context;
use tokio::sync::Semaphore;

use crate::service::InventoryHandler;
use crate::shared_types::{InventoryService, Product, ProductIdentifier, Quantity, Status};
use crate::store::InventoryStore;

/// Serves inventory requests with at most `max_in_flight` running at once.
pub struct InventoryServer<S> {
    handler: InventoryHandler<S>,
    workers: Arc<Semaphore>,
}

impl<S> Clone for InventoryServer<S> {
    fn clone(&self) -> Self {
        InventoryServer {
            handler: self.handler.clone(),
            workers: self.workers.clone(),
        }
    }
}

impl<S: InventoryStore> InventoryServer<S> {
    pub fn new(handler: InventoryHandler<S>, max_in_flight: usize) -> Self {
        InventoryServer {
            handler,
            workers: Arc::new(Semaphore::new(max_in_flight)),
        }
    }
}

impl<S: InventoryStore> InventoryService for InventoryServer<S> {
    type AddProductFut = BoxFuture<'static, Status>;
    type GetProductByIdFut = BoxFuture<'static, Product>;
    type UpdateProductQuantityFut = BoxFuture<'static, Product>;
    type DeleteProductFut = BoxFuture<'static, Status>;
    type GetAllProductsFut = BoxFuture<'static, Vec<Product>>;

    fn add_product(self, _: context::Context, product: Product) -> Self::AddProductFut {
        async move {
            let _worker = self.workers.acquire().await;
            self.handler.add_product(product).await
        }
        .boxed()
    }

    fn get_product_by_id(self, _: context::Context, id: ProductIdentifier) -> Self::GetProductByIdFut {
        async move {
            let _worker = self.workers.acquire().await;
            self.handler.get_product_by_id(id.product_identifier).await
        }
        .boxed()
    }

    fn update_product_quantity(
        self,
        _: context::Context,
        quantity: Quantity,
    ) -> Self::UpdateProductQuantityFut {
        async move {
            let _worker = self.workers.acquire().await;
            self.handler.update_product_quantity(quantity).await
        }
        .boxed()
    }

    fn delete_product(self, _: context::Context, id: ProductIdentifier) -> Self::DeleteProductFut {
        async move {
            let _worker = self.workers.acquire().await;
            self.handler.delete_product(id.product_identifier).await
        }
        .boxed()
    }

    // tarpc has no server-streaming calls, so the lazy listing is drained
    // here. Order, the empty sentinel and a trailing failure sentinel all
    // survive the trip.
    fn get_all_products(self, _: context::Context) -> Self::GetAllProductsFut {
        async move {
            let _worker = self.workers.acquire().await;
            self.handler.get_all_products().collect::<Vec<_>>().await
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::ScanLockPolicy;
    use crate::store::MemoryStore;
    use tarpc::{client, server::{self, Channel}};

    async fn connect(store: Arc<MemoryStore>) -> crate::shared_types::InventoryServiceClient {
        let (client_transport, server_transport) = tarpc::transport::channel::unbounded();
        let server = InventoryServer::new(
            InventoryHandler::new(store, ScanLockPolicy::HoldForScan),
            10,
        );
        let channel = server::BaseChannel::with_defaults(server_transport);
        tokio::spawn(channel.execute(server.serve()));

        crate::shared_types::InventoryServiceClient::new(client::Config::default(), client_transport)
            .spawn()
    }

    #[tokio::test]
    async fn round_trip_over_tarpc() {
        let client = connect(Arc::new(MemoryStore::new())).await;

        let listing = client.get_all_products(context::current()).await.unwrap();
        assert_eq!(listing, vec![Product::not_found()]);

        let status = client
            .add_product(context::current(), Product::new(1, "Widget", 10, 2.50))
            .await
            .unwrap();
        assert_eq!(status.status, Status::ADDED);

        let id = ProductIdentifier {
            product_identifier: 1,
        };
        let found = client.get_product_by_id(context::current(), id).await.unwrap();
        assert_eq!(found, Product::new(1, "Widget", 10, 2.50));

        let updated = client
            .update_product_quantity(
                context::current(),
                Quantity {
                    product_identifier: 1,
                    product_quantity: 3,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.product_quantity, 3);

        let listing = client.get_all_products(context::current()).await.unwrap();
        assert_eq!(listing, vec![Product::new(1, "Widget", 3, 2.50)]);

        let status = client.delete_product(context::current(), id).await.unwrap();
        assert_eq!(status.status, Status::DELETED);
        let status = client.delete_product(context::current(), id).await.unwrap();
        assert_eq!(status.status, Status::NOT_FOUND);
    }

    #[tokio::test]
    async fn store_outage_reaches_the_client_as_sentinels() {
        let store = Arc::new(MemoryStore::new());
        let client = connect(store.clone()).await;
        store.set_offline(true);

        let id = ProductIdentifier {
            product_identifier: 1,
        };
        let found = client.get_product_by_id(context::current(), id).await.unwrap();
        assert!(found.is_store_unavailable());

        let listing = client.get_all_products(context::current()).await.unwrap();
        assert_eq!(listing, vec![Product::store_unavailable()]);
    }
}
