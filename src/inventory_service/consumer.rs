use super::ProductUsecase;
use crate::model::OrderCreated;
use async_trait::async_trait;
use storefront_kit::{DomainEvent, EventHandler, ServiceError};
use tracing::{debug, error, info};

/// Applies `order.created` to inventory: one stock decrement per line item.
///
/// Items are decremented independently. A failing item (unknown product,
/// insufficient stock) is logged and the rest are still applied; the first
/// failure is returned so the consumer logs the event as failed. There is no
/// deduplication, so a redelivered event decrements twice.
#[derive(Clone)]
pub struct StockDecrementHandler {
    products: ProductUsecase,
}

impl StockDecrementHandler {
    pub fn new(products: ProductUsecase) -> Self {
        Self { products }
    }
}

#[async_trait]
impl EventHandler for StockDecrementHandler {
    async fn handle(&self, event: DomainEvent) -> Result<(), ServiceError> {
        let created: OrderCreated = event
            .decode()
            .map_err(|e| ServiceError::validation(format!("malformed order.created payload: {e}")))?;
        debug!(order_id = %created.order_id, items = created.items.len(), "Applying order to inventory");

        let mut first_failure = None;
        for item in &created.items {
            if let Err(e) = self.products.decrease_stock(item.product_id, item.quantity).await {
                error!(
                    order_id = %created.order_id,
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    error = %e,
                    "Stock decrement failed"
                );
                first_failure.get_or_insert(e);
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => {
                info!(order_id = %created.order_id, "Inventory updated for order");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LineItem, OrderId, Product, ProductCreate, ProductId};
    use std::sync::Arc;
    use storefront_kit::mock::OfflineCounterStore;
    use storefront_kit::{
        EventKind, IdentifierAllocator, MemoryCache, ReadThroughCache, StoreActor, DEFAULT_CACHE_TTL,
    };

    async fn handler_with_stock(stock: &[(u64, u32)]) -> (StockDecrementHandler, ProductUsecase) {
        let (actor, products) = StoreActor::<Product>::new(16);
        tokio::spawn(actor.run());
        for &(id, stock) in stock {
            let product = Product::new(
                ProductId(id),
                ProductCreate {
                    name: format!("p{id}"),
                    description: "d".into(),
                    category: "c".into(),
                    price: 1.0,
                    stock,
                },
            );
            products.insert(product).await.unwrap();
        }
        let usecase = ProductUsecase::new(
            products,
            IdentifierAllocator::new(Arc::new(OfflineCounterStore)),
            ReadThroughCache::new(Arc::new(MemoryCache::new()), DEFAULT_CACHE_TTL),
        );
        (StockDecrementHandler::new(usecase.clone()), usecase)
    }

    fn event(items: Vec<LineItem>) -> DomainEvent {
        let payload = OrderCreated {
            order_id: OrderId(1),
            user_id: "u1".into(),
            items,
        };
        DomainEvent::new(EventKind::ResourceCreated, "order", &payload).unwrap()
    }

    #[tokio::test]
    async fn decrements_every_line_item() {
        let (handler, products) = handler_with_stock(&[(1, 10), (2, 4)]).await;
        handler
            .handle(event(vec![
                LineItem {
                    product_id: ProductId(1),
                    quantity: 3,
                },
                LineItem {
                    product_id: ProductId(2),
                    quantity: 4,
                },
            ]))
            .await
            .unwrap();

        assert_eq!(products.get_product(ProductId(1)).await.unwrap().stock, 7);
        assert_eq!(products.get_product(ProductId(2)).await.unwrap().stock, 0);
    }

    #[tokio::test]
    async fn one_bad_item_does_not_block_the_others() {
        let (handler, products) = handler_with_stock(&[(1, 10)]).await;
        let err = handler
            .handle(event(vec![
                LineItem {
                    product_id: ProductId(99),
                    quantity: 1,
                },
                LineItem {
                    product_id: ProductId(1),
                    quantity: 2,
                },
            ]))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::NotFound { .. }));
        assert_eq!(products.get_product(ProductId(1)).await.unwrap().stock, 8);
    }

    #[tokio::test]
    async fn redelivery_decrements_again() {
        let (handler, products) = handler_with_stock(&[(1, 10)]).await;
        let evt = event(vec![LineItem {
            product_id: ProductId(1),
            quantity: 2,
        }]);
        handler.handle(evt.clone()).await.unwrap();
        handler.handle(evt).await.unwrap();

        assert_eq!(products.get_product(ProductId(1)).await.unwrap().stock, 6);
    }

    #[tokio::test]
    async fn foreign_payload_is_rejected() {
        let (handler, _) = handler_with_stock(&[]).await;
        let evt = DomainEvent::new(EventKind::ResourceCreated, "order", &"not an order").unwrap();
        assert!(matches!(handler.handle(evt).await, Err(ServiceError::Validation(_))));
    }
}
