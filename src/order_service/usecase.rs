use crate::model::{Order, OrderCreate, OrderCreated, OrderFilter, OrderId, OrderPatch, OrderStatus};
use storefront_kit::{
    CacheKey, Document, EventKind, IdentifierAllocator, Page, ReadThroughCache, ServiceError,
    SideChannel, StoreClient, StoreError,
};
use tracing::{debug, info, instrument, warn};

pub(crate) fn order_key(id: OrderId) -> CacheKey {
    CacheKey::new(Order::KIND, id)
}

pub(crate) fn user_orders_key(user_id: &str) -> CacheKey {
    CacheKey::new("user_orders", user_id)
}

/// Orchestrates the order service: allocator, store, cache and the
/// `order.created` side channel around each mutation.
#[derive(Clone)]
pub struct OrderUsecase {
    orders: StoreClient<Order>,
    ids: IdentifierAllocator,
    cache: ReadThroughCache,
    events: SideChannel,
    transition_retries: u32,
}

impl OrderUsecase {
    pub fn new(
        orders: StoreClient<Order>,
        ids: IdentifierAllocator,
        cache: ReadThroughCache,
        events: SideChannel,
        transition_retries: u32,
    ) -> Self {
        Self {
            orders,
            ids,
            cache,
            events,
            transition_retries,
        }
    }

    /// Places an order in `PENDING`.
    ///
    /// Succeeds once the order is stored. The `order.created` event is
    /// published afterwards and its outcome never changes the result.
    #[instrument(skip(self, params), fields(user_id = %params.user_id))]
    pub async fn create_order(&self, params: OrderCreate) -> Result<Order, ServiceError> {
        debug!(?params, "create_order called");
        validate_create(&params)?;

        let id = OrderId(self.ids.next(Order::KIND).await?);
        let order = Order::new(id, params);
        self.orders.insert(order.clone()).await?;
        info!(%id, items = order.items.len(), total = order.total, "Order created");

        self.cache.invalidate(&user_orders_key(&order.user_id)).await;
        self.events
            .emit_payload(EventKind::ResourceCreated, Order::KIND, &OrderCreated::from(&order))
            .await;

        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, id: OrderId) -> Result<Order, ServiceError> {
        self.cache
            .get_or_fetch(&order_key(id), || async {
                self.orders
                    .get(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found(Order::KIND, id))
            })
            .await
    }

    /// Moves the order to `status` (`"COMPLETED"`, `"CANCELLED"`, ...).
    ///
    /// The write only lands if the order still has the status that was
    /// validated; otherwise the order is re-read and re-validated, so two
    /// racing callers can't both succeed.
    #[instrument(skip(self))]
    pub async fn update_order_status(&self, id: OrderId, status: &str) -> Result<Order, ServiceError> {
        let requested = status.trim();
        if requested.is_empty() {
            return Err(ServiceError::validation("status is required"));
        }
        self.transition(id, requested).await
    }

    /// Shorthand for the transition to `CANCELLED`.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, id: OrderId) -> Result<Order, ServiceError> {
        self.transition(id, OrderStatus::Cancelled.as_str()).await
    }

    #[instrument(skip(self))]
    pub async fn list_user_orders(&self, user_id: &str) -> Result<Vec<Order>, ServiceError> {
        if user_id.trim().is_empty() {
            return Err(ServiceError::validation("user_id is required"));
        }
        self.cache
            .get_or_fetch(&user_orders_key(user_id), || async {
                let (orders, total) = self.orders.find(OrderFilter::user(user_id), Page::all()).await?;
                debug!(total, "Loaded user orders from store");
                Ok::<_, ServiceError>(orders)
            })
            .await
    }

    async fn transition(&self, id: OrderId, requested: &str) -> Result<Order, ServiceError> {
        for attempt in 0..=self.transition_retries {
            let current = self
                .orders
                .get(id)
                .await?
                .ok_or_else(|| ServiceError::not_found(Order::KIND, id))?;

            let target: OrderStatus = requested
                .parse()
                .map_err(|_| ServiceError::invalid_transition(current.status, requested))?;
            current.status.transition_to(target)?;

            let guard = OrderFilter::guarded(id, current.status);
            match self.orders.update_one(guard, OrderPatch::SetStatus(target)).await? {
                Some(updated) => {
                    info!(%id, from = %current.status, to = %target, "Order status changed");
                    self.cache.invalidate(&order_key(id)).await;
                    self.cache.invalidate(&user_orders_key(&updated.user_id)).await;
                    return Ok(updated);
                }
                None => {
                    warn!(%id, attempt, observed = %current.status, "Status changed concurrently, re-validating");
                }
            }
        }

        Err(StoreError::Conflict(format!("{}:{id}", Order::KIND)).into())
    }
}

fn validate_create(params: &OrderCreate) -> Result<(), ServiceError> {
    if params.user_id.trim().is_empty() {
        return Err(ServiceError::validation("user_id is required"));
    }
    if params.items.is_empty() {
        return Err(ServiceError::validation("order must contain at least one item"));
    }
    if let Some(item) = params.items.iter().find(|i| i.product_id.0 == 0) {
        return Err(ServiceError::validation(format!(
            "invalid product id in order: {}",
            item.product_id
        )));
    }
    if let Some(item) = params.items.iter().find(|i| i.quantity == 0) {
        return Err(ServiceError::validation(format!(
            "quantity for product {} must be at least 1",
            item.product_id
        )));
    }
    if !params.total.is_finite() || params.total < 0.0 {
        return Err(ServiceError::validation("total cannot be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LineItem, ProductId};
    use std::sync::Arc;
    use storefront_kit::mock::{
        create_mock_store, expect_find_one, expect_insert, expect_no_request, expect_update_one,
        FailingPublisher, OfflineCounterStore, RecordingPublisher,
    };
    use storefront_kit::{Counter, MemoryCache, StoreActor, DEFAULT_CACHE_TTL};

    fn spawn_allocator() -> IdentifierAllocator {
        let (actor, counters) = StoreActor::<Counter>::new(16);
        tokio::spawn(actor.run());
        IdentifierAllocator::new(Arc::new(counters))
    }

    fn cache() -> ReadThroughCache {
        ReadThroughCache::new(Arc::new(MemoryCache::new()), DEFAULT_CACHE_TTL)
    }

    fn params(user_id: &str) -> OrderCreate {
        OrderCreate {
            user_id: user_id.into(),
            items: vec![LineItem {
                product_id: ProductId(1),
                quantity: 2,
            }],
            total: 20.0,
        }
    }

    fn pending(id: u64) -> Order {
        Order::new(OrderId(id), params("u1"))
    }

    #[tokio::test]
    async fn invalid_input_short_circuits_before_allocation() {
        let (orders, mut requests) = create_mock_store::<Order>(4);
        let usecase = OrderUsecase::new(
            orders,
            IdentifierAllocator::new(Arc::new(OfflineCounterStore)),
            cache(),
            SideChannel::new(Arc::new(RecordingPublisher::default())),
            3,
        );

        let mut no_items = params("u1");
        no_items.items.clear();
        for bad in [params(""), no_items] {
            let err = usecase.create_order(bad).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "{err}");
        }
        expect_no_request(&mut requests);
    }

    #[tokio::test]
    async fn allocation_failure_aborts_without_writing() {
        let (orders, mut requests) = create_mock_store::<Order>(4);
        let recorder = Arc::new(RecordingPublisher::default());
        let usecase = OrderUsecase::new(
            orders,
            IdentifierAllocator::new(Arc::new(OfflineCounterStore)),
            cache(),
            SideChannel::new(recorder.clone()),
            3,
        );

        let err = usecase.create_order(params("u1")).await.unwrap_err();
        assert!(matches!(err, ServiceError::AllocationFailed { .. }));
        expect_no_request(&mut requests);
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn failed_insert_aborts_before_publishing() {
        let (orders, mut requests) = create_mock_store::<Order>(4);
        let recorder = Arc::new(RecordingPublisher::default());
        let usecase = OrderUsecase::new(
            orders,
            spawn_allocator(),
            cache(),
            SideChannel::new(recorder.clone()),
            3,
        );

        let call = tokio::spawn(async move { usecase.create_order(params("u1")).await });
        let (doc, respond_to) = expect_insert(&mut requests).await.unwrap();
        assert_eq!(doc.id, OrderId(1));
        respond_to.send(Err(StoreError::Unavailable)).unwrap();

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::Unavailable)), "{err}");
        assert!(recorder.events().is_empty());
        expect_no_request(&mut requests);
    }

    #[tokio::test]
    async fn cached_order_is_served_without_a_store_request() {
        let (orders, mut requests) = create_mock_store::<Order>(4);
        let usecase = OrderUsecase::new(
            orders,
            spawn_allocator(),
            cache(),
            SideChannel::new(Arc::new(FailingPublisher)),
            3,
        );

        let order = pending(7);
        let first = {
            let usecase = usecase.clone();
            tokio::spawn(async move { usecase.get_order(OrderId(7)).await })
        };
        let (filter, respond_to) = expect_find_one(&mut requests).await.unwrap();
        assert_eq!(filter.id, Some(OrderId(7)));
        respond_to.send(Ok(Some(order.clone()))).unwrap();
        assert_eq!(first.await.unwrap().unwrap(), order);

        assert_eq!(usecase.get_order(OrderId(7)).await.unwrap(), order);
        expect_no_request(&mut requests);
    }

    #[tokio::test]
    async fn transition_is_written_with_a_status_guard() {
        let (orders, mut requests) = create_mock_store::<Order>(4);
        let usecase = OrderUsecase::new(
            orders,
            spawn_allocator(),
            cache(),
            SideChannel::new(Arc::new(FailingPublisher)),
            3,
        );

        let call = tokio::spawn(async move { usecase.update_order_status(OrderId(3), "COMPLETED").await });

        let (_, respond_to) = expect_find_one(&mut requests).await.unwrap();
        respond_to.send(Ok(Some(pending(3)))).unwrap();

        let (filter, patch, respond_to) = expect_update_one(&mut requests).await.unwrap();
        assert_eq!(filter.id, Some(OrderId(3)));
        assert_eq!(filter.status, Some(OrderStatus::Pending));
        assert!(matches!(patch, OrderPatch::SetStatus(OrderStatus::Completed)));

        let mut completed = pending(3);
        completed.status = OrderStatus::Completed;
        respond_to.send(Ok(Some(completed))).unwrap();

        assert_eq!(call.await.unwrap().unwrap().status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn lost_guard_rereads_and_rejects_against_the_new_status() {
        let (orders, mut requests) = create_mock_store::<Order>(4);
        let usecase = OrderUsecase::new(
            orders,
            spawn_allocator(),
            cache(),
            SideChannel::new(Arc::new(FailingPublisher)),
            3,
        );

        let call = tokio::spawn(async move { usecase.update_order_status(OrderId(3), "COMPLETED").await });

        let (_, respond_to) = expect_find_one(&mut requests).await.unwrap();
        respond_to.send(Ok(Some(pending(3)))).unwrap();

        // Someone cancelled it in between.
        let (_, _, respond_to) = expect_update_one(&mut requests).await.unwrap();
        respond_to.send(Ok(None)).unwrap();

        let (_, respond_to) = expect_find_one(&mut requests).await.unwrap();
        let mut cancelled = pending(3);
        cancelled.status = OrderStatus::Cancelled;
        respond_to.send(Ok(Some(cancelled))).unwrap();

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidTransition { ref from, ref to } if from == "CANCELLED" && to == "COMPLETED"
        ));
    }

    #[tokio::test]
    async fn exhausted_retries_surface_as_conflict() {
        let (orders, mut requests) = create_mock_store::<Order>(4);
        let usecase = OrderUsecase::new(
            orders,
            spawn_allocator(),
            cache(),
            SideChannel::new(Arc::new(FailingPublisher)),
            1,
        );

        let call = tokio::spawn(async move { usecase.cancel_order(OrderId(5)).await });

        for _ in 0..2 {
            let (_, respond_to) = expect_find_one(&mut requests).await.unwrap();
            respond_to.send(Ok(Some(pending(5)))).unwrap();
            let (_, _, respond_to) = expect_update_one(&mut requests).await.unwrap();
            respond_to.send(Ok(None)).unwrap();
        }

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn unknown_status_is_an_invalid_transition() {
        let (orders, mut requests) = create_mock_store::<Order>(4);
        let usecase = OrderUsecase::new(
            orders,
            spawn_allocator(),
            cache(),
            SideChannel::new(Arc::new(FailingPublisher)),
            3,
        );

        let call = tokio::spawn(async move { usecase.update_order_status(OrderId(3), "SHIPPED").await });
        let (_, respond_to) = expect_find_one(&mut requests).await.unwrap();
        respond_to.send(Ok(Some(pending(3)))).unwrap();

        assert!(matches!(
            call.await.unwrap(),
            Err(ServiceError::InvalidTransition { .. })
        ));
        expect_no_request(&mut requests);
    }
}
