use crate::config::Config;
use crate::inventory_service::{ProductUsecase, StockDecrementHandler};
use crate::model::{Order, Product, User, ORDER_CREATED_TOPIC};
use crate::order_service::OrderUsecase;
use crate::user_service::UserUsecase;
use std::sync::Arc;
use storefront_kit::{
    Counter, EventConsumer, EventPublisher, IdentifierAllocator, MemoryBroker, MemoryCache,
    ReadThroughCache, SideChannel, StoreActor, TransportError, TransportPublisher,
};
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("failed to subscribe consumer: {0}")]
    Subscribe(#[from] TransportError),
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The three storefront services wired to one set of in-process collaborators.
///
/// # Architecture
///
/// - **Store of record**: one [`StoreActor`] per collection (counters, users,
///   products, orders)
/// - **Cache**: one [`MemoryCache`] shared by every usecase, keys namespaced
///   by resource kind
/// - **Events**: a [`MemoryBroker`]; orders publish to it, inventory consumes
///   `order.created` on a background task
///
/// # Example
///
/// ```ignore
/// let system = StorefrontSystem::start(&Config::default()).await?;
///
/// let product = system.products.create_product(params).await?;
/// let order = system.orders.create_order(order_params).await?;
///
/// // Drop any usecase clones you took before this, or it waits for them.
/// system.shutdown().await?;
/// ```
pub struct StorefrontSystem {
    pub users: UserUsecase,
    pub products: ProductUsecase,
    pub orders: OrderUsecase,
    broker: Arc<MemoryBroker>,
    consumers: Vec<JoinHandle<()>>,
    stores: Vec<JoinHandle<()>>,
}

impl StorefrontSystem {
    /// Starts every store actor and the `order.created` consumer.
    pub async fn start(config: &Config) -> Result<Self, SystemError> {
        Self::start_inner(config, None).await
    }

    /// Like [`start`](Self::start), but orders publish through `publisher`
    /// instead of the broker. The consumer still listens on the broker.
    pub async fn start_with_publisher(
        config: &Config,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<Self, SystemError> {
        Self::start_inner(config, Some(publisher)).await
    }

    async fn start_inner(
        config: &Config,
        publisher: Option<Arc<dyn EventPublisher>>,
    ) -> Result<Self, SystemError> {
        info!(?config, "Starting storefront");

        // 1. Store of record
        let (counter_actor, counters) = StoreActor::<Counter>::new(config.store_buffer);
        let (user_actor, users) = StoreActor::<User>::new(config.store_buffer);
        let (product_actor, products) = StoreActor::<Product>::new(config.store_buffer);
        let (order_actor, orders) = StoreActor::<Order>::new(config.store_buffer);
        let stores = vec![
            tokio::spawn(counter_actor.run()),
            tokio::spawn(user_actor.run()),
            tokio::spawn(product_actor.run()),
            tokio::spawn(order_actor.run()),
        ];

        // 2. Shared collaborators
        let ids = IdentifierAllocator::new(Arc::new(counters));
        let cache = ReadThroughCache::new(Arc::new(MemoryCache::new()), config.cache_ttl);
        let broker = Arc::new(MemoryBroker::new(config.broker_capacity));
        let publisher: Arc<dyn EventPublisher> = match publisher {
            Some(publisher) => publisher,
            None => Arc::new(TransportPublisher::new(broker.clone())),
        };

        // 3. Usecases
        let users = UserUsecase::new(users, ids.clone(), cache.clone());
        let products = ProductUsecase::new(products, ids.clone(), cache.clone());
        let orders = OrderUsecase::new(
            orders,
            ids,
            cache,
            SideChannel::new(publisher),
            config.transition_retries,
        );

        // 4. Cross-service consumers
        let stock_consumer = EventConsumer::spawn(
            broker.clone(),
            ORDER_CREATED_TOPIC,
            Arc::new(StockDecrementHandler::new(products.clone())),
        )
        .await?;

        info!("Storefront started");
        Ok(Self {
            users,
            products,
            orders,
            broker,
            consumers: vec![stock_consumer],
            stores,
        })
    }

    /// Stops consumers, then the stores.
    ///
    /// Closing the broker lets each consumer finish the events it already
    /// received. Store actors stop once the last usecase (including clones
    /// held elsewhere) is dropped.
    pub async fn shutdown(self) -> Result<(), SystemError> {
        info!("Shutting down storefront...");
        let Self {
            users,
            products,
            orders,
            broker,
            consumers,
            stores,
        } = self;

        broker.close();
        for handle in consumers {
            handle.await.inspect_err(|e| error!(error = %e, "Consumer task failed"))?;
        }

        drop(users);
        drop(products);
        drop(orders);

        for handle in stores {
            handle.await.inspect_err(|e| error!(error = %e, "Store task failed"))?;
        }

        info!("Storefront shutdown complete");
        Ok(())
    }
}
