use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use storefront::config::Config;
use storefront::inventory_service::ProductQuery;
use storefront::lifecycle::StorefrontSystem;
use storefront::model::{
    LineItem, Order, OrderCreate, OrderStatus, Product, ProductCreate, ProductId, ProductUpdate,
};
use storefront_kit::mock::FailingPublisher;
use storefront_kit::ServiceError;

async fn start() -> StorefrontSystem {
    StorefrontSystem::start(&Config::default())
        .await
        .expect("system starts")
}

async fn stock_product(system: &StorefrontSystem, stock: u32) -> Product {
    system
        .products
        .create_product(ProductCreate {
            name: "Widget".into(),
            description: "A widget".into(),
            category: "widgets".into(),
            price: 10.0,
            stock,
        })
        .await
        .expect("product created")
}

fn order_for(user_id: &str, product_id: ProductId, quantity: u32) -> OrderCreate {
    OrderCreate {
        user_id: user_id.into(),
        items: vec![LineItem {
            product_id,
            quantity,
        }],
        total: 10.0 * quantity as f64,
    }
}

/// Stock as the store sees it. Listings skip the cache.
async fn stored_stock(system: &StorefrontSystem, id: ProductId) -> u32 {
    let page = system
        .products
        .list_products(ProductQuery {
            category: None,
            page: 1,
            limit: 1000,
        })
        .await
        .unwrap();
    page.items
        .into_iter()
        .find(|p| p.id == id)
        .map(|p| p.stock)
        .expect("product listed")
}

async fn wait_for_stock(system: &StorefrontSystem, id: ProductId, expected: u32) {
    for _ in 0..200 {
        if stored_stock(system, id).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "stock of product {id} never reached {expected} (is {})",
        stored_stock(system, id).await
    );
}

#[tokio::test]
async fn order_lifecycle_for_u1() {
    let system = start().await;
    let product = stock_product(&system, 10).await;

    let created = system
        .orders
        .create_order(order_for("u1", product.id, 2))
        .await
        .unwrap();
    assert_eq!(created.status, OrderStatus::Pending);
    assert_eq!(created.id.0, 1);

    let fetched = system.orders.get_order(created.id).await.unwrap();
    assert_eq!(fetched.status, OrderStatus::Pending);
    assert_eq!(fetched.items, created.items);

    let completed = system
        .orders
        .update_order_status(created.id, "COMPLETED")
        .await
        .unwrap();
    assert_eq!(completed.status, OrderStatus::Completed);

    let err = system
        .orders
        .update_order_status(created.id, "COMPLETED")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition { .. }));

    // The cached PENDING copy was evicted by the transition.
    assert_eq!(
        system.orders.get_order(created.id).await.unwrap().status,
        OrderStatus::Completed
    );

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn terminal_orders_reject_every_further_transition() {
    let system = start().await;
    let product = stock_product(&system, 10).await;

    let cancelled = system
        .orders
        .create_order(order_for("u1", product.id, 1))
        .await
        .unwrap();
    system.orders.cancel_order(cancelled.id).await.unwrap();

    let completed = system
        .orders
        .create_order(order_for("u1", product.id, 1))
        .await
        .unwrap();
    system
        .orders
        .update_order_status(completed.id, "COMPLETED")
        .await
        .unwrap();

    for id in [cancelled.id, completed.id] {
        for status in ["PENDING", "COMPLETED", "CANCELLED"] {
            let err = system.orders.update_order_status(id, status).await.unwrap_err();
            assert!(
                matches!(err, ServiceError::InvalidTransition { .. }),
                "order {id} -> {status}: {err}"
            );
        }
        assert!(matches!(
            system.orders.cancel_order(id).await,
            Err(ServiceError::InvalidTransition { .. })
        ));
    }

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn failing_publisher_does_not_fail_order_creation() {
    let system = StorefrontSystem::start_with_publisher(&Config::default(), Arc::new(FailingPublisher))
        .await
        .unwrap();
    let product = stock_product(&system, 10).await;

    let order = system
        .orders
        .create_order(order_for("u1", product.id, 3))
        .await
        .expect("order succeeds despite publish failure");
    assert_eq!(system.orders.get_order(order.id).await.unwrap().id, order.id);

    // The event was lost, so inventory never heard about the order.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(stored_stock(&system, product.id).await, 10);

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn order_creation_decrements_stock_through_the_consumer() {
    let system = start().await;
    let lamp = stock_product(&system, 10).await;
    let desk = stock_product(&system, 5).await;

    system
        .orders
        .create_order(OrderCreate {
            user_id: "u1".into(),
            items: vec![
                LineItem {
                    product_id: lamp.id,
                    quantity: 2,
                },
                LineItem {
                    product_id: desk.id,
                    quantity: 5,
                },
            ],
            total: 70.0,
        })
        .await
        .unwrap();

    wait_for_stock(&system, lamp.id, 8).await;
    wait_for_stock(&system, desk.id, 0).await;

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn consumer_keeps_going_after_a_failed_event() {
    let system = start().await;
    let product = stock_product(&system, 1).await;

    // Unknown product: the handler fails, the order itself still succeeds.
    system
        .orders
        .create_order(order_for("u1", ProductId(999), 1))
        .await
        .unwrap();
    // More than is in stock: fails too, and stock is left alone.
    system
        .orders
        .create_order(order_for("u1", product.id, 5))
        .await
        .unwrap();
    system
        .orders
        .create_order(order_for("u1", product.id, 1))
        .await
        .unwrap();

    wait_for_stock(&system, product.id, 0).await;

    system.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_conflicting_transitions_have_exactly_one_winner() {
    let system = start().await;
    let product = stock_product(&system, 100).await;

    for _ in 0..20 {
        let order = system
            .orders
            .create_order(order_for("u1", product.id, 1))
            .await
            .unwrap();

        let complete = {
            let orders = system.orders.clone();
            tokio::spawn(async move { orders.update_order_status(order.id, "COMPLETED").await })
        };
        let cancel = {
            let orders = system.orders.clone();
            tokio::spawn(async move { orders.cancel_order(order.id).await })
        };

        let results = [complete.await.unwrap(), cancel.await.unwrap()];
        let winners: Vec<&Order> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1, "exactly one transition must win: {results:?}");

        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert!(matches!(loser, ServiceError::InvalidTransition { .. }), "{loser}");

        let stored = system.orders.get_order(order.id).await.unwrap();
        assert_eq!(stored.status, winners[0].status);
    }

    system.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_get_distinct_ids() {
    let system = start().await;
    let product = stock_product(&system, 1000).await;

    let mut handles = Vec::new();
    for i in 0..100 {
        let orders = system.orders.clone();
        let params = order_for(&format!("user-{}", i % 7), product.id, 1);
        handles.push(tokio::spawn(async move { orders.create_order(params).await }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        let order = handle.await.unwrap().unwrap();
        assert!(ids.insert(order.id), "id {} issued twice", order.id);
    }
    assert_eq!(ids.len(), 100);
    assert_eq!(ids.iter().map(|id| id.0).max(), Some(100));

    wait_for_stock(&system, product.id, 900).await;
    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn product_writes_evict_the_cached_copy() {
    let system = start().await;
    let product = stock_product(&system, 10).await;

    // Populate the cache.
    assert_eq!(system.products.get_product(product.id).await.unwrap().price, 10.0);

    system
        .products
        .update_product(
            product.id,
            ProductUpdate {
                price: Some(12.5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(system.products.get_product(product.id).await.unwrap().price, 12.5);

    system.products.delete_product(product.id).await.unwrap();
    assert!(matches!(
        system.products.get_product(product.id).await,
        Err(ServiceError::NotFound { .. })
    ));

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn user_order_listing_reflects_new_orders_and_transitions() {
    let system = start().await;
    let product = stock_product(&system, 10).await;

    let first = system
        .orders
        .create_order(order_for("u1", product.id, 1))
        .await
        .unwrap();
    assert_eq!(system.orders.list_user_orders("u1").await.unwrap().len(), 1);

    system
        .orders
        .create_order(order_for("u1", product.id, 1))
        .await
        .unwrap();
    system
        .orders
        .create_order(order_for("u2", product.id, 1))
        .await
        .unwrap();
    assert_eq!(system.orders.list_user_orders("u1").await.unwrap().len(), 2);

    system.orders.cancel_order(first.id).await.unwrap();
    let listed = system.orders.list_user_orders("u1").await.unwrap();
    let first_listed = listed.iter().find(|o| o.id == first.id).unwrap();
    assert_eq!(first_listed.status, OrderStatus::Cancelled);

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_resources_are_not_found_not_validation() {
    let system = start().await;

    let err = system
        .orders
        .get_order(storefront::model::OrderId(404))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { kind: "order", .. }));
    assert!(err.is_client_error());

    let err = system
        .orders
        .update_order_status(storefront::model::OrderId(404), "COMPLETED")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));

    system.shutdown().await.unwrap();
}
