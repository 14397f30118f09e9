//! Runs one order through the storefront end to end.
//!
//! ```bash
//! RUST_LOG=info cargo run
//! ```

use anyhow::Context;
use std::time::Duration;
use storefront::config::Config;
use storefront::inventory_service::ProductQuery;
use storefront::lifecycle::{setup_tracing, StorefrontSystem};
use storefront::model::{LineItem, OrderCreate, ProductCreate, UserCreate};
use tracing::{info, warn, Instrument};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();

    let config = Config::from_env().context("loading configuration")?;
    let system = StorefrontSystem::start(&config).await?;

    let user = system
        .users
        .create_user(UserCreate {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            role: None,
        })
        .instrument(tracing::info_span!("user_creation"))
        .await?;
    info!(user_id = %user.id, "User created");

    let product = system
        .products
        .create_product(ProductCreate {
            name: "Desk Lamp".to_string(),
            description: "Adjustable LED desk lamp".to_string(),
            category: "lighting".to_string(),
            price: 25.0,
            stock: 10,
        })
        .await?;
    info!(product_id = %product.id, stock = product.stock, "Product created");

    let order = system
        .orders
        .create_order(OrderCreate {
            user_id: user.id.to_string(),
            items: vec![LineItem {
                product_id: product.id,
                quantity: 2,
            }],
            total: 50.0,
        })
        .instrument(tracing::info_span!("order_processing"))
        .await?;
    info!(order_id = %order.id, status = %order.status, "Order placed");

    // The stock decrement happens on the consumer task; give it a moment.
    // Listings bypass the cache, so they see it as soon as it lands.
    let lighting = ProductQuery {
        category: Some("lighting".to_string()),
        page: 1,
        limit: 10,
    };
    let mut stock = product.stock;
    for _ in 0..50 {
        let page = system.products.list_products(lighting.clone()).await?;
        if let Some(current) = page.items.iter().find(|p| p.id == product.id) {
            stock = current.stock;
        }
        if stock < product.stock {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    if stock == product.stock {
        warn!(product_id = %product.id, "Stock not decremented yet");
    }
    info!(product_id = %product.id, stock, "Inventory after order");

    let completed = system.orders.update_order_status(order.id, "COMPLETED").await?;
    info!(order_id = %completed.id, status = %completed.status, "Order completed");

    if let Err(e) = system.orders.cancel_order(order.id).await {
        info!(error = %e, "Cancelling a completed order is rejected");
    }

    system.shutdown().await?;
    info!("Application completed successfully");
    Ok(())
}
