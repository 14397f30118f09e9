//! # Observability & Tracing
//!
//! Structured logging for every service and for the kit underneath them.
//!
//! ## Configuration
//!
//! Verbosity comes from `RUST_LOG`. Output is the compact format without the
//! module prefix (`with_target(false)`): the `kind`, `topic` and `key` fields
//! already say where a line came from.
//!
//! ```bash
//! RUST_LOG=info cargo run      # state changes only
//! RUST_LOG=debug cargo run     # cache hits/misses, store requests, payloads
//! RUST_LOG=storefront_kit=debug,storefront=info cargo run
//! ```
//!
//! ## What Gets Logged
//!
//! | Level | Examples |
//! |-------|----------|
//! | `info` | `Order created id=1`, `Stock decreased id=1 quantity=2 stock=8`, store start/stop |
//! | `debug` | `Cache hit key=order:1`, `Allocated id resource_type="order" id=1` |
//! | `warn` | `Event dropped topic=order.created`, `Status changed concurrently, re-validating` |
//! | `error` | `Event handler failed`, `Id allocation failed` |
//!
//! ## Order Flow at `info`
//!
//! ```text
//! INFO create_order{user_id=u1}: Inserted kind="order" id=1 size=1
//! INFO create_order{user_id=u1}: Order created id=1 items=1 total=20.0
//! INFO decrease_stock{id=ProductId(1) quantity=2}: Stock decreased id=1 quantity=2 stock=8
//! INFO Inventory updated for order order_id=1
//! ```
//!
//! The decrement lines come from the consumer task, after `create_order` has
//! already returned.

/// Installs the global subscriber. Call once, at the top of `main`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
