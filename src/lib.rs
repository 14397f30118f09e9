//! # Storefront
//!
//! Users, inventory and orders as three services over a shared consistency
//! core ([`storefront_kit`]).
//!
//! ## Core Components
//!
//! - **[model]**: [`Order`](model::Order), [`Product`](model::Product) and
//!   [`User`](model::User), with the filters and patches the store applies.
//! - **[order_service]**: order placement and the status machine.
//! - **[inventory_service]**: products, stock, and the `order.created` consumer.
//! - **[user_service]**: registration and profile lookups.
//! - **[lifecycle]**: wiring everything to in-process collaborators, and tracing.
//! - **[config]**: environment-driven settings.
//!
//! ## Write Path
//!
//! ```text
//! validate ─► allocate id ─► store write ─► evict cache ─► publish event ─► respond
//!                                                              ┆
//!                                             (background) consumer ─► stock decrement
//! ```
//!
//! Validation and not-found errors return before anything is written.
//! Allocation and store errors abort the mutation. Publish errors are logged
//! and never reach the caller.
//!
//! ## Read Path
//!
//! Cache first (`<kind>:<id>`), then the store, then populate the cache. A
//! broken or undecodable cache entry behaves like a miss.
//!
//! ## Testing
//!
//! Usecases are unit tested against channel-level store mocks from
//! [`storefront_kit::mock`]; `tests/` runs the whole system through
//! [`StorefrontSystem`](lifecycle::StorefrontSystem).

pub mod config;
pub mod inventory_service;
pub mod lifecycle;
pub mod model;
pub mod order_service;
pub mod user_service;
