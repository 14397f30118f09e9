//! # Order Service
//!
//! Places orders and drives them through their status machine.
//!
//! ## Cache Keys
//!
//! | Key | Holds | Invalidated by |
//! |-----|-------|----------------|
//! | `order:<id>` | one [`Order`](crate::model::Order) | any status transition |
//! | `user_orders:<user_id>` | that user's orders | order creation, status transitions |
//!
//! ## Cross-Service Effects
//!
//! Creating an order publishes `order.created` with an
//! [`OrderCreated`](crate::model::OrderCreated) payload. Inventory consumes
//! it to decrement stock. The publish happens after the order is stored and
//! its failure is only logged, so an order can exist without its stock ever
//! being decremented.

mod usecase;

pub use usecase::OrderUsecase;
