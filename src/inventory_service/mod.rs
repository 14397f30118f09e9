//! # Inventory Service
//!
//! Products and their stock. Stock changes in two places:
//!
//! 1. [`ProductUsecase::update_product`] sets it directly.
//! 2. [`StockDecrementHandler`] takes it down when `order.created` arrives.
//!
//! Both go through the store as single writes, and the decrement carries a
//! `min_stock` guard, so concurrent orders can't oversell a product. Each
//! write evicts `product:<id>` from the cache.

mod consumer;
mod usecase;

pub use consumer::StockDecrementHandler;
pub use usecase::{ProductPage, ProductQuery, ProductUsecase};
