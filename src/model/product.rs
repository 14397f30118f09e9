//! Products in the inventory.
//!
//! `stock` changes through two paths: direct updates from the inventory API
//! ([`ProductPatch::Fields`]) and decrements driven by `order.created` events
//! ([`ProductPatch::DecrementStock`]). The decrement is only ever sent with a
//! `min_stock` guard, so it can't take stock below zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use storefront_kit::Document;

/// Type-safe identifier for Products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub u64);

impl From<u64> for ProductId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub stock: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(id: ProductId, params: ProductCreate) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: params.name,
            description: params.description,
            category: params.category,
            price: params.price,
            stock: params.stock,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Payload for creating a product.
#[derive(Debug, Clone)]
pub struct ProductCreate {
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub stock: u32,
}

/// Partial update; `None` leaves the field alone.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<u32>,
}

impl ProductUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.price.is_none()
            && self.stock.is_none()
    }
}

#[derive(Debug)]
pub enum ProductPatch {
    Fields(ProductUpdate),
    DecrementStock(u32),
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub id: Option<ProductId>,
    pub category: Option<String>,
    /// Matches products with at least this much stock.
    pub min_stock: Option<u32>,
}

impl ProductFilter {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Default::default()
        }
    }
}

impl Document for Product {
    type Id = ProductId;
    type Filter = ProductFilter;
    type Patch = ProductPatch;

    const KIND: &'static str = "product";

    fn id(&self) -> &ProductId {
        &self.id
    }

    fn by_id(id: ProductId) -> ProductFilter {
        ProductFilter {
            id: Some(id),
            ..Default::default()
        }
    }

    fn matches(&self, filter: &ProductFilter) -> bool {
        filter.id.map_or(true, |id| id == self.id)
            && filter.category.as_ref().map_or(true, |c| *c == self.category)
            && filter.min_stock.map_or(true, |min| self.stock >= min)
    }

    fn apply(&mut self, patch: ProductPatch) {
        match patch {
            ProductPatch::Fields(update) => {
                if let Some(name) = update.name {
                    self.name = name;
                }
                if let Some(description) = update.description {
                    self.description = description;
                }
                if let Some(category) = update.category {
                    self.category = category;
                }
                if let Some(price) = update.price {
                    self.price = price;
                }
                if let Some(stock) = update.stock {
                    self.stock = stock;
                }
            }
            ProductPatch::DecrementStock(quantity) => {
                self.stock = self.stock.saturating_sub(quantity);
            }
        }
        self.updated_at = Utc::now();
    }
}
