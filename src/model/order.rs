//! Customer orders and their status machine.
//!
//! ```text
//! PENDING ──► COMPLETED
//!    │
//!    └─────► CANCELLED
//! ```
//!
//! `COMPLETED` and `CANCELLED` are terminal. Asking for the status an order
//! already has is rejected as well, so repeating a transition never succeeds
//! twice.

use crate::model::ProductId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use storefront_kit::{Document, ServiceError};

/// Topic the inventory service consumes to decrement stock.
pub const ORDER_CREATED_TOPIC: &str = "order.created";

/// Type-safe identifier for Orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Validates `self → target`, returning `target` when allowed.
    pub fn transition_to(self, target: OrderStatus) -> Result<OrderStatus, ServiceError> {
        match (self, target) {
            (OrderStatus::Pending, OrderStatus::Completed | OrderStatus::Cancelled) => Ok(target),
            _ => Err(ServiceError::invalid_transition(self, target)),
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: String,
    pub items: Vec<LineItem>,
    pub total: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Payload for placing an order. The total is priced by the caller.
#[derive(Debug, Clone)]
pub struct OrderCreate {
    pub user_id: String,
    pub items: Vec<LineItem>,
    pub total: f64,
}

impl Order {
    /// A new order always starts `PENDING`.
    pub fn new(id: OrderId, params: OrderCreate) -> Self {
        Self {
            id,
            user_id: params.user_id,
            items: params.items,
            total: params.total,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub id: Option<OrderId>,
    pub user_id: Option<String>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    /// Matches order `id` only while its status is still `status`.
    pub fn guarded(id: OrderId, status: OrderStatus) -> Self {
        Self {
            id: Some(id),
            status: Some(status),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum OrderPatch {
    SetStatus(OrderStatus),
}

impl Document for Order {
    type Id = OrderId;
    type Filter = OrderFilter;
    type Patch = OrderPatch;

    const KIND: &'static str = "order";

    fn id(&self) -> &OrderId {
        &self.id
    }

    fn by_id(id: OrderId) -> OrderFilter {
        OrderFilter {
            id: Some(id),
            ..Default::default()
        }
    }

    fn matches(&self, filter: &OrderFilter) -> bool {
        filter.id.map_or(true, |id| id == self.id)
            && filter.user_id.as_ref().map_or(true, |u| *u == self.user_id)
            && filter.status.map_or(true, |s| s == self.status)
    }

    fn apply(&mut self, patch: OrderPatch) {
        match patch {
            OrderPatch::SetStatus(status) => self.status = status,
        }
    }
}

/// Payload of the `order.created` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub user_id: String,
    pub items: Vec<LineItem>,
}

impl From<&Order> for OrderCreated {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            user_id: order.user_id.clone(),
            items: order.items.clone(),
        }
    }
}
