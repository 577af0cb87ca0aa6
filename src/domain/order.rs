//! Shop orders. Items snapshot the product price at order-creation time, so a
//! later catalog change never alters what the buyer pays. The cached total is
//! the single pricing input for payment.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::money;

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Fulfilled,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Fulfilled => "fulfilled",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "fulfilled" => Ok(OrderStatus::Fulfilled),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub status: OrderStatus,
    pub currency: String,
    /// Cached Σ(unit_price × quantity) over the order's items.
    pub total: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: u32,
    /// Unit price at order-creation time.
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i64,
    pub status: OrderStatus,
    pub currency: String,
    pub total: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: u32,
    pub unit_price: BigDecimal,
}

/// Recomputes an order total from its items.
pub fn order_total(items: &[NewOrderItem]) -> BigDecimal {
    let sum = items.iter().fold(BigDecimal::from(0), |acc, item| {
        acc + &item.unit_price * BigDecimal::from(item.quantity)
    });
    money::quantize(&sum)
}

/// Minimal catalog product view: the shop collaborator owns the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: BigDecimal,
    pub discount_price: Option<BigDecimal>,
    pub available: bool,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: BigDecimal,
    pub discount_price: Option<BigDecimal>,
    pub available: bool,
}

impl Product {
    /// Effective unit price: the discount price when one is set.
    pub fn effective_price(&self) -> BigDecimal {
        self.discount_price.clone().unwrap_or_else(|| self.price.clone())
    }
}
