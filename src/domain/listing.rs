//! Pet listings and per-category adoption rates. Both are written by the
//! catalog collaborator; the settlement engine reads them for pricing and
//! flips `available` on a successful adoption.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub species: String,
    pub category_id: Option<i64>,
    pub available: bool,
    /// Fixed total adoption price; overrides any category rate.
    pub custom_price: Option<BigDecimal>,
    /// Number of days the listing is priced for (per-day rate multiplier).
    pub duration_days: u32,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewListing {
    pub owner_id: i64,
    pub name: String,
    pub species: String,
    pub category_id: Option<i64>,
    pub custom_price: Option<BigDecimal>,
    pub duration_days: u32,
    pub currency: String,
}

/// Per-category price-per-day. Several rates may exist for one category; the
/// most recently created active in-window rate governs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRate {
    pub id: i64,
    pub category_id: i64,
    pub price_per_day: BigDecimal,
    pub currency: String,
    pub active: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCategoryRate {
    pub category_id: i64,
    pub price_per_day: BigDecimal,
    pub currency: String,
    pub active: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

impl CategoryRate {
    /// Whether the rate applies at `now`: active and inside its optional
    /// validity window.
    pub fn applies_at(&self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        if let Some(from) = self.valid_from {
            if now < from {
                return false;
            }
        }
        if let Some(to) = self.valid_to {
            if now > to {
                return false;
            }
        }
        true
    }
}
