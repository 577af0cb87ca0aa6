//! Adoption records. One per listing, created exactly once at successful
//! settlement; immutable afterwards except for remarks.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdoptionRecord {
    pub id: i64,
    pub listing_id: i64,
    pub adopter_id: i64,
    pub price_paid: BigDecimal,
    pub confirmed: bool,
    pub remarks: Option<String>,
    pub adopted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAdoption {
    pub listing_id: i64,
    pub adopter_id: i64,
    pub price_paid: BigDecimal,
    pub confirmed: bool,
}
