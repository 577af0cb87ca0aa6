//! Price resolution for listings.
//!
//! The settlement coordinator only sees the [`PriceSource`] capability, so
//! catalog pricing and settlement can be tested independently. The default
//! implementation walks the priority chain: explicit fixed price on the
//! listing, then the latest active in-window per-day category rate multiplied
//! by the listing duration, then zero.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;

use crate::domain::{Listing, money};
use crate::error::LedgerError;
use crate::store::{Store, StoreTx};

#[async_trait]
pub trait PriceSource<S: Store>: Send + Sync + 'static {
    /// Amount owed for adopting `listing`, resolved inside the caller's
    /// atomic unit.
    async fn listing_price(
        &self,
        tx: &mut S::Tx,
        listing: &Listing,
    ) -> Result<BigDecimal, LedgerError>;
}

pub struct CatalogPriceSource;

#[async_trait]
impl<S: Store> PriceSource<S> for CatalogPriceSource {
    async fn listing_price(
        &self,
        tx: &mut S::Tx,
        listing: &Listing,
    ) -> Result<BigDecimal, LedgerError> {
        // A fixed total price on the listing wins over any rate.
        if let Some(price) = &listing.custom_price {
            return Ok(price.clone());
        }

        let days = listing.duration_days.max(1);
        let Some(category_id) = listing.category_id else {
            return Ok(money::zero());
        };

        match tx.latest_active_rate(category_id, Utc::now()).await? {
            Some(rate) => {
                let amount = &rate.price_per_day * BigDecimal::from(days);
                Ok(money::quantize(&amount))
            }
            None => Ok(money::zero()),
        }
    }
}
