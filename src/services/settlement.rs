//! Settlement coordinator.
//!
//! Each public operation is one settlement attempt with two terminal
//! outcomes: committed, or rejected with a typed reason and no observable
//! side effect. Everything between the first row lock and the commit runs
//! inside a single [`StoreTx`]; a storage failure anywhere in that span rolls
//! the whole unit back, so callers may retry transient failures safely.
//!
//! Lock discipline: the listing/order row is locked before its availability
//! or status is validated, and account rows are always locked in ascending
//! `user_id` order, on every path that touches more than one account.

use bigdecimal::BigDecimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    Account, AdoptionRecord, NewAdoption, NewOrder, NewOrderItem, NewPaymentTransaction, Order,
    OrderItem, OrderStatus, PaymentStatus, PaymentTransaction, order,
};
use crate::error::LedgerError;
use crate::services::pricing::{CatalogPriceSource, PriceSource};
use crate::store::{Store, StoreError, StoreTx};

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: u32,
    /// Accepted for wire compatibility but never trusted: the catalog price
    /// is authoritative.
    #[serde(default)]
    pub unit_price: Option<BigDecimal>,
}

pub struct SettlementService<S: Store, P: PriceSource<S> = CatalogPriceSource> {
    store: Arc<S>,
    prices: Arc<P>,
}

impl<S: Store, P: PriceSource<S>> Clone for SettlementService<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            prices: self.prices.clone(),
        }
    }
}

impl<S: Store> SettlementService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            prices: Arc::new(CatalogPriceSource),
        }
    }
}

impl<S: Store, P: PriceSource<S>> SettlementService<S, P> {
    pub fn with_price_source(store: Arc<S>, prices: Arc<P>) -> Self {
        Self { store, prices }
    }

    /// Settles a pet adoption: resolves the price, moves the funds from the
    /// listing owner to the adopter, writes the adoption record and takes the
    /// listing off the market, atomically.
    pub async fn adopt(
        &self,
        adopter_id: i64,
        listing_id: i64,
    ) -> Result<AdoptionRecord, LedgerError> {
        let mut tx = self.store.begin().await?;

        let listing = match tx.lock_listing(listing_id).await {
            Ok(listing) => listing,
            Err(StoreError::NotFound(_)) => {
                return Err(LedgerError::NotFound(format!("listing {listing_id}")));
            }
            Err(err) => return Err(err.into()),
        };

        if !listing.available {
            return Err(LedgerError::Validation(
                "this pet has already been adopted".to_string(),
            ));
        }
        if listing.owner_id == adopter_id {
            return Err(LedgerError::Forbidden(
                "cannot adopt your own pet".to_string(),
            ));
        }

        // Funds flow from the listing owner to the adopter.
        let payer_id = listing.owner_id;
        let payee_id = adopter_id;

        let (first_id, second_id) = if payer_id < payee_id {
            (payer_id, payee_id)
        } else {
            (payee_id, payer_id)
        };
        let first = lock_settlement_account(&mut tx, first_id).await?;
        let second = lock_settlement_account(&mut tx, second_id).await?;
        let (mut payer, mut payee) = if first_id == payer_id {
            (first, second)
        } else {
            (second, first)
        };

        let amount = self.prices.listing_price(&mut tx, &listing).await?;

        if !payer.can_charge(&amount)? {
            return Err(LedgerError::InsufficientFunds);
        }
        payer.charge(&amount)?;
        payee.topup(&amount)?;
        tx.update_account(&payer).await?;
        tx.update_account(&payee).await?;

        let adoption = tx
            .insert_adoption(NewAdoption {
                listing_id,
                adopter_id,
                price_paid: amount,
                confirmed: true,
            })
            .await?;
        tx.set_listing_available(listing_id, false).await?;
        tx.commit().await?;

        tracing::info!(
            listing_id,
            adopter_id,
            price = %adoption.price_paid,
            "adoption settled"
        );
        Ok(adoption)
    }

    /// Creates an order with price-snapshotted items. Unit prices come from
    /// the catalog at this moment and never change afterwards.
    pub async fn create_order(
        &self,
        user_id: i64,
        items: Vec<OrderItemRequest>,
    ) -> Result<(Order, Vec<OrderItem>), LedgerError> {
        if items.is_empty() {
            return Err(LedgerError::Validation(
                "order must contain at least one item".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;

        let mut snapshot = Vec::with_capacity(items.len());
        for item in &items {
            if item.quantity == 0 {
                return Err(LedgerError::Validation(format!(
                    "quantity must be positive for product {}",
                    item.product_id
                )));
            }
            let product = tx
                .get_product(item.product_id)
                .await?
                .ok_or_else(|| {
                    LedgerError::Validation(format!("unknown product {}", item.product_id))
                })?;
            if !product.available {
                return Err(LedgerError::Validation(format!(
                    "product {} is not available",
                    product.id
                )));
            }
            snapshot.push(NewOrderItem {
                product_id: product.id,
                quantity: item.quantity,
                unit_price: product.effective_price(),
            });
        }

        let total = order::order_total(&snapshot);
        let (created, created_items) = tx
            .insert_order(
                NewOrder {
                    user_id,
                    status: OrderStatus::Pending,
                    currency: order::DEFAULT_CURRENCY.to_string(),
                    total,
                },
                &snapshot,
            )
            .await?;
        tx.commit().await?;

        tracing::info!(order_id = created.id, user_id, total = %created.total, "order created");
        Ok((created, created_items))
    }

    /// Pays a pending order from the owner's account balance. The amount is
    /// always the order's cached total.
    pub async fn pay_order(
        &self,
        user_id: i64,
        order_id: i64,
    ) -> Result<PaymentTransaction, LedgerError> {
        let mut tx = self.store.begin().await?;

        let order = match tx.lock_order(order_id).await {
            Ok(order) => order,
            Err(StoreError::NotFound(_)) => {
                return Err(LedgerError::NotFound(format!("order {order_id}")));
            }
            Err(err) => return Err(err.into()),
        };

        if order.user_id != user_id {
            return Err(LedgerError::Forbidden(
                "order belongs to another user".to_string(),
            ));
        }
        match order.status {
            OrderStatus::Pending => {}
            OrderStatus::Paid => {
                return Err(LedgerError::AlreadyProcessed("Order already paid".to_string()));
            }
            other => {
                return Err(LedgerError::Validation(format!(
                    "order is {other} and cannot be paid"
                )));
            }
        }

        let mut account = lock_settlement_account(&mut tx, user_id).await?;
        let amount = order.total.clone();

        if !account.can_charge(&amount)? {
            return Err(LedgerError::InsufficientFunds);
        }
        account.charge(&amount)?;
        tx.update_account(&account).await?;

        tx.update_order_status(order_id, OrderStatus::Paid).await?;
        let payment = tx
            .insert_payment(NewPaymentTransaction {
                reference: Uuid::new_v4().to_string(),
                user_id: Some(user_id),
                order_id: Some(order_id),
                amount,
                currency: order.currency.clone(),
                status: PaymentStatus::Completed,
                raw_payload: None,
                credited: false,
            })
            .await?;
        tx.commit().await?;

        tracing::info!(order_id, user_id, amount = %payment.amount, "order paid from account");
        Ok(payment)
    }
}

/// Locks an account row for a settlement; a missing account is a business
/// rejection, not a 404.
async fn lock_settlement_account<T: StoreTx>(
    tx: &mut T,
    user_id: i64,
) -> Result<Account, LedgerError> {
    match tx.lock_account(user_id).await {
        Ok(account) => Ok(account),
        Err(StoreError::NotFound(_)) => Err(LedgerError::Validation(format!(
            "no account exists for user {user_id}"
        ))),
        Err(err) => Err(err.into()),
    }
}
