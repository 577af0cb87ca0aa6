//! In-memory store adapter.
//!
//! Backs the test suite and local demos. A single async mutex serializes
//! atomic units; a unit clones the dataset, mutates the working copy, and
//! writes it back on commit, so dropping a unit mid-way observes rollback
//! exactly like the durable adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;

use crate::domain::{
    Account, AdoptionRecord, CategoryRate, Listing, NewAdoption, NewCategoryRate, NewListing,
    NewOrder, NewOrderItem, NewPaymentTransaction, NewProduct, Order, OrderItem, OrderStatus,
    PaymentTransaction, Product, money,
};
use crate::store::{Store, StoreError, StoreResult, StoreTx};

#[derive(Default, Clone)]
struct MemoryInner {
    accounts: HashMap<i64, Account>,
    listings: HashMap<i64, Listing>,
    rates: HashMap<i64, Vec<CategoryRate>>,
    adoptions: HashMap<i64, AdoptionRecord>,
    products: HashMap<i64, Product>,
    orders: HashMap<i64, Order>,
    order_items: HashMap<i64, Vec<OrderItem>>,
    payments: HashMap<String, PaymentTransaction>,
    last_id: i64,
}

impl MemoryInner {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
    lock_wait: Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lock_wait(Duration::from_secs(5))
    }

    pub fn with_lock_wait(lock_wait: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner::default())),
            lock_wait,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryInner>,
    work: MemoryInner,
}

impl std::fmt::Debug for MemoryTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTx").finish_non_exhaustive()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> StoreResult<MemoryTx> {
        let guard = timeout(self.lock_wait, self.inner.clone().lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout)?;
        let work = guard.clone();
        Ok(MemoryTx { guard, work })
    }

    async fn get_account(&self, user_id: i64) -> StoreResult<Option<Account>> {
        Ok(self.inner.lock().await.accounts.get(&user_id).cloned())
    }

    async fn get_or_create_account(&self, user_id: i64, currency: &str) -> StoreResult<Account> {
        let mut inner = self.inner.lock().await;
        if let Some(account) = inner.accounts.get(&user_id) {
            return Ok(account.clone());
        }
        let now = Utc::now();
        let account = Account {
            id: inner.next_id(),
            user_id,
            balance: money::zero(),
            currency: currency.to_string(),
            created_at: now,
            updated_at: now,
        };
        inner.accounts.insert(user_id, account.clone());
        Ok(account)
    }

    async fn get_listing(&self, id: i64) -> StoreResult<Option<Listing>> {
        Ok(self.inner.lock().await.listings.get(&id).cloned())
    }

    async fn insert_listing(&self, listing: NewListing) -> StoreResult<Listing> {
        let mut inner = self.inner.lock().await;
        let listing = Listing {
            id: inner.next_id(),
            owner_id: listing.owner_id,
            name: listing.name,
            species: listing.species,
            category_id: listing.category_id,
            available: true,
            custom_price: listing.custom_price,
            duration_days: listing.duration_days,
            currency: listing.currency,
            created_at: Utc::now(),
        };
        inner.listings.insert(listing.id, listing.clone());
        Ok(listing)
    }

    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        let mut inner = self.inner.lock().await;
        let product = Product {
            id: inner.next_id(),
            name: product.name,
            price: product.price,
            discount_price: product.discount_price,
            available: product.available,
        };
        inner.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn insert_category_rate(&self, rate: NewCategoryRate) -> StoreResult<CategoryRate> {
        let mut inner = self.inner.lock().await;
        let rate = CategoryRate {
            id: inner.next_id(),
            category_id: rate.category_id,
            price_per_day: rate.price_per_day,
            currency: rate.currency,
            active: rate.active,
            valid_from: rate.valid_from,
            valid_to: rate.valid_to,
            created_at: Utc::now(),
        };
        inner
            .rates
            .entry(rate.category_id)
            .or_default()
            .push(rate.clone());
        Ok(rate)
    }

    async fn get_order(&self, id: i64) -> StoreResult<Option<Order>> {
        Ok(self.inner.lock().await.orders.get(&id).cloned())
    }

    async fn order_items(&self, order_id: i64) -> StoreResult<Vec<OrderItem>> {
        Ok(self
            .inner
            .lock()
            .await
            .order_items
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn adoption_for_listing(&self, listing_id: i64) -> StoreResult<Option<AdoptionRecord>> {
        Ok(self.inner.lock().await.adoptions.get(&listing_id).cloned())
    }

    async fn get_payment_by_reference(
        &self,
        reference: &str,
    ) -> StoreResult<Option<PaymentTransaction>> {
        Ok(self.inner.lock().await.payments.get(reference).cloned())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_account(&mut self, user_id: i64) -> StoreResult<Account> {
        self.work
            .accounts
            .get(&user_id)
            .cloned()
            .ok_or(StoreError::NotFound("account"))
    }

    async fn update_account(&mut self, account: &Account) -> StoreResult<()> {
        let stored = self
            .work
            .accounts
            .get_mut(&account.user_id)
            .ok_or(StoreError::NotFound("account"))?;
        stored.balance = account.balance.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn lock_listing(&mut self, id: i64) -> StoreResult<Listing> {
        self.work
            .listings
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("listing"))
    }

    async fn set_listing_available(&mut self, id: i64, available: bool) -> StoreResult<()> {
        let listing = self
            .work
            .listings
            .get_mut(&id)
            .ok_or(StoreError::NotFound("listing"))?;
        listing.available = available;
        Ok(())
    }

    async fn insert_adoption(&mut self, adoption: NewAdoption) -> StoreResult<AdoptionRecord> {
        if self.work.adoptions.contains_key(&adoption.listing_id) {
            return Err(StoreError::Conflict(format!(
                "adoption already exists for listing {}",
                adoption.listing_id
            )));
        }
        let record = AdoptionRecord {
            id: self.work.next_id(),
            listing_id: adoption.listing_id,
            adopter_id: adoption.adopter_id,
            price_paid: adoption.price_paid,
            confirmed: adoption.confirmed,
            remarks: None,
            adopted_at: Utc::now(),
        };
        self.work.adoptions.insert(record.listing_id, record.clone());
        Ok(record)
    }

    async fn lock_order(&mut self, id: i64) -> StoreResult<Order> {
        self.work
            .orders
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("order"))
    }

    async fn update_order_status(&mut self, id: i64, status: OrderStatus) -> StoreResult<()> {
        let order = self
            .work
            .orders
            .get_mut(&id)
            .ok_or(StoreError::NotFound("order"))?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn get_product(&mut self, id: i64) -> StoreResult<Option<Product>> {
        Ok(self.work.products.get(&id).cloned())
    }

    async fn insert_order(
        &mut self,
        order: NewOrder,
        items: &[NewOrderItem],
    ) -> StoreResult<(Order, Vec<OrderItem>)> {
        let now = Utc::now();
        let order = Order {
            id: self.work.next_id(),
            user_id: order.user_id,
            status: order.status,
            currency: order.currency,
            total: order.total,
            created_at: now,
            updated_at: now,
        };
        let items: Vec<OrderItem> = items
            .iter()
            .map(|item| OrderItem {
                id: self.work.next_id(),
                order_id: order.id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price.clone(),
            })
            .collect();
        self.work.orders.insert(order.id, order.clone());
        self.work.order_items.insert(order.id, items.clone());
        Ok((order, items))
    }

    async fn latest_active_rate(
        &mut self,
        category_id: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<CategoryRate>> {
        Ok(self.work.rates.get(&category_id).and_then(|rates| {
            rates
                .iter()
                .filter(|rate| rate.applies_at(now))
                .max_by_key(|rate| (rate.created_at, rate.id))
                .cloned()
        }))
    }

    async fn insert_payment(
        &mut self,
        payment: NewPaymentTransaction,
    ) -> StoreResult<PaymentTransaction> {
        if self.work.payments.contains_key(&payment.reference) {
            return Err(StoreError::Conflict(format!(
                "payment transaction {} already exists",
                payment.reference
            )));
        }
        let now = Utc::now();
        let payment = PaymentTransaction {
            id: self.work.next_id(),
            reference: payment.reference,
            user_id: payment.user_id,
            order_id: payment.order_id,
            amount: payment.amount,
            currency: payment.currency,
            status: payment.status,
            raw_payload: payment.raw_payload,
            credited: payment.credited,
            credit_error: None,
            created_at: now,
            updated_at: now,
        };
        self.work
            .payments
            .insert(payment.reference.clone(), payment.clone());
        Ok(payment)
    }

    async fn lock_or_create_payment(
        &mut self,
        reference: &str,
        fallback: NewPaymentTransaction,
    ) -> StoreResult<PaymentTransaction> {
        if let Some(existing) = self.work.payments.get(reference) {
            return Ok(existing.clone());
        }
        self.insert_payment(fallback).await
    }

    async fn update_payment(&mut self, payment: &PaymentTransaction) -> StoreResult<()> {
        let stored = self
            .work
            .payments
            .get_mut(&payment.reference)
            .ok_or(StoreError::NotFound("payment transaction"))?;
        *stored = payment.clone();
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        let MemoryTx { mut guard, work } = self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_unit_rolls_back() {
        let store = MemoryStore::new();
        store.get_or_create_account(1, "NPR").await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            let mut account = tx.lock_account(1).await.unwrap();
            account.balance = "99.00".parse().unwrap();
            tx.update_account(&account).await.unwrap();
            // dropped without commit
        }

        let account = store.get_account(1).await.unwrap().unwrap();
        assert_eq!(account.balance, money::zero());
    }

    #[tokio::test]
    async fn committed_unit_persists() {
        let store = MemoryStore::new();
        store.get_or_create_account(1, "NPR").await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let mut account = tx.lock_account(1).await.unwrap();
        account.balance = "42.00".parse().unwrap();
        tx.update_account(&account).await.unwrap();
        tx.commit().await.unwrap();

        let account = store.get_account(1).await.unwrap().unwrap();
        assert_eq!(account.balance, "42.00".parse::<bigdecimal::BigDecimal>().unwrap());
    }

    #[tokio::test]
    async fn begin_times_out_while_unit_is_held() {
        let store = MemoryStore::with_lock_wait(Duration::from_millis(20));
        let _held = store.begin().await.unwrap();
        let err = store.begin().await.unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout));
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let store = MemoryStore::new();
        let first = store.get_or_create_account(7, "NPR").await.unwrap();
        let second = store.get_or_create_account(7, "NPR").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn duplicate_adoption_conflicts() {
        let store = MemoryStore::new();
        let listing = store
            .insert_listing(NewListing {
                owner_id: 1,
                name: "Rex".to_string(),
                species: "dog".to_string(),
                category_id: None,
                custom_price: None,
                duration_days: 1,
                currency: "USD".to_string(),
            })
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        let adoption = NewAdoption {
            listing_id: listing.id,
            adopter_id: 2,
            price_paid: money::zero(),
            confirmed: true,
        };
        tx.insert_adoption(adoption.clone()).await.unwrap();
        let err = tx.insert_adoption(adoption).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
