//! Storage port for the ledger.
//!
//! A [`Store`] hands out [`StoreTx`] units. One unit is one atomic
//! all-or-nothing scope: every `lock_*` method takes an exclusive row lock
//! that is held until commit, and dropping a unit without committing rolls
//! every change back. Callers that lock more than one account must do so in
//! ascending `user_id` order; that total order is what rules out deadlock
//! between concurrent settlements.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{
    Account, AdoptionRecord, CategoryRate, Listing, NewAdoption, NewCategoryRate, NewListing,
    NewOrder, NewOrderItem, NewPaymentTransaction, NewProduct, Order, OrderItem, OrderStatus,
    PaymentTransaction, Product,
};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflicting concurrent update: {0}")]
    Conflict(String),

    #[error("timed out waiting for a row lock")]
    LockTimeout,

    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable store handle. Reads outside a unit see committed state only;
/// the `insert_*` helpers exist for the catalog collaborator and tests.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: StoreTx;

    /// Opens an atomic unit. Lock waits inside the unit are bounded; hitting
    /// the bound surfaces as [`StoreError::LockTimeout`] with no mutation.
    async fn begin(&self) -> StoreResult<Self::Tx>;

    async fn get_account(&self, user_id: i64) -> StoreResult<Option<Account>>;

    /// Provisioning primitive: returns the existing account or creates a
    /// zero-balance one.
    async fn get_or_create_account(&self, user_id: i64, currency: &str) -> StoreResult<Account>;

    async fn get_listing(&self, id: i64) -> StoreResult<Option<Listing>>;

    async fn insert_listing(&self, listing: NewListing) -> StoreResult<Listing>;

    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product>;

    async fn insert_category_rate(&self, rate: NewCategoryRate) -> StoreResult<CategoryRate>;

    async fn get_order(&self, id: i64) -> StoreResult<Option<Order>>;

    async fn order_items(&self, order_id: i64) -> StoreResult<Vec<OrderItem>>;

    async fn adoption_for_listing(&self, listing_id: i64) -> StoreResult<Option<AdoptionRecord>>;

    async fn get_payment_by_reference(
        &self,
        reference: &str,
    ) -> StoreResult<Option<PaymentTransaction>>;
}

/// One atomic unit. Dropping without [`StoreTx::commit`] rolls back.
#[async_trait]
pub trait StoreTx: Send {
    /// Locks an account row exclusively for the rest of the unit.
    async fn lock_account(&mut self, user_id: i64) -> StoreResult<Account>;

    /// Persists a balance previously mutated on a locked account.
    async fn update_account(&mut self, account: &Account) -> StoreResult<()>;

    async fn lock_listing(&mut self, id: i64) -> StoreResult<Listing>;

    async fn set_listing_available(&mut self, id: i64, available: bool) -> StoreResult<()>;

    async fn insert_adoption(&mut self, adoption: NewAdoption) -> StoreResult<AdoptionRecord>;

    async fn lock_order(&mut self, id: i64) -> StoreResult<Order>;

    async fn update_order_status(&mut self, id: i64, status: OrderStatus) -> StoreResult<()>;

    async fn get_product(&mut self, id: i64) -> StoreResult<Option<Product>>;

    async fn insert_order(
        &mut self,
        order: NewOrder,
        items: &[NewOrderItem],
    ) -> StoreResult<(Order, Vec<OrderItem>)>;

    /// Most recently created rate for the category that is active and within
    /// its validity window at `now`. Served from an index, not a scan.
    async fn latest_active_rate(
        &mut self,
        category_id: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<CategoryRate>>;

    async fn insert_payment(
        &mut self,
        payment: NewPaymentTransaction,
    ) -> StoreResult<PaymentTransaction>;

    /// Locks the payment row for `reference`, inserting `fallback` first when
    /// no row exists yet. This is the reconciler's dedup point: concurrent
    /// notifications for one reference serialize here.
    async fn lock_or_create_payment(
        &mut self,
        reference: &str,
        fallback: NewPaymentTransaction,
    ) -> StoreResult<PaymentTransaction>;

    async fn update_payment(&mut self, payment: &PaymentTransaction) -> StoreResult<()>;

    async fn commit(self) -> StoreResult<()>;
}
