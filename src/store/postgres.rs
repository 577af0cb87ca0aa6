//! PostgreSQL store adapter.
//!
//! One [`StoreTx`] maps to one database transaction; row locks are plain
//! `SELECT ... FOR UPDATE`, and `SET LOCAL lock_timeout` bounds every lock
//! wait inside the unit. Row structs stay private to this adapter and convert
//! into domain entities at the edge.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::Transaction;

use crate::domain::{
    Account, AdoptionRecord, CategoryRate, Listing, NewAdoption, NewCategoryRate, NewListing,
    NewOrder, NewOrderItem, NewPaymentTransaction, NewProduct, Order, OrderItem, OrderStatus,
    PaymentTransaction, Product,
};
use crate::store::{Store, StoreError, StoreResult, StoreTx};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PostgresStore {
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self {
            pool,
            lock_timeout_ms,
        }
    }

    pub async fn connect(database_url: &str, lock_timeout_ms: u64) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool, lock_timeout_ms))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::RowNotFound => StoreError::NotFound("row"),
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // lock_not_available: FOR UPDATE wait exceeded lock_timeout
            Some("55P03") => StoreError::LockTimeout,
            // unique_violation
            Some("23505") => StoreError::Conflict(db.message().to_string()),
            _ => StoreError::Backend(err.to_string()),
        },
        _ => StoreError::Backend(err.to_string()),
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> StoreResult<PostgresTx> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let stmt = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout_ms);
        sqlx::query(&stmt)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        Ok(PostgresTx { tx })
    }

    async fn get_account(&self, user_id: i64) -> StoreResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(AccountRow::into_domain))
    }

    async fn get_or_create_account(&self, user_id: i64, currency: &str) -> StoreResult<Account> {
        sqlx::query(
            "INSERT INTO accounts (user_id, currency) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(currency)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let row = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.into_domain())
    }

    async fn get_listing(&self, id: i64) -> StoreResult<Option<Listing>> {
        let row = sqlx::query_as::<_, ListingRow>("SELECT * FROM listings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(ListingRow::into_domain))
    }

    async fn insert_listing(&self, listing: NewListing) -> StoreResult<Listing> {
        let row = sqlx::query_as::<_, ListingRow>(
            r#"
            INSERT INTO listings (owner_id, name, species, category_id, custom_price, duration_days, currency)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(listing.owner_id)
        .bind(&listing.name)
        .bind(&listing.species)
        .bind(listing.category_id)
        .bind(&listing.custom_price)
        .bind(listing.duration_days as i32)
        .bind(&listing.currency)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into_domain())
    }

    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            INSERT INTO products (name, price, discount_price, available)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&product.name)
        .bind(&product.price)
        .bind(&product.discount_price)
        .bind(product.available)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into_domain())
    }

    async fn insert_category_rate(&self, rate: NewCategoryRate) -> StoreResult<CategoryRate> {
        let row = sqlx::query_as::<_, CategoryRateRow>(
            r#"
            INSERT INTO category_rates (category_id, price_per_day, currency, active, valid_from, valid_to)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(rate.category_id)
        .bind(&rate.price_per_day)
        .bind(&rate.currency)
        .bind(rate.active)
        .bind(rate.valid_from)
        .bind(rate.valid_to)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into_domain())
    }

    async fn get_order(&self, id: i64) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(OrderRow::into_domain).transpose()
    }

    async fn order_items(&self, order_id: i64) -> StoreResult<Vec<OrderItem>> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT * FROM order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(OrderItemRow::into_domain).collect())
    }

    async fn adoption_for_listing(&self, listing_id: i64) -> StoreResult<Option<AdoptionRecord>> {
        let row =
            sqlx::query_as::<_, AdoptionRow>("SELECT * FROM adoptions WHERE listing_id = $1")
                .bind(listing_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;
        Ok(row.map(AdoptionRow::into_domain))
    }

    async fn get_payment_by_reference(
        &self,
        reference: &str,
    ) -> StoreResult<Option<PaymentTransaction>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            "SELECT * FROM payment_transactions WHERE reference = $1",
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(PaymentRow::into_domain).transpose()
    }
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn lock_account(&mut self, user_id: i64) -> StoreResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        row.map(AccountRow::into_domain)
            .ok_or(StoreError::NotFound("account"))
    }

    async fn update_account(&mut self, account: &Account) -> StoreResult<()> {
        sqlx::query("UPDATE accounts SET balance = $1, updated_at = now() WHERE user_id = $2")
            .bind(&account.balance)
            .bind(account.user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn lock_listing(&mut self, id: i64) -> StoreResult<Listing> {
        let row =
            sqlx::query_as::<_, ListingRow>("SELECT * FROM listings WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(map_sqlx)?;
        row.map(ListingRow::into_domain)
            .ok_or(StoreError::NotFound("listing"))
    }

    async fn set_listing_available(&mut self, id: i64, available: bool) -> StoreResult<()> {
        sqlx::query("UPDATE listings SET available = $1 WHERE id = $2")
            .bind(available)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn insert_adoption(&mut self, adoption: NewAdoption) -> StoreResult<AdoptionRecord> {
        let row = sqlx::query_as::<_, AdoptionRow>(
            r#"
            INSERT INTO adoptions (listing_id, adopter_id, price_paid, confirmed)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(adoption.listing_id)
        .bind(adoption.adopter_id)
        .bind(&adoption.price_paid)
        .bind(adoption.confirmed)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.into_domain())
    }

    async fn lock_order(&mut self, id: i64) -> StoreResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        row.map(OrderRow::into_domain)
            .transpose()?
            .ok_or(StoreError::NotFound("order"))
    }

    async fn update_order_status(&mut self, id: i64, status: OrderStatus) -> StoreResult<()> {
        sqlx::query("UPDATE orders SET status = $1, updated_at = now() WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_product(&mut self, id: i64) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(ProductRow::into_domain))
    }

    async fn insert_order(
        &mut self,
        order: NewOrder,
        items: &[NewOrderItem],
    ) -> StoreResult<(Order, Vec<OrderItem>)> {
        let order_row = sqlx::query_as::<_, OrderRow>(
            r#"
            INSERT INTO orders (user_id, status, currency, total)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(order.user_id)
        .bind(order.status.as_str())
        .bind(&order.currency)
        .bind(&order.total)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        let order = order_row.into_domain()?;

        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, OrderItemRow>(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.quantity as i32)
            .bind(&item.unit_price)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
            inserted.push(row.into_domain());
        }

        Ok((order, inserted))
    }

    async fn latest_active_rate(
        &mut self,
        category_id: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<CategoryRate>> {
        let row = sqlx::query_as::<_, CategoryRateRow>(
            r#"
            SELECT * FROM category_rates
            WHERE category_id = $1
              AND active
              AND (valid_from IS NULL OR valid_from <= $2)
              AND (valid_to IS NULL OR valid_to >= $2)
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(category_id)
        .bind(now)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(CategoryRateRow::into_domain))
    }

    async fn insert_payment(
        &mut self,
        payment: NewPaymentTransaction,
    ) -> StoreResult<PaymentTransaction> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            INSERT INTO payment_transactions
                (reference, user_id, order_id, amount, currency, status, raw_payload, credited)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&payment.reference)
        .bind(payment.user_id)
        .bind(payment.order_id)
        .bind(&payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(&payment.raw_payload)
        .bind(payment.credited)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        row.into_domain()
    }

    async fn lock_or_create_payment(
        &mut self,
        reference: &str,
        fallback: NewPaymentTransaction,
    ) -> StoreResult<PaymentTransaction> {
        sqlx::query(
            r#"
            INSERT INTO payment_transactions
                (reference, user_id, order_id, amount, currency, status, raw_payload, credited)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (reference) DO NOTHING
            "#,
        )
        .bind(reference)
        .bind(fallback.user_id)
        .bind(fallback.order_id)
        .bind(&fallback.amount)
        .bind(&fallback.currency)
        .bind(fallback.status.as_str())
        .bind(&fallback.raw_payload)
        .bind(fallback.credited)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;

        let row = sqlx::query_as::<_, PaymentRow>(
            "SELECT * FROM payment_transactions WHERE reference = $1 FOR UPDATE",
        )
        .bind(reference)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        row.into_domain()
    }

    async fn update_payment(&mut self, payment: &PaymentTransaction) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE payment_transactions
            SET user_id = $1, order_id = $2, amount = $3, currency = $4, status = $5,
                raw_payload = $6, credited = $7, credit_error = $8, updated_at = now()
            WHERE reference = $9
            "#,
        )
        .bind(payment.user_id)
        .bind(payment.order_id)
        .bind(&payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(&payment.raw_payload)
        .bind(payment.credited)
        .bind(&payment.credit_error)
        .bind(&payment.reference)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await.map_err(map_sqlx)
    }
}

// --- Row types. Internal to the adapter. ---

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: i64,
    user_id: i64,
    balance: BigDecimal,
    currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_domain(self) -> Account {
        Account {
            id: self.id,
            user_id: self.user_id,
            balance: self.balance,
            currency: self.currency,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ListingRow {
    id: i64,
    owner_id: i64,
    name: String,
    species: String,
    category_id: Option<i64>,
    available: bool,
    custom_price: Option<BigDecimal>,
    duration_days: i32,
    currency: String,
    created_at: DateTime<Utc>,
}

impl ListingRow {
    fn into_domain(self) -> Listing {
        Listing {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            species: self.species,
            category_id: self.category_id,
            available: self.available,
            custom_price: self.custom_price,
            duration_days: self.duration_days.max(1) as u32,
            currency: self.currency,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRateRow {
    id: i64,
    category_id: i64,
    price_per_day: BigDecimal,
    currency: String,
    active: bool,
    valid_from: Option<DateTime<Utc>>,
    valid_to: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl CategoryRateRow {
    fn into_domain(self) -> CategoryRate {
        CategoryRate {
            id: self.id,
            category_id: self.category_id,
            price_per_day: self.price_per_day,
            currency: self.currency,
            active: self.active,
            valid_from: self.valid_from,
            valid_to: self.valid_to,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdoptionRow {
    id: i64,
    listing_id: i64,
    adopter_id: i64,
    price_paid: BigDecimal,
    confirmed: bool,
    remarks: Option<String>,
    adopted_at: DateTime<Utc>,
}

impl AdoptionRow {
    fn into_domain(self) -> AdoptionRecord {
        AdoptionRecord {
            id: self.id,
            listing_id: self.listing_id,
            adopter_id: self.adopter_id,
            price_paid: self.price_paid,
            confirmed: self.confirmed,
            remarks: self.remarks,
            adopted_at: self.adopted_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    price: BigDecimal,
    discount_price: Option<BigDecimal>,
    available: bool,
}

impl ProductRow {
    fn into_domain(self) -> Product {
        Product {
            id: self.id,
            name: self.name,
            price: self.price,
            discount_price: self.discount_price,
            available: self.available,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    status: String,
    currency: String,
    total: BigDecimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_domain(self) -> StoreResult<Order> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(StoreError::Backend)?;
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            status,
            currency: self.currency,
            total: self.total,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i64,
    order_id: i64,
    product_id: i64,
    quantity: i32,
    unit_price: BigDecimal,
}

impl OrderItemRow {
    fn into_domain(self) -> OrderItem {
        OrderItem {
            id: self.id,
            order_id: self.order_id,
            product_id: self.product_id,
            quantity: self.quantity.max(0) as u32,
            unit_price: self.unit_price,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: i64,
    reference: String,
    user_id: Option<i64>,
    order_id: Option<i64>,
    amount: BigDecimal,
    currency: String,
    status: String,
    raw_payload: Option<serde_json::Value>,
    credited: bool,
    credit_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_domain(self) -> StoreResult<PaymentTransaction> {
        let status = self
            .status
            .parse::<crate::domain::PaymentStatus>()
            .map_err(StoreError::Backend)?;
        Ok(PaymentTransaction {
            id: self.id,
            reference: self.reference,
            user_id: self.user_id,
            order_id: self.order_id,
            amount: self.amount,
            currency: self.currency,
            status,
            raw_payload: self.raw_payload,
            credited: self.credited,
            credit_error: self.credit_error,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
