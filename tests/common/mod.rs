#![allow(dead_code)]

use std::sync::Arc;

use bigdecimal::BigDecimal;
use furlink_ledger::AppState;
use furlink_ledger::domain::{Listing, NewCategoryRate, NewListing, NewProduct, Product};
use furlink_ledger::store::{MemoryStore, Store, StoreTx};

pub const GATEWAY_URL: &str = "https://gateway.test/form";

pub fn dec(s: &str) -> BigDecimal {
    s.parse().unwrap()
}

pub fn state() -> AppState<MemoryStore> {
    AppState::new(Arc::new(MemoryStore::new()), GATEWAY_URL.to_string())
}

/// Provisions an account and seeds it with an opening balance.
pub async fn account_with_balance(state: &AppState<MemoryStore>, user_id: i64, balance: &str) {
    state.accounts.provision(user_id, None).await.unwrap();
    let amount = dec(balance);
    if amount == dec("0") {
        return;
    }
    let mut tx = state.store.begin().await.unwrap();
    let mut account = tx.lock_account(user_id).await.unwrap();
    account.topup(&amount).unwrap();
    tx.update_account(&account).await.unwrap();
    tx.commit().await.unwrap();
}

pub async fn balance_of(state: &AppState<MemoryStore>, user_id: i64) -> BigDecimal {
    state
        .store
        .get_account(user_id)
        .await
        .unwrap()
        .unwrap()
        .balance
}

pub async fn seed_listing(
    state: &AppState<MemoryStore>,
    owner_id: i64,
    custom_price: Option<&str>,
    category_id: Option<i64>,
    duration_days: u32,
) -> Listing {
    state
        .store
        .insert_listing(NewListing {
            owner_id,
            name: "Rex".to_string(),
            species: "dog".to_string(),
            category_id,
            custom_price: custom_price.map(|p| p.parse().unwrap()),
            duration_days,
            currency: "USD".to_string(),
        })
        .await
        .unwrap()
}

pub async fn seed_rate(state: &AppState<MemoryStore>, category_id: i64, price_per_day: &str) {
    state
        .store
        .insert_category_rate(NewCategoryRate {
            category_id,
            price_per_day: dec(price_per_day),
            currency: "USD".to_string(),
            active: true,
            valid_from: None,
            valid_to: None,
        })
        .await
        .unwrap();
}

pub async fn seed_product(
    state: &AppState<MemoryStore>,
    price: &str,
    discount_price: Option<&str>,
    available: bool,
) -> Product {
    state
        .store
        .insert_product(NewProduct {
            name: "chew toy".to_string(),
            price: dec(price),
            discount_price: discount_price.map(|p| p.parse().unwrap()),
            available,
        })
        .await
        .unwrap()
}
