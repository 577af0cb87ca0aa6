pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod services;
pub mod store;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::services::{AccountService, ReconcilerService, SettlementService};
use crate::store::Store;

pub struct AppState<S: Store> {
    pub store: Arc<S>,
    pub accounts: AccountService<S>,
    pub settlements: SettlementService<S>,
    pub reconciler: ReconcilerService<S>,
}

impl<S: Store> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            accounts: self.accounts.clone(),
            settlements: self.settlements.clone(),
            reconciler: self.reconciler.clone(),
        }
    }
}

impl<S: Store> AppState<S> {
    pub fn new(store: Arc<S>, gateway_form_url: String) -> Self {
        Self {
            accounts: AccountService::new(store.clone()),
            settlements: SettlementService::new(store.clone()),
            reconciler: ReconcilerService::new(store.clone(), gateway_form_url),
            store,
        }
    }
}

pub fn create_app<S: Store>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/accounts/provision", post(handlers::accounts::provision::<S>))
        .route("/accounts/me", get(handlers::accounts::me::<S>))
        .route("/pets/:id/adopt", post(handlers::adoptions::adopt::<S>))
        .route("/shop/orders", post(handlers::orders::create_order::<S>))
        .route("/shop/orders/pay", post(handlers::orders::pay_order::<S>))
        .route("/payments/initiate", post(handlers::webhook::initiate::<S>))
        .route("/payments/callback", post(handlers::webhook::callback::<S>))
        .route(
            "/payments/transactions/:reference",
            get(handlers::webhook::get_transaction::<S>),
        )
        .with_state(state)
}
