//! Gateway reconciler.
//!
//! Consumes the append-only stream of asynchronous gateway notifications and
//! applies each one's effect exactly once. The dedup point is the payment
//! row lock on the externally-supplied reference: replays serialize there,
//! observe `credited == true`, and change no balance.
//!
//! A crediting failure is recorded on the transaction for operators but does
//! not fail the notification; the gateway gets its acknowledgment either way
//! and never retries forever over a business condition.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    GatewayStatus, NewPaymentTransaction, PaymentStatus, PaymentTransaction, money, payment,
};
use crate::error::LedgerError;
use crate::store::{Store, StoreError, StoreTx};

#[derive(Debug, Clone, Deserialize)]
pub struct InitiateRequest {
    pub amount: BigDecimal,
    #[serde(default)]
    pub currency: Option<String>,
    /// Client-supplied transaction identifier; generated when absent.
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiateResponse {
    pub reference: String,
    pub status: PaymentStatus,
    /// Where the client posts the gateway form.
    pub gateway_form_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallbackAck {
    pub detail: String,
    pub reference: String,
}

pub struct ReconcilerService<S: Store> {
    store: Arc<S>,
    gateway_form_url: String,
}

impl<S: Store> Clone for ReconcilerService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            gateway_form_url: self.gateway_form_url.clone(),
        }
    }
}

impl<S: Store> ReconcilerService<S> {
    pub fn new(store: Arc<S>, gateway_form_url: String) -> Self {
        Self {
            store,
            gateway_form_url,
        }
    }

    /// Records a pending payment attempt before the client is sent to the
    /// gateway. If the gateway notified first, the zero-amount placeholder it
    /// left behind is claimed by attaching the initiating user and amount.
    pub async fn initiate(
        &self,
        user_id: i64,
        request: InitiateRequest,
    ) -> Result<InitiateResponse, LedgerError> {
        if !money::is_positive(&request.amount) {
            return Err(LedgerError::InvalidAmount(format!(
                "payment amount must be positive, got {}",
                request.amount
            )));
        }

        let reference = match request.reference {
            Some(reference) if !reference.trim().is_empty() => reference,
            _ => Uuid::new_v4().to_string(),
        };
        let currency = request
            .currency
            .unwrap_or_else(|| payment::DEFAULT_CURRENCY.to_string());
        let amount = money::quantize(&request.amount);

        let mut tx = self.store.begin().await?;
        let mut record = tx
            .lock_or_create_payment(
                &reference,
                NewPaymentTransaction {
                    reference: reference.clone(),
                    user_id: Some(user_id),
                    order_id: None,
                    amount: amount.clone(),
                    currency,
                    status: PaymentStatus::Pending,
                    raw_payload: None,
                    credited: false,
                },
            )
            .await?;

        let mut claimed = false;
        if record.user_id.is_none() {
            record.user_id = Some(user_id);
            claimed = true;
        }
        if !money::is_positive(&record.amount) && money::is_positive(&amount) {
            record.amount = amount;
            claimed = true;
        }
        if claimed {
            tx.update_payment(&record).await?;
        }
        tx.commit().await?;

        tracing::info!(reference = %record.reference, user_id, "payment initiated");
        Ok(InitiateResponse {
            reference: record.reference,
            status: record.status,
            gateway_form_url: self.gateway_form_url.clone(),
        })
    }

    /// Applies one gateway notification: dedups by reference, advances the
    /// status, credits the payer's account at most once, and keeps the raw
    /// payload for audit.
    pub async fn reconcile(&self, payload: Value) -> Result<CallbackAck, LedgerError> {
        let reference = payment::extract_reference(&payload).ok_or_else(|| {
            LedgerError::Validation(
                "transaction identifier (transaction_uuid/pid/oid) required".to_string(),
            )
        })?;

        let mut tx = self.store.begin().await?;
        let mut record = tx
            .lock_or_create_payment(&reference, NewPaymentTransaction::placeholder(&reference))
            .await?;

        // The previous status decides credit eligibility below.
        let previous_status = record.status;
        record.raw_payload = Some(payload.clone());

        match payment::classify(&payload) {
            GatewayStatus::Completed => record.status = PaymentStatus::Completed,
            GatewayStatus::Failed => record.status = PaymentStatus::Failed,
            GatewayStatus::Unrecognized => {}
        }

        let credit_due = record.status == PaymentStatus::Completed
            && previous_status != PaymentStatus::Completed
            && !record.credited;
        if credit_due {
            self.apply_credit(&mut tx, &mut record, &payload).await?;
        }

        tx.update_payment(&record).await?;
        tx.commit().await?;

        tracing::info!(
            reference = %record.reference,
            status = %record.status,
            credited = record.credited,
            "gateway notification reconciled"
        );
        Ok(CallbackAck {
            detail: "callback recorded".to_string(),
            reference: record.reference,
        })
    }

    /// Credits the linked account inside the caller's unit. Failures caused
    /// by the transaction's own state (no user, no amount, no account) are
    /// recorded on the record instead of propagated.
    async fn apply_credit(
        &self,
        tx: &mut S::Tx,
        record: &mut PaymentTransaction,
        payload: &Value,
    ) -> Result<(), LedgerError> {
        let Some(user_id) = record.user_id else {
            record.credit_error = Some("no initiating user linked to transaction".to_string());
            tracing::warn!(reference = %record.reference, "credit skipped: no linked user");
            return Ok(());
        };

        // Prefer the amount recorded at initiation; fall back to the payload.
        let amount = if money::is_positive(&record.amount) {
            Some(record.amount.clone())
        } else {
            payment::extract_amount(payload)
                .map(|amount| money::quantize(&amount))
                .filter(|amount| money::is_positive(amount))
        };
        let Some(amount) = amount else {
            record.credit_error = Some("unable to resolve credit amount".to_string());
            tracing::warn!(reference = %record.reference, "credit skipped: no resolvable amount");
            return Ok(());
        };

        match tx.lock_account(user_id).await {
            Ok(mut account) => {
                account.topup(&amount)?;
                tx.update_account(&account).await?;
                record.amount = amount.clone();
                record.credited = true;
                record.credit_error = None;
                tracing::info!(
                    reference = %record.reference,
                    user_id,
                    amount = %amount,
                    "account credited"
                );
            }
            Err(StoreError::NotFound(_)) => {
                record.credit_error = Some(format!("no account exists for user {user_id}"));
                tracing::warn!(
                    reference = %record.reference,
                    user_id,
                    "credit failed: account missing"
                );
            }
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }

    /// Owner-or-admin transaction lookup. Anyone else sees a 404, not a 403:
    /// the existence of someone else's transaction is not disclosed.
    pub async fn transaction_for(
        &self,
        reference: &str,
        user_id: i64,
        is_admin: bool,
    ) -> Result<PaymentTransaction, LedgerError> {
        let record = self
            .store
            .get_payment_by_reference(reference)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {reference}")))?;

        match record.user_id {
            Some(owner) if owner != user_id && !is_admin => {
                Err(LedgerError::NotFound(format!("transaction {reference}")))
            }
            _ => Ok(record),
        }
    }
}
