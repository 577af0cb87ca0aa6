mod common;

use common::*;
use furlink_ledger::domain::{NewPaymentTransaction, PaymentStatus};
use furlink_ledger::error::LedgerError;
use furlink_ledger::services::InitiateRequest;
use furlink_ledger::store::{Store, StoreTx};
use serde_json::json;

const PAYER: i64 = 5;

fn initiate_request(amount: &str, reference: Option<&str>) -> InitiateRequest {
    InitiateRequest {
        amount: dec(amount),
        currency: None,
        reference: reference.map(str::to_string),
    }
}

#[tokio::test]
async fn successful_callback_credits_the_account_once() {
    let state = state();
    account_with_balance(&state, PAYER, "0.00").await;
    let initiated = state
        .reconciler
        .initiate(PAYER, initiate_request("100.50", None))
        .await
        .unwrap();

    let payload = json!({
        "transaction_uuid": initiated.reference,
        "status": "SUCCESS",
    });
    let ack = state.reconciler.reconcile(payload).await.unwrap();
    assert_eq!(ack.reference, initiated.reference);

    assert_eq!(balance_of(&state, PAYER).await, dec("100.50"));
    let record = state
        .store
        .get_payment_by_reference(&initiated.reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Completed);
    assert!(record.credited);
    assert!(record.credit_error.is_none());
    assert!(record.raw_payload.is_some());
}

#[tokio::test]
async fn replayed_callback_never_credits_twice() {
    let state = state();
    account_with_balance(&state, PAYER, "0.00").await;
    let initiated = state
        .reconciler
        .initiate(PAYER, initiate_request("40.00", None))
        .await
        .unwrap();

    let payload = json!({
        "transaction_uuid": initiated.reference,
        "status": "COMPLETE",
        "refId": "GW-1",
    });
    for _ in 0..5 {
        state.reconciler.reconcile(payload.clone()).await.unwrap();
    }

    // N deliveries, exactly one credit.
    assert_eq!(balance_of(&state, PAYER).await, dec("40.00"));
    let record = state
        .store
        .get_payment_by_reference(&initiated.reference)
        .await
        .unwrap()
        .unwrap();
    assert!(record.credited);
}

#[tokio::test]
async fn failed_callback_marks_failed_without_credit() {
    let state = state();
    account_with_balance(&state, PAYER, "0.00").await;
    let initiated = state
        .reconciler
        .initiate(PAYER, initiate_request("40.00", None))
        .await
        .unwrap();

    let payload = json!({
        "transaction_uuid": initiated.reference,
        "status": "FAILED",
    });
    state.reconciler.reconcile(payload).await.unwrap();

    assert_eq!(balance_of(&state, PAYER).await, dec("0.00"));
    let record = state
        .store
        .get_payment_by_reference(&initiated.reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Failed);
    assert!(!record.credited);
}

#[tokio::test]
async fn failure_then_success_still_credits_exactly_once() {
    let state = state();
    account_with_balance(&state, PAYER, "0.00").await;
    let initiated = state
        .reconciler
        .initiate(PAYER, initiate_request("25.00", None))
        .await
        .unwrap();

    state
        .reconciler
        .reconcile(json!({"transaction_uuid": initiated.reference, "status": "FAILED"}))
        .await
        .unwrap();
    state
        .reconciler
        .reconcile(json!({"transaction_uuid": initiated.reference, "status": "SUCCESS"}))
        .await
        .unwrap();

    assert_eq!(balance_of(&state, PAYER).await, dec("25.00"));
}

#[tokio::test]
async fn ambiguous_payload_leaves_status_unchanged() {
    let state = state();
    account_with_balance(&state, PAYER, "0.00").await;
    let initiated = state
        .reconciler
        .initiate(PAYER, initiate_request("25.00", None))
        .await
        .unwrap();

    state
        .reconciler
        .reconcile(json!({"transaction_uuid": initiated.reference, "status": "PROCESSING"}))
        .await
        .unwrap();

    let record = state
        .store
        .get_payment_by_reference(&initiated.reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Pending);
    assert!(!record.credited);
    assert_eq!(balance_of(&state, PAYER).await, dec("0.00"));
    // The raw payload is still captured for audit.
    assert!(record.raw_payload.is_some());
}

#[tokio::test]
async fn unknown_reference_creates_a_pending_placeholder() {
    let state = state();

    state
        .reconciler
        .reconcile(json!({"pid": "gw-777", "status": "PROCESSING"}))
        .await
        .unwrap();

    let record = state
        .store
        .get_payment_by_reference("gw-777")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Pending);
    assert_eq!(record.user_id, None);
    assert_eq!(record.amount, dec("0.00"));
}

#[tokio::test]
async fn initiate_claims_a_placeholder_left_by_an_early_callback() {
    let state = state();
    account_with_balance(&state, PAYER, "0.00").await;

    state
        .reconciler
        .reconcile(json!({"oid": "gw-88", "status": "PROCESSING"}))
        .await
        .unwrap();

    let initiated = state
        .reconciler
        .initiate(PAYER, initiate_request("60.00", Some("gw-88")))
        .await
        .unwrap();
    assert_eq!(initiated.reference, "gw-88");

    let record = state
        .store
        .get_payment_by_reference("gw-88")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.user_id, Some(PAYER));
    assert_eq!(record.amount, dec("60.00"));

    // The gateway retries with a success marker; the claimed transaction
    // now credits normally.
    state
        .reconciler
        .reconcile(json!({"oid": "gw-88", "status": "SUCCESS"}))
        .await
        .unwrap();
    assert_eq!(balance_of(&state, PAYER).await, dec("60.00"));
}

#[tokio::test]
async fn amount_is_recovered_from_payload_when_not_stored() {
    let state = state();
    account_with_balance(&state, PAYER, "0.00").await;

    // A transaction known locally but with no amount recorded yet.
    {
        let mut tx = state.store.begin().await.unwrap();
        tx.insert_payment(NewPaymentTransaction {
            reference: "gw-55".to_string(),
            user_id: Some(PAYER),
            order_id: None,
            amount: dec("0.00"),
            currency: "NPR".to_string(),
            status: PaymentStatus::Pending,
            raw_payload: None,
            credited: false,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    state
        .reconciler
        .reconcile(json!({"transaction_uuid": "gw-55", "status": "SUCCESS", "tAmt": "55.25"}))
        .await
        .unwrap();

    assert_eq!(balance_of(&state, PAYER).await, dec("55.25"));
    let record = state
        .store
        .get_payment_by_reference("gw-55")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.amount, dec("55.25"));
    assert!(record.credited);
}

#[tokio::test]
async fn completed_callback_without_linked_user_records_credit_error() {
    let state = state();

    state
        .reconciler
        .reconcile(json!({"pid": "gw-66", "status": "SUCCESS", "tAmt": "10.00"}))
        .await
        .unwrap();

    let record = state
        .store
        .get_payment_by_reference("gw-66")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Completed);
    assert!(!record.credited);
    assert!(record.credit_error.is_some());
}

#[tokio::test]
async fn missing_account_records_credit_error_but_acknowledges() {
    let state = state();
    // User 42 was never provisioned.
    {
        let mut tx = state.store.begin().await.unwrap();
        tx.insert_payment(NewPaymentTransaction {
            reference: "gw-42".to_string(),
            user_id: Some(42),
            order_id: None,
            amount: dec("15.00"),
            currency: "NPR".to_string(),
            status: PaymentStatus::Pending,
            raw_payload: None,
            credited: false,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    let ack = state
        .reconciler
        .reconcile(json!({"transaction_uuid": "gw-42", "status": "SUCCESS"}))
        .await
        .unwrap();
    assert_eq!(ack.reference, "gw-42");

    let record = state
        .store
        .get_payment_by_reference("gw-42")
        .await
        .unwrap()
        .unwrap();
    // The status advance sticks; the stuck credit is an operator concern.
    assert_eq!(record.status, PaymentStatus::Completed);
    assert!(!record.credited);
    assert_eq!(
        record.credit_error.as_deref(),
        Some("no account exists for user 42")
    );
}

#[tokio::test]
async fn unresolvable_amount_records_credit_error() {
    let state = state();
    account_with_balance(&state, PAYER, "0.00").await;
    {
        let mut tx = state.store.begin().await.unwrap();
        tx.insert_payment(NewPaymentTransaction {
            reference: "gw-77".to_string(),
            user_id: Some(PAYER),
            order_id: None,
            amount: dec("0.00"),
            currency: "NPR".to_string(),
            status: PaymentStatus::Pending,
            raw_payload: None,
            credited: false,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    state
        .reconciler
        .reconcile(json!({"transaction_uuid": "gw-77", "status": "SUCCESS"}))
        .await
        .unwrap();

    let record = state
        .store
        .get_payment_by_reference("gw-77")
        .await
        .unwrap()
        .unwrap();
    assert!(!record.credited);
    assert!(record.credit_error.is_some());
    assert_eq!(balance_of(&state, PAYER).await, dec("0.00"));
}

#[tokio::test]
async fn callback_without_identifier_is_a_validation_error() {
    let state = state();
    let err = state
        .reconciler
        .reconcile(json!({"status": "SUCCESS"}))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn initiate_rejects_non_positive_amounts() {
    let state = state();
    for amount in ["0.00", "-5.00"] {
        let err = state
            .reconciler
            .initiate(PAYER, initiate_request(amount, None))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
    }
}

#[tokio::test]
async fn initiate_is_idempotent_on_reference() {
    let state = state();
    account_with_balance(&state, PAYER, "0.00").await;

    let first = state
        .reconciler
        .initiate(PAYER, initiate_request("30.00", Some("gw-9")))
        .await
        .unwrap();
    let second = state
        .reconciler
        .initiate(PAYER, initiate_request("99.00", Some("gw-9")))
        .await
        .unwrap();

    assert_eq!(first.reference, second.reference);
    // The stored amount stays at the first initiation's value.
    let record = state
        .store
        .get_payment_by_reference("gw-9")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.amount, dec("30.00"));
}

#[tokio::test]
async fn transaction_lookup_hides_foreign_transactions() {
    let state = state();
    account_with_balance(&state, PAYER, "0.00").await;
    let initiated = state
        .reconciler
        .initiate(PAYER, initiate_request("10.00", None))
        .await
        .unwrap();

    // Owner sees it.
    let found = state
        .reconciler
        .transaction_for(&initiated.reference, PAYER, false)
        .await
        .unwrap();
    assert_eq!(found.reference, initiated.reference);

    // A stranger gets a not-found, not a forbidden.
    let err = state
        .reconciler
        .transaction_for(&initiated.reference, 99, false)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    // An admin sees everything.
    let found = state
        .reconciler
        .transaction_for(&initiated.reference, 99, true)
        .await
        .unwrap();
    assert_eq!(found.reference, initiated.reference);
}
