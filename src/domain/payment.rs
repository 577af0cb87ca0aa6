//! Payment transactions and gateway notification classification.
//!
//! A [`PaymentTransaction`] represents either one attempt with the external
//! gateway or an internal account-to-account settlement. The `credited` flag
//! is monotonic: it transitions false→true at most once, on the first
//! transition into `Completed`, and gates the one-time account credit.
//!
//! Gateway notifications arrive as opaque key/value payloads. Every accepted
//! key name is enumerated here; classification is a closed enum rather than
//! field probing scattered through the handler.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_CURRENCY: &str = "NPR";

/// Keys that may carry the transaction identifier, in lookup order.
pub const REFERENCE_KEYS: &[&str] = &["transaction_uuid", "pid", "oid"];

/// `status` values recognized as success (compared case-insensitively).
pub const SUCCESS_STATUS_MARKERS: &[&str] = &["SUCCESS", "COMPLETE", "COMPLETED"];

/// Keys whose non-empty presence alone marks success (gateway reference ids).
pub const SUCCESS_REF_KEYS: &[&str] = &["rid", "refId"];

/// `status` values recognized as failure (compared case-insensitively).
pub const FAILURE_STATUS_MARKERS: &[&str] = &["FAILED", "ERROR"];

/// Keys that may carry the paid amount, in lookup order.
pub const AMOUNT_KEYS: &[&str] = &[
    "tAmt",
    "amt",
    "amount",
    "total_amount",
    "totalAmount",
    "tamount",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: i64,
    /// Externally-supplied transaction identifier; unique.
    pub reference: String,
    /// Initiating identity, when known.
    pub user_id: Option<i64>,
    /// Order this payment funds, for internal settlements.
    pub order_id: Option<i64>,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: PaymentStatus,
    /// Last gateway notification, kept verbatim for audit.
    pub raw_payload: Option<Value>,
    /// Set once, when the completed payment is credited to the account.
    pub credited: bool,
    /// Operator-visible reason a due credit could not be applied.
    pub credit_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentTransaction {
    pub reference: String,
    pub user_id: Option<i64>,
    pub order_id: Option<i64>,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub raw_payload: Option<Value>,
    pub credited: bool,
}

impl NewPaymentTransaction {
    /// Zero-amount pending placeholder for a notification that arrived before
    /// any local record existed.
    pub fn placeholder(reference: &str) -> Self {
        Self {
            reference: reference.to_string(),
            user_id: None,
            order_id: None,
            amount: crate::domain::money::zero(),
            currency: DEFAULT_CURRENCY.to_string(),
            status: PaymentStatus::Pending,
            raw_payload: None,
            credited: false,
        }
    }
}

/// Outcome of classifying one gateway notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    Completed,
    Failed,
    /// No recognized marker; the transaction status is left unchanged.
    Unrecognized,
}

fn non_empty_str<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Pulls the transaction identifier out of a notification payload.
pub fn extract_reference(payload: &Value) -> Option<String> {
    REFERENCE_KEYS
        .iter()
        .find_map(|key| non_empty_str(payload, key))
        .map(str::to_string)
}

/// Classifies a notification. Success markers win over failure markers: some
/// gateways send a reference id alongside a stale status field.
pub fn classify(payload: &Value) -> GatewayStatus {
    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_uppercase();

    let has_success_ref = SUCCESS_REF_KEYS
        .iter()
        .any(|key| non_empty_str(payload, key).is_some());

    if SUCCESS_STATUS_MARKERS.contains(&status.as_str()) || has_success_ref {
        return GatewayStatus::Completed;
    }
    if FAILURE_STATUS_MARKERS.contains(&status.as_str()) {
        return GatewayStatus::Failed;
    }
    GatewayStatus::Unrecognized
}

/// Finds a parseable amount among the known payload keys. Gateways disagree
/// on both the key name and whether the value is a string or a number.
pub fn extract_amount(payload: &Value) -> Option<BigDecimal> {
    for key in AMOUNT_KEYS {
        let parsed = match payload.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => s.parse::<BigDecimal>().ok(),
            Some(Value::Number(n)) => n.to_string().parse::<BigDecimal>().ok(),
            _ => None,
        };
        if parsed.is_some() {
            return parsed;
        }
    }
    None
}
