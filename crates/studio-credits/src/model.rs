use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wire error code for a deduction rejected for lack of funds
pub const INSUFFICIENT_CREDITS: &str = "insufficient_credits";

/// Authenticated caller of the credit API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub token: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }

    /// Value of the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Server-side balance row of one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub balance: u64,
    pub total_purchased: u64,
    pub total_spent: u64,
    pub purchase_count: u64,
}

impl WalletState {
    pub fn summary(&self) -> WalletSummary {
        WalletSummary {
            balance: self.balance,
            purchase_count: self.purchase_count,
            total_purchased: self.total_purchased,
            total_spent: self.total_spent,
        }
    }
}

/// Response of the wallet summary endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSummary {
    pub balance: u64,
    pub purchase_count: u64,
    pub total_purchased: u64,
    pub total_spent: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    Purchase,
    Grant,
    Deduction,
    Refund,
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryType::Purchase => "purchase",
            LedgerEntryType::Grant => "grant",
            LedgerEntryType::Deduction => "deduction",
            LedgerEntryType::Refund => "refund",
        }
    }
}

/// Append-only record of one balance change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: String,
    /// Signed change to the balance
    pub amount: i64,
    #[serde(rename = "type")]
    pub entry_type: LedgerEntryType,
    pub description: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        user_id: impl Into<String>,
        amount: i64,
        entry_type: LedgerEntryType,
        description: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            amount,
            entry_type,
            description: description.into(),
            metadata,
            created_at: Utc::now(),
        }
    }
}

/// Body of a deduction request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductRequest {
    pub action_type: String,
    pub cost: u64,
}

impl DeductRequest {
    pub fn new(action_type: impl Into<String>, cost: u64) -> Self {
        Self {
            action_type: action_type.into(),
            cost,
        }
    }
}

/// Body of a deduction response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<Uuid>,
}

impl DeductResponse {
    pub fn charged(new_balance: u64, entry_id: Uuid) -> Self {
        Self {
            success: true,
            new_balance: Some(new_balance),
            error: None,
            entry_id: Some(entry_id),
        }
    }

    pub fn rejected(error: impl Into<String>, balance: Option<u64>) -> Self {
        Self {
            success: false,
            new_balance: balance,
            error: Some(error.into()),
            entry_id: None,
        }
    }

    /// Rejected because the balance did not cover the cost
    pub fn is_insufficient(&self) -> bool {
        !self.success && self.error.as_deref() == Some(INSUFFICIENT_CREDITS)
    }
}

/// Result of a ledger/balance consistency check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub balance: u64,
    pub ledger_sum: i64,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        i64::try_from(self.balance).is_ok_and(|balance| balance == self.ledger_sum)
    }
}
