use thiserror::Error;
use uuid::Uuid;

/// Boxed error produced by a gated action
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the ledger and the credit API transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: u64, required: u64 },

    #[error("Invalid or expired session")]
    Unauthorized,

    #[error("Wallet for user {0} not found")]
    WalletNotFound(String),

    #[error("Ledger entry {0} not found")]
    EntryNotFound(Uuid),

    #[error("Ledger entry {0} is not a deduction")]
    NotRefundable(Uuid),

    #[error("Ledger entry {0} already refunded")]
    AlreadyRefunded(Uuid),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Outcome of a rejected or failed gated action
#[derive(Error, Debug)]
pub enum CreditError {
    /// Balance below the floor a (usually free) action requires
    #[error("Minimum balance of {required} credits not met (balance {balance})")]
    MinimumBalanceNotMet { required: u64, balance: u64 },

    /// Cost exceeds the balance, detected locally or by the server
    #[error("Insufficient credits: {required} required")]
    InsufficientCredits { required: u64, balance: Option<u64> },

    /// Network, auth or server fault unrelated to the balance
    #[error("Deduction failed: {0}")]
    DeductionFailed(String),

    /// The action itself failed; a charge made for it is not refunded
    #[error("Action failed: {source}")]
    ActionFailed {
        entry_id: Option<Uuid>,
        source: BoxError,
    },
}

impl CreditError {
    /// Ledger entry of the charge an `ActionFailed` was billed under
    pub fn charged_entry(&self) -> Option<Uuid> {
        match self {
            CreditError::ActionFailed { entry_id, .. } => *entry_id,
            _ => None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(
            self,
            CreditError::InsufficientCredits { .. } | CreditError::MinimumBalanceNotMet { .. }
        )
    }
}

impl From<LedgerError> for CreditError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds { balance, required } => {
                CreditError::InsufficientCredits {
                    required,
                    balance: Some(balance),
                }
            }
            other => CreditError::DeductionFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_maps_to_insufficient_credits() {
        let err = CreditError::from(LedgerError::InsufficientFunds {
            balance: 3,
            required: 8,
        });
        assert!(matches!(
            err,
            CreditError::InsufficientCredits {
                required: 8,
                balance: Some(3)
            }
        ));
        assert!(err.is_insufficient());
    }

    #[test]
    fn test_other_ledger_errors_are_deduction_failures() {
        let err = CreditError::from(LedgerError::Unauthorized);
        assert!(matches!(err, CreditError::DeductionFailed(_)));
        assert!(!err.is_insufficient());
    }

    #[test]
    fn test_action_failed_keeps_source() {
        let id = Uuid::new_v4();
        let err = CreditError::ActionFailed {
            entry_id: Some(id),
            source: "model timeout".into(),
        };
        assert_eq!(err.charged_entry(), Some(id));
        assert_eq!(err.to_string(), "Action failed: model timeout");
        assert!(std::error::Error::source(&err).is_some());
    }
}
