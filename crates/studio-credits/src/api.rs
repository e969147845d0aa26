use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::{DeductRequest, DeductResponse, LedgerError, Session, WalletSummary};

/// Authoritative credit endpoints, called with the caller's session
///
/// `deduct` must re-check the balance and, only if it covers the cost,
/// decrement it and append the ledger entry as one unit. A lack of funds is
/// reported as a rejected [`DeductResponse`] (or
/// [`LedgerError::InsufficientFunds`]), never as a transport error.
#[async_trait]
pub trait CreditApi: Send + Sync {
    async fn deduct(
        &self,
        session: &Session,
        request: DeductRequest,
    ) -> Result<DeductResponse, LedgerError>;

    async fn wallet_summary(&self, session: &Session) -> Result<WalletSummary, LedgerError>;

    /// Compensate one deduction entry; returns the updated summary
    async fn refund(&self, session: &Session, entry_id: Uuid)
    -> Result<WalletSummary, LedgerError>;
}

#[async_trait]
impl<A: CreditApi + ?Sized> CreditApi for Arc<A> {
    async fn deduct(
        &self,
        session: &Session,
        request: DeductRequest,
    ) -> Result<DeductResponse, LedgerError> {
        (**self).deduct(session, request).await
    }

    async fn wallet_summary(&self, session: &Session) -> Result<WalletSummary, LedgerError> {
        (**self).wallet_summary(session).await
    }

    async fn refund(
        &self,
        session: &Session,
        entry_id: Uuid,
    ) -> Result<WalletSummary, LedgerError> {
        (**self).refund(session, entry_id).await
    }
}
