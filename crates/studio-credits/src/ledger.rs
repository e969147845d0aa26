//! In-process authoritative credit ledger
//!
//! Sessions, wallets and the append-only entry log live behind one mutex, so
//! a balance check, its decrement and the ledger append happen as one unit.
//! Concurrent deductions for the same user therefore can never jointly
//! overdraw the wallet.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    CreditApi, DeductRequest, DeductResponse, INSUFFICIENT_CREDITS, LedgerEntry, LedgerEntryType,
    LedgerError, Reconciliation, Session, WalletState, WalletSummary,
};

#[derive(Debug, Default)]
struct LedgerState {
    /// token -> user id
    sessions: HashMap<String, String>,
    wallets: HashMap<String, WalletState>,
    entries: Vec<LedgerEntry>,
    refunded: HashSet<Uuid>,
}

impl LedgerState {
    fn user_for(&self, session: &Session) -> Result<String, LedgerError> {
        match self.sessions.get(&session.token) {
            Some(user_id) if *user_id == session.user_id => Ok(user_id.clone()),
            _ => Err(LedgerError::Unauthorized),
        }
    }

    fn wallet(&self, user_id: &str) -> Result<&WalletState, LedgerError> {
        self.wallets
            .get(user_id)
            .ok_or_else(|| LedgerError::WalletNotFound(user_id.to_string()))
    }

    fn wallet_mut(&mut self, user_id: &str) -> Result<&mut WalletState, LedgerError> {
        self.wallets
            .get_mut(user_id)
            .ok_or_else(|| LedgerError::WalletNotFound(user_id.to_string()))
    }

    fn append(&mut self, entry: LedgerEntry) -> LedgerEntry {
        self.entries.push(entry.clone());
        entry
    }
}

fn signed(amount: u64) -> Result<i64, LedgerError> {
    i64::try_from(amount).map_err(|_| LedgerError::InvalidAmount(amount.to_string()))
}

/// Balance after crediting `amount`
///
/// Capped at `i64::MAX` so the signed ledger entries always sum to it.
fn credited(balance: u64, amount: u64) -> Result<u64, LedgerError> {
    balance
        .checked_add(amount)
        .filter(|total| i64::try_from(*total).is_ok())
        .ok_or_else(|| overflow(balance, amount))
}

fn overflow(total: u64, amount: u64) -> LedgerError {
    LedgerError::InvalidAmount(format!("adding {} to {} overflows", amount, total))
}

/// Authoritative ledger kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a bearer session for `user_id`, creating an empty wallet if needed
    pub fn open_session(&self, user_id: impl Into<String>) -> Session {
        let user_id = user_id.into();
        let session = Session::new(user_id.clone(), Uuid::new_v4().simple().to_string());

        let mut state = self.state.lock();
        state.wallets.entry(user_id.clone()).or_default();
        state.sessions.insert(session.token.clone(), user_id);
        session
    }

    /// Drop a session; later calls with it are unauthorized
    pub fn close_session(&self, session: &Session) -> bool {
        self.state.lock().sessions.remove(&session.token).is_some()
    }

    /// Credit a paid top-up
    pub fn purchase(
        &self,
        user_id: &str,
        amount: u64,
        description: impl Into<String>,
    ) -> Result<LedgerEntry, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount("purchase of 0 credits".to_string()));
        }
        let signed_amount = signed(amount)?;

        let mut state = self.state.lock();
        let wallet = state.wallets.entry(user_id.to_string()).or_default();
        let balance = credited(wallet.balance, amount)?;
        let total_purchased = wallet
            .total_purchased
            .checked_add(amount)
            .ok_or_else(|| overflow(wallet.total_purchased, amount))?;
        wallet.balance = balance;
        wallet.total_purchased = total_purchased;
        wallet.purchase_count += 1;

        let entry = state.append(LedgerEntry::new(
            user_id,
            signed_amount,
            LedgerEntryType::Purchase,
            description,
            json!({}),
        ));
        info!(
            target: "studio_credits",
            user_id = %user_id,
            amount = amount,
            balance = balance,
            "Credits purchased"
        );
        Ok(entry)
    }

    /// Credit promotional or bonus credits; not counted as a purchase
    pub fn grant(
        &self,
        user_id: &str,
        amount: u64,
        reason: impl Into<String>,
    ) -> Result<LedgerEntry, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount("grant of 0 credits".to_string()));
        }
        let signed_amount = signed(amount)?;

        let mut state = self.state.lock();
        let wallet = state.wallets.entry(user_id.to_string()).or_default();
        let balance = credited(wallet.balance, amount)?;
        wallet.balance = balance;

        let entry = state.append(LedgerEntry::new(
            user_id,
            signed_amount,
            LedgerEntryType::Grant,
            reason,
            json!({}),
        ));
        info!(
            target: "studio_credits",
            user_id = %user_id,
            amount = amount,
            balance = balance,
            "Credits granted"
        );
        Ok(entry)
    }

    /// Atomic check-and-decrement plus ledger append
    pub fn charge(
        &self,
        user_id: &str,
        action_type: &str,
        cost: u64,
    ) -> Result<(LedgerEntry, u64), LedgerError> {
        if cost == 0 {
            return Err(LedgerError::InvalidAmount("deduction of 0 credits".to_string()));
        }
        let signed_cost = signed(cost)?;

        let mut state = self.state.lock();
        let wallet = state.wallet_mut(user_id)?;
        if wallet.balance < cost {
            return Err(LedgerError::InsufficientFunds {
                balance: wallet.balance,
                required: cost,
            });
        }
        wallet.balance -= cost;
        wallet.total_spent += cost;
        let balance = wallet.balance;

        let entry = state.append(LedgerEntry::new(
            user_id,
            -signed_cost,
            LedgerEntryType::Deduction,
            action_type,
            json!({ "action_type": action_type, "cost": cost }),
        ));
        info!(
            target: "studio_credits",
            user_id = %user_id,
            action_type = %action_type,
            cost = cost,
            balance = balance,
            entry_id = %entry.id,
            "Credits deducted"
        );
        Ok((entry, balance))
    }

    /// Compensate a deduction owned by `user_id`, at most once
    pub fn refund_entry(&self, user_id: &str, entry_id: Uuid) -> Result<LedgerEntry, LedgerError> {
        let mut state = self.state.lock();

        let original = state
            .entries
            .iter()
            .find(|entry| entry.id == entry_id && entry.user_id == user_id)
            .ok_or(LedgerError::EntryNotFound(entry_id))?;
        if original.entry_type != LedgerEntryType::Deduction {
            return Err(LedgerError::NotRefundable(entry_id));
        }
        if state.refunded.contains(&entry_id) {
            return Err(LedgerError::AlreadyRefunded(entry_id));
        }

        let amount = original.amount.unsigned_abs();
        let signed_amount = signed(amount)?;
        let description = format!("refund: {}", original.description);
        let wallet = state.wallet_mut(user_id)?;
        let balance = credited(wallet.balance, amount)?;
        wallet.balance = balance;
        wallet.total_spent = wallet.total_spent.saturating_sub(amount);

        state.refunded.insert(entry_id);
        let entry = state.append(LedgerEntry::new(
            user_id,
            signed_amount,
            LedgerEntryType::Refund,
            description,
            json!({ "refunds": entry_id }),
        ));
        info!(
            target: "studio_credits",
            user_id = %user_id,
            refunded_entry = %entry_id,
            amount = amount,
            balance = balance,
            "Deduction refunded"
        );
        Ok(entry)
    }

    pub fn wallet(&self, user_id: &str) -> Result<WalletState, LedgerError> {
        self.state.lock().wallet(user_id).cloned()
    }

    /// Ledger history of `user_id`, newest first
    pub fn entries(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let state = self.state.lock();
        state.wallet(user_id)?;
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|entry| entry.user_id == user_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    /// Compare the balance row with the sum of the user's entries
    pub fn reconcile(&self, user_id: &str) -> Result<Reconciliation, LedgerError> {
        let state = self.state.lock();
        let balance = state.wallet(user_id)?.balance;
        let ledger_sum = state
            .entries
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.amount)
            .sum();

        let reconciliation = Reconciliation {
            balance,
            ledger_sum,
        };
        if !reconciliation.is_consistent() {
            warn!(
                target: "studio_credits",
                user_id = %user_id,
                balance = balance,
                ledger_sum = ledger_sum,
                "Wallet balance disagrees with ledger"
            );
        }
        Ok(reconciliation)
    }
}

#[async_trait]
impl CreditApi for InMemoryLedger {
    async fn deduct(
        &self,
        session: &Session,
        request: DeductRequest,
    ) -> Result<DeductResponse, LedgerError> {
        let user_id = self.state.lock().user_for(session)?;
        match self.charge(&user_id, &request.action_type, request.cost) {
            Ok((entry, balance)) => Ok(DeductResponse::charged(balance, entry.id)),
            Err(LedgerError::InsufficientFunds { balance, required }) => {
                warn!(
                    target: "studio_credits",
                    user_id = %user_id,
                    action_type = %request.action_type,
                    balance = balance,
                    required = required,
                    "Deduction rejected"
                );
                Ok(DeductResponse::rejected(INSUFFICIENT_CREDITS, Some(balance)))
            }
            Err(err) => Err(err),
        }
    }

    async fn wallet_summary(&self, session: &Session) -> Result<WalletSummary, LedgerError> {
        let state = self.state.lock();
        let user_id = state.user_for(session)?;
        Ok(state.wallet(&user_id)?.summary())
    }

    async fn refund(
        &self,
        session: &Session,
        entry_id: Uuid,
    ) -> Result<WalletSummary, LedgerError> {
        let user_id = self.state.lock().user_for(session)?;
        self.refund_entry(&user_id, entry_id)?;
        Ok(self.wallet(&user_id)?.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn funded(amount: u64) -> (InMemoryLedger, Session) {
        let ledger = InMemoryLedger::new();
        let session = ledger.open_session("user-1");
        ledger.purchase("user-1", amount, "starter pack").unwrap();
        (ledger, session)
    }

    #[test]
    fn test_purchase_updates_wallet() {
        let (ledger, _) = funded(20);
        ledger.grant("user-1", 5, "welcome bonus").unwrap();

        let wallet = ledger.wallet("user-1").unwrap();
        assert_eq!(wallet.balance, 25);
        assert_eq!(wallet.total_purchased, 20);
        assert_eq!(wallet.purchase_count, 1);
        assert!(ledger.reconcile("user-1").unwrap().is_consistent());
    }

    #[test]
    fn test_zero_amounts_rejected() {
        let ledger = InMemoryLedger::new();
        assert!(matches!(
            ledger.purchase("user-1", 0, "nothing"),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.grant("user-1", 0, "nothing"),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_overflowing_credit_rejected_without_change() {
        let max = i64::MAX as u64;
        let (ledger, _) = funded(max - 5);

        assert!(matches!(
            ledger.purchase("user-1", 10, "top-up"),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.grant("user-1", max, "bonus"),
            Err(LedgerError::InvalidAmount(_))
        ));

        let wallet = ledger.wallet("user-1").unwrap();
        assert_eq!(wallet.balance, max - 5);
        assert_eq!(wallet.total_purchased, max - 5);
        assert_eq!(wallet.purchase_count, 1);
        assert_eq!(ledger.entries("user-1", 10, 0).unwrap().len(), 1);
        assert!(ledger.reconcile("user-1").unwrap().is_consistent());

        ledger.grant("user-1", 5, "bonus").unwrap();
        assert_eq!(ledger.wallet("user-1").unwrap().balance, max);
    }

    #[test]
    fn test_refund_that_would_overflow_is_rejected() {
        let max = i64::MAX as u64;
        let (ledger, _) = funded(10);
        let (entry, _) = ledger.charge("user-1", "render", 8).unwrap();
        ledger.grant("user-1", max - 2, "bonus").unwrap();

        assert!(matches!(
            ledger.refund_entry("user-1", entry.id),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert_eq!(ledger.wallet("user-1").unwrap().balance, max);
        assert!(ledger.reconcile("user-1").unwrap().is_consistent());
    }

    #[test]
    fn test_charge_never_goes_negative() {
        let (ledger, _) = funded(5);
        let err = ledger.charge("user-1", "render", 8).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                balance: 5,
                required: 8
            }
        );
        assert_eq!(ledger.wallet("user-1").unwrap().balance, 5);
        assert_eq!(ledger.entries("user-1", 10, 0).unwrap().len(), 1);
    }

    #[test]
    fn test_charge_unknown_wallet() {
        let ledger = InMemoryLedger::new();
        assert!(matches!(
            ledger.charge("ghost", "render", 1),
            Err(LedgerError::WalletNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_deduct_reports_new_balance() {
        let (ledger, session) = funded(20);
        let response = ledger
            .deduct(&session, DeductRequest::new("ai_image_generation", 8))
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.new_balance, Some(12));
        let entry_id = response.entry_id.unwrap();

        let latest = &ledger.entries("user-1", 1, 0).unwrap()[0];
        assert_eq!(latest.id, entry_id);
        assert_eq!(latest.amount, -8);
        assert_eq!(latest.entry_type, LedgerEntryType::Deduction);
    }

    #[tokio::test]
    async fn test_deduct_insufficient_is_rejection_not_error() {
        let (ledger, session) = funded(5);
        let response = ledger
            .deduct(&session, DeductRequest::new("ai_image_generation", 8))
            .await
            .unwrap();

        assert!(response.is_insufficient());
        assert_eq!(response.new_balance, Some(5));
        assert_eq!(response.entry_id, None);
    }

    #[tokio::test]
    async fn test_unknown_or_foreign_session_unauthorized() {
        let (ledger, session) = funded(20);
        let forged = Session::new("user-1", "not-a-token");
        assert_eq!(
            ledger.wallet_summary(&forged).await.unwrap_err(),
            LedgerError::Unauthorized
        );

        let other = ledger.open_session("user-2");
        let mismatched = Session::new("user-1", other.token.clone());
        assert_eq!(
            ledger
                .deduct(&mismatched, DeductRequest::new("x", 1))
                .await
                .unwrap_err(),
            LedgerError::Unauthorized
        );

        assert!(ledger.close_session(&session));
        assert_eq!(
            ledger.wallet_summary(&session).await.unwrap_err(),
            LedgerError::Unauthorized
        );
    }

    #[tokio::test]
    async fn test_concurrent_deductions_never_overdraw() {
        let (ledger, session) = funded(100);
        let ledger = Arc::new(ledger);

        let mut handles = Vec::new();
        for _ in 0..50 {
            let ledger = ledger.clone();
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .deduct(&session, DeductRequest::new("send_message", 3))
                    .await
                    .unwrap()
                    .success
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 33);
        let wallet = ledger.wallet("user-1").unwrap();
        assert_eq!(wallet.balance, 1);
        assert_eq!(wallet.total_spent, 99);
        assert!(ledger.reconcile("user-1").unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_refund_rules() {
        let (ledger, session) = funded(20);
        let response = ledger
            .deduct(&session, DeductRequest::new("ai_video_generation", 8))
            .await
            .unwrap();
        let entry_id = response.entry_id.unwrap();

        let summary = ledger.refund(&session, entry_id).await.unwrap();
        assert_eq!(summary.balance, 20);
        assert_eq!(summary.total_spent, 0);

        assert_eq!(
            ledger.refund(&session, entry_id).await.unwrap_err(),
            LedgerError::AlreadyRefunded(entry_id)
        );

        let purchase_id = ledger.entries("user-1", 10, 0).unwrap().last().unwrap().id;
        assert_eq!(
            ledger.refund(&session, purchase_id).await.unwrap_err(),
            LedgerError::NotRefundable(purchase_id)
        );

        let stranger = ledger.open_session("user-2");
        let charge = ledger.charge("user-1", "send_message", 1).unwrap().0;
        assert_eq!(
            ledger.refund(&stranger, charge.id).await.unwrap_err(),
            LedgerError::EntryNotFound(charge.id)
        );
        assert!(ledger.reconcile("user-1").unwrap().is_consistent());
    }

    #[test]
    fn test_entries_newest_first_with_paging() {
        let (ledger, _) = funded(20);
        for cost in 1..=4 {
            ledger.charge("user-1", "send_message", cost).unwrap();
        }

        let page = ledger.entries("user-1", 2, 1).unwrap();
        let amounts: Vec<i64> = page.iter().map(|entry| entry.amount).collect();
        assert_eq!(amounts, vec![-3, -2]);

        let all = ledger.entries("user-1", 100, 0).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all.last().unwrap().entry_type, LedgerEntryType::Purchase);
        assert!(ledger.entries("ghost", 10, 0).is_err());
    }
}
