//! Balance-gated action execution

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use studio_cache::{
    CacheMetrics, CacheOpts, InMemoryStore, NoopMetrics, Params, PersistentStore, QueryCache,
};

use crate::{BoxError, CreditApi, CreditError, DeductRequest, PriceTable, Session, WalletSummary};

/// Cache namespace holding each user's wallet summary
pub const WALLET_SUMMARY_NAMESPACE: &str = "wallet-summary";

/// Successful gated action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReceipt<T> {
    pub output: T,
    /// Credits charged, 0 for free actions
    pub cost: u64,
    /// Ledger entry of the charge, usable with [`CreditGate::refund`]
    pub entry_id: Option<Uuid>,
    /// Balance the server reported right after the charge
    pub new_balance: Option<u64>,
}

/// Runs actions for one session, charging credits first
///
/// The wallet summary is mirrored in the shared [`QueryCache`] under
/// [`WALLET_SUMMARY_NAMESPACE`] and is refreshed after every charged action.
/// The local balance only enables fast rejection; the server decides.
pub struct CreditGate<A, P = InMemoryStore, M = NoopMetrics>
where
    A: CreditApi,
    P: PersistentStore,
    M: CacheMetrics,
{
    api: Arc<A>,
    cache: QueryCache<P, M>,
    session: Session,
    prices: PriceTable,
    summary_ttl: Duration,
}

impl<A, P, M> CreditGate<A, P, M>
where
    A: CreditApi,
    P: PersistentStore,
    M: CacheMetrics,
{
    pub fn new(api: Arc<A>, cache: QueryCache<P, M>, session: Session) -> Self {
        Self {
            api,
            cache,
            session,
            prices: PriceTable::default(),
            summary_ttl: Duration::from_secs(60),
        }
    }

    pub fn with_prices(mut self, prices: PriceTable) -> Self {
        self.prices = prices;
        self
    }

    /// How long a cached summary may be used for fast rejection
    pub fn with_summary_ttl(mut self, ttl: Duration) -> Self {
        self.summary_ttl = ttl;
        self
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Locally known balance, without any server call
    pub async fn balance(&self) -> Option<u64> {
        self.cache
            .get::<WalletSummary>(&self.session.user_id, WALLET_SUMMARY_NAMESPACE, &Params::new())
            .await
            .map(|summary| summary.balance)
    }

    /// Wallet summary, from the cache when fresh
    pub async fn summary(&self) -> Result<WalletSummary, CreditError> {
        let summary = self
            .cache
            .cached_fetch(
                &self.session.user_id,
                WALLET_SUMMARY_NAMESPACE,
                || self.api.wallet_summary(&self.session),
                &Params::new(),
                CacheOpts::new().ttl(self.summary_ttl),
            )
            .await?;
        Ok(summary)
    }

    /// Drop the cached summary and load it again from the server
    pub async fn refresh(&self) -> Result<WalletSummary, CreditError> {
        self.invalidate_summary().await;
        self.summary().await
    }

    /// Drop the cached summary so the next read goes to the server
    async fn invalidate_summary(&self) {
        self.cache
            .invalidate(&self.session.user_id, WALLET_SUMMARY_NAMESPACE, &Params::new())
            .await;
    }

    /// Compensate a charge, e.g. one reported by [`CreditError::ActionFailed`]
    pub async fn refund(&self, entry_id: Uuid) -> Result<WalletSummary, CreditError> {
        let summary = self.api.refund(&self.session, entry_id).await?;
        info!(
            target: "studio_credits",
            user_id = %self.session.user_id,
            entry_id = %entry_id,
            balance = summary.balance,
            "Charge refunded"
        );
        self.store_summary(&summary).await;
        Ok(summary)
    }

    async fn store_summary(&self, summary: &WalletSummary) {
        let stored = self
            .cache
            .set(
                &self.session.user_id,
                WALLET_SUMMARY_NAMESPACE,
                summary,
                &Params::new(),
                CacheOpts::new().ttl(self.summary_ttl),
            )
            .await;
        if let Err(err) = stored {
            warn!(target: "studio_credits", error = %err, "Wallet summary not cached");
        }
    }

    async fn refresh_quietly(&self) {
        if let Err(err) = self.refresh().await {
            warn!(
                target: "studio_credits",
                user_id = %self.session.user_id,
                error = %err,
                "Balance refresh failed"
            );
        }
    }

    /// Run `action` if the wallet can pay for `action_type`
    ///
    /// Steps, in order:
    /// 1. a balance floor for the action rejects with `MinimumBalanceNotMet`
    /// 2. free actions run without contacting the deduction endpoint
    /// 3. a locally known balance below the cost rejects without a server call
    /// 4. the server deducts atomically, or rejects with `InsufficientCredits`
    /// 5. the action runs; its failure is `ActionFailed` and the charge stands
    /// 6. the local balance is refreshed whatever the action's outcome
    pub async fn execute<T, E, F, Fut>(
        &self,
        action_type: &str,
        action: F,
    ) -> Result<ActionReceipt<T>, CreditError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        let user_id = self.session.user_id.as_str();
        let cost = self.prices.cost(action_type);

        if let Some(required) = self.prices.minimum_balance(action_type) {
            let balance = self.summary().await?.balance;
            if balance < required {
                warn!(
                    target: "studio_credits",
                    user_id = %user_id,
                    action_type = %action_type,
                    balance = balance,
                    required = required,
                    "Minimum balance not met"
                );
                return Err(CreditError::MinimumBalanceNotMet { required, balance });
            }
        }

        if cost == 0 {
            debug!(target: "studio_credits", action_type = %action_type, "Free action");
            let output = action().await.map_err(|err| CreditError::ActionFailed {
                entry_id: None,
                source: err.into(),
            })?;
            return Ok(ActionReceipt {
                output,
                cost,
                entry_id: None,
                new_balance: None,
            });
        }

        if let Some(balance) = self.balance().await {
            if balance < cost {
                debug!(
                    target: "studio_credits",
                    action_type = %action_type,
                    balance = balance,
                    cost = cost,
                    "Rejected from local balance"
                );
                return Err(CreditError::InsufficientCredits {
                    required: cost,
                    balance: Some(balance),
                });
            }
        }

        let request = DeductRequest::new(action_type, cost);
        let response = match self.api.deduct(&self.session, request).await {
            Ok(response) => response,
            Err(err) => {
                let err = CreditError::from(err);
                warn!(
                    target: "studio_credits",
                    user_id = %user_id,
                    action_type = %action_type,
                    error = %err,
                    "Deduction call failed"
                );
                self.invalidate_summary().await;
                return Err(err);
            }
        };
        if !response.success {
            let err = if response.is_insufficient() {
                CreditError::InsufficientCredits {
                    required: cost,
                    balance: response.new_balance,
                }
            } else {
                CreditError::DeductionFailed(
                    response
                        .error
                        .unwrap_or_else(|| "deduction rejected".to_string()),
                )
            };
            warn!(
                target: "studio_credits",
                user_id = %user_id,
                action_type = %action_type,
                error = %err,
                "Deduction rejected"
            );
            self.invalidate_summary().await;
            return Err(err);
        }

        let entry_id = response.entry_id;
        debug!(
            target: "studio_credits",
            action_type = %action_type,
            cost = cost,
            new_balance = ?response.new_balance,
            "Charged, running action"
        );

        let result = action().await;
        self.refresh_quietly().await;

        match result {
            Ok(output) => Ok(ActionReceipt {
                output,
                cost,
                entry_id,
                new_balance: response.new_balance,
            }),
            Err(err) => {
                let source: BoxError = err.into();
                warn!(
                    target: "studio_credits",
                    user_id = %user_id,
                    action_type = %action_type,
                    entry_id = ?entry_id,
                    error = %source,
                    "Action failed after charge"
                );
                Err(CreditError::ActionFailed { entry_id, source })
            }
        }
    }
}

impl<A, P, M> Clone for CreditGate<A, P, M>
where
    A: CreditApi,
    P: PersistentStore,
    M: CacheMetrics,
{
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            cache: self.cache.clone(),
            session: self.session.clone(),
            prices: self.prices.clone(),
            summary_ttl: self.summary_ttl,
        }
    }
}
