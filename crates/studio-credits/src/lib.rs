//! studio-credits: credit wallets and balance-gated actions
//!
//! An action kind is priced through a [`PriceTable`]. [`CreditGate`] charges
//! the wallet through a [`CreditApi`] before running the action, and keeps
//! the caller's wallet summary in a shared [`studio_cache::QueryCache`].
//! [`InMemoryLedger`] is an authoritative ledger that implements the API
//! in process.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use studio_cache::{QueryCache, QueryCacheConfig};
//! use studio_credits::{CreditGate, InMemoryLedger, actions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger = Arc::new(InMemoryLedger::new());
//!     let session = ledger.open_session("user-1");
//!     ledger.purchase("user-1", 20, "starter pack")?;
//!
//!     let cache = QueryCache::memory_only(QueryCacheConfig::default());
//!     let gate = CreditGate::new(ledger, cache, session);
//!
//!     let receipt = gate
//!         .execute(actions::AI_IMAGE_GENERATION, || async {
//!             Ok::<_, String>("image-url".to_string())
//!         })
//!         .await?;
//!     println!("charged {} credits, balance {:?}", receipt.cost, gate.balance().await);
//!     Ok(())
//! }
//! ```

mod api;
mod error;
mod gate;
mod ledger;
mod model;
mod pricing;

pub use api::CreditApi;
pub use error::{BoxError, CreditError, LedgerError};
pub use gate::{ActionReceipt, CreditGate, WALLET_SUMMARY_NAMESPACE};
pub use ledger::InMemoryLedger;
pub use model::{
    DeductRequest, DeductResponse, INSUFFICIENT_CREDITS, LedgerEntry, LedgerEntryType,
    Reconciliation, Session, WalletState, WalletSummary,
};
pub use pricing::{DEFAULT_COST, PriceTable, PriceTableBuilder, actions};
