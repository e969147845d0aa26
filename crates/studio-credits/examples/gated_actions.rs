//! Charging credits for AI generations

use std::sync::Arc;
use studio_cache::{QueryCache, QueryCacheConfig};
use studio_credits::{CreditError, CreditGate, InMemoryLedger, actions};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let ledger = Arc::new(InMemoryLedger::new());
    let session = ledger.open_session("creator-1");
    ledger.purchase("creator-1", 20, "starter pack")?;

    let cache = QueryCache::memory_only(QueryCacheConfig::default());
    let gate = CreditGate::new(ledger.clone(), cache, session);

    let receipt = gate
        .execute(actions::AI_IMAGE_GENERATION, || async {
            Ok::<_, String>("https://cdn.example.com/render.png".to_string())
        })
        .await?;
    println!("Generated {} for {} credits", receipt.output, receipt.cost);
    println!("Balance: {:?}", gate.balance().await);

    // Failure after the charge: the credits stay spent until refunded
    match gate
        .execute(actions::AI_IMAGE_GENERATION, || async {
            Err::<String, _>("model timeout")
        })
        .await
    {
        Err(CreditError::ActionFailed {
            entry_id: Some(entry_id),
            source,
        }) => {
            println!("Action failed ({}), refunding", source);
            let summary = gate.refund(entry_id).await?;
            println!("Balance after refund: {}", summary.balance);
        }
        other => println!("Unexpected outcome: {:?}", other.map(|r| r.output)),
    }

    match gate
        .execute(actions::AI_VIDEO_GENERATION, || async { Ok::<_, String>(()) })
        .await
    {
        Err(err) if err.is_insufficient() => println!("Top up needed: {}", err),
        other => println!("Outcome: {:?}", other.map(|r| r.cost)),
    }

    for entry in ledger.entries("creator-1", 10, 0)? {
        println!("{:>4} {:<10} {}", entry.amount, entry.entry_type.as_str(), entry.description);
    }
    Ok(())
}
