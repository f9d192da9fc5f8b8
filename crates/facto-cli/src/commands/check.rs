//! Check command - verify the ledger connection and reference data.

use std::sync::Arc;

use console::style;
use facto_core::{EntityResolver, TaxBucket};
use facto_ledger::LedgerBackend;

use super::Context;

pub async fn run(ctx: Context) -> anyhow::Result<()> {
    let backend: Arc<dyn LedgerBackend> = if ctx.dry_run {
        let backend = ctx.backend()?;
        println!("{} Dry run: in-memory ledger", style("ℹ").blue());
        backend
    } else {
        ctx.config.validate(true)?;
        let client = ctx.json2_backend()?;
        let user = client.connect().await?;
        println!(
            "{} Connected to {} as user {}{}",
            style("✓").green(),
            ctx.config.ledger.url,
            user.uid,
            user.lang.map(|l| format!(" ({})", l)).unwrap_or_default()
        );
        Arc::new(client)
    };

    let resolver = EntityResolver::new(backend, ctx.config.posting.clone());
    let posting = &ctx.config.posting;

    let mut checks = vec![
        (format!("sales account {}", posting.sales_account_code), resolver.sales_account().await),
        (format!("journal {}", posting.journal_code), resolver.journal().await),
        (format!("country {}", posting.country_code), resolver.country().await),
    ];
    for bucket in TaxBucket::ALL {
        checks.push((format!("sale tax {}", bucket.display()), resolver.tax(bucket).await));
    }

    let mut missing = 0;
    for (label, result) in checks {
        match result {
            Ok(id) => println!("{} {} -> {}", style("✓").green(), label, id),
            Err(e) => {
                missing += 1;
                println!("{} {}: {}", style("✗").red(), label, e);
            }
        }
    }

    if missing > 0 {
        anyhow::bail!("{} reference record(s) missing in the ledger", missing);
    }
    println!("{} Reference data complete", style("✓").green());
    Ok(())
}
