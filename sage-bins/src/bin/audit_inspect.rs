//! Offline audit-log reconciliation
//!
//! Replays an audit file and reports where every order id stands:
//! complete, needs an exchange query, failed before transmission, or
//! never sent. Run this after a restart before resuming trading.

use anyhow::Result;
use clap::Parser;
use sage_core::execution::{reconcile, OrderDisposition};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Audit log file to inspect
    #[arg(default_value = "sage_audit.log")]
    audit_file: PathBuf,

    /// Print every order id, not just the summary
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let recon = reconcile(&args.audit_file)?;

    println!("audit file: {}", args.audit_file.display());
    println!("orders on record: {}", recon.len());
    if recon.malformed_lines > 0 {
        println!("malformed lines:  {}", recon.malformed_lines);
    }
    println!();

    let complete = recon.complete();
    let pending = recon.needs_exchange_query();
    let unsent = recon.unsent();
    let failed = recon.ids_with(OrderDisposition::Failed);

    println!("complete (exchange responded): {}", complete.len());
    println!("needs exchange query:          {}", pending.len());
    println!("failed before transmission:    {}", failed.len());
    println!("never sent:                    {}", unsent.len());

    if args.verbose {
        let dump = |label: &str, ids: &[u64]| {
            if !ids.is_empty() {
                println!("\n{}:", label);
                for id in ids {
                    println!("  {}", id);
                }
            }
        };
        dump("complete", &complete);
        dump("needs exchange query", &pending);
        dump("failed", &failed);
        dump("never sent", &unsent);
    }

    // Anything in flight means manual reconciliation before restart
    if !pending.is_empty() {
        std::process::exit(2);
    }
    Ok(())
}
