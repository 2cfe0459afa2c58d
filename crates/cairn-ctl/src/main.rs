//! cairn-ctl — command-line interface for working with cairn bundles.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use std::sync::Arc;

use cairn_core::bundle::Bundle;
use cairn_core::config::CairnConfig;
use cairn_core::item::ItemId;
use cairn_services::indexer::HttpIndexer;
use cairn_services::poller::{ConfirmationPoller, PollOutcome, PollSpec};
use cairn_services::relay::{BundleSubmission, HttpRelay, Relay};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn read_bundle(path: &str) -> Result<Bundle> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path))?;
    Bundle::decode(Bytes::from(bytes)).with_context(|| format!("{} is not a valid bundle", path))
}

fn parse_id(hex_id: &str) -> Result<ItemId> {
    let raw = hex::decode(hex_id).context("item id must be hex")?;
    let raw: [u8; 32] = raw
        .try_into()
        .map_err(|_| anyhow::anyhow!("item id must be 32 bytes of hex"))?;
    Ok(ItemId::from_bytes(raw))
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

fn cmd_inspect(path: &str) -> Result<()> {
    let bundle = read_bundle(path)?;

    println!("═══════════════════════════════════════");
    println!("  Bundle {}", path);
    println!("═══════════════════════════════════════");
    println!("  Items : {}", bundle.count());

    for index in 0..bundle.count() {
        let slot = bundle.get(index)?;
        println!("  ┌─ item {}", index);
        println!("  │  id   : {}", slot.id);
        println!("  │  size : {} bytes", slot.bytes.len());
        match slot.parse() {
            Ok(item) => {
                for tag in &item.tags {
                    println!("  │  tag  : {} = {}", tag.name, tag.value);
                }
                println!("  └─ data : {} bytes", item.data.len());
            }
            Err(e) => println!("  └─ unparsable: {}", e),
        }
    }

    Ok(())
}

fn cmd_verify(path: &str) -> Result<()> {
    let bundle = read_bundle(path)?;

    let mut failed = 0usize;
    for index in 0..bundle.count() {
        let slot = bundle.get(index)?;
        let ok = match slot.parse() {
            Ok(item) => item.id() == Some(slot.id) && item.verify(),
            Err(_) => false,
        };
        if ok {
            println!("  ok    {}", slot.id);
        } else {
            println!("  FAIL  {}", slot.id);
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{} of {} items failed verification", failed, bundle.count());
    }
    println!("All {} items verified.", bundle.count());
    Ok(())
}

async fn cmd_submit(path: &str, owner: &str, group_id: Option<String>) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path))?;
    let bytes = Bytes::from(bytes);

    // Refuse to forward bytes the relay would reject anyway.
    let bundle = Bundle::decode(bytes.clone())
        .with_context(|| format!("{} is not a valid bundle", path))?;
    if !bundle.verify() {
        bail!("bundle failed verification; not submitting");
    }

    let config = CairnConfig::load()?;
    let relay = HttpRelay::new(&config.relay.endpoint)?;
    relay
        .submit(&BundleSubmission {
            bundle: bytes,
            platform: config.relay.platform_label.clone(),
            owner: owner.to_owned(),
            group_id,
        })
        .await?;

    println!("Submitted {} items:", bundle.count());
    for id in bundle.ids() {
        println!("  {}", id);
    }
    Ok(())
}

async fn cmd_confirm(hex_id: &str, kind: &str) -> Result<()> {
    let id = parse_id(hex_id)?;
    let spec = match kind {
        "purchase" => PollSpec::token_purchase(),
        "sale" => PollSpec::token_sale(),
        "deposit" => PollSpec::liquidity_deposit(),
        "pool" => PollSpec::pool_creation(),
        "tx" => PollSpec::transaction(),
        other => bail!("unknown confirmation kind: {}", other),
    };

    let config = CairnConfig::load()?;
    let indexer = Arc::new(HttpIndexer::new(&config.indexer.endpoint)?);
    let poller = ConfirmationPoller::new(indexer, config.confirmation.clone(), spec);

    println!(
        "Polling for {} (worst case {:?})...",
        id,
        config.confirmation.worst_case()
    );
    match poller.poll(&id).await? {
        PollOutcome::Success(data) => println!("Confirmed: {}", data),
        PollOutcome::Failure(detail) => bail!("operation failed: {}", detail),
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = CairnConfig::write_default_if_missing()?;
    println!("Config at {}", path.display());
    Ok(())
}

fn print_usage() {
    println!("Usage: cairn-ctl <command>");
    println!();
    println!("Commands:");
    println!("  inspect <file>                      Show a bundle's items, ids, and tags");
    println!("  verify <file>                       Check every item's id and signature");
    println!("  submit <file> --owner <addr>        Submit a bundle through the relay");
    println!("         [--group <id>]");
    println!("  confirm <id> [--kind <kind>]        Poll the indexer until the operation");
    println!("                                      resolves (kinds: purchase, sale,");
    println!("                                      deposit, pool, tx; default: tx)");
    println!("  config init                         Write the default config file");
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    // Pull out --owner / --group / --kind options
    let mut owner: Option<String> = None;
    let mut group: Option<String> = None;
    let mut kind = "tx".to_owned();
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--owner" => {
                i += 1;
                owner = Some(args.get(i).context("--owner requires a value")?.clone());
            }
            "--group" => {
                i += 1;
                group = Some(args.get(i).context("--group requires a value")?.clone());
            }
            "--kind" => {
                i += 1;
                kind = args.get(i).context("--kind requires a value")?.clone();
            }
            other => remaining.push(other),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["inspect", path] => cmd_inspect(path),
        ["verify", path] => cmd_verify(path),
        ["submit", path] => {
            let owner = owner.context("submit requires --owner <addr>")?;
            cmd_submit(path, &owner, group).await
        }
        ["confirm", id] => cmd_confirm(id, &kind).await,
        ["config", "init"] => cmd_config_init(),
        ["help"] | ["--help"] | ["-h"] | [] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
