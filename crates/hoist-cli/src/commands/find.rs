use std::path::Path;

use clap::Args;
use hoist_core::Fingerprint;

use crate::config::open_store;
use crate::output;

#[derive(Args)]
pub struct FindArgs {
    /// Fingerprint, prefixed (hst_...) or hex
    fingerprint: String,
    /// Scope to search
    #[arg(short, long, default_value = "default")]
    scope: String,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: FindArgs, store: Option<&Path>) -> anyhow::Result<()> {
    let store = open_store(store)?;
    let fp = Fingerprint::parse(&args.fingerprint)?;
    let Some(object) = store.find(&args.scope, &fp)? else {
        anyhow::bail!("no object {fp} in scope {}", args.scope);
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&object)?);
        return Ok(());
    }
    println!("{}", output::kv("fingerprint", &object.fingerprint.to_string()));
    println!("{}", output::kv("scope", &object.scope));
    println!("{}", output::kv("key", &object.key));
    println!("{}", output::kv("size", &output::human_size(object.size)));
    if let Some(media) = &object.media_type {
        println!("{}", output::kv("media", media));
    }
    println!("{}", output::kv("stored at", &object.stored_at_ms.to_string()));
    Ok(())
}
