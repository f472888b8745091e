use std::path::Path;

use clap::Args;

use crate::config::open_store;
use crate::output;

#[derive(Args)]
pub struct LsArgs {
    /// Only list this scope
    #[arg(short, long)]
    scope: Option<String>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: LsArgs, store: Option<&Path>) -> anyhow::Result<()> {
    let store = open_store(store)?;
    let objects = store.list(args.scope.as_deref())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&objects)?);
        return Ok(());
    }
    if objects.is_empty() {
        println!("(no objects)");
        return Ok(());
    }
    println!("{}", output::header(&format!("{} objects", objects.len())));
    for object in &objects {
        println!(
            "{}  {:>10}  {:<12} {}",
            object.fingerprint,
            output::human_size(object.size),
            object.media_type.as_deref().unwrap_or("-"),
            object.scope
        );
    }
    Ok(())
}
