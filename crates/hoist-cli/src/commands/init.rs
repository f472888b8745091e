use std::path::Path;

use clap::Args;
use hoist_queue::QueueConfig;
use hoist_store::{LocalStore, StoreConfig};

use crate::config::{store_root, QUEUE_CONFIG_FILE};
use crate::output;

#[derive(Args)]
pub struct InitArgs {
    /// Human-readable store name
    #[arg(long)]
    name: Option<String>,
    /// Bytes written per chunk (progress is reported per chunk)
    #[arg(long)]
    chunk_size: Option<usize>,
}

pub fn run(args: InitArgs, store: Option<&Path>) -> anyhow::Result<()> {
    let root = store_root(store)?;
    if LocalStore::open(&root).is_ok() {
        anyhow::bail!("store already exists at {}", root.display());
    }

    let mut config = StoreConfig::default();
    if let Some(name) = args.name {
        config.name = Some(name);
    }
    if let Some(chunk_size) = args.chunk_size {
        if chunk_size == 0 {
            anyhow::bail!("--chunk-size must be at least 1");
        }
        config.chunk_size = chunk_size;
    }
    let store = LocalStore::init_with(&root, config)?;

    let queue_config = root.join(QUEUE_CONFIG_FILE);
    if !queue_config.exists() {
        std::fs::write(&queue_config, QueueConfig::default().to_toml_string()?)?;
    }

    println!("Initialized hoist store in {}", root.display());
    if let Some(name) = &store.config().name {
        println!("{}", output::kv("name", name));
    }
    println!(
        "{}",
        output::kv("chunk size", &output::human_size(store.config().chunk_size as u64))
    );
    Ok(())
}
