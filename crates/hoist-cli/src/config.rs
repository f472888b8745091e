use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use hoist_queue::QueueConfig;
use hoist_store::LocalStore;

pub const STORE_ENV: &str = "HOIST_STORE";
pub const QUEUE_CONFIG_FILE: &str = "queue.toml";

/// Resolve the store root: `--store`, then `$HOIST_STORE`, then the
/// platform data directory.
pub fn store_root(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(STORE_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let data = dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!("no data directory; pass --store or set {STORE_ENV}"))?;
    Ok(data.join("hoist"))
}

pub fn open_store(explicit: Option<&Path>) -> anyhow::Result<LocalStore> {
    let root = store_root(explicit)?;
    LocalStore::open(&root)
        .with_context(|| format!("opening store at {} (run `hoist init`?)", root.display()))
}

#[derive(Args, Debug, Default)]
pub struct QueueFlags {
    /// Queue config file [default: <store>/queue.toml when present]
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Maximum simultaneous uploads
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,
    /// Automatic retries per item
    #[arg(long)]
    pub max_retries: Option<u32>,
    /// Leave failed items in error instead of retrying them
    #[arg(long)]
    pub no_auto_retry: bool,
}

pub fn load_queue_config(store_root: &Path, flags: &QueueFlags) -> anyhow::Result<QueueConfig> {
    let mut config = match &flags.config {
        Some(path) => QueueConfig::load(path)
            .with_context(|| format!("loading queue config {}", path.display()))?,
        None => {
            let default_path = store_root.join(QUEUE_CONFIG_FILE);
            if default_path.exists() {
                QueueConfig::load(&default_path)
                    .with_context(|| format!("loading queue config {}", default_path.display()))?
            } else {
                QueueConfig::default()
            }
        }
    };
    if let Some(concurrency) = flags.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(max_retries) = flags.max_retries {
        config.max_retries = max_retries;
    }
    if flags.no_auto_retry {
        config.auto_retry = false;
    }
    config.validate()?;
    Ok(config)
}
