use std::path::PathBuf;

use clap::Args;
use hoist_core::{fingerprint, MediaKind};

use crate::filter::{collect_files, IncludeRules};
use crate::output;

#[derive(Args)]
pub struct HashArgs {
    /// Files or directories
    #[arg(required = true)]
    paths: Vec<PathBuf>,
    /// Only hash files under directories that match these globs
    #[arg(long)]
    include: Vec<String>,
    /// Print plain hex instead of the prefixed form
    #[arg(long)]
    hex: bool,
}

pub fn run(args: HashArgs) -> anyhow::Result<()> {
    let rules = IncludeRules::new(&args.include)?;
    for file in collect_files(&args.paths, &rules)? {
        let data = std::fs::read(&file.path)?;
        let fp = fingerprint(&data);
        let shown = if args.hex { fp.to_hex() } else { fp.to_string() };
        println!(
            "{shown}  {:<10} {:>10}  {}",
            MediaKind::sniff(&data).mime_type(),
            output::human_size(data.len() as u64),
            file.name
        );
    }
    Ok(())
}
