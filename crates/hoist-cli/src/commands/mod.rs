pub mod find;
pub mod hash;
pub mod init;
pub mod ls;
pub mod upload;

use std::path::Path;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new store
    Init(init::InitArgs),
    /// Upload files into the store
    Upload(upload::UploadArgs),
    /// Print content fingerprints without uploading
    Hash(hash::HashArgs),
    /// Look up a stored object by fingerprint
    Find(find::FindArgs),
    /// List stored objects
    Ls(ls::LsArgs),
}

impl Commands {
    pub async fn run(self, store: Option<&Path>) -> anyhow::Result<()> {
        match self {
            Commands::Init(args) => init::run(args, store),
            Commands::Upload(args) => upload::run(args, store).await,
            Commands::Hash(args) => hash::run(args),
            Commands::Find(args) => find::run(args, store),
            Commands::Ls(args) => ls::run(args, store),
        }
    }
}
