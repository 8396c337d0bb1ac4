use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "kmsd",
    author,
    version,
    about = "Envelope-encryption key management service.",
    long_about = "Custodies a root key, mints and wraps per-scope data encryption keys, \
and serves encrypt/decrypt/rewrap operations over a small JSON/HTTP API."
)]
pub struct Cli {
    /// Address to bind the HTTP server to, e.g. 127.0.0.1:8080.
    #[arg(long)]
    pub addr: Option<String>,

    /// Directory for the persistent key store.
    #[arg(long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Path to an optional YAML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
}
