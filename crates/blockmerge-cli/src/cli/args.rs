use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "blockmerge",
    version,
    about = "Group an ordered block stream into merged files of 100 blocks"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Read NDJSON blocks and write merged bundles to a store
    Merge(MergeArgs),
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    /// Destination store (memory://, file:///path, s3://bucket/prefix)
    #[arg(long, env = "BLOCKMERGE_STORE_URL")]
    pub store: String,

    /// NDJSON block stream, `-` for stdin
    #[arg(long, default_value = "-")]
    pub input: String,

    /// Input stream is gzip compressed
    #[arg(long)]
    pub input_gzip: bool,

    /// YAML merger config; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub first_streamable_block: Option<u64>,

    /// Exclusive upper bound of the merged range
    #[arg(long)]
    pub stop_block: Option<u64>,

    /// Accept completed bundles that do not hold exactly 100 blocks
    #[arg(long)]
    pub no_enforce_size: bool,

    /// Object name suffix (defaults to the codec's extension)
    #[arg(long)]
    pub suffix: Option<String>,

    /// Write plain NDJSON instead of gzip
    #[arg(long)]
    pub no_gzip: bool,

    /// Write the trailing partial bundle at end of input
    #[arg(long)]
    pub flush_trailing: bool,
}
