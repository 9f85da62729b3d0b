use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "imgpack",
    about = "Pack image directories into deduplicated index/blob archives",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file with archive settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Fail on malformed or truncated index entries instead of skipping them
    #[arg(long, global = true)]
    pub strict: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compile a directory of images into an archive
    Pack(PackArgs),
    /// Expand an archive into one image file per entry
    Unpack(UnpackArgs),
    /// List the entries of an archive
    List(ListArgs),
    /// Remove entries from an archive and rewrite it
    Remove(RemoveArgs),
}

#[derive(Args)]
pub struct PackArgs {
    /// Directory containing the image files
    #[arg(long)]
    pub src: PathBuf,
    /// Directory the archive is written to
    #[arg(long)]
    pub dst: PathBuf,
    /// Archive name, without extension
    #[arg(long)]
    pub name: String,
}

#[derive(Args)]
pub struct UnpackArgs {
    /// Index file of the archive
    pub index: PathBuf,
    /// Directory to write the images to
    #[arg(short, long, default_value = "images")]
    pub out: PathBuf,
}

#[derive(Args)]
pub struct ListArgs {
    /// Index file of the archive
    pub index: PathBuf,
}

#[derive(Args)]
pub struct RemoveArgs {
    /// Index file of the archive
    pub index: PathBuf,
    /// Entry names to remove
    #[arg(required = true)]
    pub names: Vec<String>,
    /// Rewrite even if loading dropped damaged index lines
    #[arg(long)]
    pub force: bool,
}
