use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "easel",
    about = "Easel design catalog tools",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Workspace directory holding the blob and slot stores
    #[arg(long, global = true, default_value = ".easel")]
    pub root: PathBuf,

    /// Config file (defaults to <root>/easel.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List saved designs, newest first
    List,
    /// Show one design and the assets it references
    Show(ShowArgs),
    /// Write designs to a portable file
    Export(ExportArgs),
    /// Read designs from a portable file
    Import(ImportArgs),
    /// Rename a design
    Rename(RenameArgs),
    /// Delete a design
    Delete(DeleteArgs),
    /// Remove blobs nothing references
    Gc,
    /// List saved cutouts
    Cutouts,
}

#[derive(Args)]
pub struct ShowArgs {
    pub id: String,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Output file
    pub file: PathBuf,
    /// Export only these designs (repeatable)
    #[arg(long = "id")]
    pub ids: Vec<String>,
    /// Write the compressed container instead of plain JSON
    #[arg(long)]
    pub compress: bool,
}

#[derive(Args)]
pub struct ImportArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct RenameArgs {
    pub id: String,
    pub name: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub id: String,
}
