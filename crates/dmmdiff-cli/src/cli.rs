use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dmmdiff_codec::MapLayout;

#[derive(Parser)]
#[command(name = "dmmdiff", about = "Structural diffs for DMM map files", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

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

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LayoutArg {
    #[default]
    Tgm,
    Dmm,
}

impl From<LayoutArg> for MapLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Tgm => MapLayout::Tgm,
            LayoutArg::Dmm => MapLayout::Dmm,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Compare two revisions of a map and write an annotated diff map
    Diff(DiffArgs),
    /// Re-serialise a map in another layout or compression
    Convert(ConvertArgs),
    /// Show the size and dictionary of a map
    Inspect(InspectArgs),
}

#[derive(Args)]
pub struct DiffArgs {
    pub before: PathBuf,
    pub after: PathBuf,
    #[arg(short, long, default_value = "diff.dmm")]
    pub out: PathBuf,
    #[arg(long, value_enum, default_value_t)]
    pub layout: LayoutArg,
    #[arg(long)]
    pub gzip: bool,
}

#[derive(Args)]
pub struct ConvertArgs {
    pub input: PathBuf,
    pub output: PathBuf,
    #[arg(long, value_enum, default_value_t)]
    pub layout: LayoutArg,
    #[arg(long)]
    pub gzip: bool,
}

#[derive(Args)]
pub struct InspectArgs {
    pub map: PathBuf,
}
