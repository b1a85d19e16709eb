use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Sample information CSV to merge after loading (will over-write the config file)
    #[arg(short, long)]
    pub sample_info: Option<PathBuf>,

    /// Path to the output directory (will over-write the config file)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Skip run-order and batch correction
    #[arg(long)]
    pub skip_correction: bool,

    /// Apply the masks before exporting
    #[arg(long)]
    pub with_exclusions: bool,
}
