use std::path::PathBuf;

use clap::Parser;

pub const IMPORT_DIR_ENV: &str = "FOODGRAM_IMPORT_DIR";

/// Everything else is configured through the environment (see `Config`).
#[derive(Debug, Parser)]
#[command(name = "foodgram", about = "Recipe sharing API server")]
pub struct Cli {
    /// Load `ingredients.csv` and `tags.csv` from DIR into the database, then exit
    #[arg(long, value_name = "DIR", env = IMPORT_DIR_ENV)]
    pub import: Option<PathBuf>,
}
