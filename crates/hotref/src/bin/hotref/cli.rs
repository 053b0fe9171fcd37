//! hotref cli interface

use clap::{Parser, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; hotref ... }
    #[clap(short = 'C', long = "directory")]
    pub directory: Vec<PathBuf>,

    /// Root template
    #[clap(short = 'f', long = "file")]
    pub file: PathBuf,

    /// Environment files, applied in the given order
    #[clap(short = 'e', long = "environment", num_args = 1..)]
    pub environments: Vec<PathBuf>,

    /// Parameter overrides as key=value
    ///
    /// A single value may hold several overrides separated by ';'
    #[clap(short = 'P', long = "parameters", num_args = 1..)]
    pub parameters: Vec<String>,

    /// Also list hidden parameters and resources nothing refers to
    #[clap(short = 'u', long = "unused")]
    pub unused: bool,

    /// Print the template structure
    #[clap(short = 't', long = "print-tree")]
    pub print_tree: bool,

    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => f.write_str("text"),
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}
