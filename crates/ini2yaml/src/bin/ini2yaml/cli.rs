//! ini2yaml cli interface

use clap::{Parser, Subcommand, ValueEnum};
use ini2yaml::options::{ParseOptions, Stage, UnresolvedPolicy};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert the configuration files of one or more sites
    ///
    /// Reads <root>/<site>/<site>_<stage>.ini and writes the result next to it.
    /// Included files are written next to their source as well.
    Convert(ConvertCommand),

    /// Print debug information for development
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct ConvertCommand {
    /// Directory containing one directory per site
    #[clap(short = 'r', long = "root", default_value = ".")]
    pub root: PathBuf,

    /// Site to convert
    #[clap(short = 's', long = "site", required = true)]
    pub sites: Vec<String>,

    /// Stage to convert (firststage, secondstage), all stages if omitted
    #[clap(long = "stage")]
    pub stages: Vec<Stage>,

    #[clap(flatten)]
    pub parse: ParseArgs,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct ParseArgs {
    /// Accept trace fields that are not part of the field catalogue
    #[clap(long = "fields-on-the-fly")]
    pub fields_on_the_fly: bool,

    /// Report issues at debug level only
    #[clap(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Fail a file on references that do not resolve
    #[clap(long = "strict")]
    pub strict: bool,
}

impl ParseArgs {
    pub fn options(&self, stage: Stage) -> ParseOptions {
        let options = ParseOptions::new(stage)
            .with_verbose(!self.quiet)
            .with_fields_on_the_fly(self.fields_on_the_fly);

        if self.strict {
            options
                .with_unresolved(UnresolvedPolicy::Fail)
                .with_unresolved_in_include(UnresolvedPolicy::Fail)
        } else {
            options
        }
    }
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,

    /// Print to stdout instead of writing files
    #[clap(long = "stdout")]
    pub stdout: bool,
}

#[derive(ValueEnum, Clone, Copy, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yml",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[command(subcommand)]
    pub command: DevSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum DevSubCommand {
    /// Print the normalized text of a file
    Normalize { file: PathBuf },
    /// Print the statements of a file
    Tokens { file: PathBuf },
    /// Print the parsed document
    Document {
        file: PathBuf,
        #[clap(long = "stage", default_value = "firststage")]
        stage: Stage,
    },
}
