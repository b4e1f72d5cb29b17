mod cli;

use anyhow::Context;
use ini2yaml::error::Diagnostics;
use ini2yaml::options::{ParseOptions, Stage};
use ini2yaml::sources::{site_file, FsLoader};
use ini2yaml::Document;
use std::path::Path;
use tracing_subscriber::filter::LevelFilter;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .with_env_var("INI2YAML_LOG")
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Convert(convert_cli) => convert(convert_cli),
        cli::Command::Dev(dev_cli) => dev(dev_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

/// Convert every (site, stage) pair, continuing past failures
pub fn convert(cli: cli::ConvertCommand) -> anyhow::Result<()> {
    let stages = if cli.stages.is_empty() {
        vec![Stage::FirstStage, Stage::SecondStage]
    } else {
        cli.stages.clone()
    };
    let loader = FsLoader::new(cli.root.clone());

    let mut failed = 0;
    for site in &cli.sites {
        for stage in &stages {
            let file = site_file(site, stage.as_str());
            let options = cli.parse.options(*stage).with_site_id(site.as_str());

            if let Err(e) = convert_file(&loader, &file, &options, &cli.output) {
                failed += 1;
                for error in e.chain() {
                    eprintln!("{error}")
                }
            }
        }
    }

    anyhow::ensure!(failed == 0, "{failed} file(s) failed to convert");
    Ok(())
}

fn convert_file(
    loader: &FsLoader,
    file: &str,
    options: &ParseOptions,
    output: &cli::OutputArgs,
) -> anyhow::Result<()> {
    let document = ini2yaml::parse(loader, file, options)
        .with_context(|| format!("Failed to convert {file}"))?;
    tracing::info!(
        file,
        issues = document.diagnostics().issues().len(),
        "converted"
    );

    write(loader, file, &render(&document, output.format)?, output)?;

    for included in document.includes().values() {
        let text = match output.format {
            cli::OutputFormat::Yaml => ini2yaml::emit::included_to_string(included)?,
            cli::OutputFormat::Json => serde_json::to_string_pretty(included)?,
        };
        write(loader, &included.file, &text, output)?;
    }

    Ok(())
}

fn render(document: &Document, format: cli::OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        cli::OutputFormat::Yaml => ini2yaml::emit::to_string(document)?,
        cli::OutputFormat::Json => serde_json::to_string_pretty(document)?,
    })
}

fn write(loader: &FsLoader, file: &str, text: &str, output: &cli::OutputArgs) -> anyhow::Result<()> {
    if output.stdout {
        if let cli::OutputFormat::Yaml = output.format {
            println!("--- # {file}");
        }
        println!("{}", text.trim_end());
        return Ok(());
    }

    let target = loader.resolve(file).with_extension(output.format.extension());
    std::fs::write(&target, text)
        .with_context(|| format!("Unable to write {}", target.display()))?;
    tracing::info!(path=%target.display(), "written");
    Ok(())
}

/// (ini2yaml-)developer utilities
///
/// A quick way to expose internal structures for debugging purposes
pub fn dev(cli: cli::DevCommand) -> anyhow::Result<()> {
    use cli::DevSubCommand;

    match cli.command {
        DevSubCommand::Normalize { file } => {
            let mut diagnostics = Diagnostics::new(true);
            println!("{}", ini2yaml::normalize::normalize(&read(&file)?, &mut diagnostics));
        }
        DevSubCommand::Tokens { file } => {
            let mut diagnostics = Diagnostics::new(true);
            let normalized = ini2yaml::normalize::normalize(&read(&file)?, &mut diagnostics);
            for statement in ini2yaml::tokenize::statements(&normalized) {
                println!("{statement:?}");
            }
        }
        DevSubCommand::Document { file, stage } => {
            let name = file
                .file_name()
                .and_then(|name| name.to_str())
                .with_context(|| format!("Not a file: {}", file.display()))?;
            let root = file.parent().unwrap_or(Path::new("."));
            let loader = FsLoader::new(root.to_path_buf());

            let document = ini2yaml::parse(&loader, name, &ParseOptions::new(stage))?;
            println!("{document:#?}");
        }
    }

    Ok(())
}

fn read(file: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Unable to read {}", file.display()))
}
