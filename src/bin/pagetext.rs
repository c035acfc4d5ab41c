use clap::{Parser, Subcommand};
use pagetext::richtext::markdown_converter::document_to_markdown;
use pagetext::{
    Document, EditorConfig, PasteInput, document_to_markup, load_markup, parse_markup,
    sanitize_and_normalize,
};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pagetext")]
#[command(about = "Inspect rich text in the page-builder storage format", long_about = None)]
struct Args {
    /// Config file (default: platform config directory)
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Normalize pasted markup or text into stored markup
    Sanitize {
        /// Input file (default: stdin)
        file: Option<PathBuf>,
    },
    /// Export stored markup as Markdown
    Markdown { file: Option<PathBuf> },
    /// Export stored markup as plain text
    Plain { file: Option<PathBuf> },
    /// Check that stored markup is in the storage format
    Check { file: Option<PathBuf> },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => match EditorConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Error: {err}");
                process::exit(1);
            }
        },
        None => EditorConfig::discover(),
    };

    let result = match args.command {
        Commands::Sanitize { file } => read_input(file.as_deref()).map(|input| {
            let report =
                sanitize_and_normalize(&PasteInput::detect(input), &config.default_style(), &config);
            debug!(dropped = report.dropped_nodes, "sanitized input");
            let doc = if report.is_empty() {
                Document::with_style(config.default_style())
            } else {
                Document::from_blocks(report.blocks)
            };
            document_to_markup(&doc)
        }),
        Commands::Markdown { file } => read_input(file.as_deref())
            .map(|input| document_to_markdown(&load_markup(&input, &config))),
        Commands::Plain { file } => {
            read_input(file.as_deref()).map(|input| load_markup(&input, &config).to_plain_text())
        }
        Commands::Check { file } => match read_input(file.as_deref()) {
            Ok(input) => match parse_markup(&input, &config.default_style()) {
                Ok(doc) => Ok(format!("ok: {} block(s)", doc.block_count())),
                Err(err) => {
                    eprintln!("Error: {err}");
                    process::exit(2);
                }
            },
            Err(err) => Err(err),
        },
    };

    match result {
        Ok(output) => println!("{output}"),
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(1);
        }
    }
}

fn read_input(file: Option<&Path>) -> io::Result<String> {
    match file {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}
