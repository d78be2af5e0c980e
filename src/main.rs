//! Varanno main executable

pub mod anno;
pub mod common;
pub mod conf;
pub mod db;
pub mod err;
pub mod matcher;
pub mod seq;
pub mod tools;
pub mod transcript;
pub mod variant;

use clap::{Args, Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Gene- and database-based variant annotation",
    long_about = "This tool annotates small variants and CNVs with transcript consequences \
                  and with records from flat-file databases"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[allow(clippy::large_enum_variant)]
#[derive(Debug, Subcommand)]
enum Commands {
    /// Annotation commands.
    Anno(Anno),
    /// Database preparation commands.
    Db(Db),
    /// Helper tools.
    Tools(Tools),
}

/// Parsing of "anno *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Anno {
    /// The sub command to run
    #[command(subcommand)]
    command: AnnoCommands,
}

/// Enum supporting the parsing of "anno *" sub commands.
#[derive(Debug, Subcommand)]
enum AnnoCommands {
    Snv(anno::snv::Args),
    Cnv(anno::cnv::Args),
    Filter(anno::db::filter::Args),
    Region(anno::db::region::Args),
}

/// Parsing of "db *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Db {
    /// The sub command to run
    #[command(subcommand)]
    command: DbCommands,
}

/// Enum supporting the parsing of "db *" sub commands.
#[derive(Debug, Subcommand)]
enum DbCommands {
    TransIndex(db::trans_index::Args),
    BuildIdx(db::build_idx::Args),
}

/// Parsing of "tools *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Tools {
    /// The sub command to run
    #[command(subcommand)]
    command: ToolsCommands,
}

/// Enum supporting the parsing of "tools *" sub commands.
#[derive(Debug, Subcommand)]
enum ToolsCommands {
    Merge(tools::merge::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    // Install collector and go into sub commands.
    let term = Term::stderr();
    tracing::subscriber::with_default(collector, || {
        match &cli.command {
            Commands::Anno(anno) => match &anno.command {
                AnnoCommands::Snv(args) => anno::snv::run(&cli.common, args)?,
                AnnoCommands::Cnv(args) => anno::cnv::run(&cli.common, args)?,
                AnnoCommands::Filter(args) => anno::db::filter::run(&cli.common, args)?,
                AnnoCommands::Region(args) => anno::db::region::run(&cli.common, args)?,
            },
            Commands::Db(db) => match &db.command {
                DbCommands::TransIndex(args) => db::trans_index::run(&cli.common, args)?,
                DbCommands::BuildIdx(args) => db::build_idx::run(&cli.common, args)?,
            },
            Commands::Tools(tools) => match &tools.command {
                ToolsCommands::Merge(args) => tools::merge::run(&cli.common, args)?,
            },
        }

        Ok::<(), anyhow::Error>(())
    })?;
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}
