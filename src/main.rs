//! # Content Migrator CLI (`cmig`)
//!
//! Converts legacy notes and attachments into managed content.
//!
//! ## Usage
//!
//! ```bash
//! cmig --config ./config/cmig.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cmig init` | Create the SQLite database and run schema migrations |
//! | `cmig import <file>` | Load legacy records from a JSON file |
//! | `cmig convert <kind>` | Convert `notes`, `attachments`, or `all` |
//! | `cmig log` | List recorded conversion results |

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use content_migrator::batch::{self, OptionOverrides};
use content_migrator::config;
use content_migrator::conversion_log;
use content_migrator::import;
use content_migrator::migrate;
use content_migrator::progress::ProgressMode;
use content_migrator_core::models::RecordKind;

/// Content Migrator CLI. Converts legacy notes and attachments into
/// managed content while keeping owners, provenance, and sharing.
#[derive(Parser)]
#[command(
    name = "cmig",
    about = "Content Migrator: bulk-convert legacy notes and attachments into managed content",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cmig.toml")]
    config: PathBuf,

    /// Log debug output from the pipeline.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Import legacy records from a JSON file.
    Import {
        /// Path to the JSON dataset.
        path: PathBuf,
    },

    /// Convert legacy records into content.
    ///
    /// Reads the working set (restricted by scope, owners must be active),
    /// converts it in chunks, logs every result, and notifies the
    /// configured addresses.
    Convert {
        /// Which records to convert.
        #[arg(value_enum)]
        target: ConvertTarget,

        /// Delete each source record once converted.
        #[arg(long, overrides_with = "no_delete_source")]
        delete_source: bool,

        /// Keep source records even if the config deletes them.
        #[arg(long, overrides_with = "delete_source")]
        no_delete_source: bool,

        /// Share private records with their parent.
        #[arg(long, overrides_with = "no_share_private")]
        share_private: bool,

        /// Never share private records, whatever the config says.
        #[arg(long, overrides_with = "share_private")]
        no_share_private: bool,

        /// Convert records whose parent type does not support sharing (no link is created).
        #[arg(long, overrides_with = "no_convert_if_sharing_disabled")]
        convert_if_sharing_disabled: bool,

        /// Reject records whose parent type does not support sharing.
        #[arg(long, overrides_with = "convert_if_sharing_disabled")]
        no_convert_if_sharing_disabled: bool,

        /// Share inbound email attachments with the email's parent (e.g. a case).
        #[arg(long, overrides_with = "no_route_message_attachments")]
        route_message_attachments: bool,

        /// Share inbound email attachments with the email itself.
        #[arg(long, overrides_with = "route_message_attachments")]
        no_route_message_attachments: bool,

        /// Restrict to these parent ids (repeatable).
        #[arg(long = "parent")]
        parents: Vec<String>,

        /// Override the chunk size from config.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Count the working set without converting anything.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr.
        #[arg(long, value_enum, default_value = "auto")]
        progress: ProgressMode,
    },

    /// List recorded conversion results.
    Log {
        /// Only show results of this run.
        #[arg(long)]
        run: Option<String>,

        /// Only show failed results.
        #[arg(long)]
        failed: bool,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ConvertTarget {
    Notes,
    Attachments,
    All,
}

impl ConvertTarget {
    fn kinds(&self) -> Vec<RecordKind> {
        match self {
            ConvertTarget::Notes => vec![RecordKind::Note],
            ConvertTarget::Attachments => vec![RecordKind::Attachment],
            ConvertTarget::All => vec![RecordKind::Note, RecordKind::Attachment],
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("content_migrator=debug,content_migrator_core=debug,warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("content_migrator=info,content_migrator_core=info,warn")
        })
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Resolve a `--x` / `--no-x` pair. `None` defers to the config file.
fn flag(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { path } => {
            import::run_import(&cfg, &path).await?;
        }
        Commands::Convert {
            target,
            delete_source,
            no_delete_source,
            share_private,
            no_share_private,
            convert_if_sharing_disabled,
            no_convert_if_sharing_disabled,
            route_message_attachments,
            no_route_message_attachments,
            parents,
            chunk_size,
            dry_run,
            progress,
        } => {
            let overrides = OptionOverrides {
                delete_source: flag(delete_source, no_delete_source),
                share_private: flag(share_private, no_share_private),
                convert_if_sharing_disabled: flag(
                    convert_if_sharing_disabled,
                    no_convert_if_sharing_disabled,
                ),
                route_message_attachments: flag(
                    route_message_attachments,
                    no_route_message_attachments,
                ),
                scope_parent_ids: (!parents.is_empty()).then_some(parents),
                chunk_size,
            };
            let reporter = progress.reporter();
            batch::run_convert(&cfg, &target.kinds(), &overrides, dry_run, reporter.as_ref())
                .await?;
        }
        Commands::Log { run, failed, json } => {
            conversion_log::run_log(&cfg, run.as_deref(), failed, json).await?;
        }
    }

    Ok(())
}
