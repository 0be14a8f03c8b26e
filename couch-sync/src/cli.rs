/// # couch-sync CLI Interface (Module)
///
/// This module implements the command-line surface of couch-sync: argument parsing,
/// settings resolution, and the printing of run reports.
///
/// All pipeline logic (pull, push, export) lives in the [`couch-sync-core`] crate.
/// This module only wires flags and the REST client into those pipelines.
///
/// ## How To Use
/// - For command-line users: run the `couch-sync` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// Output: the run summary and one line per diagnostic go to stdout; logs go to stderr.
/// Only abort-class failures make [`run`] return an error.
///
/// [`couch-sync-core`]: ../../couch-sync-core/
use crate::client::RestCluster;
use crate::load_config::{load_config, resolve_settings, ConnectionOverrides};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use couch_sync_core::config::ConnectionSettings;
use couch_sync_core::export::{export, ExportOptions};
use couch_sync_core::pull::{pull, PullOptions};
use couch_sync_core::push::{push, PushOptions};
use couch_sync_core::report::{Diagnostic, ExportReport, PullReport, PushReport};
use std::path::PathBuf;

/// CLI for couch-sync: mirror Couchbase bucket settings and views to disk and back.
#[derive(Parser, Debug)]
#[clap(
    name = "couch-sync",
    version,
    about = "Pull, push and export Couchbase bucket configuration, views and documents"
)]
pub struct Cli {
    /// Optional YAML connection profile (non-secret settings only)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Cluster URL, e.g. http://localhost:8091/pools
    #[clap(long, global = true, env = "COUCH_SYNC_URL")]
    pub server: Option<String>,

    /// Administrative user name
    #[clap(long, short = 'u', global = true, env = "COUCH_SYNC_USERNAME")]
    pub username: Option<String>,

    /// Administrative password
    #[clap(
        long,
        alias = "pw",
        global = true,
        env = "COUCH_SYNC_PASSWORD",
        hide_env_values = true
    )]
    pub password: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write every remote bucket's configuration and views to the local tree
    Pull {
        /// Only pull the bucket with this name (case-insensitive)
        #[clap(long, short = 'b')]
        bucket: Option<String>,
        /// Base directory of the local tree
        #[clap(long, short = 'p', default_value = ".")]
        path: PathBuf,
    },
    /// Create missing buckets and replace design documents from the local tree
    Push {
        /// Only push the bucket with this name (case-insensitive)
        #[clap(long, short = 'b')]
        bucket: Option<String>,
        /// Base directory of the local tree
        #[clap(long, short = 'p', default_value = ".")]
        path: PathBuf,
    },
    /// Save every document emitted by a view as `<key>.json`
    Export {
        #[clap(long, short = 'b')]
        bucket: String,
        #[clap(long, short = 'd')]
        design: String,
        #[clap(long, short = 'v')]
        view: String,
        /// Bucket password, used instead of the admin credentials
        #[clap(long, env = "COUCH_SYNC_BUCKET_PASSWORD", hide_env_values = true)]
        bucket_password: Option<String>,
        /// Target directory, created if missing
        #[clap(long, short = 'p', default_value = ".")]
        path: PathBuf,
        /// Maximum concurrent document fetches
        #[clap(long)]
        parallelism: Option<usize>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Pull { .. } => "pull",
            Commands::Push { .. } => "push",
            Commands::Export { .. } => "export",
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let command = cli.command;
    let profile = match &cli.config {
        Some(path) => Some(load_config(path)?),
        None => None,
    };
    let overrides = ConnectionOverrides {
        server_url: cli.server,
        username: cli.username,
        password: cli.password,
        parallelism: match &command {
            Commands::Export { parallelism, .. } => *parallelism,
            _ => None,
        },
    };
    let settings = resolve_settings(profile.as_ref(), overrides)?;
    settings.trace_loaded();

    if matches!(command, Commands::Pull { .. } | Commands::Push { .. }) && settings.admin.is_none() {
        anyhow::bail!(
            "{} requires administrative credentials (--username/--password or COUCH_SYNC_USERNAME/COUCH_SYNC_PASSWORD)",
            command.name()
        );
    }

    let cluster = RestCluster::new(&settings)?;
    let name = command.name();
    tracing::info!(command = name, "Starting command");

    let result = match command {
        Commands::Pull { bucket, path } => {
            let options = PullOptions {
                base_path: path,
                bucket,
            };
            pull(&cluster, &options)
                .await
                .map(|report| print_report(&pull_summary(&report), &report.diagnostics))
        }
        Commands::Push { bucket, path } => {
            let options = PushOptions {
                base_path: path,
                bucket,
            };
            push(&cluster, &options)
                .await
                .map(|report| print_report(&push_summary(&report), &report.diagnostics))
        }
        Commands::Export {
            bucket,
            design,
            view,
            bucket_password,
            path,
            ..
        } => {
            let options = ExportOptions {
                bucket,
                bucket_password,
                design,
                view,
                target_dir: path,
                parallelism: settings.parallelism,
            };
            export(&cluster, &options)
                .await
                .map(|report| print_report(&export_summary(&report), &report.diagnostics))
        }
    };

    match result {
        Ok(()) => {
            tracing::info!(command = name, "Command complete");
            Ok(())
        }
        Err(e) => {
            tracing::error!(command = name, error = %e, "Command aborted");
            Err(e).with_context(|| failure_context(name, &settings))
        }
    }
}

fn failure_context(command: &str, settings: &ConnectionSettings) -> String {
    format!("{command} against {} failed", settings.server_url)
}

fn print_report(summary: &str, diagnostics: &[Diagnostic]) {
    println!("{summary}");
    for diagnostic in diagnostics {
        println!("{diagnostic}");
    }
}

pub fn pull_summary(report: &PullReport) -> String {
    let views: usize = report.buckets.iter().map(|b| b.views).sum();
    format!(
        "Pulled {} bucket(s), {} view(s); {} diagnostic(s)",
        report.buckets.len(),
        views,
        report.diagnostics.len()
    )
}

pub fn push_summary(report: &PushReport) -> String {
    format!(
        "Created {} bucket(s), replaced {} design document(s); {} diagnostic(s)",
        report.created_buckets.len(),
        report.replaced_designs.len(),
        report.diagnostics.len()
    )
}

pub fn export_summary(report: &ExportReport) -> String {
    format!(
        "Exported {} of {} document(s); {} failed",
        report.written.len(),
        report.requested,
        report.failed()
    )
}
