//! Process entry point: parses the CLI, wires a [`client::Client`] up
//! against environment-derived [`config::ProcessConfig`], and maps the
//! outcome to a process exit code. Mirrors the donor's thin `main.rs`
//! that defers essentially everything to a library crate.

mod cli;
mod client;
mod config;
mod handler;
mod logging;
mod login_cache;

use std::sync::Arc;

use clap::Parser;
use cloudxfer_core::{JobId, JobStatus};
use cloudxfer_engine::RawOptions;

use cli::{Cli, Command, JobsAction, JobStatusArg, LoginCloud, OverwriteArg, TransferArgs};
use client::Client;
use config::ProcessConfig;
use handler::{Handler, NoOpHandler, TerminalHandler};

fn overwrite_policy(arg: OverwriteArg) -> cloudxfer_core::OverwritePolicy {
    use cloudxfer_core::OverwritePolicy::*;
    match arg {
        OverwriteArg::True => True,
        OverwriteArg::False => False,
        OverwriteArg::Prompt => Prompt,
        OverwriteArg::IfSourceNewer => IfSourceNewer,
    }
}

fn job_status(arg: JobStatusArg) -> JobStatus {
    match arg {
        JobStatusArg::InProgress => JobStatus::InProgress,
        JobStatusArg::Completed => JobStatus::Completed,
        JobStatusArg::Failed => JobStatus::Failed,
        JobStatusArg::Cancelling => JobStatus::Cancelling,
        JobStatusArg::Cancelled => JobStatus::Cancelled,
        JobStatusArg::Paused => JobStatus::Paused,
    }
}

fn login_cloud_name(cloud: LoginCloud) -> &'static str {
    match cloud {
        LoginCloud::Azure => "azure",
        LoginCloud::Gcs => "gcs",
    }
}

fn raw_options(transfer: TransferArgs, is_sync: bool, delete_destination: bool) -> RawOptions {
    let mut filters = cloudxfer_core::FilterOptions::default();
    filters.include_patterns = transfer.include_pattern;
    filters.exclude_patterns = transfer.exclude_pattern;

    RawOptions {
        source: transfer.source,
        destination: transfer.destination,
        source_sas: transfer.source_sas,
        destination_sas: transfer.destination_sas,
        from_to_override: transfer.from_to,
        is_sync,
        recursive: Some(transfer.recursive),
        overwrite_policy: Some(overwrite_policy(transfer.overwrite)),
        block_size_mib: transfer.block_size_mb,
        put_md5: transfer.put_md5,
        check_md5: transfer.check_md5,
        filters,
        delete_destination,
        cap_mbps: transfer.cap_mbps,
        ..Default::default()
    }
}

fn print_summary(summary: &cloudxfer_core::JobSummary) {
    match serde_json::to_string_pretty(summary) {
        Ok(json) => println!("{json}"),
        Err(_) => println!("{summary:?}"),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    let job_id = JobId::new();
    let config = ProcessConfig::from_env();

    let _log_guard = logging::init_logging(&config.log_location, job_id);

    let handler: Arc<dyn Handler> = if cli.quiet {
        Arc::new(NoOpHandler)
    } else {
        Arc::new(TerminalHandler::new())
    };

    let client = Client::new(config);

    let result = run_command(cli.command, &client, handler, cli.quiet).await;

    if let Err(err) = result {
        tracing::error!(error = %err, "cloudxfer failed");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run_command(
    command: Command,
    client: &Client,
    handler: Arc<dyn Handler>,
    quiet: bool,
) -> anyhow::Result<()> {
    match command {
        Command::Copy(transfer) => {
            let raw = raw_options(transfer, false, false);
            let summary = client.copy(raw, handler, quiet).await?;
            print_summary(&summary);
        }
        Command::Sync {
            transfer,
            delete_destination,
        } => {
            let raw = raw_options(transfer, true, delete_destination);
            let summary = client.sync(raw, handler, quiet).await?;
            print_summary(&summary);
        }
        Command::Redirect {
            source,
            destination,
        } => {
            let bytes = client.redirect(source, destination).await?;
            eprintln!("wrote {bytes} bytes");
        }
        Command::Jobs { action } => run_jobs_command(action, client).await?,
        Command::Login { cloud } => {
            client.login(login_cloud_name(cloud)).await?;
            println!("logged in to {}", login_cloud_name(cloud));
        }
        Command::Logout { cloud } => {
            let removed = client.logout(login_cloud_name(cloud)).await?;
            if removed {
                println!("logged out of {}", login_cloud_name(cloud));
            } else {
                println!("{} was not logged in", login_cloud_name(cloud));
            }
        }
        Command::LoginStatus => {
            for (cloud, logged_in) in client.get_login_status().await? {
                println!("{cloud}: {}", if logged_in { "logged in" } else { "logged out" });
            }
        }
    }
    Ok(())
}

async fn run_jobs_command(action: JobsAction, client: &Client) -> anyhow::Result<()> {
    match action {
        JobsAction::List { status } => {
            let jobs = client.list_jobs(status.map(job_status)).await?;
            if jobs.is_empty() {
                println!("no jobs found");
            }
            for (job_id, summary) in jobs {
                println!(
                    "{job_id}  {:?}  {}/{} transfers",
                    summary.status, summary.transfers_completed, summary.total_transfers
                );
            }
        }
        JobsAction::Show { job_id } => {
            let summary = client.get_job_summary(job_id).await?;
            print_summary(&summary);
        }
        JobsAction::Resume { job_id } => {
            let summary = client.resume_job(job_id).await?;
            print_summary(&summary);
        }
        JobsAction::Rm { job_id } => {
            let removed = client.remove_job(job_id).await?;
            println!("removed {removed} part file(s) for {job_id}");
        }
    }
    Ok(())
}
