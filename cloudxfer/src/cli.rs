//! Command-line surface, modeled on the donor's `clap`-derive `Cli`/
//! `Command` split (one root parser, one subcommand enum).

use clap::{Parser, Subcommand, ValueEnum};
use cloudxfer_core::JobId;

#[derive(Parser)]
#[command(name = "cloudxfer", author, version, about, long_about = None)]
#[command(arg_required_else_help(true))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Suppress the progress bar and start/finish banner.
    #[arg(long, global = true, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OverwriteArg {
    True,
    False,
    Prompt,
    IfSourceNewer,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum JobStatusArg {
    InProgress,
    Completed,
    Failed,
    Cancelling,
    Cancelled,
    Paused,
}

/// Flags shared between `copy` and `sync`; `sync` additionally accepts
/// `--delete-destination`.
#[derive(clap::Args, Debug, Clone)]
pub struct TransferArgs {
    pub source: String,
    pub destination: String,

    #[arg(long)]
    pub recursive: bool,

    #[arg(long = "cap-mbps")]
    pub cap_mbps: Option<f64>,

    #[arg(long = "block-size-mb")]
    pub block_size_mb: Option<f64>,

    #[arg(long = "put-md5")]
    pub put_md5: bool,

    #[arg(long = "check-md5")]
    pub check_md5: bool,

    #[arg(long = "include-pattern")]
    pub include_pattern: Vec<String>,

    #[arg(long = "exclude-pattern")]
    pub exclude_pattern: Vec<String>,

    #[arg(long = "overwrite", value_enum, default_value_t = OverwriteArg::True)]
    pub overwrite: OverwriteArg,

    #[arg(long = "from-to")]
    pub from_to: Option<String>,

    #[arg(long = "source-sas", env = "CLOUDXFER_SOURCE_SAS")]
    pub source_sas: Option<String>,

    #[arg(long = "destination-sas", env = "CLOUDXFER_DESTINATION_SAS")]
    pub destination_sas: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// One-shot, one-directional transfer.
    Copy(TransferArgs),

    /// Bidirectional-comparison transfer that can also remove
    /// destination-only extras.
    Sync {
        #[command(flatten)]
        transfer: TransferArgs,

        #[arg(long = "delete-destination")]
        delete_destination: bool,
    },

    /// Upload stdin or download to stdout through a cloud endpoint,
    /// bypassing enumeration/comparison entirely.
    Redirect {
        source: String,
        destination: String,
    },

    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },

    /// Mint and cache an OAuth token for a cloud.
    Login {
        #[arg(value_enum)]
        cloud: LoginCloud,
    },

    /// Forget a cached OAuth token.
    Logout {
        #[arg(value_enum)]
        cloud: LoginCloud,
    },

    /// Print whether a cached token exists per cloud.
    LoginStatus,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum LoginCloud {
    Azure,
    Gcs,
}

#[derive(Subcommand)]
pub enum JobsAction {
    List {
        #[arg(long = "status", value_enum)]
        status: Option<JobStatusArg>,
    },
    Show {
        job_id: JobId,
    },
    Resume {
        job_id: JobId,
    },
    Rm {
        job_id: JobId,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
