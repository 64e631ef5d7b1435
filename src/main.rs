//! Converges GitLab runner registrations with local executor templates.
//!
//! Reads executor templates from `<prefix>/<instance>/`, restores or creates
//! registrations on each declared GitLab url, and writes the runner agent's
//! `config.toml`. Intended to run one-shot from a timer.

use std::path::PathBuf;
use std::process::exit;

use clap::Parser;

use gitlab_runner_sync::error::SyncError;
use gitlab_runner_sync::exit_codes;
use gitlab_runner_sync::io::gitlab::GitlabFactory;
use gitlab_runner_sync::io::host::{self, HostArch, PathProbe};
use gitlab_runner_sync::logging;
use gitlab_runner_sync::sync::{HostContext, run_sync};

#[derive(Parser)]
#[command(
    name = "gitlab-runner-sync",
    version,
    about = "On-the-fly GitLab runner registration"
)]
struct Cli {
    /// Runner configuration directory prefix.
    #[arg(short, long, default_value = "/etc/gitlab-runner")]
    prefix: PathBuf,

    /// Instance name; templates live under `<prefix>/<instance>/`.
    #[arg(short, long, default_value = "main")]
    instance: String,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("{err}");
        exit(exit_codes::for_error(&err));
    }
}

fn run(cli: &Cli) -> Result<(), SyncError> {
    let arch = HostArch::detect();
    let host = HostContext {
        hostname: host::hostname()?,
        arch: &arch,
        probe: &PathProbe,
    };
    run_sync(&cli.prefix, &cli.instance, &host, &GitlabFactory)?;
    Ok(())
}
