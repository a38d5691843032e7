//! Sieve CLI - run selected tests under coverage from the command line
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        reason = "Allow for tests"
    )
)]

use anyhow::Result;
use clap::Parser as _;
use cli::{Cli, Commands};
use handlers::RunRequest;

mod cli;
mod handlers;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    handlers::init_logging();

    match cli.command {
        Commands::Check { config } => handlers::handle_check(&config).await,
        Commands::Run {
            config,
            include,
            exclude_methods,
            exclude_functions,
            patch_target,
            patch_file,
        } => {
            let exclude = exclude_methods.into_iter().chain(exclude_functions).collect();
            handlers::handle_run(RunRequest {
                config,
                include,
                exclude,
                patch: patch_target.zip(patch_file),
            })
            .await
        }
        Commands::Fingerprint {
            dir,
            extensions,
            command,
        } => handlers::handle_fingerprint(&dir, &extensions, &command),
    }
}
