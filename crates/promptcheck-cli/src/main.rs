//! PromptCheck - run LLM prompt test suites in CI.
//!
//! ```bash
//! # Scaffold a config and an example test file
//! promptcheck init
//!
//! # Run every test under ./tests with the default pool size
//! promptcheck run
//!
//! # Run specific files, fail fast, keep the build green
//! promptcheck run tests/smoke.yaml --fail-fast --soft-fail
//! ```
//!
//! Exit codes: 0 all tests passed (or `--soft-fail`), 1 at least one test
//! failed, 2 the suite or config could not be loaded.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod init;
mod run;

#[derive(Parser)]
#[command(name = "promptcheck", version, about = "LLM prompt testing for CI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute test suites and write a JSON report artifact.
    Run(run::RunArgs),
    /// Scaffold a starter config and example test file.
    Init {
        /// Directory to scaffold into.
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("promptcheck=info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let code = match cli.command {
        Command::Run(args) => run::execute(args).await?,
        Command::Init { dir } => init::execute(&dir)?,
    };
    std::process::exit(code);
}
