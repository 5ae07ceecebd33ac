//! gm-testpki CLI application.
//!
//! Generates an SM2 certificate hierarchy into the output directory.

use clap::Parser;
use gm_testpki::config::GeneratorConfig;
use gm_testpki::error::Result;
use gm_testpki::hierarchy::generate;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gm-testpki")]
#[command(about = "Generate an SM2/SM3 test certificate hierarchy", long_about = None)]
struct Cli {
    /// Number of root organizations
    #[arg(long, default_value_t = 2)]
    orgs: usize,

    /// Child authorities under each authority
    #[arg(long, default_value_t = 2)]
    child_orgs: usize,

    /// Server certificates per authority
    #[arg(long, default_value_t = 2)]
    servers: usize,

    /// Client certificates per authority
    #[arg(long, default_value_t = 1)]
    clients: usize,

    /// Levels of child authorities below each root
    #[arg(long, default_value_t = 1)]
    depth: usize,

    /// Directory the PEM files are written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

impl From<Cli> for GeneratorConfig {
    fn from(cli: Cli) -> Self {
        GeneratorConfig {
            orgs: cli.orgs,
            child_orgs: cli.child_orgs,
            servers: cli.servers,
            clients: cli.clients,
            depth: cli.depth,
            output_dir: cli.output_dir,
        }
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GeneratorConfig::from(Cli::parse());
    let report = generate(&config)?;

    println!(
        "Generated {} key/certificate pairs in {}",
        report.issued.len(),
        config.output_dir.display()
    );

    if report.is_complete() {
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!("{} entities could not be generated:", report.failures.len());
    for failure in &report.failures {
        eprintln!("  {}", failure);
    }
    Ok(ExitCode::FAILURE)
}
