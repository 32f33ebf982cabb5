use clap::Parser;
use molehill::cli::{self, CliError, GenerateOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "molehill")]
#[command(about = "Molehill - generate Hivemall queries and a digdag workflow from a YAML pipeline")]
#[command(version)]
struct Cli {
    /// Pipeline definition (YAML)
    file: PathBuf,

    /// Workflow file to write (default: <source>.dig)
    #[arg(long)]
    dest: Option<PathBuf>,

    /// Replace existing queries and workflow
    #[arg(long)]
    overwrite: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("molehill=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    println!("Start converting: {}", cli.file.display());

    let options = GenerateOptions {
        config_file: cli.file,
        dest: cli.dest,
        overwrite: cli.overwrite,
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    };

    let path = cli::execute_generate(&options)?;
    println!("Finish dump file: {}", path.display());
    Ok(())
}
