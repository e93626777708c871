#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use unbundle_core::Config;

#[derive(Parser, Debug)]
#[command(name = "unbundle")]
#[command(author, version, about = "Serve and build ES modules without bundling", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Config file to use instead of ./unbundle.config.json
    #[arg(long, global = true, value_name = "FILE", env = "UNBUNDLE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Start the development server
    Dev {
        /// Port to listen on (default: dev.port from config, else 8080)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (default: dev.host from config, else localhost)
        #[arg(long)]
        host: Option<String>,
    },

    /// Write a static, unbundled production build
    Build {
        /// Output directory (default: build.out from config)
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Remove the output directory first
        #[arg(long)]
        clean: bool,
    },

    /// List the packages imported by the project's sources
    Scan,

    /// Print the public URL of a source file or package specifier
    Resolve {
        /// A path to a source file, or a bare specifier like `preact/hooks`
        target: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json)
        .with_config_file(cli.config);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        None | Some(Commands::Version) => commands::version::run(config.json_logs),
        Some(Commands::Dev { port, host }) => {
            let action = commands::dev::DevAction { port, host };
            let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
            runtime.block_on(commands::dev::run(&config, action))
        }
        Some(Commands::Build { out, clean }) => {
            let action = commands::build::BuildAction { out, clean };
            let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
            runtime.block_on(commands::build::run(&config, action))
        }
        Some(Commands::Scan) => commands::scan::run(&config),
        Some(Commands::Resolve { target }) => commands::resolve::run(&config, &target),
    }
}
