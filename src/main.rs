use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;

use secure_drop::cli;
use secure_drop::config::Settings;
use secure_drop::Result;

#[derive(Parser)]
#[command(name = "secure-drop")]
#[command(version)]
#[command(about = "Send single files encrypted with AES-256 under an RSA-wrapped key", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON settings file (defaults apply to anything it leaves out)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive files until Ctrl-C
    Serve {
        /// Interface to bind
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Where received files are written (default: received_files)
        #[arg(short, long)]
        save_dir: Option<PathBuf>,
    },

    /// Encrypt a file and send it to the server
    Send {
        /// File to send
        file: PathBuf,

        /// Server host
        #[arg(long)]
        host: Option<String>,

        /// Server port
        #[arg(short, long)]
        port: Option<u16>,

        /// Server public key file
        #[arg(long, value_name = "FILE")]
        public_key: Option<PathBuf>,
    },

    /// Generate the server key pair
    Keygen {
        /// Replace existing key files
        #[arg(long)]
        force: bool,
    },

    /// Show the server public key and its fingerprint
    Pubkey,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            bind,
            port,
            save_dir,
        } => {
            if let Some(bind) = bind {
                settings.bind_host = bind;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            settings.validate()?;
            cli::serve::run(&settings, save_dir)
        }
        Commands::Send {
            file,
            host,
            port,
            public_key,
        } => {
            if let Some(host) = host {
                settings.server_host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            if let Some(public_key) = public_key {
                settings.public_key_path = public_key;
            }
            settings.validate()?;
            cli::send::run(&settings, &file)
        }
        Commands::Keygen { force } => cli::keygen::run(&settings, force),
        Commands::Pubkey => cli::pubkey::run(&settings),
    }
}
