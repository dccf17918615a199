//! sso-creds
//!
//! Command-line tool that authenticates against an AWS SSO instance
//! with the OAuth2 device-authorization grant, exchanges the session
//! for role-scoped credentials, and writes them into the shared
//! credentials file where other tools pick them up transparently.
//!
//! Subcommands:
//! - `login [profile]`   run the flow and write the credentials file
//! - `export --profile`  print shell-exportable credentials
//! - `process --profile` print credential_process JSON
//! - `console --profile` open the web console via federation sign-in
//! - `version`           print version information

mod browser;
mod commands;
mod config;
mod console;
mod wiring;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sso-creds", version, about = "AWS SSO credential manager")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch credentials for a profile and write them to the shared
    /// credentials file
    Login {
        /// Name of the AWS profile
        #[arg(default_value = "default")]
        profile: String,
    },
    /// Print credentials in a shell-exportable format
    Export {
        /// Name of the AWS profile
        #[arg(long)]
        profile: String,
    },
    /// Print credential_process compatible JSON
    Process {
        /// Name of the AWS profile
        #[arg(long)]
        profile: String,
    },
    /// Open the AWS web console in the default browser using SSO
    Console {
        /// Name of the AWS profile
        #[arg(long)]
        profile: String,
        /// Force logout of any existing console session first
        #[arg(long, action = ArgAction::Set, default_value_t = true)]
        force_logout: bool,
        /// Seconds to wait after forcing logout before logging in
        #[arg(long, default_value_t = 1)]
        logout_wait: u64,
    },
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr: stdout must stay clean for `export`/`process`
    // output that shells and SDKs consume.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Command::Version = cli.command {
        // Release builds pass the commit through the environment.
        match option_env!("GIT_COMMIT") {
            Some(commit) => println!(
                "{} {} ({commit})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ),
            None => println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
        return Ok(());
    }

    // A user interrupt aborts the device-flow poll loop immediately;
    // no partial state is written because all persistence happens
    // after the network steps complete.
    tokio::select! {
        result = run(cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            anyhow::bail!("interrupted");
        }
    }
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Login { profile } => commands::login(&profile).await,
        Command::Export { profile } => commands::export(&profile).await,
        Command::Process { profile } => commands::process(&profile).await,
        Command::Console {
            profile,
            force_logout,
            logout_wait,
        } => commands::console(&profile, force_logout, logout_wait).await,
        Command::Version => unreachable!("handled before dispatch"),
    }
}
