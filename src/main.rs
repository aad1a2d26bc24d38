mod backup;
mod config;
mod gate;
mod otp;
mod prompt;
mod series;
mod session;
mod store;

use crate::backup::backup_create;
use crate::config::{Config, SECRET_VAR};
use crate::gate::{Gate, Unlocked};
use crate::otp::SharedSecret;
use crate::prompt::prompt_code;
use crate::series::Update;
use crate::session::{Session, Which, print_series};
use crate::store::Store;
use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use time::OffsetDateTime;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "series", version, about = "Track ongoing and finished series")]
struct Cli {
    /// One-time code for commands that change the list (prompted when omitted)
    #[arg(long, global = true)]
    code: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List series
    Ls {
        /// Only finished series
        #[arg(long, conflicts_with = "ongoing")]
        finished: bool,
        /// Only ongoing series
        #[arg(long)]
        ongoing: bool,
    },

    /// Add a series, ongoing when season and episode are given
    ///
    /// Examples:
    ///   series add "Dark"
    ///   series add "Andor" --season 1 --episode 3
    Add {
        name: String,
        #[arg(long, requires = "episode")]
        season: Option<u32>,
        #[arg(long, requires = "season")]
        episode: Option<u32>,
    },

    /// Change season and/or episode of an ongoing series
    Update {
        name: String,
        #[arg(long, required_unless_present = "episode")]
        season: Option<u32>,
        #[arg(long)]
        episode: Option<u32>,
    },

    /// Mark an ongoing series finished
    Finish { name: String },

    /// Delete a series
    Rm { name: String },

    /// Check a one-time code without changing anything
    Verify,

    /// Interactive shell; the code is asked once per process
    Shell,

    /// One-time code setup (TOTP)
    Otp {
        #[command(subcommand)]
        cmd: OtpCommands,
    },

    /// Backup the series store
    Backup {
        #[command(subcommand)]
        cmd: BackupCommands,
    },
}

#[derive(Subcommand, Debug)]
enum OtpCommands {
    /// Print a fresh random secret for SECRET_OTP
    NewSecret,
    /// Print the otpauth:// URI for the configured secret
    Uri {
        /// Issuer shown in the authenticator app (default: SERIES_OTP_ISSUER or "series")
        #[arg(long)]
        issuer: Option<String>,
        /// Account label shown in the authenticator app
        #[arg(long, default_value = "owner")]
        account: String,
    },
    /// Print the current code for the configured secret
    Code,
}

#[derive(Subcommand, Debug)]
enum BackupCommands {
    /// Create backup archive
    ///
    /// Examples:
    ///   series backup create
    ///   series backup create my_backup
    ///   series backup create my_backup.zip
    Create {
        /// Optional backup filename
        file: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let store = Store::open(config.table_path());
    debug!(table = %store.path().display(), "using series table");
    let gate = Gate::from_config(&config);
    let code = cli.code;

    match cli.command {
        Commands::Ls { finished, ongoing } => {
            let which = match (finished, ongoing) {
                (true, _) => Which::Finished,
                (_, true) => Which::Ongoing,
                _ => Which::All,
            };
            print_series(&store, which)?
        }
        Commands::Add {
            name,
            season,
            episode,
        } => cmd_add(&store, &unlock(&gate, code)?, &name, season.zip(episode))?,
        Commands::Update {
            name,
            season,
            episode,
        } => cmd_update(&store, &unlock(&gate, code)?, &name, season, episode)?,
        Commands::Finish { name } => {
            let serie = store.convert(&unlock(&gate, code)?, &name)?;
            println!("Finished {serie}");
        }
        Commands::Rm { name } => {
            store.delete(&unlock(&gate, code)?, &name)?;
            println!("Deleted {}", name.trim());
        }
        Commands::Verify => {
            unlock(&gate, code)?;
            println!("OTP verified successfully");
        }
        Commands::Shell => Session::new(&gate, &store, prompt_code).run()?,
        Commands::Otp { cmd } => match cmd {
            OtpCommands::NewSecret => cmd_otp_new_secret(),
            OtpCommands::Uri { issuer, account } => {
                cmd_otp_uri(&config, issuer.as_deref(), &account)?
            }
            OtpCommands::Code => cmd_otp_code(&config)?,
        },
        Commands::Backup { cmd } => match cmd {
            BackupCommands::Create { file } => {
                let path = backup_create(&config.store_dir, file)?;
                println!("Backup created at {}", path.display());
            }
        },
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Code from `--code`, otherwise asked for on the terminal.
fn unlock(gate: &Gate, code: Option<String>) -> anyhow::Result<Unlocked> {
    let code = match code {
        Some(code) => code,
        None => prompt_code()?,
    };
    Ok(gate.unlock_now(&code)?)
}

fn cmd_add(
    store: &Store,
    key: &Unlocked,
    name: &str,
    progress: Option<(u32, u32)>,
) -> anyhow::Result<()> {
    let serie = match progress {
        Some((season, episode)) => store.add_ongoing(key, name, season, episode)?,
        None => store.add_finished(key, name)?,
    };
    println!("Added {serie}");
    Ok(())
}

fn cmd_update(
    store: &Store,
    key: &Unlocked,
    name: &str,
    season: Option<u32>,
    episode: Option<u32>,
) -> anyhow::Result<()> {
    let update =
        Update::from_parts(season, episode).ok_or_else(|| anyhow!("nothing to update"))?;
    let serie = store.update(key, name, update)?;
    println!("Updated {serie}");
    Ok(())
}

/// series otp new-secret
fn cmd_otp_new_secret() {
    let secret = otp::new_secret();
    println!("{}", secret.as_str());
    eprintln!("Set it with: export {SECRET_VAR}=<secret>");
}

/// series otp uri
fn cmd_otp_uri(config: &Config, issuer: Option<&str>, account: &str) -> anyhow::Result<()> {
    let secret = SharedSecret::from_config(config.secret_text())?;
    let issuer = issuer.unwrap_or(&config.otp_issuer);
    let uri = otp::provisioning_uri(&secret, issuer, account)
        .context("cannot build provisioning URI")?;
    println!("{uri}");
    Ok(())
}

/// series otp code
fn cmd_otp_code(config: &Config) -> anyhow::Result<()> {
    let secret = SharedSecret::from_config(config.secret_text())?;
    println!("{}", otp::generate(&secret, OffsetDateTime::now_utc()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn otp_uri_takes_issuer_and_account() {
        let cli = Cli::try_parse_from([
            "series", "otp", "uri", "--issuer", "Watchlist", "--account", "me",
        ])
        .unwrap();
        match cli.command {
            Commands::Otp {
                cmd: OtpCommands::Uri { issuer, account },
            } => {
                assert_eq!(issuer.as_deref(), Some("Watchlist"));
                assert_eq!(account, "me");
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::try_parse_from(["series", "otp", "uri"]).unwrap();
        match cli.command {
            Commands::Otp {
                cmd: OtpCommands::Uri { issuer, account },
            } => {
                assert!(issuer.is_none());
                assert_eq!(account, "owner");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn mutations_accept_code_flag() {
        let cli = Cli::try_parse_from([
            "series", "add", "Andor", "--season", "1", "--episode", "3", "--code", "287082",
        ])
        .unwrap();
        assert_eq!(cli.code.as_deref(), Some("287082"));
        assert!(Cli::try_parse_from(["series", "add", "Andor", "--season", "1"]).is_err());
        assert!(Cli::try_parse_from(["series", "update", "Andor"]).is_err());
    }
}
