//! Command-line front end for the rollcall user store.
//!
//! Thin wrappers around [`rollcall::UserStore`]: `register` adds a user,
//! `login` checks credentials, `users` prints the roster.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use dialoguer::Password;
use rollcall::{AddUserOutcome, UserStore};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rollcall", version, about = "Local user-registration roster")]
struct Cli {
    /// Path to the user database. Defaults to `users.db` in the platform
    /// data directory.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a new user.
    Register {
        username: String,
        email: String,
        /// Password for the new user; prompted interactively when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Check a username/password pair against the roster.
    Login {
        username: String,
        /// Password to check; prompted interactively when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// List registered usernames.
    Users,
    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    if let Command::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "rollcall", &mut std::io::stdout());
        return Ok(());
    }

    let db_path = resolve_db_path(cli.db)?;
    let store = UserStore::open(&db_path)
        .with_context(|| format!("opening user database at {}", db_path.display()))?;

    match cli.command {
        Command::Register {
            username,
            email,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password(true)?,
            };
            match store.add_user(&username, &email, &password)? {
                AddUserOutcome::Added => println!("registered '{username}'"),
                AddUserOutcome::DuplicateUsername => {
                    eprintln!("username '{username}' is already taken");
                    std::process::exit(1);
                }
            }
        }
        Command::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password(false)?,
            };
            if store.authenticate_user(&username, &password)? {
                println!("accepted");
            } else {
                eprintln!("rejected");
                std::process::exit(1);
            }
        }
        Command::Users => {
            store.display_users()?;
            println!("{} user(s) registered", store.user_count()?);
        }
        Command::Completions { .. } => unreachable!("handled before the store is opened"),
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Hidden-input password prompt; registration asks twice.
fn prompt_password(confirm: bool) -> Result<String> {
    let prompt = Password::new().with_prompt("Password");
    let prompt = if confirm {
        prompt.with_confirmation("Confirm password", "passwords do not match")
    } else {
        prompt
    };
    Ok(prompt.interact()?)
}

/// Explicit `--db` path as given; otherwise `users.db` under the platform
/// data directory, created on demand.
fn resolve_db_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    let dirs = directories::ProjectDirs::from("", "", "rollcall")
        .context("could not determine a data directory for the user database")?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    Ok(data_dir.join("users.db"))
}
