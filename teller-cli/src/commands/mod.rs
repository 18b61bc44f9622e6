//! CLI command implementations

pub mod account;
pub mod accrue;
pub mod history;
pub mod money;
pub mod user;

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use dialoguer::Password;
use teller_core::{BankContext, Error, Session};

/// Who is running a money command
#[derive(Args, Debug, Clone)]
pub struct AuthArgs {
    /// User to log in as
    #[arg(long, short = 'u', env = "TELLER_USER")]
    pub user: Option<String>,
    /// Password (or TELLER_PASSWORD, or prompt)
    #[arg(long, short = 'p')]
    pub password: Option<String>,
}

/// Get the bank directory from environment or default
pub fn get_bank_dir() -> Result<PathBuf> {
    if let Ok(dir) = env::var("TELLER_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".teller"))
        .context("Could not find home directory; set TELLER_DIR")
}

/// Open the bank, creating its directory on first use
pub fn get_context() -> Result<BankContext> {
    let bank_dir = get_bank_dir()?;

    std::fs::create_dir_all(&bank_dir)
        .with_context(|| format!("Failed to create bank directory: {:?}", bank_dir))?;
    tracing::debug!(dir = ?bank_dir, "opening bank");

    BankContext::new(&bank_dir).context("Failed to open bank")
}

/// Get password from --password flag, TELLER_PASSWORD env var, or prompt
pub fn get_password_or_prompt(password_flag: Option<String>, prompt: &str) -> Result<String> {
    // 1. Check --password flag first
    if let Some(p) = password_flag {
        return Ok(p);
    }

    // 2. Check TELLER_PASSWORD environment variable
    if let Ok(p) = env::var("TELLER_PASSWORD") {
        return Ok(p);
    }

    // 3. Prompt interactively
    if atty::isnt(atty::Stream::Stdin) {
        bail!("No password given. Use --password or TELLER_PASSWORD when not running in a terminal");
    }
    let p = Password::new().with_prompt(prompt).interact()?;
    Ok(p)
}

/// Get a new password, asking twice when prompting
pub fn get_password_with_confirm(password_flag: Option<String>) -> Result<String> {
    if let Some(p) = password_flag {
        return Ok(p);
    }
    if let Ok(p) = env::var("TELLER_PASSWORD") {
        return Ok(p);
    }
    if atty::isnt(atty::Stream::Stdin) {
        bail!("No password given. Use --password or TELLER_PASSWORD when not running in a terminal");
    }

    let p = Password::new()
        .with_prompt("New password")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()?;
    Ok(p)
}

/// Log in, run `f` with the session, and always log out afterwards
pub fn with_session<T>(
    ctx: &BankContext,
    auth: AuthArgs,
    f: impl FnOnce(&Session) -> Result<T>,
) -> Result<T> {
    let username = match auth.user {
        Some(name) => name,
        None => bail!("No user given. Use --user or TELLER_USER"),
    };
    let password = get_password_or_prompt(auth.password, &format!("Password for {}", username))?;

    let session = ctx.accounts.login(&username, &password)?;
    let result = f(&session);
    finish_session(result, ctx.accounts.logout(session))
}

/// The operation's own error wins; a logout failure only surfaces after success
fn finish_session<T>(result: Result<T>, logout: std::result::Result<bool, Error>) -> Result<T> {
    match (result, logout) {
        (Err(e), Err(logout_err)) => {
            tracing::warn!(error = %logout_err, "logout failed after operation error");
            Err(e)
        }
        (Err(e), Ok(_)) => Err(e),
        (Ok(_), Err(logout_err)) => Err(logout_err).context("Failed to log out"),
        (Ok(value), Ok(_)) => Ok(value),
    }
}
