//! Teller CLI - bank account operations in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

use commands::{account, accrue, history, money, user, AuthArgs};

/// Teller - deposits, withdrawals, transfers and interest
#[derive(Parser)]
#[command(name = "teller", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        command: user::UserCommands,
    },

    /// Manage accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// Deposit into an account
    Deposit {
        /// Account ID
        account: i64,
        /// Amount to deposit
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
        /// Description recorded in the audit trail
        #[arg(long, short = 'd', default_value = "Deposit")]
        description: String,
        #[command(flatten)]
        auth: AuthArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Withdraw from an account you own
    Withdraw {
        /// Account ID
        account: i64,
        /// Amount to withdraw
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
        /// Description recorded in the audit trail
        #[arg(long, short = 'd', default_value = "Withdrawal")]
        description: String,
        #[command(flatten)]
        auth: AuthArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Transfer between two accounts
    Transfer {
        /// Source account ID
        from: i64,
        /// Destination account ID
        to: i64,
        /// Amount to transfer
        #[arg(allow_negative_numbers = true)]
        amount: Decimal,
        /// Description recorded in the audit trail
        #[arg(long, short = 'd', default_value = "Transfer")]
        description: String,
        #[command(flatten)]
        auth: AuthArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Pay one period of interest into every account
    Accrue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the audit trail, newest first
    History {
        /// Number of entries to show
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
        /// Only show authorization denials
        #[arg(long)]
        denials: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TELLER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::User { command } => user::run(command),
        Commands::Account { command } => account::run(command),
        Commands::Deposit { account, amount, description, auth, json } => {
            money::deposit(auth, account, amount, description, json)
        }
        Commands::Withdraw { account, amount, description, auth, json } => {
            money::withdraw(auth, account, amount, description, json)
        }
        Commands::Transfer { from, to, amount, description, auth, json } => {
            money::transfer(auth, from, to, amount, description, json)
        }
        Commands::Accrue { json } => accrue::run(json),
        Commands::History { limit, denials, json } => history::run(limit, denials, json),
    }
}
