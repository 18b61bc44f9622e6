//! Account command - open and list accounts

use std::collections::HashMap;

use anyhow::{bail, Result};
use clap::Subcommand;
use rust_decimal::Decimal;
use serde::Serialize;
use teller_core::ports::AccountStore;

use super::get_context;
use crate::output;

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Open {
        /// Owning user's name (omit for an unowned account)
        #[arg(long, short = 'o')]
        owner: Option<String>,
        /// Opening balance
        #[arg(long, short = 'b', default_value = "0")]
        balance: Decimal,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List accounts and balances
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct AccountRow {
    id: i64,
    owner: Option<String>,
    balance: Decimal,
}

pub fn run(command: AccountCommands) -> Result<()> {
    match command {
        AccountCommands::Open { owner, balance, json } => {
            let ctx = get_context()?;
            let owner = match owner {
                Some(name) => match ctx.store.find_user_by_name(&name)? {
                    Some(user) => Some(user),
                    None => bail!("No user named '{}'", name),
                },
                None => None,
            };

            let account = ctx.store.open_account(owner.as_ref().map(|u| u.id), balance)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&account)?);
            } else {
                let owner = owner.map(|u| u.name).unwrap_or_else(|| "nobody".to_string());
                output::success(&format!(
                    "Opened account {} for {} with balance {}",
                    account.id,
                    owner,
                    output::format_money(account.balance)
                ));
            }
        }
        AccountCommands::List { json } => {
            let ctx = get_context()?;
            let names: HashMap<_, _> = ctx
                .store
                .list_users()?
                .into_iter()
                .map(|u| (u.id, u.name))
                .collect();
            let rows: Vec<AccountRow> = ctx
                .store
                .list_accounts()?
                .into_iter()
                .map(|a| AccountRow {
                    id: a.id,
                    owner: a.owner_id.and_then(|id| names.get(&id).cloned()),
                    balance: a.balance,
                })
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }
            if rows.is_empty() {
                output::info("No accounts yet. Open one with: teller account open --owner <name>");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["ID", "Owner", "Balance"]);
            for row in &rows {
                table.add_row(vec![
                    row.id.to_string(),
                    row.owner.clone().unwrap_or_else(|| "-".to_string()),
                    output::format_money(row.balance),
                ]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}
