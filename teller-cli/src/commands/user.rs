//! User command - enroll and list bank users

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use teller_core::Role;

use super::{get_context, get_password_with_confirm};
use crate::output;

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user with a password
    Add {
        /// Login name
        name: String,
        /// Role: admin or user
        #[arg(long, short = 'r', default_value = "user")]
        role: Role,
        /// Password (or TELLER_PASSWORD, or prompt)
        #[arg(long, short = 'p')]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: UserCommands) -> Result<()> {
    match command {
        UserCommands::Add { name, role, password, json } => {
            let password = get_password_with_confirm(password)?;
            let ctx = get_context()?;
            let user = ctx.enroll(&name, role, &password)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&user)?);
            } else {
                output::success(&format!("Created {} '{}' (id {})", user.role, user.name, user.id));
            }
        }
        UserCommands::List { json } => {
            let ctx = get_context()?;
            let users = ctx.store.list_users()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
                return Ok(());
            }
            if users.is_empty() {
                output::info("No users yet. Add one with: teller user add <name>");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["ID", "Name", "Role"]);
            for user in &users {
                let role = if user.is_admin() {
                    user.role.to_string().bold().to_string()
                } else {
                    user.role.to_string()
                };
                table.add_row(vec![user.id.to_string(), user.name.clone(), role]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}
