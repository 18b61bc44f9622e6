//! Deposit, withdraw and transfer commands

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use teller_core::ports::AccountStore;
use teller_core::{AccountId, BankContext};

use super::{get_context, with_session, AuthArgs};
use crate::output;

#[derive(Serialize)]
struct Movement {
    operation: &'static str,
    success: bool,
    amount: Decimal,
    actor: String,
    balances: Vec<(AccountId, Option<Decimal>)>,
}

fn balances(ctx: &BankContext, ids: &[AccountId]) -> Result<Vec<(AccountId, Option<Decimal>)>> {
    ids.iter()
        .map(|&id| Ok((id, ctx.store.find_account(id)?.map(|a| a.balance))))
        .collect()
}

fn report(movement: &Movement, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(movement)?);
        return Ok(());
    }

    let summary = format!(
        "{} of {} by {}",
        movement.operation,
        output::format_money(movement.amount),
        movement.actor
    );
    if movement.success {
        output::success(&format!("{} completed", summary));
    } else {
        output::warning(&format!("{} did not go through", summary));
    }
    for (id, balance) in &movement.balances {
        match balance {
            Some(balance) => println!("  account {}: {}", id, output::format_money(*balance)),
            None => println!("  account {}: not found", id),
        }
    }
    Ok(())
}

pub fn deposit(auth: AuthArgs, account: AccountId, amount: Decimal, description: String, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let movement = with_session(&ctx, auth, |session| {
        let success = ctx.accounts.deposit(session.user(), amount, &description, account)?;
        Ok(Movement {
            operation: "Deposit",
            success,
            amount,
            actor: session.user().name.clone(),
            balances: balances(&ctx, &[account])?,
        })
    })?;
    report(&movement, json)
}

pub fn withdraw(auth: AuthArgs, account: AccountId, amount: Decimal, description: String, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let movement = with_session(&ctx, auth, |session| {
        let success = ctx.accounts.withdraw(session.user(), amount, &description, account)?;
        Ok(Movement {
            operation: "Withdrawal",
            success,
            amount,
            actor: session.user().name.clone(),
            balances: balances(&ctx, &[account])?,
        })
    })?;
    report(&movement, json)
}

pub fn transfer(
    auth: AuthArgs,
    from: AccountId,
    to: AccountId,
    amount: Decimal,
    description: String,
    json: bool,
) -> Result<()> {
    let ctx = get_context()?;
    let movement = with_session(&ctx, auth, |session| {
        let success = ctx.accounts.transfer(session.user(), amount, &description, from, to)?;
        Ok(Movement {
            operation: "Transfer",
            success,
            amount,
            actor: session.user().name.clone(),
            balances: balances(&ctx, &[from, to])?,
        })
    })?;
    report(&movement, json)
}
