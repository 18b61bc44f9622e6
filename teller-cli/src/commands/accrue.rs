//! Accrue command - pay one period of interest into every account

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let settings = ctx.interest.settings();
    if !json {
        output::info(&format!(
            "Accruing interest at rate {} as '{}'...",
            settings.rate, settings.authority_name
        ));
    }

    let report = ctx.interest.accrue_all()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut table = output::create_table();
    table.add_row(vec!["Accounts".to_string(), report.accounts.to_string()]);
    table.add_row(vec!["Credited".to_string(), report.credited.to_string()]);
    table.add_row(vec!["Failed".to_string(), report.failed.to_string()]);
    table.add_row(vec![
        "Total interest".to_string(),
        output::format_money(report.total_interest),
    ]);
    println!("{}", table);

    if report.failed > 0 {
        println!(
            "{}",
            format!("{} account(s) were not credited; see `teller history`", report.failed).yellow()
        );
    }
    Ok(())
}
