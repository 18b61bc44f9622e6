//! History command - show the audit trail

use anyhow::Result;
use comfy_table::Cell;
use teller_core::AuditEntry;

use super::get_context;
use crate::output;

pub fn run(limit: usize, denials: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let entries = if denials {
        ctx.history.denials(limit)?
    } else {
        ctx.history.recent(limit)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        output::info("No matching audit entries");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["When", "Kind", "Actor", "Account", "Amount", "Outcome", "Description"]);
    for entry in &entries {
        table.add_row(vec![
            Cell::new(entry.recorded_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(entry.kind),
            Cell::new(entry.actor_name.as_deref().unwrap_or("-")),
            Cell::new(entry.account_id.map_or("-".to_string(), |id| id.to_string())),
            Cell::new(entry.amount.map_or(String::new(), output::format_money)),
            outcome(entry),
            Cell::new(&entry.description),
        ]);
    }
    println!("{}", table);
    Ok(())
}

fn outcome(entry: &AuditEntry) -> Cell {
    match &entry.denial_reason {
        Some(reason) if entry.is_denial() => Cell::new(format!("denied: {}", reason)).fg(comfy_table::Color::Red),
        _ if entry.is_denial() => Cell::new("denied").fg(comfy_table::Color::Red),
        _ => output::outcome_cell(entry.success),
    }
}
