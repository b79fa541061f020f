//! Status command - ledger summary

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;

pub fn run(data_dir: &Path, json: bool) -> Result<()> {
    let ctx = get_context(data_dir)?;
    let status = ctx.report_service.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let currency = &ctx.config.currency;

    println!("{}", "Budget Ledger Status".bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Storage", &status.backend]);
    table.add_row(vec!["Users", &status.total_users.to_string()]);
    table.add_row(vec!["Records", &status.total_records.to_string()]);
    table.add_row(vec!["Income", &output::money(status.income, currency)]);
    table.add_row(vec!["Expenses", &output::money(status.expenses, currency)]);
    table.add_row(vec!["Balance", &output::money(status.income - status.expenses, currency)]);
    println!("{}", table);
    println!();

    let range = &status.date_range;
    if let (Some(earliest), Some(latest)) = (&range.earliest, &range.latest) {
        println!("Date range: {} to {}", earliest, latest);
        println!();
    }

    if let Some(stats) = ctx.report_service.ledger_stats()? {
        println!("{}", "Members".bold());
        let mut members = output::create_table();
        members.set_header(vec!["Id", "Name", "Income", "Expenses"]);
        for member in stats.members {
            members.add_row(vec![
                member.owner_id,
                member.display_name,
                output::money(member.income, currency),
                output::money(member.expenses, currency),
            ]);
        }
        println!("{}", members);
    }

    Ok(())
}
