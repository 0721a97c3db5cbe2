use std::path::{Path, PathBuf};

use colored::Colorize;
use comfy_table::Table;

use crate::error::Result;
use crate::fmt::money;
use crate::reconciler::{reconcile, TRANSFER_NAME};
use crate::settings::load_settings;
use crate::totals::normalize_totals;
use crate::workbook::load_grid;

pub fn run(
    input: &str,
    sheet: Option<&str>,
    output: Option<&str>,
    config: Option<&str>,
) -> Result<()> {
    let settings = load_settings(config.map(Path::new))?;
    let sheet = sheet.unwrap_or(&settings.totals_sheet);

    let input_path = PathBuf::from(input);
    let grid = load_grid(&input_path, sheet)?;
    let rows = normalize_totals(&grid)?;

    if let Some(output) = output {
        let mut wtr = csv::Writer::from_path(output)?;
        wtr.write_record(["code", "name", "debit", "credit", "source_file", "source_row"])?;
        let source_file = input_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();
        for row in &rows {
            let debit = format!("{:.2}", row.debit);
            let credit = format!("{:.2}", row.credit);
            let source_row = row.source_row.to_string();
            wtr.write_record([
                row.code.as_deref().unwrap_or(""),
                row.name.as_str(),
                debit.as_str(),
                credit.as_str(),
                source_file.as_str(),
                source_row.as_str(),
            ])?;
        }
        wtr.flush()?;
        println!("long table written to {output} ({} rows)", rows.len());
    }

    match rows.iter().find(|r| r.name.trim() == TRANSFER_NAME) {
        Some(tx) => println!(
            "transfer row: source_row {} credit {}",
            tx.source_row,
            money(tx.credit)
        ),
        None => println!(
            "{}",
            format!("no {TRANSFER_NAME:?} row located; transfer credit treated as 0").yellow()
        ),
    }

    let (result, details) = reconcile(&rows, &settings.hit_list());

    let mut table = Table::new();
    table.set_header(["指标", "金额"]);
    table.add_row(["借方合计".to_string(), money(result.debit_total)]);
    table.add_row(["转账(贷方)".to_string(), money(result.transfer_credit)]);
    table.add_row(["转内部成本".to_string(), money(result.internal_cost_credit)]);
    for (category, credit) in &result.category_totals {
        table.add_row([category.clone(), money(*credit)]);
    }
    table.add_row(["凭证贷方".to_string(), money(result.voucher_credit)]);
    table.add_row(["应挂账金额".to_string(), money(result.suspense)]);
    table.add_row(["凭证借方".to_string(), money(result.voucher_debit)]);
    println!("{table}");

    for detail in &details {
        if detail.rows.is_empty() {
            continue;
        }
        println!(
            "{}: {} row(s), credit {}",
            detail.category,
            detail.rows.len(),
            money(detail.credit_total)
        );
    }

    Ok(())
}
