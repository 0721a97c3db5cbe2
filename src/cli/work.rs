use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use colored::Colorize;
use comfy_table::Table;

use crate::detail::normalize_detail;
use crate::error::Result;
use crate::fmt::{money, round2};
use crate::settings::load_settings;
use crate::workbook::load_grid;

const ROOM_PROJECT: &str = "房费";

pub fn run(
    input: &str,
    sheet: Option<&str>,
    output: &str,
    transfer: Option<f64>,
    config: Option<&str>,
) -> Result<()> {
    let settings = load_settings(config.map(Path::new))?;
    let sheet = sheet.unwrap_or(&settings.work_sheet);

    let input_path = PathBuf::from(input);
    let grid = load_grid(&input_path, sheet)?;
    let detail = normalize_detail(&grid, &settings.project_aliases)?;

    // Long-form CSV.
    let mut wtr = csv::Writer::from_path(output)?;
    wtr.write_record(["项目", "名称", "金额", "收入类型", "source_file", "source_row"])?;
    let source_file = input_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();
    for row in &detail.rows {
        let amount = format!("{:.2}", row.amount);
        let source_row = row.source_row.to_string();
        wtr.write_record([
            row.project.as_str(),
            row.clean_name.as_str(),
            amount.as_str(),
            row.income_type.as_deref().unwrap_or(""),
            source_file.as_str(),
            source_row.as_str(),
        ])?;
    }
    wtr.flush()?;
    println!("long table written to {output} ({} rows)", detail.rows.len());
    if detail.unclassified > 0 {
        println!(
            "{}",
            format!("{} label(s) without an income-type letter", detail.unclassified).yellow()
        );
    }

    // Income-type distribution.
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for row in &detail.rows {
        let key = row.income_type.clone().unwrap_or_else(|| "?".to_string());
        *counts.entry(key).or_default() += 1;
    }
    let mut table = Table::new();
    table.set_header(["收入类型", "行数"]);
    for (itype, count) in &counts {
        table.add_row([itype.clone(), count.to_string()]);
    }
    println!("{table}");

    // Room-fee pivot by income type, with the adjustment figure when the
    // transfer credit is supplied.
    let mut room: BTreeMap<String, f64> = BTreeMap::new();
    for row in detail.rows.iter().filter(|r| r.project == ROOM_PROJECT) {
        let key = row.income_type.clone().unwrap_or_else(|| "?".to_string());
        *room.entry(key).or_default() += row.amount;
    }
    if !room.is_empty() {
        let mut table = Table::new();
        table.set_header(["房费收入类型", "金额"]);
        for (itype, amount) in &room {
            table.add_row([itype.clone(), money(round2(*amount))]);
        }
        println!("{table}");

        if let Some(transfer) = transfer {
            let room_total: f64 = room.values().sum();
            let h = room.get("H").copied().unwrap_or(0.0);
            let l = room.get("L").copied().unwrap_or(0.0);
            let t = room.get("T").copied().unwrap_or(0.0);
            let adjust_s = room_total - transfer - h - l - t;
            println!(
                "房费总计={} 转账={} H={} L={} T={} 调整S={}",
                money(round2(room_total)),
                money(transfer),
                money(round2(h)),
                money(round2(l)),
                money(round2(t)),
                money(round2(adjust_s)),
            );
        }
    }

    Ok(())
}
