use std::path::{Path, PathBuf};

use colored::Colorize;
use comfy_table::Table;

use crate::allocation::{build_allocations, read_snapshot_csv, write_snapshot_csv, AllocationSnapshot};
use crate::detail::normalize_detail;
use crate::error::{FrontdeskError, Result};
use crate::exporter::{export_report, ReportBundle};
use crate::fmt::money;
use crate::pivot::{filter_by_types, pivot};
use crate::reconciler::{reconcile, TRANSFER_NAME};
use crate::settings::load_settings;
use crate::tax::split_all;
use crate::totals::normalize_totals;
use crate::validator::validate_all;
use crate::workbook::{compute_checksum, load_grid};

#[allow(clippy::too_many_arguments)]
pub fn run(
    input: &str,
    output: Option<&str>,
    work_sheet: Option<&str>,
    totals_sheet: Option<&str>,
    types: &str,
    alloc: Option<&str>,
    alloc_out: Option<&str>,
    config: Option<&str>,
) -> Result<()> {
    let mut settings = load_settings(config.map(Path::new))?;
    if let Some(sheet) = work_sheet {
        settings.work_sheet = sheet.to_string();
    }
    if let Some(sheet) = totals_sheet {
        settings.totals_sheet = sheet.to_string();
    }

    let input_path = PathBuf::from(input);
    let checksum = compute_checksum(&input_path)?;

    // Detail side.
    let work_grid = load_grid(&input_path, &settings.work_sheet)?;
    let detail = normalize_detail(&work_grid, &settings.project_aliases)?;
    let selection = super::parse_types(types);
    let filtered = filter_by_types(&detail.rows, &selection);
    if filtered.is_empty() {
        return Err(FrontdeskError::Other(format!(
            "no detail rows match income types {types:?}"
        )));
    }
    let pivot_table = pivot(&detail.rows, &selection);

    let prior = match alloc {
        Some(path) => read_snapshot_csv(std::fs::File::open(path)?, &settings.buckets)?,
        None => AllocationSnapshot::new(),
    };
    let allocations = build_allocations(&pivot_table, &prior, &settings.buckets);
    let tax_results = split_all(&allocations, &settings.buckets);

    // Totals side.
    let totals_grid = load_grid(&input_path, &settings.totals_sheet)?;
    let totals_rows = normalize_totals(&totals_grid)?;
    let (reconciliation, hit_details) = reconcile(&totals_rows, &settings.hit_list());

    let report = validate_all(
        &allocations,
        &tax_results,
        Some(&reconciliation),
        settings.tolerance,
    );

    // Console summary.
    println!(
        "{} rows selected ({} unclassified labels in sheet), {} allocation rows",
        filtered.len(),
        detail.unclassified,
        allocations.len()
    );
    if detail.unclassified > 0 {
        println!(
            "{}",
            format!(
                "{} detail label(s) carry no income-type letter; they only appear under --types all",
                detail.unclassified
            )
            .yellow()
        );
    }
    if !totals_rows.iter().any(|r| r.name.trim() == TRANSFER_NAME) {
        println!(
            "{}",
            format!("totals sheet has no {TRANSFER_NAME:?} row; transfer credit treated as 0").yellow()
        );
    }

    let mut table = Table::new();
    table.set_header(["指标", "金额"]);
    table.add_row(["借方合计".to_string(), money(reconciliation.debit_total)]);
    table.add_row(["转账(贷方)".to_string(), money(reconciliation.transfer_credit)]);
    table.add_row([
        "转内部成本".to_string(),
        money(reconciliation.internal_cost_credit),
    ]);
    for (category, credit) in &reconciliation.category_totals {
        table.add_row([category.clone(), money(*credit)]);
    }
    table.add_row(["凭证贷方".to_string(), money(reconciliation.voucher_credit)]);
    table.add_row(["应挂账金额".to_string(), money(reconciliation.suspense)]);
    table.add_row(["凭证借方".to_string(), money(reconciliation.voucher_debit)]);
    println!("{table}");

    // Editable allocation snapshot, written even when export is blocked so
    // the user can fix their edits and re-run.
    if let Some(path) = alloc_out {
        write_snapshot_csv(std::fs::File::create(path)?, &allocations, &settings.buckets)?;
        println!("allocation table written to {path}");
    }

    if !report.ok() {
        eprintln!("{}", "validation failed; export blocked:".red());
        for failure in &report.failures {
            eprintln!("  {}", failure.to_string().red());
        }
        return Err(FrontdeskError::ExportBlocked(report.failures.len()));
    }
    println!("{}", "all checks passed".green());

    let output_path = match output {
        Some(p) => PathBuf::from(p),
        None => default_output(&input_path),
    };
    let bundle = ReportBundle {
        detail_rows: &filtered,
        pivot: &pivot_table,
        allocations: &allocations,
        tax_results: &tax_results,
        buckets: &settings.buckets,
        totals_rows: &totals_rows,
        reconciliation: &reconciliation,
        hit_details: &hit_details,
        input_checksum: &checksum,
    };
    export_report(&output_path, &bundle, &report, &settings.export_sheets)?;
    println!(
        "{}",
        format!("report written to {}", output_path.display()).green()
    );
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("report");
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    input.with_file_name(format!("{stem}_报表-{stamp}.xlsx"))
}
