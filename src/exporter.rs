use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::allocation::{AllocationRow, BucketConfig};
use crate::error::{FrontdeskError, Result};
use crate::fmt::round2;
use crate::models::{DetailRow, TotalsLongRow};
use crate::pivot::PivotTable;
use crate::reconciler::{HitDetail, ReconciliationResult};
use crate::tax::{aggregate_by_bucket, aggregate_by_project, grand_total, TaxSplitResult};
use crate::validator::ValidationReport;

pub const SHEET_WORK_LONG: &str = "工作表_long";
pub const SHEET_PIVOT: &str = "透视";
pub const SHEET_ALLOCATION: &str = "分配表";
pub const SHEET_TAX: &str = "税分拆";
pub const SHEET_TAX_PROJECT: &str = "项目税分拆";
pub const SHEET_TOTALS_LONG: &str = "总数_long";
pub const SHEET_RECON: &str = "总数校验";
pub const SHEET_HITS: &str = "命中明细";

pub const ALL_SHEETS: &[&str] = &[
    SHEET_WORK_LONG,
    SHEET_PIVOT,
    SHEET_ALLOCATION,
    SHEET_TAX,
    SHEET_TAX_PROJECT,
    SHEET_TOTALS_LONG,
    SHEET_RECON,
    SHEET_HITS,
];

/// Everything the report workbook is assembled from.
pub struct ReportBundle<'a> {
    pub detail_rows: &'a [DetailRow],
    pub pivot: &'a PivotTable,
    pub allocations: &'a [AllocationRow],
    pub tax_results: &'a [TaxSplitResult],
    pub buckets: &'a BucketConfig,
    pub totals_rows: &'a [TotalsLongRow],
    pub reconciliation: &'a ReconciliationResult,
    pub hit_details: &'a [HitDetail],
    /// SHA-256 of the input workbook, stamped on the reconciliation sheet.
    pub input_checksum: &'a str,
}

/// Write the report workbook. This is the export gate: a failed validation
/// report refuses to write anything, so no partial or corrupt output ever
/// reaches disk.
pub fn export_report(
    path: &Path,
    bundle: &ReportBundle,
    report: &ValidationReport,
    sheets: &[String],
) -> Result<()> {
    if !report.ok() {
        return Err(FrontdeskError::ExportBlocked(report.failures.len()));
    }
    if sheets.is_empty() {
        return Err(FrontdeskError::Other(
            "no sheets selected for export".to_string(),
        ));
    }

    let mut workbook = Workbook::new();
    for sheet in sheets {
        let ws = workbook.add_worksheet().set_name(sheet)?;
        match sheet.as_str() {
            SHEET_WORK_LONG => write_work_long(ws, bundle.detail_rows)?,
            SHEET_PIVOT => write_pivot(ws, bundle.pivot)?,
            SHEET_ALLOCATION => write_allocation(ws, bundle.allocations, bundle.buckets)?,
            SHEET_TAX => write_tax_summary(ws, bundle.tax_results, bundle.buckets)?,
            SHEET_TAX_PROJECT => write_tax_by_project(ws, bundle.tax_results, bundle.buckets)?,
            SHEET_TOTALS_LONG => write_totals_long(ws, bundle.totals_rows)?,
            SHEET_RECON => write_reconciliation(ws, bundle.reconciliation, bundle.input_checksum)?,
            SHEET_HITS => write_hit_details(ws, bundle.hit_details)?,
            other => {
                return Err(FrontdeskError::Other(format!(
                    "unknown export sheet: {other}"
                )))
            }
        }
    }
    workbook.save(path)?;
    Ok(())
}

/// Standalone pivot workbook for the `pivot` subcommand.
pub fn export_pivot(path: &Path, pivot: &PivotTable) -> Result<()> {
    let mut workbook = Workbook::new();
    let ws = workbook.add_worksheet().set_name(SHEET_PIVOT)?;
    write_pivot(ws, pivot)?;
    workbook.save(path)?;
    Ok(())
}

fn write_header(ws: &mut Worksheet, cells: &[&str]) -> Result<()> {
    let bold = Format::new().set_bold();
    for (col, text) in cells.iter().enumerate() {
        ws.write_string_with_format(0, col as u16, *text, &bold)?;
    }
    Ok(())
}

fn write_work_long(ws: &mut Worksheet, rows: &[DetailRow]) -> Result<()> {
    write_header(ws, &["项目", "名称", "收入类型", "金额", "source_row"])?;
    for (i, r) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        ws.write_string(row, 0, &r.project)?;
        ws.write_string(row, 1, &r.clean_name)?;
        ws.write_string(row, 2, r.income_type.as_deref().unwrap_or(""))?;
        ws.write_number(row, 3, round2(r.amount))?;
        ws.write_number(row, 4, r.source_row as f64)?;
    }
    Ok(())
}

fn write_pivot(ws: &mut Worksheet, pivot: &PivotTable) -> Result<()> {
    let mut header = vec!["名称"];
    header.extend(pivot.projects.iter().map(String::as_str));
    header.push("总计");
    write_header(ws, &header)?;

    for (i, name) in pivot.names.iter().enumerate() {
        let row = (i + 1) as u32;
        ws.write_string(row, 0, name)?;
        for (j, project) in pivot.projects.iter().enumerate() {
            ws.write_number(row, (j + 1) as u16, round2(pivot.get(name, project)))?;
        }
        ws.write_number(
            row,
            (pivot.projects.len() + 1) as u16,
            round2(pivot.row_total(name)),
        )?;
    }

    let total_row = (pivot.names.len() + 1) as u32;
    ws.write_string(total_row, 0, "合计")?;
    for (j, project) in pivot.projects.iter().enumerate() {
        ws.write_number(total_row, (j + 1) as u16, round2(pivot.column_total(project)))?;
    }
    ws.write_number(
        total_row,
        (pivot.projects.len() + 1) as u16,
        round2(pivot.grand_total()),
    )?;
    Ok(())
}

fn write_allocation(
    ws: &mut Worksheet,
    rows: &[AllocationRow],
    buckets: &BucketConfig,
) -> Result<()> {
    let mut header = vec!["名称", "项目", "金额"];
    header.extend(buckets.ids());
    header.push("分配合计");
    header.push("差额(分配-金额)");
    header.push("备注");
    write_header(ws, &header)?;

    for (i, r) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        ws.write_string(row, 0, &r.name)?;
        ws.write_string(row, 1, &r.project)?;
        ws.write_number(row, 2, round2(r.amount))?;
        let mut col = 3u16;
        for id in buckets.ids() {
            ws.write_number(row, col, round2(r.bucket(id)))?;
            col += 1;
        }
        ws.write_number(row, col, round2(r.allocated_total()))?;
        ws.write_number(row, col + 1, round2(r.allocated_total() - r.amount))?;
        ws.write_string(row, col + 2, &r.note)?;
    }
    Ok(())
}

fn write_tax_summary(
    ws: &mut Worksheet,
    results: &[TaxSplitResult],
    buckets: &BucketConfig,
) -> Result<()> {
    write_header(ws, &["类别", "含税收入", "不含税收入", "税额"])?;
    let mut row = 1u32;
    for (id, nt) in aggregate_by_bucket(results, buckets) {
        ws.write_string(row, 0, &id)?;
        ws.write_number(row, 1, round2(nt.gross))?;
        if buckets.rate(&id).is_some() {
            ws.write_number(row, 2, round2(nt.net))?;
            ws.write_number(row, 3, round2(nt.tax))?;
        }
        row += 1;
    }
    let total = grand_total(results);
    ws.write_string(row, 0, "合计")?;
    ws.write_number(row, 1, round2(total.gross))?;
    ws.write_number(row, 2, round2(total.net))?;
    ws.write_number(row, 3, round2(total.tax))?;
    Ok(())
}

fn write_tax_by_project(
    ws: &mut Worksheet,
    results: &[TaxSplitResult],
    buckets: &BucketConfig,
) -> Result<()> {
    let mut header = vec!["项目"];
    header.extend(buckets.ids());
    header.extend(["含税收入合计", "不含税收入", "税额"]);
    write_header(ws, &header)?;

    let per_project = aggregate_by_project(results);
    let bucket_count = buckets.buckets.len() as u16;

    let mut row = 1u32;
    for (project, total) in &per_project {
        ws.write_string(row, 0, project)?;
        for (col, bucket) in buckets.buckets.iter().enumerate() {
            let gross: f64 = results
                .iter()
                .filter(|r| &r.project == project)
                .filter_map(|r| r.by_bucket.get(&bucket.id))
                .map(|v| v.gross)
                .sum();
            ws.write_number(row, (col + 1) as u16, round2(gross))?;
        }
        ws.write_number(row, bucket_count + 1, round2(total.gross))?;
        ws.write_number(row, bucket_count + 2, round2(total.net))?;
        ws.write_number(row, bucket_count + 3, round2(total.tax))?;
        row += 1;
    }

    let total = grand_total(results);
    ws.write_string(row, 0, "合计")?;
    for (col, (_, nt)) in aggregate_by_bucket(results, buckets).iter().enumerate() {
        ws.write_number(row, (col + 1) as u16, round2(nt.gross))?;
    }
    ws.write_number(row, bucket_count + 1, round2(total.gross))?;
    ws.write_number(row, bucket_count + 2, round2(total.net))?;
    ws.write_number(row, bucket_count + 3, round2(total.tax))?;
    Ok(())
}

fn write_totals_long(ws: &mut Worksheet, rows: &[TotalsLongRow]) -> Result<()> {
    write_header(ws, &["code", "name", "debit", "credit", "source_row"])?;
    for (i, r) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        ws.write_string(row, 0, r.code.as_deref().unwrap_or(""))?;
        ws.write_string(row, 1, &r.name)?;
        ws.write_number(row, 2, round2(r.debit))?;
        ws.write_number(row, 3, round2(r.credit))?;
        ws.write_number(row, 4, r.source_row as f64)?;
    }
    Ok(())
}

fn write_reconciliation(
    ws: &mut Worksheet,
    rec: &ReconciliationResult,
    checksum: &str,
) -> Result<()> {
    write_header(ws, &["指标", "金额"])?;
    let mut scalars: Vec<(String, f64)> = vec![
        ("借方合计".to_string(), rec.debit_total),
        ("转账(贷方)".to_string(), rec.transfer_credit),
        ("转内部成本".to_string(), rec.internal_cost_credit),
    ];
    scalars.extend(rec.category_totals.iter().cloned());
    scalars.extend([
        ("凭证贷方".to_string(), rec.voucher_credit),
        ("应挂账金额".to_string(), rec.suspense),
        ("凭证借方".to_string(), rec.voucher_debit),
    ]);
    let mut row = 1u32;
    for (label, value) in scalars {
        ws.write_string(row, 0, &label)?;
        ws.write_number(row, 1, round2(value))?;
        row += 1;
    }
    ws.write_string(row, 0, "input_sha256")?;
    ws.write_string(row, 1, checksum)?;
    Ok(())
}

fn write_hit_details(ws: &mut Worksheet, details: &[HitDetail]) -> Result<()> {
    write_header(ws, &["类别", "source_row", "code", "name", "credit"])?;
    let mut row = 1u32;
    for detail in details {
        for r in &detail.rows {
            ws.write_string(row, 0, &detail.category)?;
            ws.write_number(row, 1, r.source_row as f64)?;
            ws.write_string(row, 2, r.code.as_deref().unwrap_or(""))?;
            ws.write_string(row, 3, &r.name)?;
            ws.write_number(row, 4, round2(r.credit))?;
            row += 1;
        }
    }
    Ok(())
}
