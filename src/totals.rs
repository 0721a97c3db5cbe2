use crate::error::Result;
use crate::models::TotalsLongRow;
use crate::schema::locate_totals_columns;
use crate::workbook::{cell_num, cell_str, Grid};

/// Names that mark a running-total row rather than a booking.
const GRAND_TOTAL_LABELS: &[&str] = &["合计", "总计"];

/// Reshape the totals sheet into long rows of (code, name, debit, credit).
/// Summary rows are excluded: anything whose name carries a grand-total
/// label, and trailing rows where both code and name are blank (those carry
/// the sheet's running totals and would double every figure downstream).
pub fn normalize_totals(grid: &Grid) -> Result<Vec<TotalsLongRow>> {
    let cols = locate_totals_columns(grid)?;

    let mut rows = Vec::new();
    for (idx, row) in grid.iter().enumerate().skip(cols.header_row + 1) {
        let name = cell_str(row, cols.name);
        let code = cols.code.and_then(|c| cell_str(row, c));
        let debit = cols.debit.and_then(|c| cell_num(row, c)).unwrap_or(0.0);
        let credit = cols.credit.and_then(|c| cell_num(row, c)).unwrap_or(0.0);

        if let Some(n) = &name {
            if GRAND_TOTAL_LABELS.iter().any(|label| n.contains(label)) {
                continue;
            }
        }
        if name.is_none() && code.is_none() {
            continue;
        }
        if name.is_none() && debit == 0.0 && credit == 0.0 {
            continue;
        }

        rows.push(TotalsLongRow {
            code,
            name: name.unwrap_or_default(),
            debit,
            credit,
            source_row: idx,
        });
    }

    Ok(rows)
}
