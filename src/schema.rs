//! Header discovery for the two input sheets. Column positions drift
//! between source files, so each sheet is scanned once for its header
//! text and the resulting column binding is treated as immutable for the
//! rest of the run.

use crate::error::{FrontdeskError, Result};
use crate::workbook::{cell_num, find_cell_containing, Grid};

// Header synonyms for the detail sheet.
const DETAIL_PROJECT: &str = "项目";
const DETAIL_NAME: &str = "名称";
const DETAIL_AMOUNT: &str = "金额";

// Header synonyms for the totals sheet.
const TOTALS_NAME: &str = "名称";
const TOTALS_DEBIT: &str = "借方";
const TOTALS_CREDIT: &str = "贷方";

// Historical layout used when no header row is present at all: project in
// column 0, name in column 2 (matches years of hand-maintained sheets).
const FALLBACK_PROJECT_COL: usize = 0;
const FALLBACK_NAME_COL: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct DetailColumns {
    /// Row index of the located header, if any. Data starts on the next row.
    pub header_row: Option<usize>,
    pub project: usize,
    pub name: usize,
    pub amount: usize,
}

impl DetailColumns {
    pub fn data_start(&self) -> usize {
        self.header_row.map_or(0, |h| h + 1)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TotalsColumns {
    pub header_row: usize,
    pub code: Option<usize>,
    pub name: usize,
    pub debit: Option<usize>,
    pub credit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Detail sheet
// ---------------------------------------------------------------------------

pub fn locate_detail_columns(grid: &Grid) -> Result<DetailColumns> {
    let mut header_row = None;
    let mut project = None;
    let mut name = None;
    let mut amount = None;

    for (idx, row) in grid.iter().enumerate() {
        let p = find_cell_containing(row, DETAIL_PROJECT);
        let n = find_cell_containing(row, DETAIL_NAME);
        if p.is_some() && n.is_some() {
            header_row = Some(idx);
            project = p;
            name = n;
            amount = find_cell_containing(row, DETAIL_AMOUNT);
            break;
        }
    }

    let project = project.unwrap_or(FALLBACK_PROJECT_COL);
    let name = name.unwrap_or(FALLBACK_NAME_COL);

    let data_start = header_row.map_or(0, |h| h + 1);
    let amount = match amount {
        Some(col) => col,
        None => detect_amount_col(grid, data_start, &[project, name]).ok_or_else(|| {
            FrontdeskError::Schema("no amount column found in detail sheet".to_string())
        })?,
    };

    let width = grid.iter().map(|r| r.len()).max().unwrap_or(0);
    if project >= width || name >= width {
        return Err(FrontdeskError::Schema(format!(
            "detail sheet too narrow for bound columns (project={project}, name={name}, width={width})"
        )));
    }

    Ok(DetailColumns {
        header_row,
        project,
        name,
        amount,
    })
}

/// Pick the column with the most numeric cells, skipping the already-bound
/// project/name columns. Mirrors the clerks' rule of thumb: whichever
/// column is mostly numbers is the amount.
fn detect_amount_col(grid: &Grid, data_start: usize, exclude: &[usize]) -> Option<usize> {
    let width = grid.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut best: Option<(usize, usize)> = None;
    for col in 0..width {
        if exclude.contains(&col) {
            continue;
        }
        let count = grid
            .iter()
            .skip(data_start)
            .filter(|row| cell_num(row, col).is_some())
            .count();
        if count > 0 && best.map_or(true, |(_, c)| count > c) {
            best = Some((col, count));
        }
    }
    best.map(|(col, _)| col)
}

// ---------------------------------------------------------------------------
// Totals sheet
// ---------------------------------------------------------------------------

pub fn locate_totals_columns(grid: &Grid) -> Result<TotalsColumns> {
    // Primary: find the row carrying the name header, then look for the
    // debit/credit headers on that row or the rows above it (the totals
    // sheet often stacks a two-line header).
    for (idx, row) in grid.iter().enumerate() {
        let Some(name) = find_cell_containing(row, TOTALS_NAME) else {
            continue;
        };
        let mut debit = None;
        let mut credit = None;
        for above in grid.iter().take(idx + 1) {
            if debit.is_none() {
                debit = find_cell_containing(above, TOTALS_DEBIT);
            }
            if credit.is_none() {
                credit = find_cell_containing(above, TOTALS_CREDIT);
            }
        }
        if debit.is_none() && credit.is_none() {
            return Err(FrontdeskError::Schema(
                "totals sheet has a name header but no debit/credit columns".to_string(),
            ));
        }
        let code = if name > 0 { Some(name - 1) } else { None };
        return Ok(TotalsColumns {
            header_row: idx,
            code,
            name,
            debit,
            credit,
        });
    }

    // Fallback: a debit/credit-only header. The name sits two columns left
    // of the debit column and the code one further left, per the historical
    // layout.
    for (idx, row) in grid.iter().enumerate() {
        let debit = find_cell_containing(row, TOTALS_DEBIT);
        let credit = find_cell_containing(row, TOTALS_CREDIT);
        if debit.is_none() && credit.is_none() {
            continue;
        }
        let name = debit.and_then(|d| d.checked_sub(2)).ok_or_else(|| {
            FrontdeskError::Schema("cannot infer name column from debit position".to_string())
        })?;
        return Ok(TotalsColumns {
            header_row: idx,
            code: name.checked_sub(1),
            name,
            debit,
            credit,
        });
    }

    Err(FrontdeskError::Schema(
        "no header row with 名称/借方/贷方 found in totals sheet".to_string(),
    ))
}
