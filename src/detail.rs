use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::DetailRow;
use crate::normalizer::{clean_name, derive_income_type};
use crate::schema::locate_detail_columns;
use crate::workbook::{cell_num, cell_str, Grid};

pub struct DetailSheet {
    pub rows: Vec<DetailRow>,
    /// Rows whose label carried no income-type letter. Reported in the run
    /// summary; the rows themselves stay in the data.
    pub unclassified: usize,
}

/// Normalize the raw detail sheet: bind columns, coerce amounts, derive the
/// income type from the raw label, then clean the label into a grouping
/// name. Rows without a numeric amount are dropped (headers, blanks,
/// annotations). `project_aliases` merges legacy project names, e.g.
/// 半日租 → 房费.
pub fn normalize_detail(
    grid: &Grid,
    project_aliases: &BTreeMap<String, String>,
) -> Result<DetailSheet> {
    let cols = locate_detail_columns(grid)?;

    let mut rows = Vec::new();
    let mut unclassified = 0usize;

    for (idx, row) in grid.iter().enumerate().skip(cols.data_start()) {
        let Some(amount) = cell_num(row, cols.amount) else {
            continue;
        };
        let raw_label = cell_str(row, cols.name).unwrap_or_default();
        let mut project = cell_str(row, cols.project).unwrap_or_default();
        if let Some(merged) = project_aliases.get(&project) {
            project = merged.clone();
        }

        // The type letter is taken from the raw label before cleaning, the
        // same order the clerks applied by hand.
        let income_type = derive_income_type(&raw_label);
        if income_type.is_none() {
            unclassified += 1;
        }

        rows.push(DetailRow {
            project,
            clean_name: clean_name(&raw_label),
            raw_label,
            income_type,
            amount,
            source_row: idx,
        });
    }

    Ok(DetailSheet { rows, unclassified })
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::Data;

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    fn grid() -> Grid {
        vec![
            vec![s("项目"), s("日期"), s("名称"), s("金额")],
            vec![s("房费"), s("8/1"), s("H空房费_调整01"), Data::Float(100.0)],
            vec![s("半日租"), s("8/1"), s("H半日_02"), Data::Float(50.0)],
            vec![s("餐费"), s("8/2"), s("早餐"), Data::Float(-20.0)],
            vec![s("房费"), s("8/3"), s("小计"), s("备注行")],
        ]
    }

    fn aliases() -> BTreeMap<String, String> {
        BTreeMap::from([("半日租".to_string(), "房费".to_string())])
    }

    #[test]
    fn test_normalize_detail() {
        let sheet = normalize_detail(&grid(), &aliases()).unwrap();
        assert_eq!(sheet.rows.len(), 3);

        let first = &sheet.rows[0];
        assert_eq!(first.project, "房费");
        assert_eq!(first.clean_name, "H空房费");
        assert_eq!(first.income_type.as_deref(), Some("H"));
        assert_eq!(first.amount, 100.0);
        assert_eq!(first.source_row, 1);
    }

    #[test]
    fn test_project_alias_merged() {
        let sheet = normalize_detail(&grid(), &aliases()).unwrap();
        assert_eq!(sheet.rows[1].project, "房费");
    }

    #[test]
    fn test_unclassified_counted_not_dropped() {
        let sheet = normalize_detail(&grid(), &aliases()).unwrap();
        assert_eq!(sheet.unclassified, 1);
        let row = &sheet.rows[2];
        assert!(row.income_type.is_none());
        assert_eq!(row.amount, -20.0);
    }

    #[test]
    fn test_non_numeric_amount_rows_skipped() {
        let sheet = normalize_detail(&grid(), &aliases()).unwrap();
        assert!(sheet.rows.iter().all(|r| r.raw_label != "小计"));
    }

    #[test]
    fn test_negative_amounts_kept() {
        let sheet = normalize_detail(&grid(), &aliases()).unwrap();
        let total: f64 = sheet.rows.iter().map(|r| r.amount).sum();
        assert_eq!(total, 130.0);
    }
}
