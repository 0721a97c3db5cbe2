use std::collections::{BTreeMap, BTreeSet};

use crate::models::DetailRow;

/// Name × project pivot of detail amounts. Keys are kept sorted so the
/// rendered sheet is stable between runs (spreadsheets get eyeballed, and
/// a reshuffled row order reads as a data change).
#[derive(Debug, Default)]
pub struct PivotTable {
    pub names: Vec<String>,
    pub projects: Vec<String>,
    cells: BTreeMap<(String, String), f64>,
}

impl PivotTable {
    pub fn get(&self, name: &str, project: &str) -> f64 {
        self.cells
            .get(&(name.to_string(), project.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    /// Non-empty cells in (name, project) order.
    pub fn cells(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.cells
            .iter()
            .map(|((n, p), amt)| (n.as_str(), p.as_str(), *amt))
    }

    pub fn row_total(&self, name: &str) -> f64 {
        self.projects.iter().map(|p| self.get(name, p)).sum()
    }

    pub fn column_total(&self, project: &str) -> f64 {
        self.names.iter().map(|n| self.get(n, project)).sum()
    }

    pub fn grand_total(&self) -> f64 {
        self.cells.values().sum()
    }
}

/// True when `row` passes the income-type selection. An empty set means no
/// filtering; unclassified rows only survive the empty filter.
pub fn matches_types(row: &DetailRow, income_types: &BTreeSet<String>) -> bool {
    if income_types.is_empty() {
        return true;
    }
    row.income_type
        .as_ref()
        .is_some_and(|t| income_types.contains(t))
}

pub fn filter_by_types(rows: &[DetailRow], income_types: &BTreeSet<String>) -> Vec<DetailRow> {
    rows.iter()
        .filter(|r| matches_types(r, income_types))
        .cloned()
        .collect()
}

/// Group the selected rows by (clean_name, project) and sum amounts. The
/// project column set is whatever the filtered rows contain, not a fixed
/// schema.
pub fn pivot(rows: &[DetailRow], income_types: &BTreeSet<String>) -> PivotTable {
    let mut cells: BTreeMap<(String, String), f64> = BTreeMap::new();
    let mut names: BTreeSet<String> = BTreeSet::new();
    let mut projects: BTreeSet<String> = BTreeSet::new();

    for row in rows.iter().filter(|r| matches_types(r, income_types)) {
        *cells
            .entry((row.clean_name.clone(), row.project.clone()))
            .or_default() += row.amount;
        names.insert(row.clean_name.clone());
        projects.insert(row.project.clone());
    }

    PivotTable {
        names: names.into_iter().collect(),
        projects: projects.into_iter().collect(),
        cells,
    }
}
