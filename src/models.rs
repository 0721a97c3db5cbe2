/// One normalized transaction from the detail sheet. `income_type` and
/// `clean_name` are computed once by the normalizer; `None` income type
/// means the label carried no ASCII letter (unclassified).
#[derive(Debug, Clone)]
pub struct DetailRow {
    pub project: String,
    pub raw_label: String,
    pub clean_name: String,
    pub income_type: Option<String>,
    pub amount: f64,
    pub source_row: usize,
}

/// One long-form row from the totals sheet. Trailing summary rows are
/// filtered out before these are built.
#[derive(Debug, Clone)]
pub struct TotalsLongRow {
    pub code: Option<String>,
    pub name: String,
    pub debit: f64,
    pub credit: f64,
    pub source_row: usize,
}
