use std::collections::BTreeMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{FrontdeskError, Result};
use crate::pivot::PivotTable;

// ---------------------------------------------------------------------------
// Bucket registry
// ---------------------------------------------------------------------------

/// A tax-treatment bucket. `rate: None` marks the no-tax bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    pub id: String,
    pub rate: Option<f64>,
}

/// Single source of truth for the bucket set, shared by the allocation
/// engine and the tax splitter. Adding a rate tier means adding one entry
/// here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    pub buckets: Vec<Bucket>,
    /// Bucket that receives 100% of a cell when no prior edit exists.
    pub default_bucket: String,
}

pub const BUCKET_NO_TAX: &str = "不计税分配";
pub const BUCKET_TAX_5: &str = "计税分配-5%";
pub const BUCKET_TAX_6: &str = "计税分配-6%";

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            buckets: vec![
                Bucket {
                    id: BUCKET_NO_TAX.to_string(),
                    rate: None,
                },
                Bucket {
                    id: BUCKET_TAX_5.to_string(),
                    rate: Some(0.05),
                },
                Bucket {
                    id: BUCKET_TAX_6.to_string(),
                    rate: Some(0.06),
                },
            ],
            default_bucket: BUCKET_NO_TAX.to_string(),
        }
    }
}

impl BucketConfig {
    pub fn ids(&self) -> Vec<&str> {
        self.buckets.iter().map(|b| b.id.as_str()).collect()
    }

    pub fn rate(&self, id: &str) -> Option<f64> {
        self.buckets
            .iter()
            .find(|b| b.id == id)
            .and_then(|b| b.rate)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buckets.is_empty() {
            return Err(FrontdeskError::Settings("bucket list is empty".to_string()));
        }
        let mut seen = std::collections::BTreeSet::new();
        for b in &self.buckets {
            if !seen.insert(&b.id) {
                return Err(FrontdeskError::Settings(format!(
                    "duplicate bucket id: {}",
                    b.id
                )));
            }
        }
        if !self.buckets.iter().any(|b| b.id == self.default_bucket) {
            return Err(FrontdeskError::Settings(format!(
                "default bucket {:?} is not in the bucket list",
                self.default_bucket
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Allocation rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AllocationRow {
    pub name: String,
    pub project: String,
    /// Current pivot-cell amount this row must account for.
    pub amount: f64,
    pub buckets: BTreeMap<String, f64>,
    pub note: String,
}

impl AllocationRow {
    pub fn allocated_total(&self) -> f64 {
        self.buckets.values().sum()
    }

    pub fn bucket(&self, id: &str) -> f64 {
        self.buckets.get(id).copied().unwrap_or(0.0)
    }
}

/// Prior user edits keyed by (clean_name, project). Edits survive
/// re-filtering as long as the key still exists in the new pivot; vanished
/// keys are dropped, new keys get the default rule.
pub type AllocationSnapshot = BTreeMap<(String, String), AllocationRow>;

fn default_row(name: &str, project: &str, amount: f64, config: &BucketConfig) -> AllocationRow {
    let buckets = config
        .buckets
        .iter()
        .map(|b| {
            let v = if b.id == config.default_bucket {
                amount
            } else {
                0.0
            };
            (b.id.clone(), v)
        })
        .collect();
    AllocationRow {
        name: name.to_string(),
        project: project.to_string(),
        amount,
        buckets,
        note: String::new(),
    }
}

/// One allocation row per pivot cell. A prior row with the same key keeps
/// its bucket values and note verbatim; only the target amount is refreshed
/// to the current cell so validation compares against live data.
pub fn build_allocations(
    pivot: &PivotTable,
    prior: &AllocationSnapshot,
    config: &BucketConfig,
) -> Vec<AllocationRow> {
    pivot
        .cells()
        .map(|(name, project, amount)| {
            match prior.get(&(name.to_string(), project.to_string())) {
                Some(edited) => AllocationRow {
                    name: name.to_string(),
                    project: project.to_string(),
                    amount,
                    buckets: edited.buckets.clone(),
                    note: edited.note.clone(),
                },
                None => default_row(name, project, amount, config),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A row whose bucket sum drifted from its cell amount. Collected, never
/// thrown; the aggregator uses these to block export.
#[derive(Debug, Clone)]
pub struct AllocationMismatch {
    pub name: String,
    pub project: String,
    pub expected: f64,
    pub actual: f64,
    pub delta: f64,
}

/// Negative totals and negative bucket values are legitimate (refunds,
/// adjustments); only the sum has to line up.
pub fn validate_allocation(
    row: &AllocationRow,
    expected_total: f64,
    tolerance: f64,
) -> Option<AllocationMismatch> {
    let actual = row.allocated_total();
    let delta = actual - expected_total;
    if delta.abs() > tolerance {
        Some(AllocationMismatch {
            name: row.name.clone(),
            project: row.project.clone(),
            expected: expected_total,
            actual,
            delta,
        })
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Snapshot CSV round-trip
// ---------------------------------------------------------------------------

const COL_NAME: &str = "名称";
const COL_PROJECT: &str = "项目";
const COL_AMOUNT: &str = "金额";
const COL_NOTE: &str = "备注";

/// Write the allocation table as an editable CSV. The user adjusts bucket
/// columns in a spreadsheet and feeds the file back with `--alloc`.
pub fn write_snapshot_csv<W: Write>(
    out: W,
    rows: &[AllocationRow],
    config: &BucketConfig,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    let mut header = vec![COL_NAME, COL_PROJECT, COL_AMOUNT];
    header.extend(config.ids());
    header.push(COL_NOTE);
    wtr.write_record(&header)?;
    for row in rows {
        let mut record = vec![
            row.name.clone(),
            row.project.clone(),
            format!("{:.2}", row.amount),
        ];
        for id in config.ids() {
            record.push(format!("{:.2}", row.bucket(id)));
        }
        record.push(row.note.clone());
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_snapshot_csv<R: Read>(input: R, config: &BucketConfig) -> Result<AllocationSnapshot> {
    let mut rdr = csv::Reader::from_reader(input);
    let headers = rdr.headers()?.clone();
    let col = |want: &str| headers.iter().position(|h| h.trim() == want);

    let name_col = col(COL_NAME).ok_or_else(|| {
        FrontdeskError::Schema(format!("allocation snapshot missing {COL_NAME} column"))
    })?;
    let project_col = col(COL_PROJECT).ok_or_else(|| {
        FrontdeskError::Schema(format!("allocation snapshot missing {COL_PROJECT} column"))
    })?;
    let amount_col = col(COL_AMOUNT);
    let note_col = col(COL_NOTE);
    let bucket_cols: Vec<(String, Option<usize>)> = config
        .ids()
        .iter()
        .map(|id| (id.to_string(), col(id)))
        .collect();

    let mut snapshot = AllocationSnapshot::new();
    for record in rdr.records() {
        let record = record?;
        let get = |i: usize| record.get(i).unwrap_or("").trim().to_string();
        let num = |i: Option<usize>| {
            i.and_then(|i| record.get(i))
                .and_then(|v| v.trim().replace(',', "").parse::<f64>().ok())
                .unwrap_or(0.0)
        };

        let name = get(name_col);
        let project = get(project_col);
        let buckets: BTreeMap<String, f64> = bucket_cols
            .iter()
            .map(|(id, i)| (id.clone(), num(*i)))
            .collect();

        snapshot.insert(
            (name.clone(), project.clone()),
            AllocationRow {
                name,
                project,
                amount: num(amount_col),
                buckets,
                note: note_col.map(get).unwrap_or_default(),
            },
        );
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DetailRow;
    use crate::pivot::pivot;
    use std::collections::BTreeSet;

    fn cell_pivot(entries: &[(&str, &str, f64)]) -> PivotTable {
        let rows: Vec<DetailRow> = entries
            .iter()
            .map(|(n, p, a)| DetailRow {
                project: p.to_string(),
                raw_label: n.to_string(),
                clean_name: n.to_string(),
                income_type: Some("H".to_string()),
                amount: *a,
                source_row: 0,
            })
            .collect();
        pivot(&rows, &BTreeSet::new())
    }

    #[test]
    fn test_default_allocation_balances_exactly() {
        let p = cell_pivot(&[("A", "客房", 150.0), ("B", "餐饮", -40.0)]);
        let config = BucketConfig::default();
        let rows = build_allocations(&p, &AllocationSnapshot::new(), &config);
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(validate_allocation(row, row.amount, 0.01).map(|m| m.delta), None);
            assert_eq!(row.bucket(BUCKET_NO_TAX), row.amount);
            assert_eq!(row.bucket(BUCKET_TAX_6), 0.0);
        }
    }

    #[test]
    fn test_prior_edit_survives_rebuild() {
        let p = cell_pivot(&[("A", "客房", 150.0)]);
        let config = BucketConfig::default();
        let mut rows = build_allocations(&p, &AllocationSnapshot::new(), &config);
        rows[0].buckets.insert(BUCKET_NO_TAX.to_string(), 50.0);
        rows[0].buckets.insert(BUCKET_TAX_6.to_string(), 100.0);
        rows[0].note = "手工拆分".to_string();

        let snapshot: AllocationSnapshot = rows
            .iter()
            .map(|r| ((r.name.clone(), r.project.clone()), r.clone()))
            .collect();
        let rebuilt = build_allocations(&p, &snapshot, &config);
        assert_eq!(rebuilt[0].bucket(BUCKET_NO_TAX), 50.0);
        assert_eq!(rebuilt[0].bucket(BUCKET_TAX_6), 100.0);
        assert_eq!(rebuilt[0].note, "手工拆分");
    }

    #[test]
    fn test_vanished_key_dropped_new_key_defaulted() {
        let config = BucketConfig::default();
        let old = cell_pivot(&[("A", "客房", 150.0)]);
        let mut snapshot: AllocationSnapshot = build_allocations(&old, &AllocationSnapshot::new(), &config)
            .into_iter()
            .map(|r| ((r.name.clone(), r.project.clone()), r))
            .collect();
        snapshot
            .get_mut(&("A".to_string(), "客房".to_string()))
            .unwrap()
            .note = "edited".to_string();

        let new = cell_pivot(&[("B", "餐饮", 70.0)]);
        let rebuilt = build_allocations(&new, &snapshot, &config);
        assert_eq!(rebuilt.len(), 1);
        assert_eq!(rebuilt[0].name, "B");
        assert_eq!(rebuilt[0].note, "");
        assert_eq!(rebuilt[0].bucket(BUCKET_NO_TAX), 70.0);
    }

    #[test]
    fn test_mismatch_detected() {
        let p = cell_pivot(&[("A", "客房", 150.0)]);
        let config = BucketConfig::default();
        let mut rows = build_allocations(&p, &AllocationSnapshot::new(), &config);
        rows[0].buckets.insert(BUCKET_NO_TAX.to_string(), 100.0);

        let mismatch = validate_allocation(&rows[0], 150.0, 0.01).unwrap();
        assert_eq!(mismatch.expected, 150.0);
        assert_eq!(mismatch.actual, 100.0);
        assert!((mismatch.delta + 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_split_is_valid() {
        let config = BucketConfig::default();
        let row = AllocationRow {
            name: "A".to_string(),
            project: "客房".to_string(),
            amount: -100.0,
            buckets: BTreeMap::from([
                (BUCKET_NO_TAX.to_string(), -30.0),
                (BUCKET_TAX_5.to_string(), 0.0),
                (BUCKET_TAX_6.to_string(), -70.0),
            ]),
            note: String::new(),
        };
        config.validate().unwrap();
        assert!(validate_allocation(&row, -100.0, 0.01).is_none());
    }

    #[test]
    fn test_bucket_config_validation() {
        let mut config = BucketConfig::default();
        config.default_bucket = "没有这个桶".to_string();
        assert!(config.validate().is_err());

        let mut dup = BucketConfig::default();
        dup.buckets.push(Bucket {
            id: BUCKET_NO_TAX.to_string(),
            rate: None,
        });
        assert!(dup.validate().is_err());
    }

    #[test]
    fn test_snapshot_csv_roundtrip() {
        let config = BucketConfig::default();
        let p = cell_pivot(&[("A", "客房", 150.0)]);
        let mut rows = build_allocations(&p, &AllocationSnapshot::new(), &config);
        rows[0].buckets.insert(BUCKET_NO_TAX.to_string(), 90.0);
        rows[0].buckets.insert(BUCKET_TAX_6.to_string(), 60.0);
        rows[0].note = "拆6%".to_string();

        let mut buf = Vec::new();
        write_snapshot_csv(&mut buf, &rows, &config).unwrap();
        let snapshot = read_snapshot_csv(buf.as_slice(), &config).unwrap();

        let restored = &snapshot[&("A".to_string(), "客房".to_string())];
        assert_eq!(restored.bucket(BUCKET_NO_TAX), 90.0);
        assert_eq!(restored.bucket(BUCKET_TAX_6), 60.0);
        assert_eq!(restored.note, "拆6%");
        assert_eq!(restored.amount, 150.0);
    }
}
