use std::collections::BTreeMap;
use std::fmt;

use crate::allocation::{validate_allocation, AllocationMismatch, AllocationRow};
use crate::reconciler::ReconciliationResult;
use crate::tax::{aggregate_by_name, aggregate_by_project, grand_total, TaxSplitResult};

#[derive(Debug, Clone)]
pub enum ValidationFailure {
    /// One allocation row out of balance with its pivot cell.
    Row(AllocationMismatch),
    /// A name-level or project-level rollup out of balance.
    Rollup {
        dimension: &'static str,
        key: String,
        expected: f64,
        actual: f64,
    },
    /// The grand totals disagree.
    GrandTotal { expected: f64, actual: f64 },
    /// Tax aggregates across dimensions drifted apart.
    AggregateDrift {
        dimension: &'static str,
        delta: f64,
    },
    /// voucher_debit != voucher_credit. Structurally impossible; kept as a
    /// tripwire for the reconciliation arithmetic.
    VoucherSelfCheck { credit: f64, debit: f64 },
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Row(m) => write!(
                f,
                "allocation out of balance for {}/{}: allocated {:.2}, cell {:.2} (delta {:+.2})",
                m.name, m.project, m.actual, m.expected, m.delta
            ),
            Self::Rollup {
                dimension,
                key,
                expected,
                actual,
            } => write!(
                f,
                "{dimension} rollup out of balance for {key}: allocated {actual:.2}, amount {expected:.2}"
            ),
            Self::GrandTotal { expected, actual } => write!(
                f,
                "grand total out of balance: allocated {actual:.2}, amount {expected:.2}"
            ),
            Self::AggregateDrift { dimension, delta } => write!(
                f,
                "tax aggregates drifted on the {dimension} dimension by {delta:+.4}"
            ),
            Self::VoucherSelfCheck { credit, debit } => write!(
                f,
                "voucher self-check broken: credit {credit:.2} != debit {debit:.2}"
            ),
        }
    }
}

/// The single authoritative export gate: `ok` must hold before any output
/// workbook is written.
#[derive(Debug)]
pub struct ValidationReport {
    pub failures: Vec<ValidationFailure>,
}

impl ValidationReport {
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }
}

fn rollup_failures(
    rows: &[AllocationRow],
    dimension: &'static str,
    key_of: fn(&AllocationRow) -> &str,
    tolerance: f64,
    failures: &mut Vec<ValidationFailure>,
) {
    let mut expected: BTreeMap<String, f64> = BTreeMap::new();
    let mut actual: BTreeMap<String, f64> = BTreeMap::new();
    for row in rows {
        *expected.entry(key_of(row).to_string()).or_default() += row.amount;
        *actual.entry(key_of(row).to_string()).or_default() += row.allocated_total();
    }
    for (key, exp) in &expected {
        let act = actual[key];
        if (act - exp).abs() > tolerance {
            failures.push(ValidationFailure::Rollup {
                dimension,
                key: key.clone(),
                expected: *exp,
                actual: act,
            });
        }
    }
}

/// Run every check over the allocation and tax-split outputs. All failures
/// are collected rather than raised so the caller always gets the complete
/// diagnostic picture. Reconciliation imbalance (a nonzero suspense) is
/// business data, not a failure; only the structural self-check is tested.
pub fn validate_all(
    allocation_rows: &[AllocationRow],
    tax_results: &[TaxSplitResult],
    reconciliation: Option<&ReconciliationResult>,
    tolerance: f64,
) -> ValidationReport {
    let mut failures = Vec::new();

    for row in allocation_rows {
        if let Some(mismatch) = validate_allocation(row, row.amount, tolerance) {
            failures.push(ValidationFailure::Row(mismatch));
        }
    }

    rollup_failures(allocation_rows, "name", |r| &r.name, tolerance, &mut failures);
    rollup_failures(
        allocation_rows,
        "project",
        |r| &r.project,
        tolerance,
        &mut failures,
    );

    let expected_total: f64 = allocation_rows.iter().map(|r| r.amount).sum();
    let actual_total: f64 = allocation_rows.iter().map(|r| r.allocated_total()).sum();
    if (actual_total - expected_total).abs() > tolerance {
        failures.push(ValidationFailure::GrandTotal {
            expected: expected_total,
            actual: actual_total,
        });
    }

    let total = grand_total(tax_results);
    let name_net: f64 = aggregate_by_name(tax_results).values().map(|v| v.net).sum();
    let project_net: f64 = aggregate_by_project(tax_results)
        .values()
        .map(|v| v.net)
        .sum();
    if (total.net - name_net).abs() > tolerance {
        failures.push(ValidationFailure::AggregateDrift {
            dimension: "name",
            delta: total.net - name_net,
        });
    }
    if (total.net - project_net).abs() > tolerance {
        failures.push(ValidationFailure::AggregateDrift {
            dimension: "project",
            delta: total.net - project_net,
        });
    }

    if let Some(rec) = reconciliation {
        if (rec.voucher_debit - rec.voucher_credit).abs() > tolerance {
            failures.push(ValidationFailure::VoucherSelfCheck {
                credit: rec.voucher_credit,
                debit: rec.voucher_debit,
            });
        }
    }

    ValidationReport { failures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::{
        build_allocations, AllocationSnapshot, BucketConfig, BUCKET_NO_TAX,
    };
    use crate::models::DetailRow;
    use crate::pivot::pivot;
    use crate::tax::split_all;
    use std::collections::BTreeSet;

    fn build(entries: &[(&str, &str, f64)]) -> Vec<AllocationRow> {
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
        let p = pivot(&rows, &BTreeSet::new());
        build_allocations(&p, &AllocationSnapshot::new(), &BucketConfig::default())
    }

    #[test]
    fn test_clean_data_passes() {
        let config = BucketConfig::default();
        let alloc = build(&[("A", "客房", 150.0), ("B", "餐饮", -20.0)]);
        let results = split_all(&alloc, &config);
        let report = validate_all(&alloc, &results, None, 0.01);
        assert!(report.ok(), "unexpected failures: {:?}", report.failures);
    }

    #[test]
    fn test_broken_row_blocks_export() {
        let config = BucketConfig::default();
        let mut alloc = build(&[("A", "客房", 150.0)]);
        alloc[0].buckets.insert(BUCKET_NO_TAX.to_string(), 120.0);
        let results = split_all(&alloc, &config);
        let report = validate_all(&alloc, &results, None, 0.01);
        assert!(!report.ok());
        // One broken row surfaces at row, name, project, and grand-total
        // levels.
        assert_eq!(report.failures.len(), 4);
        assert!(matches!(report.failures[0], ValidationFailure::Row(_)));
    }

    #[test]
    fn test_offsetting_rows_caught_at_row_level() {
        let config = BucketConfig::default();
        let mut alloc = build(&[("A", "客房", 100.0), ("A", "餐饮", 100.0)]);
        // +30 on one row, -30 on the other: name rollup balances, rows do
        // not.
        alloc[0].buckets.insert(BUCKET_NO_TAX.to_string(), 130.0);
        alloc[1].buckets.insert(BUCKET_NO_TAX.to_string(), 70.0);
        let results = split_all(&alloc, &config);
        let report = validate_all(&alloc, &results, None, 0.01);
        let row_failures = report
            .failures
            .iter()
            .filter(|f| matches!(f, ValidationFailure::Row(_)))
            .count();
        assert_eq!(row_failures, 2);
    }

    #[test]
    fn test_tolerance_respected() {
        let config = BucketConfig::default();
        let mut alloc = build(&[("A", "客房", 100.0)]);
        alloc[0].buckets.insert(BUCKET_NO_TAX.to_string(), 100.004);
        let results = split_all(&alloc, &config);
        assert!(validate_all(&alloc, &results, None, 0.01).ok());
        assert!(!validate_all(&alloc, &results, None, 0.001).ok());
    }

    #[test]
    fn test_failures_render() {
        let config = BucketConfig::default();
        let mut alloc = build(&[("A", "客房", 150.0)]);
        alloc[0].buckets.insert(BUCKET_NO_TAX.to_string(), 0.0);
        let results = split_all(&alloc, &config);
        let report = validate_all(&alloc, &results, None, 0.01);
        let rendered = report.failures[0].to_string();
        assert!(rendered.contains("A/客房"));
        assert!(rendered.contains("150.00"));
    }
}
