use std::collections::BTreeMap;

use crate::allocation::{AllocationRow, BucketConfig};

/// Gross / net-of-tax / tax triple. Unrounded; `fmt::round2` is applied
/// once when a figure reaches a sheet or a console table.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetTax {
    pub gross: f64,
    pub net: f64,
    pub tax: f64,
}

impl NetTax {
    pub fn accumulate(&mut self, other: NetTax) {
        self.gross += other.gross;
        self.net += other.net;
        self.tax += other.tax;
    }
}

#[derive(Debug, Clone)]
pub struct TaxSplitResult {
    pub name: String,
    pub project: String,
    pub by_bucket: BTreeMap<String, NetTax>,
}

impl TaxSplitResult {
    pub fn total(&self) -> NetTax {
        let mut total = NetTax::default();
        for v in self.by_bucket.values() {
            total.accumulate(*v);
        }
        total
    }
}

fn decompose(gross: f64, rate: Option<f64>) -> NetTax {
    match rate {
        None => NetTax {
            gross,
            net: gross,
            tax: 0.0,
        },
        Some(rate) => {
            let net = gross / (1.0 + rate);
            NetTax {
                gross,
                net,
                tax: gross - net,
            }
        }
    }
}

/// Split one allocation row into net/tax per bucket. The decomposition is
/// sign-agnostic: a negative allocation yields negative net and tax, which
/// keeps the aggregate cross-checks exact for mixed-sign data.
pub fn split(row: &AllocationRow, config: &BucketConfig) -> TaxSplitResult {
    let by_bucket = config
        .buckets
        .iter()
        .map(|b| (b.id.clone(), decompose(row.bucket(&b.id), b.rate)))
        .collect();
    TaxSplitResult {
        name: row.name.clone(),
        project: row.project.clone(),
        by_bucket,
    }
}

pub fn split_all(rows: &[AllocationRow], config: &BucketConfig) -> Vec<TaxSplitResult> {
    rows.iter().map(|r| split(r, config)).collect()
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Per-bucket totals across every result, in registry order.
pub fn aggregate_by_bucket(
    results: &[TaxSplitResult],
    config: &BucketConfig,
) -> Vec<(String, NetTax)> {
    config
        .buckets
        .iter()
        .map(|b| {
            let mut sum = NetTax::default();
            for r in results {
                if let Some(v) = r.by_bucket.get(&b.id) {
                    sum.accumulate(*v);
                }
            }
            (b.id.clone(), sum)
        })
        .collect()
}

pub fn aggregate_by_name(results: &[TaxSplitResult]) -> BTreeMap<String, NetTax> {
    let mut out: BTreeMap<String, NetTax> = BTreeMap::new();
    for r in results {
        out.entry(r.name.clone()).or_default().accumulate(r.total());
    }
    out
}

pub fn aggregate_by_project(results: &[TaxSplitResult]) -> BTreeMap<String, NetTax> {
    let mut out: BTreeMap<String, NetTax> = BTreeMap::new();
    for r in results {
        out.entry(r.project.clone())
            .or_default()
            .accumulate(r.total());
    }
    out
}

pub fn grand_total(results: &[TaxSplitResult]) -> NetTax {
    let mut total = NetTax::default();
    for r in results {
        total.accumulate(r.total());
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::{BUCKET_NO_TAX, BUCKET_TAX_5, BUCKET_TAX_6};

    fn row(name: &str, project: &str, no_tax: f64, tax5: f64, tax6: f64) -> AllocationRow {
        AllocationRow {
            name: name.to_string(),
            project: project.to_string(),
            amount: no_tax + tax5 + tax6,
            buckets: BTreeMap::from([
                (BUCKET_NO_TAX.to_string(), no_tax),
                (BUCKET_TAX_5.to_string(), tax5),
                (BUCKET_TAX_6.to_string(), tax6),
            ]),
            note: String::new(),
        }
    }

    #[test]
    fn test_no_tax_bucket_is_identity() {
        let config = BucketConfig::default();
        let result = split(&row("A", "客房", 150.0, 0.0, 0.0), &config);
        let nt = result.by_bucket[BUCKET_NO_TAX];
        assert_eq!(nt.net, 150.0);
        assert_eq!(nt.tax, 0.0);
        assert_eq!(result.total().gross, 150.0);
    }

    #[test]
    fn test_rate_decomposition() {
        let config = BucketConfig::default();
        let result = split(&row("A", "客房", 0.0, 0.0, 106.0), &config);
        let t6 = result.by_bucket[BUCKET_TAX_6];
        assert!((t6.net - 100.0).abs() < 1e-9);
        assert!((t6.tax - 6.0).abs() < 1e-9);
        // net + tax reconstructs the gross exactly
        assert!((t6.net + t6.tax - t6.gross).abs() < 1e-12);
    }

    #[test]
    fn test_negative_allocation_decomposes() {
        let config = BucketConfig::default();
        let result = split(&row("A", "客房", 0.0, -105.0, 0.0), &config);
        let t5 = result.by_bucket[BUCKET_TAX_5];
        assert!((t5.net + 100.0).abs() < 1e-9);
        assert!((t5.tax + 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregation_consistency() {
        let config = BucketConfig::default();
        let rows = vec![
            row("甲", "客房", 100.0, 52.5, 0.0),
            row("甲", "餐饮", 0.0, 0.0, 212.0),
            row("乙", "客房", -30.0, 0.0, 53.0),
        ];
        let results = split_all(&rows, &config);

        let total = grand_total(&results);
        let name_sum: f64 = aggregate_by_name(&results).values().map(|v| v.tax).sum();
        let project_sum: f64 = aggregate_by_project(&results)
            .values()
            .map(|v| v.tax)
            .sum();
        let bucket_sum: f64 = aggregate_by_bucket(&results, &config)
            .iter()
            .map(|(_, v)| v.tax)
            .sum();

        assert!((total.tax - name_sum).abs() < 1e-9);
        assert!((total.tax - project_sum).abs() < 1e-9);
        assert!((total.tax - bucket_sum).abs() < 1e-9);

        let name_net: f64 = aggregate_by_name(&results).values().map(|v| v.net).sum();
        assert!((total.net - name_net).abs() < 1e-9);
    }

    #[test]
    fn test_by_bucket_keeps_registry_order() {
        let config = BucketConfig::default();
        let results = split_all(&[row("A", "客房", 1.0, 2.0, 3.0)], &config);
        let agg = aggregate_by_bucket(&results, &config);
        let ids: Vec<&str> = agg.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec![BUCKET_NO_TAX, BUCKET_TAX_5, BUCKET_TAX_6]);
    }
}
