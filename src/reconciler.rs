use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::TotalsLongRow;

/// Row name that carries the month's transfer credit.
pub const TRANSFER_NAME: &str = "转账";
/// Row name for internal cost transfers, netted out of the voucher credit.
pub const INTERNAL_COST_NAME: &str = "转内部成本";

// ---------------------------------------------------------------------------
// Hit list
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    #[default]
    Exact,
    Contains,
    Regex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitRule {
    pub pattern: String,
    #[serde(default)]
    pub match_type: MatchType,
}

impl HitRule {
    pub fn exact(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            match_type: MatchType::Exact,
        }
    }

    fn matches(&self, name: &str) -> bool {
        let name = name.trim();
        match self.match_type {
            MatchType::Exact => name == self.pattern,
            MatchType::Contains => name.contains(&self.pattern),
            MatchType::Regex => Regex::new(&self.pattern)
                .map(|re| re.is_match(name))
                .unwrap_or(false),
        }
    }
}

/// One fund category with its name-matching rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitListEntry {
    pub category: String,
    pub rules: Vec<HitRule>,
}

impl HitListEntry {
    fn matches(&self, name: &str) -> bool {
        self.rules.iter().any(|r| r.matches(name))
    }
}

/// The fixed default hit list: fund categories and the account-name
/// synonyms that feed them, as booked by the front desk.
pub fn default_hit_list() -> Vec<HitListEntry> {
    let exact = |category: &str, names: &[&str]| HitListEntry {
        category: category.to_string(),
        rules: names.iter().map(|n| HitRule::exact(n)).collect(),
    };
    vec![
        exact("银行", &["银行转账", "银行转帐", "银行", "银行汇总", "AR支票预收"]),
        exact("微信", &["微信", "微信支付", "微信汇总"]),
        exact("现金", &["现金结账", "现金", "现金汇总", "AR现金预收"]),
        exact("拉卡拉", &["拉卡拉", "拉卡拉预收", "银联POS预收", "拉卡拉汇总"]),
        exact("财政", &["财政", "财政汇总"]),
    ]
}

/// Append user-supplied names (exact match) to the default categories.
/// Each entry may itself be a delimited list. Unknown categories become
/// new entries; duplicates are dropped.
pub fn extend_hit_list(
    base: Vec<HitListEntry>,
    extra: &BTreeMap<String, Vec<String>>,
) -> Vec<HitListEntry> {
    let mut list = base;
    for (category, names) in extra {
        let idx = match list.iter().position(|e| &e.category == category) {
            Some(idx) => idx,
            None => {
                list.push(HitListEntry {
                    category: category.clone(),
                    rules: Vec::new(),
                });
                list.len() - 1
            }
        };
        let entry = &mut list[idx];
        for name in names.iter().flat_map(|n| parse_name_list(n)) {
            let exists = entry
                .rules
                .iter()
                .any(|r| r.match_type == MatchType::Exact && r.pattern == name);
            if !exists {
                entry.rules.push(HitRule::exact(&name));
            }
        }
    }
    list
}

/// Split free text into names: newlines, commas (full or half width), 、
/// and semicolons all delimit. Order preserved, duplicates dropped.
pub fn parse_name_list(text: &str) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::new();
    for part in text
        .replace(['，', '、', ';', '；'], ",")
        .split(['\n', ','])
    {
        let part = part.trim();
        if !part.is_empty() && seen.insert(part.to_string()) {
            out.push(part.to_string());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Matched rows for one category, kept for the audit sheet.
#[derive(Debug, Clone)]
pub struct HitDetail {
    pub category: String,
    pub rows: Vec<TotalsLongRow>,
    pub credit_total: f64,
}

#[derive(Debug, Clone)]
pub struct ReconciliationResult {
    pub debit_total: f64,
    pub transfer_credit: f64,
    pub internal_cost_credit: f64,
    /// debit_total − transfer_credit − internal_cost_credit
    pub voucher_credit: f64,
    /// Per-category credit sums in hit-list order.
    pub category_totals: Vec<(String, f64)>,
    pub fund_category_total: f64,
    /// voucher_credit − fund_category_total: the "should be booked" residual.
    pub suspense: f64,
    /// fund_category_total + suspense. Equals voucher_credit by
    /// construction; carried as a self-check, not an independent figure.
    pub voucher_debit: f64,
}

/// Back-derive the expected voucher figures from the long-form totals.
/// A row matching several categories is counted in every one of them (each
/// category is summed independently over the whole table). An empty table
/// reconciles to all zeros; that is a valid state, not a fault.
pub fn reconcile(
    rows: &[TotalsLongRow],
    hit_list: &[HitListEntry],
) -> (ReconciliationResult, Vec<HitDetail>) {
    let debit_total: f64 = rows.iter().map(|r| r.debit).sum();
    let credit_where = |wanted: &str| -> f64 {
        rows.iter()
            .filter(|r| r.name.trim() == wanted)
            .map(|r| r.credit)
            .sum()
    };
    let transfer_credit = credit_where(TRANSFER_NAME);
    let internal_cost_credit = credit_where(INTERNAL_COST_NAME);

    let mut details = Vec::new();
    let mut category_totals = Vec::new();
    for entry in hit_list {
        let matched: Vec<TotalsLongRow> = rows
            .iter()
            .filter(|r| entry.matches(&r.name))
            .cloned()
            .collect();
        let credit_total: f64 = matched.iter().map(|r| r.credit).sum();
        category_totals.push((entry.category.clone(), credit_total));
        details.push(HitDetail {
            category: entry.category.clone(),
            rows: matched,
            credit_total,
        });
    }

    let fund_category_total: f64 = category_totals.iter().map(|(_, c)| c).sum();
    let voucher_credit = debit_total - transfer_credit - internal_cost_credit;
    let suspense = voucher_credit - fund_category_total;
    let voucher_debit = fund_category_total + suspense;

    (
        ReconciliationResult {
            debit_total,
            transfer_credit,
            internal_cost_credit,
            voucher_credit,
            category_totals,
            fund_category_total,
            suspense,
            voucher_debit,
        },
        details,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, debit: f64, credit: f64) -> TotalsLongRow {
        TotalsLongRow {
            code: None,
            name: name.to_string(),
            debit,
            credit,
            source_row: 0,
        }
    }

    #[test]
    fn test_scalar_chain() {
        let rows = vec![
            row("银行", 500.0, 400.0),
            row("现金结账", 500.0, 200.0),
            row("转账", 0.0, 200.0),
            row("转内部成本", 0.0, 100.0),
        ];
        let (result, _) = reconcile(&rows, &default_hit_list());
        assert_eq!(result.debit_total, 1000.0);
        assert_eq!(result.transfer_credit, 200.0);
        assert_eq!(result.internal_cost_credit, 100.0);
        assert_eq!(result.voucher_credit, 700.0);
        assert_eq!(result.fund_category_total, 600.0);
        assert_eq!(result.suspense, 100.0);
        assert_eq!(result.voucher_debit, 700.0);
    }

    #[test]
    fn test_voucher_tautology_holds_for_odd_data() {
        let rows = vec![
            row("未知渠道", 123.45, 67.89),
            row("转账", 0.0, -50.0),
        ];
        let (result, _) = reconcile(&rows, &default_hit_list());
        assert!((result.voucher_debit - result.voucher_credit).abs() < 1e-9);
    }

    #[test]
    fn test_empty_table_reconciles_to_zero() {
        let (result, details) = reconcile(&[], &default_hit_list());
        assert_eq!(result.debit_total, 0.0);
        assert_eq!(result.voucher_credit, 0.0);
        assert_eq!(result.suspense, 0.0);
        assert!(details.iter().all(|d| d.rows.is_empty()));
    }

    #[test]
    fn test_hit_detail_records_matched_rows() {
        let rows = vec![
            row("银行转账", 0.0, 300.0),
            row("银行", 0.0, 100.0),
            row("微信", 0.0, 50.0),
        ];
        let (result, details) = reconcile(&rows, &default_hit_list());
        let bank = details.iter().find(|d| d.category == "银行").unwrap();
        assert_eq!(bank.rows.len(), 2);
        assert_eq!(bank.credit_total, 400.0);
        assert_eq!(result.category_totals[0], ("银行".to_string(), 400.0));
    }

    #[test]
    fn test_overlapping_categories_count_in_both() {
        // A name appended to two categories is summed in both; that is the
        // documented policy for overlapping hit lists.
        let extra = BTreeMap::from([
            ("银行".to_string(), vec!["共用渠道".to_string()]),
            ("财政".to_string(), vec!["共用渠道".to_string()]),
        ]);
        let hit_list = extend_hit_list(default_hit_list(), &extra);
        let rows = vec![row("共用渠道", 0.0, 80.0)];
        let (result, _) = reconcile(&rows, &hit_list);
        assert_eq!(result.fund_category_total, 160.0);
    }

    #[test]
    fn test_transfer_match_is_exact() {
        let rows = vec![row("转账(待核)", 0.0, 500.0), row(" 转账 ", 0.0, 200.0)];
        let (result, _) = reconcile(&rows, &default_hit_list());
        assert_eq!(result.transfer_credit, 200.0);
    }

    #[test]
    fn test_extend_hit_list_dedupes() {
        let extra = BTreeMap::from([(
            "银行".to_string(),
            vec!["银行".to_string(), "新渠道".to_string(), "新渠道".to_string()],
        )]);
        let list = extend_hit_list(default_hit_list(), &extra);
        let bank = list.iter().find(|e| e.category == "银行").unwrap();
        let new_count = bank.rules.iter().filter(|r| r.pattern == "新渠道").count();
        let old_count = bank.rules.iter().filter(|r| r.pattern == "银行").count();
        assert_eq!(new_count, 1);
        assert_eq!(old_count, 1);
    }

    #[test]
    fn test_extend_hit_list_splits_delimited_entries() {
        let extra = BTreeMap::from([(
            "微信".to_string(),
            vec!["美团、饿了么".to_string()],
        )]);
        let list = extend_hit_list(default_hit_list(), &extra);
        let wechat = list.iter().find(|e| e.category == "微信").unwrap();
        assert!(wechat.rules.iter().any(|r| r.pattern == "美团"));
        assert!(wechat.rules.iter().any(|r| r.pattern == "饿了么"));
    }

    #[test]
    fn test_contains_and_regex_rules() {
        let list = vec![HitListEntry {
            category: "银行".to_string(),
            rules: vec![
                HitRule {
                    pattern: "银行".to_string(),
                    match_type: MatchType::Contains,
                },
                HitRule {
                    pattern: r"^POS\d+$".to_string(),
                    match_type: MatchType::Regex,
                },
            ],
        }];
        let rows = vec![
            row("工商银行专户", 0.0, 10.0),
            row("POS12", 0.0, 20.0),
            row("POSX", 0.0, 40.0),
        ];
        let (result, _) = reconcile(&rows, &list);
        assert_eq!(result.fund_category_total, 30.0);
    }

    #[test]
    fn test_parse_name_list() {
        let parsed = parse_name_list("银行A，银行B、银行C;银行A\n银行D");
        assert_eq!(parsed, vec!["银行A", "银行B", "银行C", "银行D"]);
        assert!(parse_name_list("  \n ").is_empty());
    }
}
